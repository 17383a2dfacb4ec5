//! Input mappings
//!
//! Each `--input name=path` flag declares a local directory to upload as a
//! named build input.

use anyhow::{Context, Result};
use skiff_core::domain::pipe::Pipe;
use std::path::{Path, PathBuf};

/// A declared input, before its pipe exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMapping {
    pub name: String,
    /// Absolute path of the directory to upload
    pub path: PathBuf,
}

/// An input with its allocated pipe
#[derive(Debug, Clone)]
pub struct Input {
    pub name: String,
    pub local_path: PathBuf,
    pub pipe: Pipe,
}

impl InputMapping {
    /// Parses `name=path`, resolving `path` against the working directory
    pub fn parse(raw: &str) -> Result<Self> {
        let (name, path) = raw
            .split_once('=')
            .with_context(|| format!("malformed input: {}", raw))?;

        if name.is_empty() || path.is_empty() {
            anyhow::bail!("malformed input: {}", raw);
        }

        let path = std::path::absolute(path)
            .with_context(|| format!("could not locate input {}", name))?;

        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    /// The working directory, named after its last path component
    pub fn current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().context("could not determine working directory")?;
        Self::for_dir(cwd)
    }

    fn for_dir(path: PathBuf) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("cannot name an input after {}", path.display()))?;

        Ok(Self { name, path })
    }

    /// Attaches the pipe allocated for this input
    pub fn with_pipe(self, pipe: Pipe) -> Input {
        Input {
            name: self.name,
            local_path: self.path,
            pipe,
        }
    }
}

/// Resolves the `--input` flags, defaulting to the working directory
///
/// Every mapped path must be an existing directory.
pub fn resolve_mappings(raw: &[String]) -> Result<Vec<InputMapping>> {
    let mappings = if raw.is_empty() {
        vec![InputMapping::current_dir()?]
    } else {
        raw.iter()
            .map(|r| InputMapping::parse(r))
            .collect::<Result<Vec<_>>>()?
    };

    for mapping in &mappings {
        ensure_dir(&mapping.name, &mapping.path)?;
    }

    Ok(mappings)
}

fn ensure_dir(name: &str, path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("could not locate input {} at {}", name, path.display()))?;

    if !metadata.is_dir() {
        anyhow::bail!("input {} is not a directory: {}", name, path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping() {
        let mapping = InputMapping::parse("src=/tmp/project").unwrap();
        assert_eq!(mapping.name, "src");
        assert_eq!(mapping.path, PathBuf::from("/tmp/project"));
    }

    #[test]
    fn test_parse_relative_path_is_absolute() {
        let mapping = InputMapping::parse("src=some/dir").unwrap();
        assert!(mapping.path.is_absolute());
        assert!(mapping.path.ends_with("some/dir"));
    }

    #[test]
    fn test_parse_keeps_equals_in_path() {
        let mapping = InputMapping::parse("src=/tmp/a=b").unwrap();
        assert_eq!(mapping.path, PathBuf::from("/tmp/a=b"));
    }

    #[test]
    fn test_parse_malformed() {
        for raw in ["src", "=/tmp", "src=", ""] {
            let err = InputMapping::parse(raw).unwrap_err();
            assert!(err.to_string().contains("malformed input"), "{}", raw);
        }
    }

    #[test]
    fn test_default_mapping_named_after_directory() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("my-project");
        std::fs::create_dir(&project).unwrap();

        let mapping = InputMapping::for_dir(project.clone()).unwrap();
        assert_eq!(mapping.name, "my-project");
        assert_eq!(mapping.path, project);
    }

    #[test]
    fn test_resolve_keeps_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b", "a", "c"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }

        let raw: Vec<String> = ["b", "a", "c"]
            .iter()
            .map(|n| format!("{}={}", n, dir.path().join(n).display()))
            .collect();
        let mappings = resolve_mappings(&raw).unwrap();

        let names: Vec<&str> = mappings.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_resolve_rejects_missing_and_non_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        let missing = format!("src={}", dir.path().join("nope").display());
        assert!(resolve_mappings(&[missing]).is_err());

        let not_dir = format!("src={}", file.display());
        let err = resolve_mappings(&[not_dir]).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
