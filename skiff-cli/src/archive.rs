//! Input archives
//!
//! Turns a local directory into a gzip-compressed tar stream, rooted at the
//! directory and without its `.git` metadata.
//!
//! Two strategies produce the same archive contents:
//! - [`ArchiveStrategy::ExternalTar`] pipes `tar` output straight through, so
//!   the archive is never held in memory or on disk
//! - [`ArchiveStrategy::BuiltIn`] writes the archive to a temporary file first,
//!   for hosts without `tar`

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use futures_util::future::BoxFuture;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context as TaskContext, Poll, ready};
use tempfile::TempPath;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{ChildStdout, Command};
use tracing::debug;
use walkdir::WalkDir;

/// Version-control directory left out of every archive
const VCS_DIR: &str = ".git";

/// How archives are produced on this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStrategy {
    /// Stream the output of an external `tar` binary
    ExternalTar { tar: PathBuf },
    /// Archive in-process into a temporary file
    BuiltIn,
}

impl ArchiveStrategy {
    /// Uses `tar` from `PATH` when there is one
    pub fn detect() -> Self {
        match which::which("tar") {
            Ok(tar) => {
                debug!("Archiving inputs with {}", tar.display());
                ArchiveStrategy::ExternalTar { tar }
            }
            Err(_) => {
                debug!("No tar on PATH, archiving inputs in-process");
                ArchiveStrategy::BuiltIn
            }
        }
    }

    /// Starts producing the archive of `dir`
    pub async fn produce(&self, dir: &Path) -> Result<ArchiveStream> {
        match self {
            ArchiveStrategy::ExternalTar { tar } => spawn_tar(tar, dir),
            ArchiveStrategy::BuiltIn => {
                let dir = dir.to_path_buf();
                tokio::task::spawn_blocking(move || archive_to_tempfile(&dir))
                    .await
                    .context("archive task failed")?
            }
        }
    }
}

/// A readable archive byte stream
///
/// Dropping the stream kills a still-running `tar` or removes the temporary
/// file. A `tar` that exits unsuccessfully turns the end of its output into a
/// read error, so a truncated archive is never mistaken for a complete one.
pub enum ArchiveStream {
    Subprocess {
        stdout: ChildStdout,
        // Owns the child, which is killed if this is dropped unfinished.
        // `None` once the exit status has been collected.
        exit: Option<BoxFuture<'static, std::io::Result<ExitStatus>>>,
    },
    TempFile {
        file: tokio::fs::File,
        path: TempPath,
    },
}

impl ArchiveStream {
    /// Location of the backing temporary file, if any
    pub fn temp_path(&self) -> Option<&Path> {
        match self {
            ArchiveStream::Subprocess { .. } => None,
            ArchiveStream::TempFile { path, .. } => Some(&**path),
        }
    }
}

impl AsyncRead for ArchiveStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ArchiveStream::Subprocess { stdout, exit } => {
                let before = buf.filled().len();
                ready!(Pin::new(stdout).poll_read(cx, buf))?;
                if buf.filled().len() > before || buf.remaining() == 0 {
                    return Poll::Ready(Ok(()));
                }

                // End of output: the archive is only complete if tar succeeded
                let Some(wait) = exit.as_mut() else {
                    return Poll::Ready(Ok(()));
                };
                let status = ready!(wait.as_mut().poll(cx));
                *exit = None;
                Poll::Ready(check_tar_status(status?))
            }
            ArchiveStream::TempFile { file, .. } => Pin::new(file).poll_read(cx, buf),
        }
    }
}

fn check_tar_status(status: ExitStatus) -> std::io::Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("tar {}", status)))
    }
}

fn spawn_tar(tar: &Path, dir: &Path) -> Result<ArchiveStream> {
    let mut child = Command::new(tar)
        .args(["--exclude", VCS_DIR, "-czf", "-", "."])
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("could not run tar in {}", dir.display()))?;

    let stdout = child
        .stdout
        .take()
        .context("could not create tar pipe")?;

    Ok(ArchiveStream::Subprocess {
        stdout,
        exit: Some(Box::pin(async move { child.wait().await })),
    })
}

fn archive_to_tempfile(dir: &Path) -> Result<ArchiveStream> {
    let temp = tempfile::Builder::new()
        .prefix("skiff-")
        .suffix(".tgz")
        .tempfile()
        .context("creating tempfile failed")?;

    write_archive(dir, temp.as_file())
        .with_context(|| format!("creating archive of {} failed", dir.display()))?;

    let (mut file, path) = temp.into_parts();
    file.seek(SeekFrom::Start(0))
        .context("could not open archive")?;

    debug!("Archived {} into {}", dir.display(), path.display());
    Ok(ArchiveStream::TempFile {
        file: tokio::fs::File::from_std(file),
        path,
    })
}

/// Writes a gzip tar of `dir` into `dest`, entries sorted by name
fn write_archive<W: std::io::Write>(dir: &Path, dest: W) -> Result<()> {
    let mut builder = tar::Builder::new(GzEncoder::new(dest, Compression::default()));
    builder.follow_symlinks(false);

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != VCS_DIR);

    for entry in entries {
        let entry = entry?;
        let name = entry.path().strip_prefix(dir)?;
        builder
            .append_path_with_name(entry.path(), name)
            .with_context(|| format!("could not archive {}", entry.path().display()))?;
    }

    builder.into_inner()?.finish()?;
    Ok(())
}
