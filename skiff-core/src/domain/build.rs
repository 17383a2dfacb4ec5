//! Build domain types

use serde::{Deserialize, Serialize};

/// Build record as returned by the server on creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: u64,
    #[serde(default)]
    pub status: BuildStatus,
}

/// Build execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    #[default]
    Pending,
    Started,
    Succeeded,
    Failed,
    Errored,
    Aborted,
}

impl BuildStatus {
    /// Whether the build can no longer change status
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuildStatus::Succeeded | BuildStatus::Failed | BuildStatus::Errored | BuildStatus::Aborted
        )
    }

    /// Process exit code mirroring this status
    ///
    /// Only meaningful for terminal statuses; non-terminal ones map to 1.
    pub fn exit_code(self) -> i32 {
        match self {
            BuildStatus::Succeeded => 0,
            BuildStatus::Failed => 1,
            BuildStatus::Errored => 3,
            BuildStatus::Aborted => 4,
            BuildStatus::Pending | BuildStatus::Started => 1,
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Pending => write!(f, "pending"),
            BuildStatus::Started => write!(f, "started"),
            BuildStatus::Succeeded => write!(f, "succeeded"),
            BuildStatus::Failed => write!(f, "failed"),
            BuildStatus::Errored => write!(f, "errored"),
            BuildStatus::Aborted => write!(f, "aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&BuildStatus::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");

        let status: BuildStatus = serde_json::from_str("\"errored\"").unwrap();
        assert_eq!(status, BuildStatus::Errored);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!BuildStatus::Pending.is_terminal());
        assert!(!BuildStatus::Started.is_terminal());
        assert!(BuildStatus::Succeeded.is_terminal());
        assert!(BuildStatus::Failed.is_terminal());
        assert!(BuildStatus::Errored.is_terminal());
        assert!(BuildStatus::Aborted.is_terminal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BuildStatus::Succeeded.exit_code(), 0);
        assert_ne!(BuildStatus::Failed.exit_code(), 0);
        assert_ne!(BuildStatus::Errored.exit_code(), 0);
        assert_ne!(BuildStatus::Aborted.exit_code(), 0);
        // 2 is reserved for forced termination
        assert_ne!(BuildStatus::Errored.exit_code(), 2);
        assert_ne!(BuildStatus::Aborted.exit_code(), 2);
    }

    #[test]
    fn test_build_without_status_defaults_to_pending() {
        let build: Build = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        assert_eq!(build.id, 42);
        assert_eq!(build.status, BuildStatus::Pending);
    }
}
