//! Build creation DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::config::JobConfig;

/// Request body for build creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSpec {
    pub privileged: bool,
    pub config: JobConfig,
    pub inputs: Vec<InputSource>,
}

/// One build input, fetched by the build engine from `source.uri`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub source: HashMap<String, String>,
}

impl InputSource {
    /// Input type for gzip tar archives served over HTTP
    pub const ARCHIVE: &'static str = "archive";

    /// An archive input read from `uri`
    pub fn archive(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_type: Self::ARCHIVE.to_string(),
            source: HashMap::from([("uri".to_string(), uri.into())]),
        }
    }

    /// The URI the build engine reads this input from
    pub fn uri(&self) -> Option<&str> {
        self.source.get("uri").map(String::as_str)
    }
}
