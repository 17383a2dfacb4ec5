//! Job configuration
//!
//! The job configuration is loaded from a file by the command-line tool and
//! sent to the server as part of the build specification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the remote build should run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Container image to run in, when the server should not pick one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub run: RunConfig,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Command to execute inside the build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl JobConfig {
    /// Appends extra arguments to `run.args`
    pub fn append_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run.args.extend(args.into_iter().map(Into::into));
    }

    /// Overwrites every param whose key resolves through `lookup`
    ///
    /// Params with no match keep their configured value; keys that are not
    /// already params are never added.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (key, value) in self.params.iter_mut() {
            if let Some(env) = lookup(key) {
                *value = env;
            }
        }
    }
}
