//! Pipe domain types

use serde::{Deserialize, Serialize};

/// A server-allocated relay channel
///
/// The client writes an archive into the pipe while the build engine reads it
/// back out. The pipe's buffer lives on one specific node, so reads must be
/// addressed to `peer_addr` rather than the API gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipe {
    pub id: String,
    /// `host:port` of the node holding the pipe's buffer
    pub peer_addr: String,
}
