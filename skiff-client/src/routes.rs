//! Server route table

/// Allocate a pipe (POST)
pub const CREATE_PIPE: &str = "/api/v1/pipes";

/// Create a build (POST)
pub const CREATE_BUILD: &str = "/api/v1/builds";

/// Read (GET) or write (PUT) a pipe
pub fn pipe(pipe_id: &str) -> String {
    format!("/api/v1/pipes/{}", pipe_id)
}

/// Live event stream of a build (WebSocket)
pub fn build_events(build_id: u64) -> String {
    format!("/api/v1/builds/{}/events", build_id)
}

/// Abort a build (POST)
pub fn abort_build(build_id: u64) -> String {
    format!("/api/v1/builds/{}/abort", build_id)
}
