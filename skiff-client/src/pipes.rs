//! Pipe API endpoints

use reqwest::{Body, StatusCode, Url};
use skiff_core::domain::pipe::Pipe;
use tracing::debug;

use crate::SkiffClient;
use crate::error::{ClientError, Result};
use crate::routes;

impl SkiffClient {
    /// Allocate a new pipe
    ///
    /// The server must answer `201 Created` with the pipe's id and the
    /// address of the node holding its buffer.
    pub async fn create_pipe(&self) -> Result<Pipe> {
        let url = self.url(routes::CREATE_PIPE)?;
        let response = self.client.post(url).send().await?;

        let response = self
            .expect_status(response, StatusCode::CREATED, "creating pipe")
            .await?;
        let pipe: Pipe = self.decode(response, "creating pipe").await?;

        debug!("Created pipe {} on {}", pipe.id, pipe.peer_addr);
        Ok(pipe)
    }

    /// URL the build engine reads the pipe from
    ///
    /// Points at the pipe's peer node instead of the configured server, since
    /// only that node holds the buffer.
    pub fn read_pipe_url(&self, pipe: &Pipe) -> Result<Url> {
        let url = self.url(&routes::pipe(&pipe.id))?;
        rewrite_to_peer(url, &pipe.peer_addr)
    }

    /// Stream `body` into the pipe's write endpoint
    ///
    /// Any 2xx answer counts as success.
    pub async fn write_pipe(&self, pipe_id: &str, body: impl Into<Body>) -> Result<()> {
        let url = self.url(&routes::pipe(pipe_id))?;
        let response = self.client.put(url).body(body).send().await?;

        self.expect_success(response, "uploading bits").await?;
        debug!("Finished writing pipe {}", pipe_id);
        Ok(())
    }
}

/// Replaces the host and port of `url` with `peer_addr` (`host:port`)
pub fn rewrite_to_peer(mut url: Url, peer_addr: &str) -> Result<Url> {
    let invalid = || ClientError::InvalidUrl(format!("invalid peer address: {:?}", peer_addr));

    let peer = Url::parse(&format!("{}://{}", url.scheme(), peer_addr)).map_err(|_| invalid())?;
    if peer.path() != "/" || peer.host_str().is_none() {
        return Err(invalid());
    }

    url.set_host(peer.host_str()).map_err(|_| invalid())?;
    url.set_port(peer.port()).map_err(|_| invalid())?;
    Ok(url)
}
