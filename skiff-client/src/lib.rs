//! Skiff HTTP Client
//!
//! A type-safe client for the build server's pipe, build and event APIs.
//!
//! # Example
//!
//! ```no_run
//! use skiff_client::SkiffClient;
//!
//! #[tokio::main]
//! async fn main() -> skiff_client::Result<()> {
//!     let client = SkiffClient::new("http://localhost:8080")?;
//!
//!     let pipe = client.create_pipe().await?;
//!     println!("Created pipe {} on {}", pipe.id, pipe.peer_addr);
//!     Ok(())
//! }
//! ```

mod builds;
pub mod error;
mod events;
mod pipes;
pub mod routes;
mod session;

// Re-export commonly used types
pub use builds::BuildInput;
pub use error::{ClientError, Result};
pub use events::EventStream;
pub use session::{SessionCookie, SessionTokens};

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

/// HTTP client for the build server
///
/// Cheap to clone: clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct SkiffClient {
    /// Base URL of the server (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl SkiffClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:8080")
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure proxies, TLS settings, etc.
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self { base_url, client })
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a route path
    pub fn url(&self, path: &str) -> Result<Url> {
        let url = format!("{}{}", self.base_url, path);
        Url::parse(&url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Require `expected` status, otherwise turn the response into an error
    async fn expect_status(
        &self,
        response: reqwest::Response,
        expected: StatusCode,
        action: &'static str,
    ) -> Result<reqwest::Response> {
        if response.status() == expected {
            return Ok(response);
        }
        Err(self.bad_response(response, action).await)
    }

    /// Require any 2xx status
    async fn expect_success(
        &self,
        response: reqwest::Response,
        action: &'static str,
    ) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(self.bad_response(response, action).await)
    }

    /// Build an error that carries the response body
    ///
    /// The body is what tells the operator why the server refused.
    async fn bad_response(&self, response: reqwest::Response, action: &'static str) -> ClientError {
        let status = response.status();
        tracing::debug!("bad response when {}: {:?}", action, response.headers());

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        ClientError::unexpected_status(action, status.as_u16(), body)
    }

    /// Deserialize a JSON body
    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        action: &'static str,
    ) -> Result<T> {
        response.json().await.map_err(|e| {
            ClientError::ParseError(format!("malformed response when {}: {}", action, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SkiffClient::new("http://localhost:8080").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = SkiffClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_rejects_invalid_url() {
        assert!(matches!(
            SkiffClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_route_url() {
        let client = SkiffClient::new("http://localhost:8080").unwrap();
        let url = client.url("/api/v1/pipes").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/v1/pipes");
    }
}
