//! Build API endpoints

use reqwest::StatusCode;
use skiff_core::domain::build::Build;
use skiff_core::domain::config::JobConfig;
use skiff_core::domain::pipe::Pipe;
use skiff_core::dto::build::{BuildSpec, InputSource};
use tracing::{debug, info};

use crate::SkiffClient;
use crate::error::Result;
use crate::routes;
use crate::session::SessionTokens;

/// An input to reference from a new build
#[derive(Debug, Clone, Copy)]
pub struct BuildInput<'a> {
    pub name: &'a str,
    pub pipe: &'a Pipe,
}

impl SkiffClient {
    // =============================================================================
    // Build Lifecycle
    // =============================================================================

    /// Assemble the build specification for `inputs`
    ///
    /// Inputs keep their order. Each one is read from its pipe's peer node.
    /// Builds are always requested privileged.
    pub fn build_spec(&self, inputs: &[BuildInput<'_>], config: JobConfig) -> Result<BuildSpec> {
        let inputs = inputs
            .iter()
            .map(|input| {
                let uri = self.read_pipe_url(input.pipe)?;
                Ok(InputSource::archive(input.name, uri.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BuildSpec {
            privileged: true,
            config,
            inputs,
        })
    }

    /// Create a build reading from the given inputs
    ///
    /// # Returns
    /// The created build and the session cookies that pin its event stream
    /// to the node that accepted it
    pub async fn create_build(
        &self,
        inputs: &[BuildInput<'_>],
        config: JobConfig,
    ) -> Result<(Build, SessionTokens)> {
        let spec = self.build_spec(inputs, config)?;
        let url = self.url(routes::CREATE_BUILD)?;

        // .json() also sets Content-Type: application/json
        let response = self.client.post(url).json(&spec).send().await?;
        let response = self
            .expect_status(response, StatusCode::CREATED, "creating build")
            .await?;

        let tokens = SessionTokens::from_response(&response);
        let build: Build = self.decode(response, "creating build").await?;

        info!(
            "Created build {} with {} input(s), {} session cookie(s)",
            build.id,
            spec.inputs.len(),
            tokens.cookies().len()
        );
        Ok((build, tokens))
    }

    /// Ask the server to abort a build
    ///
    /// The response body is discarded; only the status is checked.
    pub async fn abort_build(&self, build_id: u64) -> Result<()> {
        let url = self.url(&routes::abort_build(build_id))?;
        let response = self.client.post(url).send().await?;

        self.expect_success(response, "aborting build").await?;
        debug!("Abort requested for build {}", build_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use skiff_testutil::FakeServer;
    use skiff_core::domain::build::BuildStatus;
    use skiff_core::domain::config::RunConfig;

    fn pipe(id: &str, peer_addr: &str) -> Pipe {
        Pipe {
            id: id.to_string(),
            peer_addr: peer_addr.to_string(),
        }
    }

    fn job_config() -> JobConfig {
        JobConfig {
            image: None,
            run: RunConfig {
                path: "./ci/test.sh".to_string(),
                args: vec![],
            },
            params: Default::default(),
        }
    }

    #[test]
    fn test_build_spec_keeps_input_order_and_targets_peers() {
        let client = SkiffClient::new("http://gateway:8080").unwrap();
        let a = pipe("a", "10.0.0.1:7777");
        let b = pipe("b", "10.0.0.2:7777");
        let c = pipe("c", "10.0.0.1:7777");
        let inputs = [
            BuildInput { name: "zeta", pipe: &a },
            BuildInput { name: "alpha", pipe: &b },
            BuildInput { name: "mid", pipe: &c },
        ];

        let spec = client.build_spec(&inputs, job_config()).unwrap();

        assert!(spec.privileged);
        let names: Vec<&str> = spec.inputs.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(spec.inputs[0].uri(), Some("http://10.0.0.1:7777/api/v1/pipes/a"));
        assert_eq!(spec.inputs[1].uri(), Some("http://10.0.0.2:7777/api/v1/pipes/b"));
        assert!(spec.inputs.iter().all(|i| i.input_type == "archive"));
        assert!(spec.inputs.iter().all(|i| !i.uri().unwrap().contains("gateway")));
    }

    #[tokio::test]
    async fn test_create_build_captures_cookies() {
        let server = FakeServer::start().await;
        let client = SkiffClient::new(server.url()).unwrap();
        let p = pipe("pipe-1", "10.0.0.7:7777");

        let (build, tokens) = client
            .create_build(&[BuildInput { name: "src", pipe: &p }], job_config())
            .await
            .unwrap();

        assert_eq!(build.id, 42);
        assert_eq!(build.status, BuildStatus::Pending);
        assert_eq!(tokens.cookie_header().as_deref(), Some("node=worker-3; sid=s3cr3t"));

        let requests = server.state().build_requests();
        assert_eq!(requests.len(), 1);
        let body = &requests[0];
        assert_eq!(body.content_type.as_deref(), Some("application/json"));
        assert_eq!(body.spec["privileged"], true);
        assert_eq!(body.spec["inputs"][0]["name"], "src");
        assert_eq!(
            body.spec["inputs"][0]["source"]["uri"],
            "http://10.0.0.7:7777/api/v1/pipes/pipe-1"
        );
        assert_eq!(body.spec["config"]["run"]["path"], "./ci/test.sh");
    }

    #[tokio::test]
    async fn test_create_build_rejected() {
        let server = FakeServer::builder().build_status(503).start().await;
        let client = SkiffClient::new(server.url()).unwrap();

        let err = client.create_build(&[], job_config()).await.unwrap_err();
        match err {
            ClientError::UnexpectedStatus { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "build rejected");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_abort_build() {
        let server = FakeServer::start().await;
        let client = SkiffClient::new(server.url()).unwrap();

        client.abort_build(42).await.unwrap();
        client.abort_build(7).await.unwrap();

        assert_eq!(server.state().aborts(), vec![42, 7]);
    }
}
