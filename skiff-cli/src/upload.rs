//! Upload coordinator
//!
//! Streams each input's archive into the write end of its pipe. Uploads run as
//! independent tasks; the first one to fail fails the whole command.

use anyhow::{Context, Result};
use reqwest::Body;
use skiff_client::SkiffClient;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::archive::ArchiveStrategy;
use crate::inputs::Input;

/// Uploads one input
///
/// The archive is streamed into the request body as it is produced.
pub async fn upload(client: &SkiffClient, input: &Input, strategy: &ArchiveStrategy) -> Result<()> {
    debug!(
        "Uploading input {} from {} into pipe {}",
        input.name,
        input.local_path.display(),
        input.pipe.id
    );

    let archive = strategy
        .produce(&input.local_path)
        .await
        .with_context(|| format!("could not archive input {}", input.name))?;

    let body = Body::wrap_stream(ReaderStream::new(archive));
    client
        .write_pipe(&input.pipe.id, body)
        .await
        .with_context(|| format!("failed to upload input {}", input.name))?;

    info!("Uploaded input {}", input.name);
    Ok(())
}

/// Starts one upload task per input
pub fn spawn_uploads(
    client: Arc<SkiffClient>,
    inputs: Vec<Input>,
    strategy: ArchiveStrategy,
) -> JoinSet<Result<()>> {
    let strategy = Arc::new(strategy);
    let mut uploads = JoinSet::new();

    for input in inputs {
        let client = Arc::clone(&client);
        let strategy = Arc::clone(&strategy);
        uploads.spawn(async move { upload(&client, &input, &strategy).await });
    }

    uploads
}

/// Resolves with the first upload error
///
/// Never resolves if every upload succeeds.
pub async fn first_failure(uploads: &mut JoinSet<Result<()>>) -> anyhow::Error {
    while let Some(joined) = uploads.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return e,
            Err(e) => return anyhow::Error::new(e).context("upload task failed"),
        }
    }

    std::future::pending().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use skiff_core::domain::pipe::Pipe;
    use skiff_testutil::FakeServer;
    use std::time::Duration;

    fn input(name: &str, dir: &std::path::Path, pipe_id: &str) -> Input {
        Input {
            name: name.to_string(),
            local_path: dir.to_path_buf(),
            pipe: Pipe {
                id: pipe_id.to_string(),
                peer_addr: "pipe-node.test:7777".to_string(),
            },
        }
    }

    fn archive_paths(bytes: &[u8]) -> Vec<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_upload_streams_archive_into_pipe() {
        let server = FakeServer::start().await;
        let client = SkiffClient::new(server.url()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi\n").unwrap();

        upload(&client, &input("src", dir.path(), "pipe-1"), &ArchiveStrategy::BuiltIn)
            .await
            .unwrap();

        let uploaded = server.state().uploaded("pipe-1").unwrap();
        assert_eq!(archive_paths(&uploaded), vec!["hello.txt"]);
    }

    #[tokio::test]
    async fn test_upload_rejected_by_server() {
        let server = FakeServer::builder().upload_status(500).start().await;
        let client = SkiffClient::new(server.url()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = upload(&client, &input("src", dir.path(), "pipe-1"), &ArchiveStrategy::BuiltIn)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("failed to upload input src"));
    }

    #[tokio::test]
    async fn test_spawned_uploads_all_complete() {
        let server = FakeServer::start().await;
        let client = Arc::new(SkiffClient::new(server.url()).unwrap());
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();

        let mut uploads = spawn_uploads(
            client,
            vec![input("a", a.path(), "pipe-1"), input("b", b.path(), "pipe-2")],
            ArchiveStrategy::BuiltIn,
        );

        // No failure ever resolves
        let outcome = tokio::time::timeout(Duration::from_secs(2), first_failure(&mut uploads)).await;
        assert!(outcome.is_err());

        assert!(server.state().uploaded("pipe-1").is_some());
        assert!(server.state().uploaded("pipe-2").is_some());
    }

    #[tokio::test]
    async fn test_first_failure_reports_missing_input() {
        let server = FakeServer::start().await;
        let client = Arc::new(SkiffClient::new(server.url()).unwrap());
        let dir = tempfile::tempdir().unwrap();

        let mut uploads = spawn_uploads(
            client,
            vec![input("gone", &dir.path().join("gone"), "pipe-1")],
            ArchiveStrategy::BuiltIn,
        );

        let err = first_failure(&mut uploads).await;
        assert!(format!("{:#}", err).contains("could not archive input gone"));
        assert!(server.state().uploaded("pipe-1").is_none());
    }
}
