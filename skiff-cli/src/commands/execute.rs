//! Execute command
//!
//! Submits a build, uploads its inputs and streams its output:
//!
//! 1. Allocate one pipe per input
//! 2. Create the build, reading each input from its pipe
//! 3. Arm the cancellation controller
//! 4. Connect to the build's event stream
//! 5. Upload every input in the background while rendering events
//!
//! Each step needs the result of the one before it, except that uploads and
//! rendering run concurrently.

use anyhow::{Context, Result};
use clap::Args;
use skiff_client::{BuildInput, SessionTokens, SkiffClient};
use skiff_core::domain::config::JobConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::archive::ArchiveStrategy;
use crate::cancel::{self, CancelOutcome, CancellationController};
use crate::config::{self, Config};
use crate::inputs::{self, Input, InputMapping};
use crate::render::render;
use crate::upload;

/// Arguments of `skiff execute`
#[derive(Args)]
pub struct ExecuteArgs {
    /// Build configuration file
    #[arg(short, long, default_value = "build.yml")]
    config: PathBuf,

    /// Input to upload, as NAME=PATH (repeatable; defaults to the current directory)
    #[arg(short, long = "input", value_name = "NAME=PATH")]
    inputs: Vec<String>,

    /// Extra arguments appended to the build's run arguments
    #[arg(last = true)]
    args: Vec<String>,
}

/// Handle `skiff execute`
///
/// Configuration problems are reported before any request is made.
pub async fn handle_execute_command(args: ExecuteArgs, config: &Config) -> Result<i32> {
    config.validate()?;

    let mappings = inputs::resolve_mappings(&args.inputs)?;

    let config_path = std::path::absolute(&args.config).context("could not locate config file")?;
    let job_config = config::load_job_config(&config_path, &args.args)?;

    let client = Arc::new(SkiffClient::new(&config.target_url)?);
    let execution = Execution::new(client, mappings, job_config, ArchiveStrategy::detect());

    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    execution
        .run(cancel::termination_signals, &mut stdout, &mut stderr)
        .await
}

/// One build submission, from pipe allocation to the final status
pub struct Execution {
    client: Arc<SkiffClient>,
    mappings: Vec<InputMapping>,
    job_config: JobConfig,
    strategy: ArchiveStrategy,
}

impl Execution {
    pub fn new(
        client: Arc<SkiffClient>,
        mappings: Vec<InputMapping>,
        job_config: JobConfig,
        strategy: ArchiveStrategy,
    ) -> Self {
        Self {
            client,
            mappings,
            job_config,
            strategy,
        }
    }

    /// Runs the build to completion
    ///
    /// `signals` is called once the build exists and must return the channel
    /// termination signals arrive on.
    ///
    /// # Returns
    /// The exit code mirroring the build's final status, or
    /// [`cancel::FORCED_EXIT_CODE`] after a second signal
    pub async fn run<F, O, E>(self, signals: F, out: &mut O, err: &mut E) -> Result<i32>
    where
        F: FnOnce() -> Result<mpsc::Receiver<()>>,
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let Execution {
            client,
            mappings,
            job_config,
            strategy,
        } = self;

        info!("Submitting build to {}", client.base_url());

        let mut inputs: Vec<Input> = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let pipe = client
                .create_pipe()
                .await
                .with_context(|| format!("failed to create pipe for input {}", mapping.name))?;
            inputs.push(mapping.with_pipe(pipe));
        }

        let build_inputs: Vec<BuildInput<'_>> = inputs
            .iter()
            .map(|input| BuildInput {
                name: &input.name,
                pipe: &input.pipe,
            })
            .collect();
        let (build, tokens) = client
            .create_build(&build_inputs, job_config)
            .await
            .context("failed to create build")?;
        drop(build_inputs);
        info!("Build {} created", build.id);

        let signals = signals().context("failed to listen for termination signals")?;
        let controller = CancellationController::new(build.id, Arc::clone(&client));
        let mut cancellation = tokio::spawn(controller.run(signals));

        // A forced exit must win over anything still in flight, including
        // the event stream handshake
        tokio::select! {
            result = stream_build(&client, build.id, &tokens, inputs, strategy, out, err) => result,
            Ok(CancelOutcome::Forced) = &mut cancellation => Ok(cancel::FORCED_EXIT_CODE),
        }
    }
}

/// Streams a created build's output while its inputs upload
async fn stream_build<O, E>(
    client: &Arc<SkiffClient>,
    build_id: u64,
    tokens: &SessionTokens,
    inputs: Vec<Input>,
    strategy: ArchiveStrategy,
    out: &mut O,
    err: &mut E,
) -> Result<i32>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut events = client
        .open_event_stream(build_id, tokens)
        .await
        .context("failed to stream output")?;

    let mut uploads = upload::spawn_uploads(Arc::clone(client), inputs, strategy);

    let code = tokio::select! {
        code = render(&mut events, out, err) => code.context("failed to render stream")?,
        e = upload::first_failure(&mut uploads) => return Err(e),
    };

    if let Err(e) = events.close().await {
        debug!("Closing event stream failed: {}", e);
    }
    Ok(code)
}
