//! Build output rendering
//!
//! Consumes the build's event stream, writes its output for the operator and
//! works out the exit code the build ended with.

use anyhow::{Context, Result};
use colored::*;
use futures_util::{Stream, StreamExt};
use skiff_core::domain::build::BuildStatus;
use skiff_core::domain::event::BuildEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Renders events until the build reaches a terminal status
///
/// Log output goes to `out` unchanged; errors and the final status go to
/// `err`. Writes are asynchronous so a stalled terminal never blocks the
/// runtime. A stream that ends after the build's command finished but before
/// its final status still yields that command's exit status. A stream that
/// ends before either is an error.
pub async fn render<S, O, E>(events: &mut S, out: &mut O, err: &mut E) -> Result<i32>
where
    S: Stream<Item = skiff_client::Result<BuildEvent>> + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut finish_status: Option<i32> = None;

    while let Some(event) = events.next().await {
        let event = event.context("failed to read build event")?;

        if let Some(status) = event.terminal_status() {
            let line = format!("{}\n", colorize_status(status));
            err.write_all(line.as_bytes()).await?;
            err.flush().await?;
            return Ok(exit_code(status, finish_status));
        }

        match event {
            BuildEvent::Log(log) => {
                out.write_all(log.payload.as_bytes()).await?;
                out.flush().await?;
            }
            BuildEvent::Error(error) => {
                let line = format!("{}\n", error.message.red().bold());
                err.write_all(line.as_bytes()).await?;
            }
            BuildEvent::Finish(finish) => {
                debug!("Build command exited with {}", finish.exit_status);
                finish_status = Some(finish.exit_status);
            }
            BuildEvent::Status(status) => {
                debug!("Build is {}", status.status);
            }
            BuildEvent::Unknown(kind) => {
                debug!("Ignoring unknown build event {:?}", kind);
            }
        }
    }

    finish_status.context("event stream ended before the build finished")
}

/// Exit code for a terminal status
///
/// A failed build reports its command's own exit status when there is one.
/// That status is passed through unchanged, even when it is 2 and so matches
/// the code of a forced exit.
fn exit_code(status: BuildStatus, finish_status: Option<i32>) -> i32 {
    match (status, finish_status) {
        (BuildStatus::Failed, Some(code)) if code != 0 => code,
        _ => status.exit_code(),
    }
}

/// Colorize a build status for display
fn colorize_status(status: BuildStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        BuildStatus::Pending => status_str.yellow(),
        BuildStatus::Started => status_str.cyan(),
        BuildStatus::Succeeded => status_str.green(),
        BuildStatus::Failed => status_str.red(),
        BuildStatus::Errored => status_str.red().bold(),
        BuildStatus::Aborted => status_str.dimmed(),
    }
}
