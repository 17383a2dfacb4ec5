//! Cancellation controller
//!
//! The first termination signal asks the server to abort the build and keeps
//! the client attached so the operator sees the build wind down. A second
//! signal gives up on the build and exits immediately.

use anyhow::Result;
use async_trait::async_trait;
use colored::*;
use skiff_client::SkiffClient;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Exit code after a second termination signal
pub const FORCED_EXIT_CODE: i32 = 2;

/// Out-of-band abort of a running build
#[async_trait]
pub trait AbortBuild: Send + Sync {
    /// Requests an abort; the server's answer is not waited on beyond its status
    async fn abort(&self, build_id: u64) -> Result<()>;
}

#[async_trait]
impl AbortBuild for SkiffClient {
    async fn abort(&self, build_id: u64) -> Result<()> {
        self.abort_build(build_id).await?;
        Ok(())
    }
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    /// Waiting for the first signal
    Armed,
    /// Abort requested, waiting for a second signal
    Terminating,
}

/// How the controller stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A second signal arrived; the process should exit now
    Forced,
    /// The signal source went away
    Detached,
}

/// Two-step signal escalation for one build
pub struct CancellationController<A: AbortBuild + ?Sized + 'static> {
    build_id: u64,
    aborter: Arc<A>,
    state: CancelState,
}

impl<A: AbortBuild + ?Sized + 'static> CancellationController<A> {
    pub fn new(build_id: u64, aborter: Arc<A>) -> Self {
        Self {
            build_id,
            aborter,
            state: CancelState::Armed,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> CancelState {
        self.state
    }

    /// Reacts to signals until the second one arrives
    pub async fn run(mut self, mut signals: mpsc::Receiver<()>) -> CancelOutcome {
        while signals.recv().await.is_some() {
            match self.state {
                CancelState::Armed => {
                    eprintln!("\n{}", "aborting...".yellow());
                    self.request_abort();
                    self.state = CancelState::Terminating;
                }
                CancelState::Terminating => {
                    eprintln!("{}", "exiting immediately".red());
                    return CancelOutcome::Forced;
                }
            }
        }

        debug!("Signal source closed, cancellation controller detached");
        CancelOutcome::Detached
    }

    /// Fires the abort request without blocking the next signal
    fn request_abort(&self) {
        let aborter = Arc::clone(&self.aborter);
        let build_id = self.build_id;

        tokio::spawn(async move {
            if let Err(e) = aborter.abort(build_id).await {
                warn!("failed to abort build {}: {:#}", build_id, e);
            }
        });
    }
}

/// Forwards SIGINT and SIGTERM into a channel
///
/// Installing the listeners replaces the default terminate-on-signal
/// behavior for the rest of the process.
pub fn termination_signals() -> Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel(4);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = interrupt.recv() => {}
                    Some(()) = terminate.recv() => {}
                    else => break,
                }
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}
