//! Process lifecycle around the ingest loop.
//!
//! Two policies are supported:
//!
//! - **Graceful shutdown**: run until a stop signal (or the feed ends), let the
//!   in-flight event finish, close the catalog and the feed, exit.
//! - **Self restart**: after a fixed number of stored events, start a fresh
//!   copy of this process, give it a moment to come up, then release the
//!   catalog and the listener and exit. The successor binds the listener
//!   with retries, so the hand-over only overlaps during its startup.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::catalog::TorrentCatalog;
use crate::config::{LifecycleConfig, LifecycleMode};
use crate::feed::AnnounceFeed;
use crate::ingest::{ExitReason, IngestLoop, IngestStats, LoopExit};
use crate::metrics::LIFECYCLE_TRANSITIONS;
use crate::retry::RetryPolicy;

/// What the instance does when ingestion ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum LifecyclePolicy {
    GracefulShutdown,
    SelfRestart { after_events: u64 },
}

impl LifecyclePolicy {
    /// Resolve the configured policy, falling back to `default_mode`.
    pub fn from_config(config: &LifecycleConfig, default_mode: LifecycleMode) -> Self {
        match config.policy.unwrap_or(default_mode) {
            LifecycleMode::Graceful => Self::GracefulShutdown,
            LifecycleMode::SelfRestart => Self::SelfRestart {
                after_events: config.restart_after_events,
            },
        }
    }

    pub fn restart_threshold(&self) -> Option<u64> {
        match self {
            Self::GracefulShutdown => None,
            Self::SelfRestart { after_events } => Some(*after_events),
        }
    }
}

/// Ingest instance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Running,
    Draining,
    Restarting,
    Stopped,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Restarting => "restarting",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to spawn successor: {0}")]
    Spawn(String),
}

/// Starts the process that takes over after a self restart.
pub trait Respawner: Send + Sync {
    fn spawn_successor(&self) -> Result<(), LifecycleError>;
}

/// Re-executes a program with fixed arguments, detached from this process.
#[derive(Debug, Clone)]
pub struct ProcessRespawner {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessRespawner {
    pub fn new(program: PathBuf, args: Vec<OsString>) -> Self {
        Self { program, args }
    }

    /// The running executable with the arguments it was started with.
    pub fn current() -> Result<Self, LifecycleError> {
        let program = std::env::current_exe().map_err(|e| LifecycleError::Spawn(e.to_string()))?;
        let args = std::env::args_os().skip(1).collect();
        Ok(Self::new(program, args))
    }
}

impl Respawner for ProcessRespawner {
    fn spawn_successor(&self) -> Result<(), LifecycleError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| LifecycleError::Spawn(format!("{}: {}", self.program.display(), e)))?;

        info!(pid = child.id(), program = %self.program.display(), "Spawned successor");
        Ok(())
    }
}

/// Owns the lifecycle of one ingest instance.
pub struct Supervisor {
    policy: LifecyclePolicy,
    catalog: Arc<dyn TorrentCatalog>,
    respawner: Arc<dyn Respawner>,
    retry: RetryPolicy,
    successor_grace: Duration,
    state: LoopState,
    history: Vec<LoopState>,
}

impl Supervisor {
    pub fn new(
        policy: LifecyclePolicy,
        catalog: Arc<dyn TorrentCatalog>,
        respawner: Arc<dyn Respawner>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            policy,
            catalog,
            respawner,
            retry,
            successor_grace: Duration::from_secs(1),
            state: LoopState::Running,
            history: vec![LoopState::Running],
        }
    }

    pub fn with_successor_grace(mut self, grace: Duration) -> Self {
        self.successor_grace = grace;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Every state this instance has been in, in order.
    pub fn history(&self) -> &[LoopState] {
        &self.history
    }

    /// Ingest from `feed` until the policy says stop, then release resources.
    ///
    /// If the successor cannot be spawned the instance keeps ingesting and
    /// tries again at the next threshold.
    pub async fn run<F>(&mut self, feed: &mut F, mut shutdown: broadcast::Receiver<()>) -> LoopExit
    where
        F: AnnounceFeed + ?Sized,
    {
        let mut total = IngestStats::default();

        loop {
            let mut ingest = IngestLoop::new(self.catalog.clone(), self.retry);
            if let Some(threshold) = self.policy.restart_threshold() {
                ingest = ingest.with_restart_threshold(threshold);
            }

            let exit = ingest.run(&mut *feed, &mut shutdown).await;
            total.merge(&exit.stats);

            match exit.reason {
                ExitReason::Shutdown | ExitReason::FeedClosed => {
                    self.transition(LoopState::Draining);
                    self.close_catalog();
                    feed.close().await;
                    self.transition(LoopState::Stopped);
                    return LoopExit {
                        reason: exit.reason,
                        stats: total,
                    };
                }
                ExitReason::RestartThresholdReached => {
                    self.transition(LoopState::Restarting);
                    match self.respawner.spawn_successor() {
                        Ok(()) => {
                            tokio::time::sleep(self.successor_grace).await;
                            self.close_catalog();
                            feed.close().await;
                            self.transition(LoopState::Stopped);
                            return LoopExit {
                                reason: exit.reason,
                                stats: total,
                            };
                        }
                        Err(e) => {
                            error!(error = %e, "Could not hand over, continuing to ingest");
                            self.transition(LoopState::Running);
                        }
                    }
                }
            }
        }
    }

    fn close_catalog(&self) {
        if let Err(e) = self.catalog.close() {
            warn!(error = %e, "Failed to close catalog");
        }
    }

    fn transition(&mut self, next: LoopState) {
        info!(from = %self.state, to = %next, "Lifecycle transition");
        LIFECYCLE_TRANSITIONS
            .with_label_values(&[next.as_str()])
            .inc();
        self.state = next;
        self.history.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_config_default_mode() {
        let config = LifecycleConfig::default();
        assert_eq!(
            LifecyclePolicy::from_config(&config, LifecycleMode::Graceful),
            LifecyclePolicy::GracefulShutdown
        );
        assert_eq!(
            LifecyclePolicy::from_config(&config, LifecycleMode::SelfRestart),
            LifecyclePolicy::SelfRestart { after_events: 100 }
        );
    }

    #[test]
    fn test_policy_from_config_override() {
        let config = LifecycleConfig {
            policy: Some(LifecycleMode::SelfRestart),
            restart_after_events: 7,
            ..Default::default()
        };
        let policy = LifecyclePolicy::from_config(&config, LifecycleMode::Graceful);
        assert_eq!(policy.restart_threshold(), Some(7));
    }

    #[test]
    fn test_loop_state_display() {
        assert_eq!(LoopState::Restarting.to_string(), "restarting");
    }

    #[test]
    fn test_process_respawner_reports_missing_program() {
        let respawner = ProcessRespawner::new(
            PathBuf::from("/nonexistent/trawler-successor"),
            Vec::new(),
        );
        assert!(matches!(
            respawner.spawn_successor(),
            Err(LifecycleError::Spawn(_))
        ));
    }
}
