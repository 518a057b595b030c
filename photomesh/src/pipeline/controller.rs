//! Orchestration controller.
//!
//! [`ReconstructionController`] sequences the four pipeline stages over
//! one workspace. It validates the configuration at construction, then
//! either runs inline on the caller's task ([`run`]) or spawns onto the
//! runtime and hands back a [`ControllerHandle`] ([`start`]) so it can be
//! stopped from another task while a stage is executing.
//!
//! The controller owns the root cancellation token for the run. A stop
//! request cancels the root token and forwards to the active stage's
//! token through the [`ActiveWorker`] slot, so a collaborator blocked
//! inside a stage unwinds at its next polling point. The token is never
//! reset; a controller is single-use.
//!
//! [`run`]: ReconstructionController::run
//! [`start`]: ReconstructionController::start

use crate::capabilities::Capabilities;
use crate::config::{ConfigError, PipelineConfig};
use crate::pipeline::context::{Collaborators, PipelineContext};
use crate::pipeline::error::PipelineError;
use crate::pipeline::stages::{self, StageOutcome};
use crate::registry::ReconstructionRegistry;
use crate::worker::{ActiveWorker, WorkerStatus};
use crate::workspace::Workspace;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Observable state of a pipeline run.
///
/// Disabled stages are skipped without a state transition; the next
/// enabled stage still runs. `Stopped` is absorbing: it is entered when
/// the cancellation token is observed at a stage boundary and never left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    Idle,
    Extracting,
    Matching,
    SparseMapping,
    DenseMapping,
    Done,
    Failed,
    Stopped,
}

impl PipelineState {
    /// Returns true once the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Stopped)
    }

    /// The coarse worker status this state corresponds to.
    pub fn worker_status(&self) -> WorkerStatus {
        match self {
            Self::Idle => WorkerStatus::Pending,
            Self::Extracting | Self::Matching | Self::SparseMapping | Self::DenseMapping => {
                WorkerStatus::Running
            }
            Self::Done => WorkerStatus::Succeeded,
            Self::Failed => WorkerStatus::Failed,
            Self::Stopped => WorkerStatus::Stopped,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Extracting => write!(f, "extracting features"),
            Self::Matching => write!(f, "matching features"),
            Self::SparseMapping => write!(f, "sparse mapping"),
            Self::DenseMapping => write!(f, "dense mapping"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Top-level driver for one reconstruction run.
pub struct ReconstructionController {
    ctx: PipelineContext,
    cancel: CancellationToken,
    active: Arc<ActiveWorker>,
    state_tx: watch::Sender<PipelineState>,
    state_rx: watch::Receiver<PipelineState>,
}

impl ReconstructionController {
    /// Validates `config` and assembles a controller.
    ///
    /// Fails fast on configuration errors; no work is performed and no
    /// workspace state is touched until [`run`](Self::run) or
    /// [`start`](Self::start).
    pub fn new(
        config: PipelineConfig,
        collaborators: Collaborators,
        registry: Arc<ReconstructionRegistry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let options = config.stage_options();
        let workspace = Workspace::new(&config.workspace_path);
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        Ok(Self {
            ctx: PipelineContext {
                options,
                workspace,
                capabilities: Capabilities::compiled(),
                config,
                collaborators,
                registry,
            },
            cancel: CancellationToken::new(),
            active: Arc::new(ActiveWorker::new()),
            state_tx,
            state_rx,
        })
    }

    /// Overrides the compiled-in capability flags.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.ctx.capabilities = capabilities;
        self
    }

    /// Runs the pipeline on the current task until it completes, stops or
    /// fails. A stopped run returns `Ok`.
    pub async fn run(self) -> Result<(), PipelineError> {
        let result = self.execute().await;
        let state = final_state(&result);
        log_outcome(&result);
        let _ = self.state_tx.send(state);
        result.map(|_| ())
    }

    /// Spawns the pipeline onto the runtime and returns a handle for
    /// waiting and stopping from other tasks.
    pub fn start(self) -> ControllerHandle {
        let result_holder: Arc<Mutex<Option<Result<(), PipelineError>>>> =
            Arc::new(Mutex::new(None));
        let handle = ControllerHandle {
            state_rx: self.state_rx.clone(),
            cancel: self.cancel.clone(),
            active: Arc::clone(&self.active),
            result: Arc::clone(&result_holder),
        };

        tokio::spawn(async move {
            let result = self.execute().await;
            let state = final_state(&result);
            log_outcome(&result);
            // The result must be in place before the terminal state is
            // published; wait() returns as soon as it observes it.
            *result_holder.lock().await = Some(result.map(|_| ()));
            let _ = self.state_tx.send(state);
        });

        handle
    }

    async fn execute(&self) -> Result<StageOutcome, PipelineError> {
        let ctx = &self.ctx;

        if self.cancel.is_cancelled() {
            return Ok(StageOutcome::Stopped);
        }

        if ctx.config.extraction {
            let _ = self.state_tx.send(PipelineState::Extracting);
            self.run_stage(|cancel| async move { stages::extraction::run(ctx, &cancel).await })
                .await?;
        }

        if self.cancel.is_cancelled() {
            return Ok(StageOutcome::Stopped);
        }

        if ctx.config.matching {
            let _ = self.state_tx.send(PipelineState::Matching);
            self.run_stage(|cancel| async move { stages::matching::run(ctx, &cancel).await })
                .await?;
        }

        if self.cancel.is_cancelled() {
            return Ok(StageOutcome::Stopped);
        }

        if ctx.config.sparse {
            let _ = self.state_tx.send(PipelineState::SparseMapping);
            self.run_stage(|cancel| async move { stages::sparse::run(ctx, &cancel).await })
                .await?;
        }

        if self.cancel.is_cancelled() {
            return Ok(StageOutcome::Stopped);
        }

        if ctx.config.dense {
            let _ = self.state_tx.send(PipelineState::DenseMapping);
            let outcome = self
                .run_stage(|cancel| async move { stages::dense::run(ctx, &cancel).await })
                .await?;
            if outcome == StageOutcome::Stopped {
                return Ok(StageOutcome::Stopped);
            }
        }

        Ok(StageOutcome::Completed)
    }

    /// Runs one stage under a fresh child token registered in the active
    /// slot, clearing the slot once the stage returns.
    async fn run_stage<T, F, Fut>(&self, stage: F) -> Result<T, PipelineError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = Result<T, crate::pipeline::error::StageError>>,
    {
        let stage_cancel = self.cancel.child_token();
        self.active.begin(stage_cancel.clone());
        let result = stage(stage_cancel).await;
        self.active.clear();
        result.map_err(PipelineError::from)
    }
}

fn final_state(result: &Result<StageOutcome, PipelineError>) -> PipelineState {
    match result {
        Ok(StageOutcome::Completed) => PipelineState::Done,
        Ok(StageOutcome::Stopped) => PipelineState::Stopped,
        Err(_) => PipelineState::Failed,
    }
}

fn log_outcome(result: &Result<StageOutcome, PipelineError>) {
    match result {
        Ok(StageOutcome::Completed) => info!("reconstruction pipeline finished"),
        Ok(StageOutcome::Stopped) => info!("reconstruction pipeline stopped on request"),
        Err(err) => error!(error = %err, "reconstruction pipeline failed"),
    }
}

/// Handle to a started pipeline run.
///
/// Cloneable; all clones observe the same run.
#[derive(Clone)]
pub struct ControllerHandle {
    state_rx: watch::Receiver<PipelineState>,
    cancel: CancellationToken,
    active: Arc<ActiveWorker>,
    result: Arc<Mutex<Option<Result<(), PipelineError>>>>,
}

impl ControllerHandle {
    /// Current pipeline state.
    pub fn state(&self) -> PipelineState {
        *self.state_rx.borrow()
    }

    /// Coarse worker status derived from the pipeline state.
    pub fn status(&self) -> WorkerStatus {
        self.state().worker_status()
    }

    /// Requests cooperative cancellation.
    ///
    /// Cancels the run's root token and forwards the request to whichever
    /// stage is currently active. Returns immediately; the run winds down
    /// at its next cancellation checkpoint.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.active.stop();
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits until the run reaches a terminal state and returns its
    /// result. Safe to call again after completion; subsequent calls
    /// return `Ok`.
    pub async fn wait(&mut self) -> Result<(), PipelineError> {
        loop {
            if self.state().is_terminal() {
                break;
            }
            if self.state_rx.changed().await.is_err() {
                break;
            }
        }
        self.result.lock().await.take().unwrap_or(Ok(()))
    }
}
