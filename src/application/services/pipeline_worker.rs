use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::domain::JobId;

use super::{ExecutionOutcome, PipelineOrchestrator};

/// Asks the worker to start one orchestrator execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub job_id: JobId,
}

/// Receives execution requests and runs each job as its own task.
pub struct PipelineWorker {
    receiver: mpsc::Receiver<ExecutionRequest>,
    orchestrator: Arc<PipelineOrchestrator>,
    job_slots: Arc<Semaphore>,
}

impl PipelineWorker {
    pub fn new(
        receiver: mpsc::Receiver<ExecutionRequest>,
        orchestrator: Arc<PipelineOrchestrator>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            receiver,
            orchestrator,
            job_slots: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Runs until the channel closes, then waits for jobs still in flight.
    pub async fn run(mut self) {
        tracing::info!("Pipeline worker started");
        let mut running = JoinSet::new();

        while let Some(request) = self.receiver.recv().await {
            while running.try_join_next().is_some() {}

            let Ok(slot) = Arc::clone(&self.job_slots).acquire_owned().await else {
                break;
            };
            let orchestrator = Arc::clone(&self.orchestrator);
            let span = tracing::info_span!("pipeline_job", job_id = %request.job_id);

            running.spawn(
                async move {
                    let _slot = slot;
                    execute(&orchestrator, request.job_id).await;
                }
                .instrument(span),
            );
        }

        tracing::info!(in_flight = running.len(), "Channel closed, draining running jobs");
        while running.join_next().await.is_some() {}
        tracing::info!("Pipeline worker stopped");
    }
}

async fn execute(orchestrator: &PipelineOrchestrator, job_id: JobId) {
    match orchestrator.run(job_id).await {
        Ok(ExecutionOutcome::Completed(_)) => {
            tracing::info!("Job completed");
        }
        Ok(ExecutionOutcome::Failed(job)) => {
            let (stage, cause) = job
                .error
                .map(|e| (e.stage, e.cause))
                .unwrap_or_default();
            tracing::warn!(stage = %stage, cause = %cause, "Job failed");
        }
        Ok(ExecutionOutcome::Skipped { status, .. }) => {
            tracing::info!(status = %status, "Duplicate execution ignored");
        }
        Err(e) => {
            tracing::error!(error = %e, "Pipeline execution aborted");
        }
    }
}
