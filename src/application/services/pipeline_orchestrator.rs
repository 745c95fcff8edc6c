use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::application::ports::{
    ActExecutor, ActInput, AnalyzeExecutor, AnalyzeInput, BatchPlanExecutor, BatchPlanInput,
    ClassifyExecutor, ClassifyInput, ExtractExecutor, ExtractInput, JobRepository,
    RepositoryError, StageError, StageExecutor,
};
use crate::domain::{
    ExtractionResult, Job, JobEnvelope, JobError, JobId, JobStatus, JobUpdate, Stage,
};

use super::fan_out::{BatchFailure, run_bounded};

/// The executor behind every stage of the pipeline.
pub struct PipelineExecutors {
    pub classify: Arc<ClassifyExecutor>,
    pub batch_plan: Arc<BatchPlanExecutor>,
    pub extract: Arc<ExtractExecutor>,
    pub analyze: Arc<AnalyzeExecutor>,
    pub act: Arc<ActExecutor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub classify: Duration,
    pub batch_plan: Duration,
    pub extract: Duration,
    pub analyze: Duration,
    pub act: Duration,
}

impl StageTimeouts {
    pub fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Classify => self.classify,
            Stage::BatchPlan => self.batch_plan,
            Stage::Extract => self.extract,
            Stage::Analyze => self.analyze,
            Stage::Act => self.act,
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            classify: Duration::from_secs(3 * 60),
            batch_plan: Duration::from_secs(60),
            extract: Duration::from_secs(10 * 60),
            analyze: Duration::from_secs(5 * 60),
            act: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Extract invocations allowed in flight for one job.
    pub extract_concurrency: usize,
    /// Extract invocations allowed in flight across all jobs, if bounded.
    pub global_extract_concurrency: Option<usize>,
    pub timeouts: StageTimeouts,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            extract_concurrency: 1,
            global_extract_concurrency: None,
            timeouts: StageTimeouts::default(),
        }
    }
}

#[derive(Debug)]
pub enum ExecutionOutcome {
    Completed(Job),
    Failed(Job),
    /// The job was already claimed by another execution.
    Skipped { job_id: JobId, status: JobStatus },
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
    #[error("{stage} failed ({cause}) and the failure could not be recorded: {source}")]
    FailureNotRecorded {
        stage: Stage,
        cause: String,
        source: RepositoryError,
    },
}

enum Progress {
    Next(Job),
    Stopped(ExecutionOutcome),
}

/// Drives one job through Classify, Batch-Plan, Extract, Analyze and Act.
///
/// Every transition is committed to the job repository, status and envelope
/// together, before the next stage is invoked.
pub struct PipelineOrchestrator {
    job_repository: Arc<dyn JobRepository>,
    executors: PipelineExecutors,
    config: OrchestratorConfig,
    global_extract_slots: Option<Arc<Semaphore>>,
}

impl PipelineOrchestrator {
    pub fn new(
        job_repository: Arc<dyn JobRepository>,
        executors: PipelineExecutors,
        config: OrchestratorConfig,
    ) -> Self {
        let global_extract_slots = config
            .global_extract_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        Self {
            job_repository,
            executors,
            config,
            global_extract_slots,
        }
    }

    #[tracing::instrument(skip(self), fields(job_id = %job_id))]
    pub async fn run(&self, job_id: JobId) -> Result<ExecutionOutcome, OrchestratorError> {
        let job = self
            .job_repository
            .get_by_id(job_id)
            .await?
            .ok_or(OrchestratorError::JobNotFound(job_id))?;

        if job.status != JobStatus::Created {
            tracing::info!(status = %job.status, "Job already past CREATED, skipping");
            return Ok(ExecutionOutcome::Skipped {
                job_id,
                status: job.status,
            });
        }

        let job = match self
            .job_repository
            .transition(job_id, JobStatus::Created, &JobUpdate::claim(JobStatus::Classifying))
            .await
        {
            Ok(job) => job,
            Err(RepositoryError::Conflict { actual, .. }) => {
                tracing::info!(status = %actual, "Job claimed concurrently, skipping");
                return Ok(ExecutionOutcome::Skipped {
                    job_id,
                    status: actual,
                });
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(status = %job.status, "Job claimed");

        let work = self.invoke(
            self.executors.classify.as_ref(),
            classify_input(&job.envelope),
        );
        let job = match self
            .step(job, Stage::Classify, work, |env, out| env.classification = Some(out))
            .await?
        {
            Progress::Next(job) => job,
            Progress::Stopped(outcome) => return Ok(outcome),
        };

        let work = self.invoke(
            self.executors.batch_plan.as_ref(),
            batch_plan_input(&job.envelope),
        );
        let job = match self
            .step(job, Stage::BatchPlan, work, |env, out| env.batch_plan = Some(out))
            .await?
        {
            Progress::Next(job) => job,
            Progress::Stopped(outcome) => return Ok(outcome),
        };

        let work = self.extract_all(extract_inputs(&job));
        let job = match self
            .step(job, Stage::Extract, work, |env, out| {
                env.extraction_results = Some(out)
            })
            .await?
        {
            Progress::Next(job) => job,
            Progress::Stopped(outcome) => return Ok(outcome),
        };

        let work = self.invoke(
            self.executors.analyze.as_ref(),
            analyze_input(&job.envelope),
        );
        let job = match self
            .step(job, Stage::Analyze, work, |env, out| env.analysis = Some(out))
            .await?
        {
            Progress::Next(job) => job,
            Progress::Stopped(outcome) => return Ok(outcome),
        };

        let work = self.invoke(self.executors.act.as_ref(), act_input(&job.envelope));
        match self
            .step(job, Stage::Act, work, |env, out| env.action = Some(out))
            .await?
        {
            Progress::Next(job) => {
                tracing::info!("Pipeline completed");
                Ok(ExecutionOutcome::Completed(job))
            }
            Progress::Stopped(outcome) => Ok(outcome),
        }
    }

    /// Awaits one stage, then commits either its merged output together with
    /// the next status, or the failure.
    async fn step<T, Fut, M>(
        &self,
        job: Job,
        stage: Stage,
        work: Fut,
        merge: M,
    ) -> Result<Progress, OrchestratorError>
    where
        Fut: Future<Output = Result<T, StageError>>,
        M: FnOnce(&mut JobEnvelope, T),
    {
        debug_assert_eq!(job.status, stage.running_status());
        tracing::info!(stage = %stage, "Stage started");

        let output = match work.await {
            Ok(output) => output,
            Err(e) => return self.fail(job, stage, e.to_string()).await,
        };

        let mut envelope = job.envelope.clone();
        merge(&mut envelope, output);

        let update = JobUpdate::advance(stage.completed_status(), envelope);
        let job = self
            .job_repository
            .transition(job.id, job.status, &update)
            .await?;
        tracing::info!(stage = %stage, status = %job.status, "Stage committed");
        Ok(Progress::Next(job))
    }

    async fn fail(
        &self,
        job: Job,
        stage: Stage,
        cause: String,
    ) -> Result<Progress, OrchestratorError> {
        tracing::warn!(stage = %stage, cause = %cause, "Stage failed");
        let update = JobUpdate::fail(JobError::new(stage.name(), cause.clone()));
        match self
            .job_repository
            .transition(job.id, job.status, &update)
            .await
        {
            Ok(job) => Ok(Progress::Stopped(ExecutionOutcome::Failed(job))),
            Err(source) => Err(OrchestratorError::FailureNotRecorded {
                stage,
                cause,
                source,
            }),
        }
    }

    async fn invoke<I, O>(
        &self,
        executor: &dyn StageExecutor<Input = I, Output = O>,
        input: Result<I, StageError>,
    ) -> Result<O, StageError>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        let input = input?;
        let limit = self.config.timeouts.for_stage(executor.stage());
        with_timeout(limit, executor.execute(input)).await
    }

    async fn extract_all(
        &self,
        inputs: Result<Vec<ExtractInput>, StageError>,
    ) -> Result<Vec<ExtractionResult>, StageError> {
        let inputs = inputs?;
        let batches = inputs.len();
        let executor = Arc::clone(&self.executors.extract);
        let global_slots = self.global_extract_slots.clone();
        let limit = self.config.timeouts.for_stage(executor.stage());

        tracing::debug!(
            batches,
            concurrency = self.config.extract_concurrency,
            "Dispatching extraction batches"
        );

        run_bounded(inputs, self.config.extract_concurrency, move |input| {
            let executor = Arc::clone(&executor);
            let global_slots = global_slots.clone();
            async move {
                let _slot = match global_slots {
                    Some(slots) => Some(
                        slots
                            .acquire_owned()
                            .await
                            .map_err(|e| StageError::Crashed(e.to_string()))?,
                    ),
                    None => None,
                };
                with_timeout(limit, executor.execute(input)).await
            }
        })
        .await
        .map_err(|failure| describe_batch_failure(failure, batches))
    }
}

async fn with_timeout<T>(
    limit: Duration,
    work: impl Future<Output = Result<T, StageError>>,
) -> Result<T, StageError> {
    tokio::time::timeout(limit, work)
        .await
        .unwrap_or(Err(StageError::Timeout(limit)))
}

fn describe_batch_failure(failure: BatchFailure, batches: usize) -> StageError {
    match failure.index {
        Some(index) => StageError::BatchFailed {
            batch: index + 1,
            batches,
            source: Box::new(failure.error),
        },
        None => failure.error,
    }
}

fn missing(output: &str) -> StageError {
    StageError::InvalidInput(format!("envelope has no {} output", output))
}

fn classify_input(envelope: &JobEnvelope) -> Result<ClassifyInput, StageError> {
    Ok(ClassifyInput {
        source_object_key: envelope.source_object_key.clone(),
        insurance_type: envelope.insurance_type,
    })
}

fn batch_plan_input(envelope: &JobEnvelope) -> Result<BatchPlanInput, StageError> {
    let classification = envelope
        .classification
        .clone()
        .ok_or_else(|| missing("classification"))?;
    Ok(BatchPlanInput { classification })
}

fn extract_inputs(job: &Job) -> Result<Vec<ExtractInput>, StageError> {
    let envelope = &job.envelope;
    let classification = envelope
        .classification
        .as_ref()
        .ok_or_else(|| missing("classification"))?;
    let plan = envelope
        .batch_plan
        .as_ref()
        .ok_or_else(|| missing("batch plan"))?;

    Ok(plan
        .ranges
        .iter()
        .enumerate()
        .map(|(batch_index, pages)| ExtractInput {
            job_id: job.id,
            batch_index,
            pages: *pages,
            source_object_key: envelope.source_object_key.clone(),
            insurance_type: envelope.insurance_type,
            document_type: classification.document_type.clone(),
        })
        .collect())
}

fn analyze_input(envelope: &JobEnvelope) -> Result<AnalyzeInput, StageError> {
    Ok(AnalyzeInput {
        insurance_type: envelope.insurance_type,
        classification: envelope
            .classification
            .clone()
            .ok_or_else(|| missing("classification"))?,
        extraction_results: envelope
            .extraction_results
            .clone()
            .ok_or_else(|| missing("extraction"))?,
    })
}

fn act_input(envelope: &JobEnvelope) -> Result<ActInput, StageError> {
    Ok(ActInput {
        insurance_type: envelope.insurance_type,
        analysis: envelope
            .analysis
            .clone()
            .ok_or_else(|| missing("analysis"))?,
    })
}
