use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use underwriter::application::ports::{
    BatchPlanInput, ClassifyInput, ExtractInput, InferenceClient, JobRepository, ObjectStorage,
    RepositoryError, StageError, StageExecutor,
};
use underwriter::application::services::{
    ExecutionOutcome, OrchestratorConfig, OrchestratorError, PipelineExecutors, PipelineOrchestrator, StageTimeouts,
};
use underwriter::application::stages::{
    ActStage, AnalyzeStage, BatchPlanStage, ClassifyStage, ExtractStage, RetryPolicy,
};
use underwriter::domain::{
    BatchPlan, Classification, ExtractionResult, InsuranceType, Job, JobId, JobStatus, JobUpdate,
    ObjectKey, PageRange, Stage,
};
use underwriter::infrastructure::inference::MockInferenceClient;
use underwriter::infrastructure::persistence::InMemoryJobRepository;
use underwriter::infrastructure::storage::ObjectStoreStorage;

/// Records every committed status while delegating to the in-memory store.
/// Transitions into any status listed in `unavailable_for` fail as if the
/// store were down.
struct RecordingJobRepository {
    inner: InMemoryJobRepository,
    statuses: Mutex<Vec<JobStatus>>,
    unavailable_for: Vec<JobStatus>,
}

impl RecordingJobRepository {
    fn new() -> Self {
        Self::unavailable_for(Vec::new())
    }

    fn unavailable_for(unavailable_for: Vec<JobStatus>) -> Self {
        Self {
            inner: InMemoryJobRepository::new(),
            statuses: Mutex::new(Vec::new()),
            unavailable_for,
        }
    }

    async fn statuses(&self) -> Vec<JobStatus> {
        self.statuses.lock().await.clone()
    }
}

#[async_trait]
impl JobRepository for RecordingJobRepository {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        self.statuses.lock().await.push(job.status);
        self.inner.create(job).await
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        self.inner.get_by_id(id).await
    }

    async fn find_latest_by_source_key(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<Job>, RepositoryError> {
        self.inner.find_latest_by_source_key(key).await
    }

    async fn transition(
        &self,
        id: JobId,
        expected: JobStatus,
        update: &JobUpdate,
    ) -> Result<Job, RepositoryError> {
        if self.unavailable_for.contains(&update.status) {
            return Err(RepositoryError::ConnectionFailed(
                "job store unavailable".to_string(),
            ));
        }
        let job = self.inner.transition(id, expected, update).await?;
        self.statuses.lock().await.push(job.status);
        Ok(job)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>, RepositoryError> {
        self.inner.list_recent(limit).await
    }

    async fn list_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Job>, RepositoryError> {
        self.inner.list_terminal_before(cutoff).await
    }

    async fn delete(&self, id: JobId) -> Result<bool, RepositoryError> {
        self.inner.delete(id).await
    }
}

struct FailingClassify;

#[async_trait]
impl StageExecutor for FailingClassify {
    type Input = ClassifyInput;
    type Output = Classification;

    fn stage(&self) -> Stage {
        Stage::Classify
    }

    async fn execute(&self, _input: ClassifyInput) -> Result<Classification, StageError> {
        Err(StageError::MalformedResponse("classifier unavailable".to_string()))
    }
}

struct FixedClassify {
    page_count: u32,
    delay: Duration,
}

#[async_trait]
impl StageExecutor for FixedClassify {
    type Input = ClassifyInput;
    type Output = Classification;

    fn stage(&self) -> Stage {
        Stage::Classify
    }

    async fn execute(&self, _input: ClassifyInput) -> Result<Classification, StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(Classification {
            document_type: "APPLICATION".to_string(),
            page_count: self.page_count,
            confidence: Some(0.95),
            details: serde_json::Value::Null,
        })
    }
}

struct CountingBatchPlan {
    inner: BatchPlanStage,
    calls: AtomicUsize,
}

impl CountingBatchPlan {
    fn new(batch_size: u32) -> Self {
        Self {
            inner: BatchPlanStage::new(batch_size),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StageExecutor for CountingBatchPlan {
    type Input = BatchPlanInput;
    type Output = BatchPlan;

    fn stage(&self) -> Stage {
        Stage::BatchPlan
    }

    async fn execute(&self, input: BatchPlanInput) -> Result<BatchPlan, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(input).await
    }
}

/// Extract fake with per-batch delays and failures, tracking peak concurrency.
#[derive(Default)]
struct ScriptedExtract {
    delays: HashMap<usize, Duration>,
    failing: Option<usize>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    started: std::sync::Mutex<Vec<usize>>,
}

impl ScriptedExtract {
    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn started(&self) -> Vec<usize> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageExecutor for ScriptedExtract {
    type Input = ExtractInput;
    type Output = ExtractionResult;

    fn stage(&self) -> Stage {
        Stage::Extract
    }

    async fn execute(&self, input: ExtractInput) -> Result<ExtractionResult, StageError> {
        self.started.lock().unwrap().push(input.batch_index);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .get(&input.batch_index)
            .copied()
            .unwrap_or(Duration::from_millis(10));
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing == Some(input.batch_index) {
            return Err(StageError::MalformedResponse(format!(
                "batch {} unreadable",
                input.batch_index
            )));
        }
        Ok(ExtractionResult {
            batch_index: input.batch_index,
            pages: input.pages,
            artifact_key: ObjectKey::extraction_artifact(&input.job_id, &input.pages),
            field_count: 1,
        })
    }
}

struct Harness {
    repository: Arc<RecordingJobRepository>,
    storage: Arc<ObjectStoreStorage>,
    inference: Arc<dyn InferenceClient>,
}

impl Harness {
    fn new() -> Self {
        Self::with_repository(RecordingJobRepository::new())
    }

    fn with_repository(repository: RecordingJobRepository) -> Self {
        Self {
            repository: Arc::new(repository),
            storage: Arc::new(ObjectStoreStorage::in_memory()),
            inference: Arc::new(MockInferenceClient::new(3)),
        }
    }

    fn real_executors(&self) -> PipelineExecutors {
        let storage: Arc<dyn ObjectStorage> = self.storage.clone();
        PipelineExecutors {
            classify: Arc::new(ClassifyStage::new(
                Arc::clone(&self.inference),
                RetryPolicy::none(),
            )),
            batch_plan: Arc::new(BatchPlanStage::new(1)),
            extract: Arc::new(ExtractStage::new(
                Arc::clone(&self.inference),
                Arc::clone(&storage),
                RetryPolicy::none(),
            )),
            analyze: Arc::new(AnalyzeStage::new(
                Arc::clone(&self.inference),
                storage,
                RetryPolicy::none(),
            )),
            act: Arc::new(ActStage::new(Arc::clone(&self.inference), RetryPolicy::none())),
        }
    }

    fn orchestrator(
        &self,
        executors: PipelineExecutors,
        config: OrchestratorConfig,
    ) -> PipelineOrchestrator {
        PipelineOrchestrator::new(self.repository.clone(), executors, config)
    }

    async fn seed_job(&self) -> Job {
        let job = Job::new(
            ObjectKey::from_raw("uploads/policy123.pdf"),
            InsuranceType::PropertyCasualty,
        );
        self.repository.create(&job).await.unwrap();
        job
    }
}

fn executors_with_extract(
    harness: &Harness,
    pages: u32,
    extract: Arc<ScriptedExtract>,
) -> PipelineExecutors {
    let mut executors = harness.real_executors();
    executors.classify = Arc::new(FixedClassify {
        page_count: pages,
        delay: Duration::ZERO,
    });
    executors.extract = extract;
    executors
}

fn config_with_concurrency(extract_concurrency: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        extract_concurrency,
        ..OrchestratorConfig::default()
    }
}

#[tokio::test]
async fn given_uploaded_policy_when_pipeline_runs_then_job_completes_with_every_stage_output() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let orchestrator = harness.orchestrator(harness.real_executors(), config_with_concurrency(2));

    let outcome = orchestrator.run(job.id).await.unwrap();

    let completed = match outcome {
        ExecutionOutcome::Completed(job) => job,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(completed.status, JobStatus::Complete);
    assert!(completed.completed_at.is_some());
    assert!(completed.error.is_none());

    let envelope = &completed.envelope;
    let plan = envelope.batch_plan.as_ref().expect("batch plan");
    let results = envelope.extraction_results.as_ref().expect("extraction results");
    assert!(envelope.classification.is_some());
    assert!(envelope.analysis.is_some());
    assert_eq!(envelope.action.as_ref().unwrap().decision, "REFER");
    assert_eq!(results.len(), plan.len());
    assert_eq!(plan.len(), 3);

    for result in results {
        assert!(harness.storage.exists(&result.artifact_key).await.unwrap());
    }

    let stored = harness.repository.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored, completed);
}

#[tokio::test]
async fn given_successful_run_when_recording_commits_then_statuses_follow_the_sequence() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let orchestrator = harness.orchestrator(harness.real_executors(), config_with_concurrency(1));

    orchestrator.run(job.id).await.unwrap();

    assert_eq!(
        harness.repository.statuses().await,
        vec![
            JobStatus::Created,
            JobStatus::Classifying,
            JobStatus::Batching,
            JobStatus::Extracting,
            JobStatus::Analyzing,
            JobStatus::Acting,
            JobStatus::Complete,
        ]
    );
}

#[tokio::test]
async fn given_classify_error_when_pipeline_runs_then_job_fails_and_batch_plan_is_never_invoked() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let batch_plan = Arc::new(CountingBatchPlan::new(1));
    let mut executors = harness.real_executors();
    executors.classify = Arc::new(FailingClassify);
    executors.batch_plan = batch_plan.clone();
    let orchestrator = harness.orchestrator(executors, OrchestratorConfig::default());

    let outcome = orchestrator.run(job.id).await.unwrap();

    let failed = match outcome {
        ExecutionOutcome::Failed(job) => job,
        other => panic!("expected failure, got {:?}", other),
    };
    let error = failed.error.expect("error recorded");
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(error.stage, "Classify");
    assert!(error.cause.contains("classifier unavailable"));
    assert!(failed.completed_at.is_some());
    assert!(failed.envelope.classification.is_none());
    assert_eq!(batch_plan.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        harness.repository.statuses().await,
        vec![JobStatus::Created, JobStatus::Classifying, JobStatus::Failed]
    );
}

#[tokio::test]
async fn given_concurrency_of_one_when_extracting_then_batches_run_strictly_sequentially() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let extract = Arc::new(ScriptedExtract::default());
    let executors = executors_with_extract(&harness, 5, extract.clone());
    let orchestrator = harness.orchestrator(executors, config_with_concurrency(1));

    orchestrator.run(job.id).await.unwrap();

    assert_eq!(extract.peak(), 1);
    assert_eq!(extract.started(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn given_concurrency_of_two_when_extracting_then_at_most_two_batches_are_outstanding() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let extract = Arc::new(ScriptedExtract {
        delays: (0..6).map(|i| (i, Duration::from_millis(30))).collect(),
        ..ScriptedExtract::default()
    });
    let executors = executors_with_extract(&harness, 6, extract.clone());
    let orchestrator = harness.orchestrator(executors, config_with_concurrency(2));

    let outcome = orchestrator.run(job.id).await.unwrap();

    assert!(matches!(outcome, ExecutionOutcome::Completed(_)));
    assert_eq!(extract.peak(), 2);
}

#[tokio::test]
async fn given_later_batch_finishing_first_when_extracting_then_results_keep_submission_order() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let extract = Arc::new(ScriptedExtract {
        delays: HashMap::from([
            (0, Duration::from_millis(80)),
            (1, Duration::from_millis(5)),
            (2, Duration::from_millis(40)),
        ]),
        ..ScriptedExtract::default()
    });
    let executors = executors_with_extract(&harness, 3, extract.clone());
    let orchestrator = harness.orchestrator(executors, config_with_concurrency(3));

    let ExecutionOutcome::Completed(job) = orchestrator.run(job.id).await.unwrap() else {
        panic!("expected completion");
    };

    let results = job.envelope.extraction_results.unwrap();
    let order: Vec<usize> = results.iter().map(|r| r.batch_index).collect();
    let pages: Vec<PageRange> = results.iter().map(|r| r.pages).collect();
    assert_eq!(order, vec![0, 1, 2]);
    assert_eq!(
        pages,
        vec![PageRange::new(1, 1), PageRange::new(2, 2), PageRange::new(3, 3)]
    );
}

#[tokio::test]
async fn given_failing_batch_when_extracting_then_job_fails_without_extraction_results() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let extract = Arc::new(ScriptedExtract {
        failing: Some(1),
        ..ScriptedExtract::default()
    });
    let executors = executors_with_extract(&harness, 4, extract.clone());
    let orchestrator = harness.orchestrator(executors, config_with_concurrency(1));

    let ExecutionOutcome::Failed(job) = orchestrator.run(job.id).await.unwrap() else {
        panic!("expected failure");
    };

    let error = job.error.unwrap();
    assert_eq!(error.stage, "Extract");
    assert!(error.cause.contains("batch 2 of 4"), "{}", error.cause);
    assert!(job.envelope.extraction_results.is_none());
    assert!(job.envelope.batch_plan.is_some());
    assert_eq!(extract.started(), vec![0, 1]);
}

#[tokio::test]
async fn given_stage_exceeding_its_limit_when_running_then_job_fails_with_timeout() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let mut executors = harness.real_executors();
    executors.classify = Arc::new(FixedClassify {
        page_count: 1,
        delay: Duration::from_secs(5),
    });
    let config = OrchestratorConfig {
        timeouts: StageTimeouts {
            classify: Duration::from_millis(20),
            ..StageTimeouts::default()
        },
        ..OrchestratorConfig::default()
    };
    let orchestrator = harness.orchestrator(executors, config);

    let ExecutionOutcome::Failed(job) = orchestrator.run(job.id).await.unwrap() else {
        panic!("expected failure");
    };

    let error = job.error.unwrap();
    assert_eq!(error.stage, "Classify");
    assert!(error.cause.contains("timed out"));
}

#[tokio::test]
async fn given_already_claimed_job_when_running_again_then_execution_is_skipped() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    harness
        .repository
        .transition(job.id, JobStatus::Created, &JobUpdate::claim(JobStatus::Classifying))
        .await
        .unwrap();
    let orchestrator = harness.orchestrator(harness.real_executors(), OrchestratorConfig::default());

    let outcome = orchestrator.run(job.id).await.unwrap();

    assert!(matches!(
        outcome,
        ExecutionOutcome::Skipped {
            status: JobStatus::Classifying,
            ..
        }
    ));
    let stored = harness.repository.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Classifying);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn given_two_concurrent_runs_when_racing_on_one_job_then_only_one_executes() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let orchestrator = Arc::new(
        harness.orchestrator(harness.real_executors(), config_with_concurrency(2)),
    );

    let first = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.run(job.id).await }
    });
    let second = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.run(job.id).await }
    });

    let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, ExecutionOutcome::Completed(_)))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, ExecutionOutcome::Skipped { .. }))
        .count();
    assert_eq!((completed, skipped), (1, 1));
}

#[tokio::test]
async fn given_unknown_job_when_running_then_job_not_found_is_returned() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(harness.real_executors(), OrchestratorConfig::default());

    let result = orchestrator.run(JobId::new()).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn given_global_extract_limit_when_extracting_then_cap_applies_below_per_job_cap() {
    let harness = Harness::new();
    let job = harness.seed_job().await;
    let extract = Arc::new(ScriptedExtract {
        delays: (0..4).map(|i| (i, Duration::from_millis(20))).collect(),
        ..ScriptedExtract::default()
    });
    let executors = executors_with_extract(&harness, 4, extract.clone());
    let config = OrchestratorConfig {
        extract_concurrency: 4,
        global_extract_concurrency: Some(1),
        ..OrchestratorConfig::default()
    };
    let orchestrator = harness.orchestrator(executors, config);

    orchestrator.run(job.id).await.unwrap();

    assert_eq!(extract.peak(), 1);
}

#[tokio::test]
async fn given_store_down_after_classify_when_pipeline_runs_then_run_errors_and_job_stays_classifying()
{
    let harness =
        Harness::with_repository(RecordingJobRepository::unavailable_for(vec![JobStatus::Batching]));
    let job = harness.seed_job().await;
    let batch_plan = Arc::new(CountingBatchPlan::new(1));
    let mut executors = harness.real_executors();
    executors.batch_plan = batch_plan.clone();
    let orchestrator = harness.orchestrator(executors, OrchestratorConfig::default());

    let result = orchestrator.run(job.id).await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Repository(RepositoryError::ConnectionFailed(_)))
    ));
    assert_eq!(batch_plan.calls.load(Ordering::SeqCst), 0);
    let stored = harness.repository.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Classifying);
    assert!(stored.envelope.classification.is_none());
}

#[tokio::test]
async fn given_store_down_when_recording_stage_failure_then_error_carries_stage_and_cause() {
    let harness =
        Harness::with_repository(RecordingJobRepository::unavailable_for(vec![JobStatus::Failed]));
    let job = harness.seed_job().await;
    let mut executors = harness.real_executors();
    executors.classify = Arc::new(FailingClassify);
    let orchestrator = harness.orchestrator(executors, OrchestratorConfig::default());

    let result = orchestrator.run(job.id).await;

    match result {
        Err(OrchestratorError::FailureNotRecorded {
            stage,
            cause,
            source,
        }) => {
            assert_eq!(stage, Stage::Classify);
            assert!(cause.contains("classifier unavailable"));
            assert!(matches!(source, RepositoryError::ConnectionFailed(_)));
        }
        other => panic!("expected unrecorded failure, got {:?}", other),
    }
    let stored = harness.repository.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Classifying);
}
