mod fan_out;
mod ingestion_trigger;
mod pipeline_orchestrator;
mod pipeline_worker;
mod retention_sweep;

pub use fan_out::{BatchFailure, run_bounded};
pub use ingestion_trigger::{
    BatchIngestionReport, IngestionError, IngestionOutcome, IngestionSignal, IngestionTrigger,
};
pub use pipeline_orchestrator::{
    ExecutionOutcome, OrchestratorConfig, OrchestratorError, PipelineExecutors,
    PipelineOrchestrator, StageTimeouts,
};
pub use pipeline_worker::{ExecutionRequest, PipelineWorker};
pub use retention_sweep::{
    ARCHIVE_FORMAT_VERSION, ArchiveDocument, RetentionSweep, SweepError, SweepReport,
    SweepSchedule,
};
