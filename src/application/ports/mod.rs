mod inference_client;
mod job_repository;
mod object_storage;
mod repository_error;
mod stage_executor;

pub use inference_client::{InferenceClient, InferenceError, InferenceOperation};
pub use job_repository::JobRepository;
pub(crate) use job_repository::check_transition;
pub use object_storage::{ObjectStorage, ObjectStorageError};
pub use repository_error::RepositoryError;
pub use stage_executor::{
    ActExecutor, ActInput, AnalyzeExecutor, AnalyzeInput, BatchPlanExecutor, BatchPlanInput,
    ClassifyExecutor, ClassifyInput, ExtractExecutor, ExtractInput, StageError, StageExecutor,
};
