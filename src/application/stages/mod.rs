//! Stage executors backed by the inference service and object storage.

mod act;
mod analyze;
mod batch_plan;
mod classify;
mod extract;
mod response;
mod retry;

pub use act::ActStage;
pub use analyze::AnalyzeStage;
pub use batch_plan::BatchPlanStage;
pub use classify::{ClassifyStage, DEFAULT_MAX_PAGES};
pub use extract::ExtractStage;
pub use retry::{MAX_RETRY_DELAY, RetryPolicy};
