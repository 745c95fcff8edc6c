mod envelope;
mod insurance_type;
mod job;
mod job_id;
mod job_status;
mod object_key;
mod stage;

pub use envelope::{
    ActionResult, Analysis, BatchPlan, Classification, ExtractionResult, JobEnvelope, PageRange,
};
pub use insurance_type::InsuranceType;
pub use job::{Job, JobError, JobUpdate};
pub use job_id::JobId;
pub use job_status::JobStatus;
pub use object_key::{ObjectKey, UPLOAD_PREFIX};
pub use stage::Stage;
