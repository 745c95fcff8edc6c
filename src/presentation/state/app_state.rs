use std::sync::Arc;

use crate::application::ports::JobRepository;
use crate::application::services::IngestionTrigger;
use crate::presentation::config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub ingestion_trigger: Arc<IngestionTrigger>,
    pub job_repository: Arc<dyn JobRepository>,
    pub settings: Settings,
}
