use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use underwriter::application::ports::{InferenceClient, JobRepository};
use underwriter::application::services::{
    IngestionTrigger, PipelineExecutors, PipelineOrchestrator, PipelineWorker, RetentionSweep,
    SweepSchedule,
};
use underwriter::application::stages::{
    ActStage, AnalyzeStage, BatchPlanStage, ClassifyStage, ExtractStage,
};
use underwriter::infrastructure::inference::{HttpInferenceClient, MockInferenceClient};
use underwriter::infrastructure::observability::{TracingConfig, init_tracing};
use underwriter::infrastructure::persistence::{
    InMemoryJobRepository, PgJobRepository, create_pool,
};
use underwriter::infrastructure::storage::StorageFactory;
use underwriter::presentation::config::{InferenceProviderSetting, Settings};
use underwriter::presentation::{AppState, Environment, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;

    init_tracing(TracingConfig::default(), settings.server.port);
    tracing::info!(environment = %environment, "Starting underwriter");

    let job_repository: Arc<dyn JobRepository> = match &settings.database.url {
        Some(url) => {
            let pool = create_pool(url, settings.database.max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            Arc::new(PgJobRepository::new(pool))
        }
        None => {
            tracing::warn!("No database url configured, jobs are kept in memory");
            Arc::new(InMemoryJobRepository::new())
        }
    };

    let live_storage =
        StorageFactory::live(&settings.storage).context("Failed to create live storage")?;
    let archive_storage =
        StorageFactory::archive(&settings.storage).context("Failed to create archive storage")?;

    let inference: Arc<dyn InferenceClient> = match settings.inference.provider {
        InferenceProviderSetting::Http => Arc::new(
            HttpInferenceClient::new(
                settings.inference.base_url.clone(),
                settings.inference.api_key.clone(),
                Duration::from_secs(settings.inference.request_timeout_secs),
            )
            .context("Failed to create inference client")?,
        ),
        InferenceProviderSetting::Mock => {
            tracing::warn!("Using mock inference provider");
            Arc::new(MockInferenceClient::new(settings.inference.mock_page_count))
        }
    };

    let pipeline = &settings.pipeline;
    let executors = PipelineExecutors {
        classify: Arc::new(
            ClassifyStage::new(Arc::clone(&inference), pipeline.classify.retry_policy())
                .with_max_pages(pipeline.max_pages),
        ),
        batch_plan: Arc::new(BatchPlanStage::new(pipeline.batch_size)),
        extract: Arc::new(ExtractStage::new(
            Arc::clone(&inference),
            Arc::clone(&live_storage),
            pipeline.extract.retry_policy(),
        )),
        analyze: Arc::new(AnalyzeStage::new(
            Arc::clone(&inference),
            Arc::clone(&live_storage),
            pipeline.analyze.retry_policy(),
        )),
        act: Arc::new(ActStage::new(
            Arc::clone(&inference),
            pipeline.act.retry_policy(),
        )),
    };

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::clone(&job_repository),
        executors,
        pipeline.orchestrator_config(),
    ));

    let (sender, receiver) = mpsc::channel(pipeline.channel_capacity.max(1));
    let worker = PipelineWorker::new(receiver, orchestrator, pipeline.max_concurrent_jobs);
    tokio::spawn(worker.run());

    let ingestion_trigger = Arc::new(IngestionTrigger::new(
        Arc::clone(&job_repository),
        sender,
        chrono::Duration::seconds(settings.ingestion.dedupe_window_secs),
    ));

    let retention = &settings.retention;
    if retention.enabled {
        let schedule = SweepSchedule::daily_at(retention.schedule_hour, retention.schedule_minute)
            .context("Invalid retention schedule")?;
        let sweep = Arc::new(RetentionSweep::new(
            Arc::clone(&job_repository),
            Arc::clone(&live_storage),
            archive_storage,
            retention.retention_days,
        ));
        tokio::spawn(sweep.run_on_schedule(schedule));
    } else {
        tracing::info!("Retention sweep disabled");
    }

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        ingestion_trigger,
        job_repository,
        settings,
    };
    let router = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
