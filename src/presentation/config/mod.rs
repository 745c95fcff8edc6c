mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    BucketSettings, DatabaseSettings, InferenceProviderSetting, InferenceSettings,
    IngestionSettings, PipelineSettings, RetentionSettings, ServerSettings, Settings,
    StagePolicySettings, StorageProviderSetting, StorageSettings,
};
