mod http_inference_client;
mod mock_inference_client;

pub use http_inference_client::HttpInferenceClient;
pub use mock_inference_client::MockInferenceClient;
