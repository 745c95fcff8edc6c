use serde::de::DeserializeOwned;

use crate::application::ports::StageError;

pub(super) fn parse<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, StageError> {
    serde_json::from_value(value).map_err(|e| StageError::MalformedResponse(e.to_string()))
}

pub(super) fn into_details(map: serde_json::Map<String, serde_json::Value>) -> serde_json::Value {
    serde_json::Value::Object(map)
}
