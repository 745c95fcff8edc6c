use serde::{Deserialize, Serialize};

use super::{InsuranceType, ObjectKey};

/// Inclusive, 1-based page range handled by one extraction batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn page_count(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub document_type: String,
    pub page_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPlan {
    pub ranges: Vec<PageRange>,
}

impl BatchPlan {
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub batch_index: usize,
    pub pages: PageRange,
    /// Where the extracted data for these pages was written.
    pub artifact_key: ObjectKey,
    pub field_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub decision: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Accumulated pipeline state. Every stage owns exactly one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    pub source_object_key: ObjectKey,
    pub insurance_type: InsuranceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_plan: Option<BatchPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_results: Option<Vec<ExtractionResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionResult>,
}

impl JobEnvelope {
    pub fn seed(source_object_key: ObjectKey, insurance_type: InsuranceType) -> Self {
        Self {
            source_object_key,
            insurance_type,
            classification: None,
            batch_plan: None,
            extraction_results: None,
            analysis: None,
            action: None,
        }
    }

    /// Keys of every live object the job produced besides its source.
    pub fn artifact_keys(&self) -> Vec<ObjectKey> {
        self.extraction_results
            .iter()
            .flatten()
            .map(|r| r.artifact_key.clone())
            .collect()
    }
}
