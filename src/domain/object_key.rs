use std::fmt;

use serde::{Deserialize, Serialize};

use super::{JobId, PageRange};

pub const UPLOAD_PREFIX: &str = "uploads/";
const EXTRACTION_PREFIX: &str = "extractions";
const ARCHIVE_PREFIX: &str = "archive";

/// Key of an object in the document or archive store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Prefix under which every extraction artifact of a job lives.
    pub fn extraction_prefix(job_id: &JobId) -> Self {
        Self(format!("{}/{}", EXTRACTION_PREFIX, job_id))
    }

    pub fn extraction_artifact(job_id: &JobId, range: &PageRange) -> Self {
        Self(format!(
            "{}/{}/pages-{}-{}.json",
            EXTRACTION_PREFIX, job_id, range.start, range.end
        ))
    }

    pub fn archive(job_id: &JobId) -> Self {
        Self(format!("{}/{}.json", ARCHIVE_PREFIX, job_id))
    }

    /// Cold-store copy of a live extraction artifact.
    pub fn archived_artifact(job_id: &JobId, live_key: &ObjectKey) -> Self {
        Self(format!(
            "{}/{}/{}/{}",
            ARCHIVE_PREFIX,
            job_id,
            EXTRACTION_PREFIX,
            live_key.file_name()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used as the original filename of an upload.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn is_upload(&self) -> bool {
        self.0.starts_with(UPLOAD_PREFIX) && self.0.len() > UPLOAD_PREFIX.len()
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.file_name()
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(extension))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
