use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Document category tag supplied with the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceType {
    Life,
    PropertyCasualty,
}

impl InsuranceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsuranceType::Life => "life",
            InsuranceType::PropertyCasualty => "property_casualty",
        }
    }
}

impl FromStr for InsuranceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "life" => Ok(InsuranceType::Life),
            "property_casualty" | "p&c" => Ok(InsuranceType::PropertyCasualty),
            other => Err(format!("Unsupported insurance type: {}", other)),
        }
    }
}

impl fmt::Display for InsuranceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
