// Report Request Domain Model

use serde::{Deserialize, Serialize};

/// Payload of a `report_generation_queue` task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTask {
    pub report_type: String,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
}
