use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const ORCHESTRATION_SCHEMA_VERSION: &str = "v1";
pub const OUTCOME_RECORD_SCHEMA_VERSION: &str = "v1";
pub const MAX_ROSTER_ROWS: usize = 50_000;
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_BATCHES: usize = 1_000;

/// One roster row as exported from Excel, keyed by column header.
pub type RosterRow = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub schema_version: String,
    pub request_fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchAssignment {
    pub batch_id: usize,
    pub start_index: usize,
    pub end_index_exclusive: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRequest {
    pub run_id: String,
    pub rows: Vec<RosterRow>,
    pub batch_count: Option<usize>,
    pub batch_size: Option<usize>,
    #[serde(default = "default_max_batches")]
    pub max_batches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedImportRequest {
    pub run_id: String,
    pub rows: Vec<RosterRow>,
    pub total_rows: usize,
    pub batch_count: Option<usize>,
    pub batch_size: Option<usize>,
    pub max_batches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerBatchPayload {
    pub run_id: String,
    pub batch_id: usize,
    pub total_rows: usize,
    pub start_index: usize,
    pub end_index_exclusive: usize,
    pub rows: Vec<RosterRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchRecord {
    pub batch_id: usize,
    pub status_code: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParentAcceptedResponse {
    pub run_id: String,
    pub total_rows: usize,
    pub batches_dispatched: usize,
    pub dispatches: Vec<DispatchRecord>,
    pub status: String,
    pub schema_version: String,
}

/// Worker response, field names exactly as the upstream ERP expects them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchReport {
    pub success: bool,
    pub message: String,
    #[serde(rename = "failedRows")]
    pub failed_rows: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeError {
    pub error_code: String,
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchOutcomeRecord {
    pub run_id: String,
    pub batch_id: usize,
    pub status: String,
    pub start_index: usize,
    pub end_index_exclusive: usize,
    pub profiles_modified: u64,
    pub credentials_upserted: u64,
    pub credentials_modified: u64,
    pub failed_application_numbers: Vec<String>,
    pub event_time: String,
    pub record_schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn default_max_batches() -> usize {
    DEFAULT_MAX_BATCHES
}

pub fn normalize_request(
    payload: ImportRequest,
) -> Result<NormalizedImportRequest, ValidationError> {
    let run_id = payload.run_id.trim().to_string();
    if run_id.is_empty() {
        return Err(ValidationError::new("run_id cannot be empty"));
    }

    if payload.rows.is_empty() {
        return Err(ValidationError::new("rows cannot be empty"));
    }

    if payload.rows.len() > MAX_ROSTER_ROWS {
        return Err(ValidationError::new(format!(
            "Roster exceeds MAX_ROSTER_ROWS={MAX_ROSTER_ROWS}"
        )));
    }

    if let Some(0) = payload.batch_count {
        return Err(ValidationError::new(
            "batch_count must be a positive integer",
        ));
    }

    if let Some(0) = payload.batch_size {
        return Err(ValidationError::new(
            "batch_size must be a positive integer",
        ));
    }

    if payload.max_batches == 0 {
        return Err(ValidationError::new(
            "max_batches must be a positive integer",
        ));
    }

    // A request that names no chunking strategy gets the write batch size
    // the directory backend is tuned for.
    let (batch_count, batch_size) = match (payload.batch_count, payload.batch_size) {
        (None, None) => (None, Some(DEFAULT_BATCH_SIZE)),
        other => other,
    };

    let total_rows = payload.rows.len();
    Ok(NormalizedImportRequest {
        run_id,
        rows: payload.rows,
        total_rows,
        batch_count,
        batch_size,
        max_batches: payload.max_batches,
    })
}

pub fn request_fingerprint(request: &NormalizedImportRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(request));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(application_number: &str) -> RosterRow {
        BTreeMap::from([
            (
                "Application Number".to_string(),
                Value::from(application_number),
            ),
            ("RollNo".to_string(), Value::from("r-1")),
        ])
    }

    #[test]
    fn normalize_request_rejects_blank_run_id() {
        let request = ImportRequest {
            run_id: " ".to_string(),
            rows: vec![sample_row("APP-001")],
            batch_count: Some(1),
            batch_size: None,
            max_batches: 10,
        };

        let error = normalize_request(request).expect_err("request should fail");
        assert_eq!(error.message(), "run_id cannot be empty");
    }

    #[test]
    fn normalize_request_rejects_empty_roster() {
        let request = ImportRequest {
            run_id: "run-1".to_string(),
            rows: Vec::new(),
            batch_count: Some(1),
            batch_size: None,
            max_batches: 10,
        };

        let error = normalize_request(request).expect_err("request should fail");
        assert_eq!(error.message(), "rows cannot be empty");
    }

    #[test]
    fn normalize_request_rejects_zero_batch_size() {
        let request = ImportRequest {
            run_id: "run-1".to_string(),
            rows: vec![sample_row("APP-001")],
            batch_count: None,
            batch_size: Some(0),
            max_batches: 10,
        };

        let error = normalize_request(request).expect_err("request should fail");
        assert_eq!(error.message(), "batch_size must be a positive integer");
    }

    #[test]
    fn normalize_request_defaults_batch_size_when_unspecified() {
        let request = ImportRequest {
            run_id: "run-1".to_string(),
            rows: vec![sample_row("APP-001"), sample_row("APP-002")],
            batch_count: None,
            batch_size: None,
            max_batches: DEFAULT_MAX_BATCHES,
        };

        let normalized = normalize_request(request).expect("request should pass");
        assert_eq!(normalized.total_rows, 2);
        assert_eq!(normalized.batch_count, None);
        assert_eq!(normalized.batch_size, Some(DEFAULT_BATCH_SIZE));
    }

    #[test]
    fn request_fingerprint_is_stable_and_input_sensitive() {
        let request = ImportRequest {
            run_id: "run-1".to_string(),
            rows: vec![sample_row("APP-001")],
            batch_count: Some(1),
            batch_size: None,
            max_batches: 10,
        };
        let normalized = normalize_request(request).expect("request should pass");

        let first = request_fingerprint(&normalized);
        let second = request_fingerprint(&normalized);
        assert_eq!(first, second);

        let mut altered = normalized.clone();
        altered.rows.push(sample_row("APP-002"));
        altered.total_rows = altered.rows.len();
        assert_ne!(first, request_fingerprint(&altered));
    }
}
