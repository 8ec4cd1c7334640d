use std::collections::BTreeSet;
use std::time::Instant;

use roster_core::credentials::{build_credential_record, CredentialRecord};
use roster_core::fields;
use roster_core::mapping::{map_roster_row, ProfileUpdate, RosterRow};
use roster_import_core::contract::{
    BatchOutcomeRecord, BatchReport, OutcomeError, WorkerBatchPayload,
    OUTCOME_RECORD_SCHEMA_VERSION,
};
use serde_json::json;

use crate::adapters::directory::DirectoryStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandlerConfig {
    pub event_time: String,
    pub created_on_millis: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandlerError {
    pub message: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct BatchWriteStats {
    profiles_modified: u64,
    credentials_upserted: u64,
    credentials_modified: u64,
}

/// Execute one roster batch: map rows, apply profile updates, upsert derived
/// credentials, and persist an outcome record. Returns the batch report the
/// upstream ERP consumes; storage failures surface in the report rather than
/// failing the invocation.
pub fn handle_worker_payload(
    payload: &WorkerBatchPayload,
    config: &WorkerHandlerConfig,
    store: &impl DirectoryStore,
) -> Result<BatchReport, WorkerHandlerError> {
    let started_at = Instant::now();
    log_worker_info(
        "batch_started",
        json!({
            "run_id": payload.run_id.clone(),
            "batch_id": payload.batch_id,
            "start_index": payload.start_index,
            "end_index_exclusive": payload.end_index_exclusive,
            "planned_rows": payload.rows.len(),
        }),
    );

    if payload.rows.is_empty() {
        return Ok(BatchReport {
            success: false,
            message: "No batch rows provided".to_string(),
            failed_rows: Vec::new(),
        });
    }

    if payload.start_index >= payload.end_index_exclusive {
        return Err(WorkerHandlerError {
            message: "Invalid batch bounds".to_string(),
        });
    }

    if payload.end_index_exclusive > payload.total_rows {
        return Err(WorkerHandlerError {
            message: "end_index_exclusive exceeds total_rows".to_string(),
        });
    }

    if payload.rows.len() != payload.end_index_exclusive - payload.start_index {
        return Err(WorkerHandlerError {
            message: "Batch rows disagree with batch bounds".to_string(),
        });
    }

    let mut failed: Vec<String> = Vec::new();
    match execute_batch(payload, config, store, &mut failed) {
        Ok(stats) => {
            let success = failed.is_empty();
            record_outcome(payload, config, store, "success", &stats, &failed, None);
            log_worker_info(
                "batch_completed",
                json!({
                    "run_id": payload.run_id.clone(),
                    "batch_id": payload.batch_id,
                    "duration_ms": started_at.elapsed().as_millis(),
                    "profiles_modified": stats.profiles_modified,
                    "credentials_upserted": stats.credentials_upserted,
                    "failed_rows": failed.len(),
                }),
            );
            Ok(BatchReport {
                success,
                message: if success {
                    "All rows updated".to_string()
                } else {
                    "Some records failed".to_string()
                },
                failed_rows: failed,
            })
        }
        Err(error) => {
            for row in &payload.rows {
                let raw = raw_application_number(row);
                if !failed.contains(&raw) {
                    failed.push(raw);
                }
            }
            record_outcome(
                payload,
                config,
                store,
                "failure",
                &BatchWriteStats::default(),
                &failed,
                Some(OutcomeError {
                    error_code: "storage_error".to_string(),
                    error_message: error.clone(),
                }),
            );
            log_worker_error(
                "batch_failed",
                json!({
                    "run_id": payload.run_id.clone(),
                    "batch_id": payload.batch_id,
                    "duration_ms": started_at.elapsed().as_millis(),
                    "error": error.clone(),
                }),
            );
            Ok(BatchReport {
                success: false,
                message: format!("Unhandled storage error: {error}"),
                failed_rows: failed,
            })
        }
    }
}

fn execute_batch(
    payload: &WorkerBatchPayload,
    config: &WorkerHandlerConfig,
    store: &impl DirectoryStore,
    failed: &mut Vec<String>,
) -> Result<BatchWriteStats, String> {
    let student_role_id = store.student_role_id()?;
    if student_role_id.is_none() {
        log_worker_error(
            "student_role_missing",
            json!({
                "run_id": payload.run_id.clone(),
                "batch_id": payload.batch_id,
                "role_name": fields::STUDENT_ROLE_NAME,
            }),
        );
    }

    let mut updates: Vec<ProfileUpdate> = Vec::new();
    let mut credential_records: Vec<CredentialRecord> = Vec::new();
    let mut batch_application_numbers: Vec<String> = Vec::new();

    for row in &payload.rows {
        let mapped = map_roster_row(row);
        let Some(application_number) = mapped.application_number().map(str::to_string) else {
            failed.push(raw_application_number(row));
            continue;
        };
        batch_application_numbers.push(application_number.clone());

        if let Some(update) = mapped.profile_update() {
            updates.push(update);
        }

        if let Some(college_email) = mapped.college_email() {
            match build_credential_record(
                college_email,
                mapped.is_active(),
                config.created_on_millis,
                student_role_id.as_deref(),
            ) {
                Ok(record) => credential_records.push(record),
                Err(error) => {
                    log_worker_error(
                        "credential_hash_failed",
                        json!({
                            "run_id": payload.run_id.clone(),
                            "batch_id": payload.batch_id,
                            "user_email": college_email,
                            "error": error.message(),
                        }),
                    );
                    failed.push(application_number);
                    continue;
                }
            }
        }
    }

    let mut stats = BatchWriteStats::default();

    if updates.is_empty() {
        log_worker_info(
            "no_profile_updates",
            json!({
                "run_id": payload.run_id.clone(),
                "batch_id": payload.batch_id,
            }),
        );
    } else {
        let report = store.apply_profile_updates(&updates)?;
        stats.profiles_modified = report.modified_count;
        log_worker_info(
            "profiles_updated",
            json!({
                "run_id": payload.run_id.clone(),
                "batch_id": payload.batch_id,
                "matched_count": report.matched_count,
                "modified_count": report.modified_count,
            }),
        );

        // Rows that mapped cleanly can still name students the directory
        // has never seen; those application numbers count as failures.
        let existing: BTreeSet<String> = store
            .existing_application_numbers(&batch_application_numbers)?
            .into_iter()
            .collect();
        for application_number in &batch_application_numbers {
            if !existing.contains(application_number) {
                failed.push(application_number.clone());
            }
        }
    }

    if !credential_records.is_empty() {
        let report = store.upsert_credentials(&credential_records)?;
        stats.credentials_upserted = report.upserted_count;
        stats.credentials_modified = report.modified_count;
        log_worker_info(
            "credentials_upserted",
            json!({
                "run_id": payload.run_id.clone(),
                "batch_id": payload.batch_id,
                "upserted_count": report.upserted_count,
                "modified_count": report.modified_count,
            }),
        );
    }

    Ok(stats)
}

// The outcome record is an audit artifact; failing to persist it must not
// overturn a report whose data writes already happened.
fn record_outcome(
    payload: &WorkerBatchPayload,
    config: &WorkerHandlerConfig,
    store: &impl DirectoryStore,
    status: &str,
    stats: &BatchWriteStats,
    failed: &[String],
    error: Option<OutcomeError>,
) {
    let record = BatchOutcomeRecord {
        run_id: payload.run_id.clone(),
        batch_id: payload.batch_id,
        status: status.to_string(),
        start_index: payload.start_index,
        end_index_exclusive: payload.end_index_exclusive,
        profiles_modified: stats.profiles_modified,
        credentials_upserted: stats.credentials_upserted,
        credentials_modified: stats.credentials_modified,
        failed_application_numbers: failed.to_vec(),
        event_time: config.event_time.clone(),
        record_schema: OUTCOME_RECORD_SCHEMA_VERSION.to_string(),
        error,
    };

    if let Err(write_error) = store.record_batch_outcome(&record) {
        log_worker_error(
            "outcome_record_failed",
            json!({
                "run_id": payload.run_id.clone(),
                "batch_id": payload.batch_id,
                "status": status,
                "error": write_error,
            }),
        );
    }
}

fn raw_application_number(row: &RosterRow) -> String {
    match row.get(fields::APPLICATION_NUMBER_HEADER) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn log_worker_info(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "worker_handler",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

fn log_worker_error(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "worker_handler",
            "level": "error",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}
