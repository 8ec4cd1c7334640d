use std::sync::Mutex;

use roster_core::credentials::CredentialRecord;
use roster_core::mapping::ProfileUpdate;
use roster_import_core::contract::{BatchOutcomeRecord, ParentAcceptedResponse, WorkerBatchPayload};
use roster_import_lambda::adapters::directory::{
    CredentialWriteReport, DirectoryStore, ProfileWriteReport,
};
use roster_import_lambda::adapters::invoke::WorkerInvoker;
use roster_import_lambda::handlers::parent::handle_parent_event;
use roster_import_lambda::handlers::worker::{handle_worker_payload, WorkerHandlerConfig};
use serde_json::{json, Value};

struct CapturingInvoker {
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl CapturingInvoker {
    fn new() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
        }
    }

    fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().expect("poisoned mutex").clone()
    }
}

impl WorkerInvoker for CapturingInvoker {
    fn invoke_worker_async(&self, payload: &[u8]) -> Result<(), String> {
        self.payloads
            .lock()
            .expect("poisoned mutex")
            .push(payload.to_vec());
        Ok(())
    }
}

struct InMemoryDirectory {
    role_id: String,
    profile_updates: Mutex<Vec<ProfileUpdate>>,
    credential_records: Mutex<Vec<CredentialRecord>>,
    outcomes: Mutex<Vec<BatchOutcomeRecord>>,
}

impl InMemoryDirectory {
    fn new(role_id: &str) -> Self {
        Self {
            role_id: role_id.to_string(),
            profile_updates: Mutex::new(Vec::new()),
            credential_records: Mutex::new(Vec::new()),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    fn profile_updates(&self) -> Vec<ProfileUpdate> {
        self.profile_updates.lock().expect("poisoned mutex").clone()
    }

    fn credential_records(&self) -> Vec<CredentialRecord> {
        self.credential_records
            .lock()
            .expect("poisoned mutex")
            .clone()
    }

    fn outcomes(&self) -> Vec<BatchOutcomeRecord> {
        self.outcomes.lock().expect("poisoned mutex").clone()
    }
}

impl DirectoryStore for InMemoryDirectory {
    fn student_role_id(&self) -> Result<Option<String>, String> {
        Ok(Some(self.role_id.clone()))
    }

    fn apply_profile_updates(&self, updates: &[ProfileUpdate]) -> Result<ProfileWriteReport, String> {
        self.profile_updates
            .lock()
            .expect("poisoned mutex")
            .extend(updates.iter().cloned());
        let count = updates.len() as u64;
        Ok(ProfileWriteReport {
            matched_count: count,
            modified_count: count,
        })
    }

    fn existing_application_numbers(
        &self,
        application_numbers: &[String],
    ) -> Result<Vec<String>, String> {
        // Every roster row names a student the directory already tracks.
        Ok(application_numbers.to_vec())
    }

    fn upsert_credentials(
        &self,
        records: &[CredentialRecord],
    ) -> Result<CredentialWriteReport, String> {
        self.credential_records
            .lock()
            .expect("poisoned mutex")
            .extend(records.iter().cloned());
        Ok(CredentialWriteReport {
            upserted_count: records.len() as u64,
            modified_count: 0,
        })
    }

    fn record_batch_outcome(&self, record: &BatchOutcomeRecord) -> Result<(), String> {
        self.outcomes
            .lock()
            .expect("poisoned mutex")
            .push(record.clone());
        Ok(())
    }
}

fn roster_event(size: usize, batch_size: usize) -> Value {
    let rows: Vec<Value> = (0..size)
        .map(|index| {
            json!({
                "Application Number": format!("app-{index:03}"),
                "RollNo": format!("cs21b{index:03}"),
                "Semester": "5",
                "College Email Id": format!("student{index:03}@college.edu"),
                "Status": "active",
            })
        })
        .collect();
    json!({
        "body": {
            "run_id": "integration-run",
            "rows": rows,
            "batch_size": batch_size,
        }
    })
}

#[test]
fn dispatched_batches_cover_the_roster_and_provision_credentials() {
    let invoker = CapturingInvoker::new();
    let response = handle_parent_event(
        roster_event(5, 2),
        Some("arn:aws:lambda:example:worker"),
        &invoker,
    );
    assert_eq!(response.status_code, 202);

    let accepted: ParentAcceptedResponse =
        serde_json::from_str(&response.body).expect("response body should parse");
    assert_eq!(accepted.total_rows, 5);
    assert_eq!(accepted.batches_dispatched, 3);

    let directory = InMemoryDirectory::new("64f1b2a09c3de1a2b3c4d5e6");
    let config = WorkerHandlerConfig {
        event_time: "2026-08-06T00:00:00Z".to_string(),
        created_on_millis: 1_770_000_000_000,
    };

    for bytes in invoker.payloads() {
        let payload: WorkerBatchPayload =
            serde_json::from_slice(&bytes).expect("payload should parse");
        let report = handle_worker_payload(&payload, &config, &directory)
            .expect("worker should succeed");
        assert!(report.success, "batch {} failed", payload.batch_id);
        assert!(report.failed_rows.is_empty());
    }

    let mut updated: Vec<String> = directory
        .profile_updates()
        .into_iter()
        .map(|update| update.application_number)
        .collect();
    updated.sort();
    let expected: Vec<String> = (0..5).map(|index| format!("APP-{index:03}")).collect();
    assert_eq!(updated, expected);

    let credentials = directory.credential_records();
    assert_eq!(credentials.len(), 5);
    for record in &credentials {
        assert!(record.user_email.ends_with("@COLLEGE.EDU"));
        assert!(record.is_active);
        assert_eq!(record.auth_role_ids, vec!["64f1b2a09c3de1a2b3c4d5e6"]);
    }

    let outcomes = directory.outcomes();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|outcome| outcome.status == "success"));
    let covered: usize = outcomes
        .iter()
        .map(|outcome| outcome.end_index_exclusive - outcome.start_index)
        .sum();
    assert_eq!(covered, 5);
}
