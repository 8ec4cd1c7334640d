use roster_import_core::batching::compute_batch_plan;
use roster_import_core::contract::{
    normalize_request, request_fingerprint, DispatchRecord, ImportRequest, ParentAcceptedResponse,
    RunContext, WorkerBatchPayload, ORCHESTRATION_SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapters::invoke::WorkerInvoker;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

pub fn build_run_context(run_id: impl Into<String>, request_fingerprint: String) -> RunContext {
    RunContext {
        run_id: run_id.into(),
        schema_version: ORCHESTRATION_SCHEMA_VERSION.to_string(),
        request_fingerprint,
    }
}

pub fn handle_parent_event(
    event: Value,
    dispatch_target: Option<&str>,
    invoker: &dyn WorkerInvoker,
) -> ApiGatewayResponse {
    let payload = match normalize_apigw_event(event) {
        Ok(value) => value,
        Err(message) => return validation_error_response(&message),
    };

    let request = match serde_json::from_value::<ImportRequest>(payload) {
        Ok(value) => value,
        Err(error) => return validation_error_response(&format!("Malformed request: {error}")),
    };

    let normalized = match normalize_request(request) {
        Ok(value) => value,
        Err(error) => return validation_error_response(error.message()),
    };

    let dispatch_target = match dispatch_target {
        Some(value) if !value.trim().is_empty() => value,
        _ => {
            return error_response(
                500,
                json!({
                    "error": "misconfiguration",
                    "message": "WORKER_LAMBDA_ARN must be configured",
                }),
            );
        }
    };

    let run_context =
        build_run_context(normalized.run_id.clone(), request_fingerprint(&normalized));
    let batch_plan = match compute_batch_plan(&normalized) {
        Ok(value) => value,
        Err(error) => return validation_error_response(error.message()),
    };

    let mut dispatches = Vec::with_capacity(batch_plan.len());
    for assignment in batch_plan {
        let worker_payload = WorkerBatchPayload {
            run_id: normalized.run_id.clone(),
            batch_id: assignment.batch_id,
            total_rows: normalized.total_rows,
            start_index: assignment.start_index,
            end_index_exclusive: assignment.end_index_exclusive,
            rows: normalized.rows[assignment.start_index..assignment.end_index_exclusive].to_vec(),
        };

        let bytes = match serde_json::to_vec(&worker_payload) {
            Ok(value) => value,
            Err(error) => {
                return error_response(
                    500,
                    json!({
                        "error": "serialization_error",
                        "message": error.to_string(),
                    }),
                );
            }
        };

        if let Err(error) = invoker.invoke_worker_async(&bytes) {
            return error_response(
                502,
                json!({
                    "error": "dispatch_failed",
                    "message": error,
                    "dispatch_target": dispatch_target,
                    "run_context": run_context,
                }),
            );
        }

        dispatches.push(DispatchRecord {
            batch_id: worker_payload.batch_id,
            status_code: 202,
        });
    }

    let response = ParentAcceptedResponse {
        run_id: normalized.run_id,
        total_rows: normalized.total_rows,
        batches_dispatched: dispatches.len(),
        dispatches,
        status: "dispatch_submitted".to_string(),
        schema_version: ORCHESTRATION_SCHEMA_VERSION.to_string(),
    };
    success_response(202, response)
}

fn normalize_apigw_event(event: Value) -> Result<Value, String> {
    let Some(object) = event.as_object() else {
        return Err("Request payload must be a JSON object".to_string());
    };

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) => {
            serde_json::from_str(text).map_err(|error| format!("Malformed JSON body: {error}"))
        }
        _ => Err("Request body must be a JSON object".to_string()),
    }
}

fn validation_error_response(message: &str) -> ApiGatewayResponse {
    error_response(
        400,
        json!({
            "error": "validation_error",
            "message": message,
        }),
    )
}

fn success_response(status_code: u16, payload: impl Serialize) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: serde_json::to_string(&payload).expect("response payload should serialize"),
    }
}

fn error_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

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

    fn roster_body(size: usize, batch_size: usize) -> Value {
        let rows: Vec<Value> = (0..size)
            .map(|index| {
                json!({
                    "Application Number": format!("APP-{index:03}"),
                    "RollNo": format!("r-{index:03}"),
                })
            })
            .collect();
        json!({
            "body": {
                "run_id": "import-run",
                "rows": rows,
                "batch_size": batch_size,
            }
        })
    }

    #[test]
    fn rejects_invalid_payload_without_dispatching() {
        let invoker = CapturingInvoker::new();
        let response = handle_parent_event(
            json!({"body": "{\"run_id\":\"missing-rows\"}"}),
            Some("arn:aws:lambda:example:worker"),
            &invoker,
        );

        assert_eq!(response.status_code, 400);
        assert!(invoker.payloads().is_empty());
    }

    #[test]
    fn reports_misconfiguration_without_dispatch_target() {
        let invoker = CapturingInvoker::new();
        let response = handle_parent_event(roster_body(2, 1), None, &invoker);

        assert_eq!(response.status_code, 500);
        assert!(response.body.contains("WORKER_LAMBDA_ARN"));
        assert!(invoker.payloads().is_empty());
    }

    #[test]
    fn dispatches_contiguous_row_slices() {
        let invoker = CapturingInvoker::new();
        let response = handle_parent_event(
            roster_body(5, 2),
            Some("arn:aws:lambda:example:worker"),
            &invoker,
        );

        assert_eq!(response.status_code, 202);
        let payloads = invoker.payloads();
        assert_eq!(payloads.len(), 3);

        let decoded: Vec<WorkerBatchPayload> = payloads
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).expect("payload should parse"))
            .collect();

        assert_eq!(decoded[0].run_id, "import-run");
        assert_eq!(decoded[0].total_rows, 5);
        assert_eq!(decoded[0].rows.len(), 2);
        assert_eq!(
            decoded[0].end_index_exclusive - decoded[0].start_index,
            decoded[0].rows.len()
        );
        for pair in decoded.windows(2) {
            assert_eq!(pair[0].end_index_exclusive, pair[1].start_index);
        }
        assert_eq!(decoded[2].end_index_exclusive, 5);

        let accepted: ParentAcceptedResponse =
            serde_json::from_str(&response.body).expect("response body should parse");
        assert_eq!(accepted.batches_dispatched, 3);
        assert_eq!(accepted.status, "dispatch_submitted");
    }

    #[test]
    fn small_roster_fits_the_default_batch_size() {
        let invoker = CapturingInvoker::new();
        let response = handle_parent_event(
            json!({
                "body": {
                    "run_id": "small-run",
                    "rows": [
                        {"Application Number": "APP-001"},
                        {"Application Number": "APP-002"},
                    ],
                }
            }),
            Some("arn:aws:lambda:example:worker"),
            &invoker,
        );

        assert_eq!(response.status_code, 202);
        assert_eq!(invoker.payloads().len(), 1);
    }
}
