use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::{ClientOptions, UpdateOneModel, WriteModel};
use mongodb::{Client, Namespace};
use roster_core::credentials::CredentialRecord;
use roster_core::fields;
use roster_core::mapping::ProfileUpdate;
use roster_import_core::collections::{
    namespace, AUTH_ROLES_COLLECTION, AUTH_USERS_COLLECTION, ERP_STUDENT_PROFILE_COLLECTION,
    IMPORT_OUTCOMES_COLLECTION,
};
use roster_import_core::contract::{BatchOutcomeRecord, BatchReport, WorkerBatchPayload};
use roster_import_lambda::adapters::directory::{
    CredentialWriteReport, DirectoryStore, ProfileWriteReport,
};
use roster_import_lambda::handlers::worker::{handle_worker_payload, WorkerHandlerConfig};

struct MongoDirectoryStore {
    client: Client,
    database: String,
    outcomes_collection: String,
}

fn run_blocking<T>(future: impl Future<Output = Result<T, String>>) -> Result<T, String> {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

fn set_document(set_fields: &BTreeMap<String, serde_json::Value>) -> Result<Document, String> {
    let mut document = Document::new();
    for (field, value) in set_fields {
        let bson = mongodb::bson::to_bson(value)
            .map_err(|error| format!("failed to encode field '{field}' as BSON: {error}"))?;
        document.insert(field.clone(), bson);
    }
    Ok(document)
}

fn credential_document(record: &CredentialRecord) -> Result<Document, String> {
    let mut role_ids = Vec::with_capacity(record.auth_role_ids.len());
    for role_id in &record.auth_role_ids {
        let object_id = ObjectId::parse_str(role_id)
            .map_err(|error| format!("invalid auth role object id '{role_id}': {error}"))?;
        role_ids.push(Bson::ObjectId(object_id));
    }

    let mut document = Document::new();
    document.insert(fields::USER_EMAIL_FIELD, record.user_email.clone());
    document.insert(fields::USER_PASSWORD_FIELD, record.password_hash.clone());
    document.insert(fields::IS_ACTIVE_FIELD, record.is_active);
    document.insert(fields::CREATED_ON_FIELD, record.created_on_millis);
    document.insert(fields::AUTH_ROLES_FIELD, role_ids);
    Ok(document)
}

impl DirectoryStore for MongoDirectoryStore {
    fn student_role_id(&self) -> Result<Option<String>, String> {
        let collection = self
            .client
            .database(&self.database)
            .collection::<Document>(AUTH_ROLES_COLLECTION);
        let mut filter = Document::new();
        filter.insert(fields::AUTH_ROLE_NAME_FIELD, fields::STUDENT_ROLE_NAME);

        run_blocking(async move {
            let document = collection
                .find_one(filter)
                .projection(doc! { "_id": 1 })
                .await
                .map_err(|error| format!("failed to query auth roles: {error}"))?;
            Ok(document
                .and_then(|role| role.get_object_id("_id").ok())
                .map(|object_id| object_id.to_hex()))
        })
    }

    fn apply_profile_updates(
        &self,
        updates: &[ProfileUpdate],
    ) -> Result<ProfileWriteReport, String> {
        if updates.is_empty() {
            return Ok(ProfileWriteReport::default());
        }

        let write_namespace = Namespace::new(self.database.clone(), ERP_STUDENT_PROFILE_COLLECTION);
        let mut models = Vec::with_capacity(updates.len());
        for update in updates {
            let mut filter = Document::new();
            filter.insert(
                fields::APPLICATION_NUMBER_FIELD,
                update.application_number.clone(),
            );
            models.push(WriteModel::UpdateOne(
                UpdateOneModel::builder()
                    .namespace(write_namespace.clone())
                    .filter(filter)
                    .update(doc! { "$set": set_document(&update.set_fields)? })
                    .build(),
            ));
        }

        let client = self.client.clone();
        let target = namespace(&self.database, ERP_STUDENT_PROFILE_COLLECTION);
        run_blocking(async move {
            let result = client
                .bulk_write(models)
                .ordered(false)
                .await
                .map_err(|error| format!("failed to bulk-update {target}: {error}"))?;
            Ok(ProfileWriteReport {
                matched_count: u64::try_from(result.matched_count).unwrap_or_default(),
                modified_count: u64::try_from(result.modified_count).unwrap_or_default(),
            })
        })
    }

    fn existing_application_numbers(
        &self,
        application_numbers: &[String],
    ) -> Result<Vec<String>, String> {
        let collection = self
            .client
            .database(&self.database)
            .collection::<Document>(ERP_STUDENT_PROFILE_COLLECTION);
        let mut filter = Document::new();
        filter.insert(
            fields::APPLICATION_NUMBER_FIELD,
            doc! { "$in": application_numbers.to_vec() },
        );

        run_blocking(async move {
            let values = collection
                .distinct(fields::APPLICATION_NUMBER_FIELD, filter)
                .await
                .map_err(|error| format!("failed to query student profiles: {error}"))?;
            Ok(values
                .into_iter()
                .filter_map(|value| match value {
                    Bson::String(text) => Some(text),
                    _ => None,
                })
                .collect())
        })
    }

    fn upsert_credentials(
        &self,
        records: &[CredentialRecord],
    ) -> Result<CredentialWriteReport, String> {
        if records.is_empty() {
            return Ok(CredentialWriteReport::default());
        }

        let write_namespace = Namespace::new(self.database.clone(), AUTH_USERS_COLLECTION);
        let mut models = Vec::with_capacity(records.len());
        for record in records {
            let mut filter = Document::new();
            filter.insert(fields::USER_EMAIL_FIELD, record.user_email.clone());
            models.push(WriteModel::UpdateOne(
                UpdateOneModel::builder()
                    .namespace(write_namespace.clone())
                    .filter(filter)
                    .update(doc! { "$set": credential_document(record)? })
                    .upsert(true)
                    .build(),
            ));
        }

        let client = self.client.clone();
        let target = namespace(&self.database, AUTH_USERS_COLLECTION);
        run_blocking(async move {
            let result = client
                .bulk_write(models)
                .ordered(false)
                .await
                .map_err(|error| format!("failed to upsert credentials into {target}: {error}"))?;
            Ok(CredentialWriteReport {
                upserted_count: u64::try_from(result.upserted_count).unwrap_or_default(),
                modified_count: u64::try_from(result.modified_count).unwrap_or_default(),
            })
        })
    }

    fn record_batch_outcome(&self, record: &BatchOutcomeRecord) -> Result<(), String> {
        let collection = self
            .client
            .database(&self.database)
            .collection::<Document>(&self.outcomes_collection);
        let document = mongodb::bson::to_document(record)
            .map_err(|error| format!("failed to encode batch outcome record: {error}"))?;

        run_blocking(async move {
            collection
                .insert_one(document)
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to persist batch outcome record: {error}"))
        })
    }
}

async fn handle_request(event: LambdaEvent<serde_json::Value>) -> Result<BatchReport, Error> {
    let payload: WorkerBatchPayload = serde_json::from_value(event.payload)
        .map_err(|error| Error::from(format!("invalid worker batch payload: {error}")))?;

    let connection_uri = std::env::var("MONGO_CONNECTION_URI")
        .map_err(|_| Error::from("MONGO_CONNECTION_URI must be configured"))?;
    let database = std::env::var("MONGO_DATABASE")
        .map_err(|_| Error::from("MONGO_DATABASE must be configured"))?;
    let outcomes_collection = std::env::var("OUTCOMES_COLLECTION")
        .unwrap_or_else(|_| IMPORT_OUTCOMES_COLLECTION.to_string());

    // Same client tuning the directory backend is provisioned for: small
    // pool, fast failure on unreachable clusters, retryable writes.
    let mut options = ClientOptions::parse(&connection_uri)
        .await
        .map_err(|error| Error::from(format!("invalid MongoDB connection options: {error}")))?;
    options.max_pool_size = Some(5);
    options.connect_timeout = Some(Duration::from_secs(3));
    options.server_selection_timeout = Some(Duration::from_secs(5));
    options.retry_writes = Some(true);
    let client = Client::with_options(options)
        .map_err(|error| Error::from(format!("failed to initialize MongoDB client: {error}")))?;

    let now = Utc::now();
    let config = WorkerHandlerConfig {
        event_time: now.to_rfc3339(),
        created_on_millis: now.timestamp_millis(),
    };
    let store = MongoDirectoryStore {
        client,
        database,
        outcomes_collection,
    };

    handle_worker_payload(&payload, &config, &store).map_err(|error| Error::from(error.message))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
