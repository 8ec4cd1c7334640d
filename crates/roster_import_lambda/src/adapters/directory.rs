use roster_core::credentials::CredentialRecord;
use roster_core::mapping::ProfileUpdate;
use roster_import_core::contract::BatchOutcomeRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileWriteReport {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialWriteReport {
    pub upserted_count: u64,
    pub modified_count: u64,
}

/// Storage seam for the student directory. Profile updates and credential
/// upserts are unordered bulk writes keyed by application number and user
/// email respectively.
pub trait DirectoryStore {
    fn student_role_id(&self) -> Result<Option<String>, String>;

    fn apply_profile_updates(&self, updates: &[ProfileUpdate])
        -> Result<ProfileWriteReport, String>;

    fn existing_application_numbers(
        &self,
        application_numbers: &[String],
    ) -> Result<Vec<String>, String>;

    fn upsert_credentials(
        &self,
        records: &[CredentialRecord],
    ) -> Result<CredentialWriteReport, String>;

    fn record_batch_outcome(&self, record: &BatchOutcomeRecord) -> Result<(), String>;
}
