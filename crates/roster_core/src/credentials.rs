//! Initial login credentials derived during roster import. The college
//! email doubles as the first-login password, stored bcrypt-hashed.

use serde::{Deserialize, Serialize};

/// Matches the cost the rest of the auth stack verifies against.
pub const INITIAL_PASSWORD_HASH_COST: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialError {
    message: String,
}

impl CredentialError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CredentialError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    pub user_email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_on_millis: i64,
    pub auth_role_ids: Vec<String>,
}

pub fn hash_initial_password(secret: &str) -> Result<String, CredentialError> {
    if secret.is_empty() {
        return Err(CredentialError::new(
            "input string for hashing cannot be empty",
        ));
    }
    bcrypt::hash(secret, INITIAL_PASSWORD_HASH_COST)
        .map_err(|error| CredentialError::new(format!("bcrypt hashing failed: {error}")))
}

/// Assemble the auth-users document content for one student. A missing
/// STUDENT role id yields an empty role list rather than an error.
pub fn build_credential_record(
    user_email: &str,
    is_active: bool,
    created_on_millis: i64,
    student_role_id: Option<&str>,
) -> Result<CredentialRecord, CredentialError> {
    let password_hash = hash_initial_password(user_email)?;
    Ok(CredentialRecord {
        user_email: user_email.to_string(),
        password_hash,
        is_active,
        created_on_millis,
        auth_role_ids: student_role_id
            .map(|role_id| vec![role_id.to_string()])
            .unwrap_or_default(),
    })
}
