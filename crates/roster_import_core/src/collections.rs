pub const ERP_STUDENT_PROFILE_COLLECTION: &str = "erp_student_profile";
pub const AUTH_USERS_COLLECTION: &str = "auth_users";
pub const AUTH_ROLES_COLLECTION: &str = "auth_roles";
pub const IMPORT_OUTCOMES_COLLECTION: &str = "erp_import_outcomes";

/// Fully qualified `database.collection` name, used in log events.
pub fn namespace(database: &str, collection: &str) -> String {
    format!("{}.{collection}", database.trim_matches('.'))
}
