//! Collection field names and the Excel-header mapping for the student
//! profile and auth collections.

pub const APPLICATION_NUMBER_FIELD: &str = "applicationNumber_ErpStudentProfile_Text";
pub const ROLL_NUMBER_FIELD: &str = "studentRollNumber_ErpStudentProfile_Text";
pub const SEMESTER_FIELD: &str = "studentSemester_ErpStudentProfile_Int";
pub const SEMESTER_TYPE_FIELD: &str = "studentSemesterType_ErpStudentProfile_Text";
pub const CLASS_FIELD: &str = "studentClass_ErpStudentProfile_Text";
pub const COLLEGE_EMAIL_FIELD: &str = "studentCollegeEmail_ErpStudentProfile_Text";
pub const DATE_OF_ADMISSION_FIELD: &str = "studentDateOfAdmission_ErpStudentProfile_Date";
pub const IS_ACTIVE_FIELD: &str = "isActive_KJUSYSCommon_Bool";

pub const USER_EMAIL_FIELD: &str = "userEmail_AuthCommon_Text";
pub const USER_PASSWORD_FIELD: &str = "userPassword_AuthCommon_Text";
pub const CREATED_ON_FIELD: &str = "createdOn_KJUSYSCommon_DateTime";
pub const AUTH_ROLES_FIELD: &str = "authRoles_AuthCommon_ObjectIdArray";
pub const AUTH_ROLE_NAME_FIELD: &str = "authRoleName_AuthCommon_Text";

pub const STUDENT_ROLE_NAME: &str = "STUDENT";

/// Excel column header carrying the application number, used verbatim when
/// a row fails before mapping succeeds.
pub const APPLICATION_NUMBER_HEADER: &str = "Application Number";

pub fn db_field_for_header(header: &str) -> Option<&'static str> {
    match header {
        "Application Number" => Some(APPLICATION_NUMBER_FIELD),
        "RollNo" => Some(ROLL_NUMBER_FIELD),
        "Semester" => Some(SEMESTER_FIELD),
        "Semester Type" => Some(SEMESTER_TYPE_FIELD),
        "Class" => Some(CLASS_FIELD),
        "College Email Id" => Some(COLLEGE_EMAIL_FIELD),
        "Date Of Admission" => Some(DATE_OF_ADMISSION_FIELD),
        "Status" => Some(IS_ACTIVE_FIELD),
        _ => None,
    }
}

/// How a mapped field's raw cell value is coerced, keyed on the field-name
/// suffix convention used across the ERP collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    ActiveFlag,
    UppercaseText,
    DateMillis,
    Integer,
    Passthrough,
}

pub fn coercion_for(db_field: &str) -> Coercion {
    if db_field == IS_ACTIVE_FIELD {
        Coercion::ActiveFlag
    } else if db_field.ends_with("_Text") {
        Coercion::UppercaseText
    } else if db_field.ends_with("_Date") {
        Coercion::DateMillis
    } else if db_field.ends_with("_Int") {
        Coercion::Integer
    } else {
        Coercion::Passthrough
    }
}
