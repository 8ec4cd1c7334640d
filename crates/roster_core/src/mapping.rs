use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::{self, Coercion};

/// One roster row as exported from Excel, keyed by column header.
pub type RosterRow = BTreeMap<String, Value>;

// Anchored at the start only: Excel date cells frequently carry a trailing
// time component ("15-07-2024 00:00").
static DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})[-/](\d{2})[-/](\d{4})").expect("date pattern should compile")
});

/// A roster row translated to collection field names with coerced values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRow {
    fields: BTreeMap<&'static str, Value>,
}

/// The `$set` payload for one student profile, keyed by application number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileUpdate {
    pub application_number: String,
    pub set_fields: BTreeMap<String, Value>,
}

impl MappedRow {
    pub fn get(&self, db_field: &str) -> Option<&Value> {
        self.fields.get(db_field)
    }

    pub fn application_number(&self) -> Option<&str> {
        non_empty_text(self.fields.get(fields::APPLICATION_NUMBER_FIELD)?)
    }

    pub fn college_email(&self) -> Option<&str> {
        non_empty_text(self.fields.get(fields::COLLEGE_EMAIL_FIELD)?)
    }

    /// Active flag for derived credentials. Defaults to true when the
    /// Status column was absent from the row.
    pub fn is_active(&self) -> bool {
        self.fields
            .get(fields::IS_ACTIVE_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Everything except the application-number key itself. Returns None
    /// when the row carried no application number or nothing to update.
    pub fn profile_update(&self) -> Option<ProfileUpdate> {
        let application_number = self.application_number()?.to_string();
        let set_fields: BTreeMap<String, Value> = self
            .fields
            .iter()
            .filter(|(&db_field, _)| db_field != fields::APPLICATION_NUMBER_FIELD)
            .map(|(db_field, value)| ((*db_field).to_string(), value.clone()))
            .collect();
        if set_fields.is_empty() {
            return None;
        }
        Some(ProfileUpdate {
            application_number,
            set_fields,
        })
    }
}

fn non_empty_text(value: &Value) -> Option<&str> {
    value.as_str().filter(|text| !text.is_empty())
}

/// Convert a row from Excel headers to collection field names. Unmapped
/// headers are ignored; mapped values are coerced per field suffix.
pub fn map_roster_row(row: &RosterRow) -> MappedRow {
    let mut mapped = BTreeMap::new();
    for (header, value) in row {
        let Some(db_field) = fields::db_field_for_header(header) else {
            continue;
        };
        let coerced = match fields::coercion_for(db_field) {
            Coercion::ActiveFlag => Value::Bool(active_flag(value)),
            Coercion::UppercaseText => Value::String(uppercase_text(value)),
            Coercion::DateMillis => date_millis(value),
            Coercion::Integer => integer_value(value),
            Coercion::Passthrough => value.clone(),
        };
        mapped.insert(db_field, coerced);
    }
    MappedRow { fields: mapped }
}

fn active_flag(value: &Value) -> bool {
    match value.as_str() {
        Some(text) => text.trim().eq_ignore_ascii_case("active"),
        None => false,
    }
}

fn uppercase_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.to_uppercase(),
        Value::Null => String::new(),
        other => other.to_string().to_uppercase(),
    }
}

fn date_millis(value: &Value) -> Value {
    value
        .as_str()
        .and_then(parse_date_prefix_millis)
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn parse_date_prefix_millis(text: &str) -> Option<i64> {
    let captures = DATE_PREFIX.captures(text.trim())?;
    let day: u32 = captures[1].parse().ok()?;
    let month: u32 = captures[2].parse().ok()?;
    let year: i32 = captures[3].parse().ok()?;
    let midnight = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    Some(midnight.and_utc().timestamp_millis())
}

fn integer_value(value: &Value) -> Value {
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Value::from(integer)
            } else if let Some(float) = number.as_f64() {
                Value::from(float as i64)
            } else {
                Value::Null
            }
        }
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        Value::Bool(flag) => Value::from(i64::from(*flag)),
        _ => Value::Null,
    }
}
