//! Domain rules for roster ingestion: Excel-header field mapping, typed
//! coercions, and login credential derivation. No storage or runtime
//! concerns live here.

pub mod credentials;
pub mod fields;
pub mod mapping;
