//! Repository layer: entity-scoped database operations.
//!
//! Timestamps are stored as UTC `%Y-%m-%d %H:%M:%S` text so that range
//! filters compare lexically.

mod alert;
mod audit;
mod checklist;
mod reminder;
mod session;
mod subscription;
mod user;

use chrono::{DateTime, NaiveDateTime, Utc};

use super::DatabaseError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub use alert::*;
pub use audit::*;
pub use checklist::*;
pub use reminder::*;
pub use session::*;
pub use subscription::*;
pub use user::*;

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| DatabaseError::InvalidTimestamp {
            field: field.into(),
            value: value.into(),
        })
}

fn parse_optional_timestamp(
    field: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    value.map(|v| parse_timestamp(field, &v)).transpose()
}
