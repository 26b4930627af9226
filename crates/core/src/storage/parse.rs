//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, Utc};
use rusqlite::{Error as SqlError, ErrorCode};
use uuid::Uuid;

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(|e| {
        SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse an optional UUID from a database string column
pub fn parse_uuid_opt(s: Option<String>) -> Result<Option<Uuid>, SqlError> {
    s.map(|s| parse_uuid(&s)).transpose()
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse an optional DateTime from an RFC3339 string
pub fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Parse a JSON string array column; NULL reads as empty
pub fn parse_links(s: Option<String>) -> Result<Vec<String>, SqlError> {
    match s {
        None => Ok(Vec::new()),
        Some(s) if s.is_empty() => Ok(Vec::new()),
        Some(s) => serde_json::from_str(&s).map_err(|e| {
            SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        }),
    }
}

/// Encode a string list for a JSON array column
pub fn encode_links(links: &[String]) -> String {
    serde_json::to_string(links).unwrap_or_else(|_| "[]".to_string())
}

/// Encode a string list, mapping an empty list to NULL
pub fn encode_links_opt(links: &[String]) -> Option<String> {
    if links.is_empty() {
        None
    } else {
        Some(encode_links(links))
    }
}

/// Convert an optional capacity column to u32
pub fn parse_capacity(value: Option<i64>) -> Option<u32> {
    value.map(|v| v.clamp(0, u32::MAX as i64) as u32)
}

/// True if the error is a UNIQUE or PRIMARY KEY violation
pub fn is_unique_violation(err: &SqlError) -> bool {
    match err {
        SqlError::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_roundtrip_and_null() {
        let links = vec!["https://wa.me/123".to_string()];
        assert_eq!(parse_links(Some(encode_links(&links))).unwrap(), links);
        assert!(parse_links(None).unwrap().is_empty());
        assert!(encode_links_opt(&[]).is_none());
    }

    #[test]
    fn test_bad_uuid_is_conversion_error() {
        assert!(matches!(
            parse_uuid("not-a-uuid"),
            Err(SqlError::FromSqlConversionFailure(..))
        ));
    }

    #[test]
    fn test_negative_capacity_clamps() {
        assert_eq!(parse_capacity(Some(-3)), Some(0));
        assert_eq!(parse_capacity(None), None);
    }
}
