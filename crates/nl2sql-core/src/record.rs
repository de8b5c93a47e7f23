use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON keys of a connection record, in the order they are reported to clients.
pub const REQUIRED_FIELDS: [&str; 5] = ["DB_USER", "DB_PASSWORD", "DB_HOST", "DB_PORT", "DB_NAME"];

/// Database endpoint and credentials. Exactly one is stored at a time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    #[serde(rename = "DB_USER")]
    pub user: String,
    #[serde(rename = "DB_PASSWORD")]
    pub password: String,
    #[serde(rename = "DB_HOST")]
    pub host: String,
    /// Kept as text; clients send it either as a string or a number.
    #[serde(rename = "DB_PORT", deserialize_with = "port_from_string_or_number")]
    pub port: String,
    #[serde(rename = "DB_NAME")]
    pub database: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing required fields: {}", .missing.join(", "))]
    MissingFields { missing: Vec<&'static str> },
    #[error("invalid connection record: {0}")]
    Invalid(String),
}

impl ConnectionRecord {
    /// Build a record from an arbitrary JSON body, reporting every absent field.
    pub fn from_json(body: &Value) -> Result<Self, RecordError> {
        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| body.get(field).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(RecordError::MissingFields { missing });
        }

        // Only the five known keys survive; extra keys in the request are dropped.
        let subset: serde_json::Map<String, Value> = REQUIRED_FIELDS
            .iter()
            .filter_map(|field| body.get(field).map(|v| (field.to_string(), v.clone())))
            .collect();
        serde_json::from_value(Value::Object(subset))
            .map_err(|e| RecordError::Invalid(e.to_string()))
    }

    /// Port parsed as a TCP port number.
    pub fn port_number(&self) -> Result<u16, RecordError> {
        self.port
            .trim()
            .parse()
            .map_err(|_| RecordError::Invalid(format!("DB_PORT is not a valid port: {}", self.port)))
    }
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

fn port_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for DB_PORT, got {other}"
        ))),
    }
}
