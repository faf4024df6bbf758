//! Outcome of a façade operation

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::ErrorKind;
use crate::uds::UdsError;

/// Result of every façade call; failures are values, never errors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticResult {
    pub success: bool,
    pub message: String,
    /// Response bytes, serialized as lowercase hex
    #[serde(
        serialize_with = "serialize_hex",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Vec<u8>>,
    /// Failure category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Option<Vec<u8>>) -> Self {
        self.data = data;
        self
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(kind),
            timestamp: Utc::now(),
        }
    }

    /// Failure carrying the error's category and `context: error` as message
    pub fn from_error(context: &str, err: &UdsError) -> Self {
        Self::failure(err.kind(), format!("{}: {}", context, err))
    }

    /// Response bytes as spaced hex, empty if none
    pub fn data_hex(&self) -> String {
        self.data
            .as_deref()
            .map(crate::codec::bytes_to_hex)
            .unwrap_or_default()
    }
}

fn serialize_hex<S>(data: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match data {
        Some(bytes) => serializer.serialize_str(&hex::encode(bytes)),
        None => serializer.serialize_none(),
    }
}
