//! Mapping of Blob service error responses.

use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::error::{StoreError, StoreErrorKind, kind_for_status};

/// Header carrying the service error code.
pub const ERROR_CODE_HEADER: &str = "x-ms-error-code";

/// `<Error>` body of a failed Blob service response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "Error")]
struct StorageErrorBody {
    #[serde(rename = "Code", default)]
    code: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

impl StorageErrorBody {
    /// Parses an error body; empty or non-XML bodies yield no fields.
    fn parse(body: &str) -> Self {
        quick_xml::de::from_str(body).unwrap_or_default()
    }
}

/// Builds a [`StoreError`] from a failed response.
pub fn from_response(status: u16, headers: &HeaderMap, body: &str) -> StoreError {
    let body = StorageErrorBody::parse(body);
    let code = headers
        .get(ERROR_CODE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or(body.code.map(|code| code.trim().to_owned()));

    let kind = match (status, code.as_deref()) {
        (400, Some("InvalidResourceName" | "InvalidUri")) => StoreErrorKind::InvalidName,
        (status, _) => kind_for_status(status),
    };

    let message = body
        .message
        .as_deref()
        .and_then(|message| message.trim().lines().next())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("store responded with status {status}"));

    let error = StoreError::new(kind).with_message(message).with_status(status);
    match code {
        Some(code) => error.with_code(code),
        None => error,
    }
}
