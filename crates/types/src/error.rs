//! Error taxonomy for broker responses.
//!
//! Every failure the validation layer can raise is one variant of
//! [`BrokerError`]. Each broker-originated variant carries the request
//! URI, method, status code, and the raw body so callers can log a
//! complete diagnostic without re-fetching anything. Constructors own the
//! message-extraction rules (body `message`/`description` fields, generic
//! fallbacks) so dispatch tables stay declarative.

use serde_json::Value;
use thiserror::Error;

use crate::BrokerMethod;

/// Diagnostic payload attached to errors whose body may carry a
/// human-readable message.
///
/// When the body parses as JSON the parsed value is kept; otherwise the
/// raw text is preserved verbatim.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponsePayload {
    Json(Value),
    Text(String),
}

/// Classified failure for a broker operation.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker returned a status/body combination with no defined
    /// semantic for the attempted operation.
    #[error("{message}")]
    BadResponse {
        uri: String,
        method: BrokerMethod,
        status: u16,
        body: String,
        message: String,
    },

    /// The body was expected to be a JSON object (or to carry a recognized
    /// `state`) and was not.
    #[error("the service broker response was malformed for {method} {uri}: {description}")]
    ResponseMalformed {
        uri: String,
        method: BrokerMethod,
        status: u16,
        body: String,
        description: String,
    },

    /// An otherwise-unclassified 4xx rejection.
    #[error("{message}")]
    RequestRejected {
        uri: String,
        method: BrokerMethod,
        status: u16,
        body: String,
        message: String,
    },

    /// Status 401.
    #[error("authentication with the service broker failed for {method} {uri}")]
    AuthenticationFailed {
        uri: String,
        method: BrokerMethod,
        status: u16,
        body: String,
    },

    /// Status 408.
    #[error("the service broker request timed out for {method} {uri}")]
    Timeout {
        uri: String,
        method: BrokerMethod,
        status: u16,
        body: String,
    },

    /// Status 409. The message is extracted from the body when possible.
    #[error("{message}")]
    Conflict {
        uri: String,
        method: BrokerMethod,
        status: u16,
        message: String,
        payload: ResponsePayload,
    },

    /// Status 422 with body `error == "AsyncRequired"`: the caller must
    /// retry the operation with asynchronous semantics requested.
    #[error("the service broker requires client support for asynchronous service operations")]
    AsyncRequired {
        uri: String,
        method: BrokerMethod,
        status: u16,
        body: String,
    },

    /// Base URL plus relative path did not form a valid URI. This is a
    /// caller-configuration problem, not broker behavior.
    #[error("invalid broker request URI '{url}': {source}")]
    InvalidRequestUri {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl BrokerError {
    /// Build a [`BrokerError::BadResponse`], preferring the body's
    /// `description` field for the message when one is present.
    pub fn bad_response(uri: impl Into<String>, method: BrokerMethod, status: u16, body: &str) -> Self {
        let uri = uri.into();
        let message = match description_from_body(body) {
            Some(description) => format!("service broker error: {description}"),
            None => format!("the service broker returned an invalid response for the request to {uri}"),
        };
        Self::BadResponse {
            uri,
            method,
            status,
            body: body.to_string(),
            message,
        }
    }

    /// Build a [`BrokerError::BadResponse`] whose message never uses the
    /// body's `description` field. Used where the status code itself is the
    /// failure signal and any description in the body is incidental.
    pub fn bad_response_ignoring_description(
        uri: impl Into<String>,
        method: BrokerMethod,
        status: u16,
        body: &str,
    ) -> Self {
        let uri = uri.into();
        let message = format!("the service broker returned an invalid response for the request to {uri}");
        Self::BadResponse {
            uri,
            method,
            status,
            body: body.to_string(),
            message,
        }
    }

    pub fn response_malformed(
        uri: impl Into<String>,
        method: BrokerMethod,
        status: u16,
        body: &str,
        description: impl Into<String>,
    ) -> Self {
        Self::ResponseMalformed {
            uri: uri.into(),
            method,
            status,
            body: body.to_string(),
            description: description.into(),
        }
    }

    /// Build a [`BrokerError::RequestRejected`], preferring the body's
    /// `description` field for the message when one is present.
    pub fn request_rejected(uri: impl Into<String>, method: BrokerMethod, status: u16, body: &str) -> Self {
        let uri = uri.into();
        let message = match description_from_body(body) {
            Some(description) => format!("service broker error: {description}"),
            None => format!("the service broker rejected the request to {uri}"),
        };
        Self::RequestRejected {
            uri,
            method,
            status,
            body: body.to_string(),
            message,
        }
    }

    pub fn authentication_failed(uri: impl Into<String>, method: BrokerMethod, status: u16, body: &str) -> Self {
        Self::AuthenticationFailed {
            uri: uri.into(),
            method,
            status,
            body: body.to_string(),
        }
    }

    pub fn timeout(uri: impl Into<String>, method: BrokerMethod, status: u16, body: &str) -> Self {
        Self::Timeout {
            uri: uri.into(),
            method,
            status,
            body: body.to_string(),
        }
    }

    /// Build a [`BrokerError::Conflict`].
    ///
    /// Message extraction: a JSON body's `message` field wins, then its
    /// `description` field, then a generic `Resource conflict` fallback.
    /// An unparsable body also gets the generic fallback, and the raw text
    /// is preserved as the diagnostic payload in place of a parsed value.
    pub fn conflict(uri: impl Into<String>, method: BrokerMethod, status: u16, body: &str) -> Self {
        let uri = uri.into();
        let (message, payload) = match serde_json::from_str::<Value>(body) {
            Ok(parsed) => {
                let extracted = parsed
                    .get("message")
                    .and_then(Value::as_str)
                    .or_else(|| parsed.get("description").and_then(Value::as_str))
                    .map(str::to_string);
                let message = extracted.unwrap_or_else(|| format!("resource conflict: {uri}"));
                (message, ResponsePayload::Json(parsed))
            }
            Err(_) => (
                format!("resource conflict: {uri}"),
                ResponsePayload::Text(body.to_string()),
            ),
        };
        Self::Conflict {
            uri,
            method,
            status,
            message,
            payload,
        }
    }

    pub fn async_required(uri: impl Into<String>, method: BrokerMethod, status: u16, body: &str) -> Self {
        Self::AsyncRequired {
            uri: uri.into(),
            method,
            status,
            body: body.to_string(),
        }
    }

    /// HTTP status that produced this error, when one exists.
    /// `InvalidRequestUri` predates any exchange and has none.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadResponse { status, .. }
            | Self::ResponseMalformed { status, .. }
            | Self::RequestRejected { status, .. }
            | Self::AuthenticationFailed { status, .. }
            | Self::Timeout { status, .. }
            | Self::Conflict { status, .. }
            | Self::AsyncRequired { status, .. } => Some(*status),
            Self::InvalidRequestUri { .. } => None,
        }
    }

    /// Request URI the error refers to, when one was formed.
    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::BadResponse { uri, .. }
            | Self::ResponseMalformed { uri, .. }
            | Self::RequestRejected { uri, .. }
            | Self::AuthenticationFailed { uri, .. }
            | Self::Timeout { uri, .. }
            | Self::Conflict { uri, .. }
            | Self::AsyncRequired { uri, .. } => Some(uri),
            Self::InvalidRequestUri { .. } => None,
        }
    }
}

/// Extract a string `description` field from a JSON-object body, if any.
fn description_from_body(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<Value>(body).ok()?;
    parsed.get("description").and_then(Value::as_str).map(str::to_string)
}
