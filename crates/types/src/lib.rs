//! Shared value types for the Open Service Broker client.
//!
//! This crate defines the small vocabulary every other crate speaks:
//! the HTTP method tokens used against a broker, the completed transport
//! response handed to the validation layer, and the error taxonomy raised
//! when a broker response cannot be classified as a success.

use std::fmt;

use serde::{Deserialize, Serialize};

mod error;

pub use error::{BrokerError, ResponsePayload};

/// HTTP method used for a broker operation.
///
/// The broker contract only ever uses these four verbs; keeping a closed
/// enum here (rather than a free-form string) lets errors carry the method
/// without pulling an HTTP client crate into the type layer.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum BrokerMethod {
    Get,
    Put,
    Patch,
    Delete,
}

impl BrokerMethod {
    /// The canonical uppercase token for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for BrokerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed transport-level response from the broker.
///
/// The validation layer never performs I/O; callers finish the HTTP
/// exchange themselves and hand over the status code and body text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrokerResponse {
    /// HTTP status code as reported by the transport.
    pub status: u16,
    /// Raw body text, exactly as received. May be empty or non-JSON;
    /// the validation layer decides what that means per operation.
    pub body: String,
}

impl BrokerResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_method_displays_uppercase_token() {
        assert_eq!(BrokerMethod::Get.to_string(), "GET");
        assert_eq!(BrokerMethod::Put.as_str(), "PUT");
        assert_eq!(BrokerMethod::Patch.as_str(), "PATCH");
        assert_eq!(BrokerMethod::Delete.as_str(), "DELETE");
    }

    #[test]
    fn broker_response_keeps_body_verbatim() {
        let response = BrokerResponse::new(200, "not json at all");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "not json at all");
    }
}
