//! Normalization of a completed transport response.

use osb_types::{BrokerError, BrokerMethod, BrokerResponse};
use url::Url;

/// The shape every validator consumes: the completed transport response
/// joined with the request method and the absolute request URI.
///
/// Constructed once per dispatcher call and never mutated.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub method: BrokerMethod,
    /// Absolute request URI (broker base URL + relative path).
    pub uri: String,
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    /// Join `base_url` and `path` into the absolute request URI and carry
    /// the transport response alongside it.
    ///
    /// Fails only when the joined string is not a syntactically valid URI;
    /// that is a caller-configuration error
    /// ([`BrokerError::InvalidRequestUri`]), not broker behavior.
    pub fn wrap(
        method: BrokerMethod,
        base_url: &str,
        path: &str,
        response: &BrokerResponse,
    ) -> Result<Self, BrokerError> {
        let joined = format!("{base_url}{path}");
        let uri = Url::parse(&joined).map_err(|source| BrokerError::InvalidRequestUri {
            url: joined.clone(),
            source,
        })?;

        Ok(Self {
            method,
            uri: uri.to_string(),
            status: response.status,
            body: response.body.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_joins_base_url_and_path() {
        let response = BrokerResponse::new(200, "{}");
        let raw = RawResponse::wrap(
            BrokerMethod::Put,
            "https://broker.example.com",
            "/v2/service_instances/abc-123",
            &response,
        )
        .unwrap();

        assert_eq!(raw.uri, "https://broker.example.com/v2/service_instances/abc-123");
        assert_eq!(raw.method, BrokerMethod::Put);
        assert_eq!(raw.status, 200);
        assert_eq!(raw.body, "{}");
    }

    #[test]
    fn wrap_rejects_unparsable_uri_as_configuration_error() {
        let response = BrokerResponse::new(200, "{}");
        let err = RawResponse::wrap(BrokerMethod::Get, "not a url", "/v2/catalog", &response).unwrap_err();

        assert!(matches!(err, BrokerError::InvalidRequestUri { .. }));
        assert_eq!(err.status(), None);
    }
}
