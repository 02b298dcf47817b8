//! Operation dispatchers: status-code tables over validator trees.
//!
//! One entry point exists per broker operation kind. Each wraps the
//! transport response, selects the validator tree defined for the observed
//! status code, and runs it behind the common error classifier. Unmatched
//! status codes always fall to a terminal failure, so every code reachable
//! over HTTP resolves to exactly one outcome or one taxonomy error.

use osb_types::{BrokerError, BrokerMethod, BrokerResponse};
use tracing::warn;

use crate::response::RawResponse;
use crate::validator::{ErrorKind, ValidationOutcome, Validator};

const STATE_SUCCEEDED: &str = "succeeded";
const STATE_IN_PROGRESS: &str = "in progress";

/// States a last-operation poll may legally report.
const POLLABLE_STATES: &[&str] = &[STATE_SUCCEEDED, "failed", STATE_IN_PROGRESS];

/// Body `error` values on a 422 that signal the async-retry protocol.
const ASYNC_REQUIRED_VALUES: &[&str] = &["AsyncRequired"];

/// Classifies completed broker responses for every operation kind.
///
/// The parser is stateless apart from the configured broker base URL and
/// is safe to share across threads; each call builds its validator tree
/// fresh.
#[derive(Clone, Debug)]
pub struct ResponseParser {
    base_url: String,
}

impl ResponseParser {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Classify the response to a PUT provision or bind request.
    ///
    /// A 202 is a legitimate in-progress signal for an instance, but a
    /// hard error on a binding sub-resource: bindings cannot be
    /// asynchronous here.
    pub fn parse_provision_or_bind(
        &self,
        path: &str,
        response: &BrokerResponse,
    ) -> Result<ValidationOutcome, BrokerError> {
        let raw = RawResponse::wrap(BrokerMethod::Put, &self.base_url, path, response)?;

        let validator = match raw.status {
            200 | 201 => Validator::json_object(Validator::success(STATE_SUCCEEDED)),
            202 => Validator::json_object(Validator::if_binding_path(
                Validator::Fail(ErrorKind::BadResponse),
                Validator::success(STATE_IN_PROGRESS),
            )),
            409 => Validator::Fail(ErrorKind::Conflict),
            422 => Validator::fail_when_field(
                "error",
                ASYNC_REQUIRED_VALUES,
                ErrorKind::AsyncRequired,
                Validator::Fail(ErrorKind::BadResponse),
            ),
            _ => Validator::Fail(ErrorKind::BadResponse),
        };

        run_with_common_errors(&validator, &raw)
    }

    /// Classify the response to a DELETE deprovision or unbind request.
    ///
    /// 410 means the resource is already gone and is treated as idempotent
    /// success regardless of body content.
    pub fn parse_deprovision_or_unbind(
        &self,
        path: &str,
        response: &BrokerResponse,
    ) -> Result<ValidationOutcome, BrokerError> {
        let raw = RawResponse::wrap(BrokerMethod::Delete, &self.base_url, path, response)?;

        let validator = match raw.status {
            200 => Validator::json_object(Validator::success(STATE_SUCCEEDED)),
            201 => Validator::FailIgnoringDescription(ErrorKind::BadResponse),
            202 => Validator::json_object(Validator::if_binding_path(
                Validator::Fail(ErrorKind::BadResponse),
                Validator::success(STATE_IN_PROGRESS),
            )),
            204 => Validator::SuccessEmpty,
            410 => {
                warn!(uri = %raw.uri, "already deleted");
                Validator::SuccessEmpty
            }
            422 => Validator::fail_when_field(
                "error",
                ASYNC_REQUIRED_VALUES,
                ErrorKind::AsyncRequired,
                Validator::Fail(ErrorKind::BadResponse),
            ),
            _ => Validator::Fail(ErrorKind::BadResponse),
        };

        run_with_common_errors(&validator, &raw)
    }

    /// Classify the response to a GET catalog request.
    ///
    /// The catalog has no operation-state concept; a 200 body passes
    /// through unaugmented.
    pub fn parse_catalog(&self, path: &str, response: &BrokerResponse) -> Result<ValidationOutcome, BrokerError> {
        let raw = RawResponse::wrap(BrokerMethod::Get, &self.base_url, path, response)?;

        let validator = match raw.status {
            200 => Validator::json_object(Validator::passthrough()),
            201 | 202 => Validator::json_object(Validator::Fail(ErrorKind::BadResponse)),
            _ => Validator::Fail(ErrorKind::BadResponse),
        };

        run_with_common_errors(&validator, &raw)
    }

    /// Classify the response to a PATCH instance-update request.
    ///
    /// The 422 fallback differs from provisioning: a non-AsyncRequired 422
    /// is a rejected request, not a bad response.
    pub fn parse_update(&self, path: &str, response: &BrokerResponse) -> Result<ValidationOutcome, BrokerError> {
        let raw = RawResponse::wrap(BrokerMethod::Patch, &self.base_url, path, response)?;

        let validator = match raw.status {
            200 => Validator::json_object(Validator::success(STATE_SUCCEEDED)),
            201 => Validator::FailIgnoringDescription(ErrorKind::BadResponse),
            202 => Validator::json_object(Validator::success(STATE_IN_PROGRESS)),
            422 => Validator::fail_when_field(
                "error",
                ASYNC_REQUIRED_VALUES,
                ErrorKind::AsyncRequired,
                Validator::Fail(ErrorKind::RequestRejected),
            ),
            _ => Validator::Fail(ErrorKind::BadResponse),
        };

        run_with_common_errors(&validator, &raw)
    }

    /// Classify the response to a GET last-operation poll.
    ///
    /// A 200 body must report one of the pollable states; 410 means the
    /// instance is gone and polling can stop.
    pub fn parse_fetch_state(&self, path: &str, response: &BrokerResponse) -> Result<ValidationOutcome, BrokerError> {
        let raw = RawResponse::wrap(BrokerMethod::Get, &self.base_url, path, response)?;

        let validator = match raw.status {
            200 => Validator::json_object(Validator::state(POLLABLE_STATES, Validator::passthrough())),
            201 | 202 => Validator::json_object(Validator::Fail(ErrorKind::BadResponse)),
            410 => Validator::SuccessEmpty,
            _ => Validator::Fail(ErrorKind::BadResponse),
        };

        run_with_common_errors(&validator, &raw)
    }
}

/// Cross-cutting status-code classification applied before any
/// operation-specific chain.
///
/// 409, 410 and 422 pass through untouched: their meaning is
/// operation-specific and the inner chain decides.
fn run_with_common_errors(validator: &Validator, response: &RawResponse) -> Result<ValidationOutcome, BrokerError> {
    match response.status {
        401 => Err(BrokerError::authentication_failed(
            &response.uri,
            response.method,
            response.status,
            &response.body,
        )),
        408 => Err(BrokerError::timeout(
            &response.uri,
            response.method,
            response.status,
            &response.body,
        )),
        409 | 410 | 422 => validator.validate(response),
        400..=499 => Err(BrokerError::request_rejected(
            &response.uri,
            response.method,
            response.status,
            &response.body,
        )),
        500..=599 => Err(BrokerError::bad_response(
            &response.uri,
            response.method,
            response.status,
            &response.body,
        )),
        _ => validator.validate(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE_URL: &str = "https://broker.example.com";
    const INSTANCE_PATH: &str = "/v2/service_instances/abc-123";
    const BINDING_PATH: &str = "/v2/service_instances/abc-123/service_bindings/def-456";

    fn parser() -> ResponseParser {
        ResponseParser::new(BASE_URL)
    }

    fn res(status: u16, body: &str) -> BrokerResponse {
        BrokerResponse::new(status, body)
    }

    // Provision / bind table.

    #[test]
    fn provision_200_and_201_succeed_with_state_succeeded() {
        for status in [200, 201] {
            let outcome = parser()
                .parse_provision_or_bind(INSTANCE_PATH, &res(status, r#"{"dashboard_url": "http://x"}"#))
                .unwrap();
            assert_eq!(outcome.get("dashboard_url"), Some(&json!("http://x")));
            assert_eq!(outcome.get("last_operation"), Some(&json!({"state": "succeeded"})));
        }
    }

    #[test]
    fn provision_202_on_instance_path_is_in_progress() {
        let outcome = parser()
            .parse_provision_or_bind(INSTANCE_PATH, &res(202, r#"{"foo": "bar"}"#))
            .unwrap();
        assert_eq!(outcome.get("foo"), Some(&json!("bar")));
        assert_eq!(outcome.get("last_operation"), Some(&json!({"state": "in progress"})));
    }

    #[test]
    fn provision_202_on_binding_path_is_bad_response() {
        let err = parser()
            .parse_provision_or_bind(BINDING_PATH, &res(202, "{}"))
            .unwrap_err();
        assert!(matches!(err, BrokerError::BadResponse { .. }));
    }

    #[test]
    fn provision_409_is_conflict_with_extracted_message() {
        let err = parser()
            .parse_provision_or_bind(INSTANCE_PATH, &res(409, r#"{"message": "already provisioned"}"#))
            .unwrap_err();
        assert!(matches!(err, BrokerError::Conflict { .. }));
        assert_eq!(err.to_string(), "already provisioned");
    }

    #[test]
    fn provision_422_distinguishes_async_required() {
        let err = parser()
            .parse_provision_or_bind(INSTANCE_PATH, &res(422, r#"{"error": "AsyncRequired"}"#))
            .unwrap_err();
        assert!(matches!(err, BrokerError::AsyncRequired { .. }));

        let err = parser()
            .parse_provision_or_bind(INSTANCE_PATH, &res(422, r#"{"error": "Other"}"#))
            .unwrap_err();
        assert!(matches!(err, BrokerError::BadResponse { .. }));
    }

    #[test]
    fn provision_200_with_non_object_body_is_malformed() {
        let err = parser()
            .parse_provision_or_bind(INSTANCE_PATH, &res(200, "not json"))
            .unwrap_err();
        assert!(matches!(err, BrokerError::ResponseMalformed { .. }));
    }

    // Deprovision / unbind table.

    #[test]
    fn deprovision_200_succeeds_with_state_succeeded() {
        let outcome = parser()
            .parse_deprovision_or_unbind(INSTANCE_PATH, &res(200, "{}"))
            .unwrap();
        assert_eq!(outcome.get("last_operation"), Some(&json!({"state": "succeeded"})));
    }

    #[test]
    fn deprovision_201_fails_without_using_body_description() {
        let err = parser()
            .parse_deprovision_or_unbind(INSTANCE_PATH, &res(201, r#"{"description": "should not appear"}"#))
            .unwrap_err();
        assert!(matches!(err, BrokerError::BadResponse { .. }));
        assert!(!err.to_string().contains("should not appear"));
    }

    #[test]
    fn deprovision_202_respects_binding_path_rule() {
        let outcome = parser()
            .parse_deprovision_or_unbind(INSTANCE_PATH, &res(202, "{}"))
            .unwrap();
        assert_eq!(outcome.get("last_operation"), Some(&json!({"state": "in progress"})));

        let err = parser()
            .parse_deprovision_or_unbind(BINDING_PATH, &res(202, "{}"))
            .unwrap_err();
        assert!(matches!(err, BrokerError::BadResponse { .. }));
    }

    #[test]
    fn deprovision_204_returns_empty_outcome() {
        let outcome = parser()
            .parse_deprovision_or_unbind(INSTANCE_PATH, &res(204, ""))
            .unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn deprovision_410_is_idempotent_success_for_any_body() {
        for body in ["", "{}", "not json at all", r#"{"description": "gone"}"#] {
            let outcome = parser()
                .parse_deprovision_or_unbind(INSTANCE_PATH, &res(410, body))
                .unwrap();
            assert!(outcome.is_empty(), "body {body:?} should yield an empty outcome");
        }
    }

    // Catalog table.

    #[test]
    fn catalog_200_passes_body_through_unaugmented() {
        let body = r#"{"services": [{"id": "svc-1"}]}"#;
        let outcome = parser().parse_catalog("/v2/catalog", &res(200, body)).unwrap();
        assert_eq!(outcome.get("services"), Some(&json!([{"id": "svc-1"}])));
        assert!(!outcome.contains_key("last_operation"));
    }

    #[test]
    fn catalog_200_with_non_object_body_is_malformed() {
        let err = parser().parse_catalog("/v2/catalog", &res(200, "[]")).unwrap_err();
        assert!(matches!(err, BrokerError::ResponseMalformed { .. }));
    }

    #[test]
    fn catalog_201_and_202_are_bad_responses() {
        for status in [201, 202] {
            let err = parser().parse_catalog("/v2/catalog", &res(status, "{}")).unwrap_err();
            assert!(matches!(err, BrokerError::BadResponse { .. }));
        }
    }

    // Update table.

    #[test]
    fn update_202_is_in_progress_even_on_binding_like_paths() {
        let outcome = parser().parse_update(INSTANCE_PATH, &res(202, "{}")).unwrap();
        assert_eq!(outcome.get("last_operation"), Some(&json!({"state": "in progress"})));
    }

    #[test]
    fn update_422_falls_back_to_request_rejected() {
        let err = parser()
            .parse_update(INSTANCE_PATH, &res(422, r#"{"error": "AsyncRequired"}"#))
            .unwrap_err();
        assert!(matches!(err, BrokerError::AsyncRequired { .. }));

        let err = parser()
            .parse_update(INSTANCE_PATH, &res(422, r#"{"error": "SomethingElse"}"#))
            .unwrap_err();
        assert!(matches!(err, BrokerError::RequestRejected { .. }));
    }

    #[test]
    fn update_201_fails_ignoring_description() {
        let err = parser()
            .parse_update(INSTANCE_PATH, &res(201, r#"{"description": "nope"}"#))
            .unwrap_err();
        assert!(matches!(err, BrokerError::BadResponse { .. }));
        assert!(!err.to_string().contains("nope"));
    }

    // Last-operation poll table.

    #[test]
    fn fetch_state_accepts_each_pollable_state() {
        for state in ["succeeded", "failed", "in progress"] {
            let body = format!(r#"{{"state": "{state}", "description": "working"}}"#);
            let outcome = parser()
                .parse_fetch_state(&format!("{INSTANCE_PATH}/last_operation"), &res(200, &body))
                .unwrap();
            assert_eq!(
                outcome.get("last_operation"),
                Some(&json!({"state": state, "description": "working"}))
            );
        }
    }

    #[test]
    fn fetch_state_rejects_unrecognized_state() {
        let err = parser()
            .parse_fetch_state(INSTANCE_PATH, &res(200, r#"{"state": "bogus"}"#))
            .unwrap_err();
        match err {
            BrokerError::ResponseMalformed { description, .. } => {
                assert!(description.contains("'bogus'"), "{description}");
            }
            other => panic!("expected ResponseMalformed, got {other:?}"),
        }
    }

    #[test]
    fn fetch_state_410_means_polling_can_stop() {
        let outcome = parser().parse_fetch_state(INSTANCE_PATH, &res(410, "gone")).unwrap();
        assert!(outcome.is_empty());
    }

    // Common error classifier.

    #[test]
    fn status_401_short_circuits_every_operation() {
        let p = parser();
        let body = r#"{"state": "succeeded"}"#;
        let results = [
            p.parse_provision_or_bind(INSTANCE_PATH, &res(401, body)),
            p.parse_deprovision_or_unbind(INSTANCE_PATH, &res(401, body)),
            p.parse_catalog("/v2/catalog", &res(401, body)),
            p.parse_update(INSTANCE_PATH, &res(401, body)),
            p.parse_fetch_state(INSTANCE_PATH, &res(401, body)),
        ];
        for result in results {
            assert!(matches!(result, Err(BrokerError::AuthenticationFailed { .. })));
        }
    }

    #[test]
    fn status_408_is_a_timeout() {
        let err = parser()
            .parse_provision_or_bind(INSTANCE_PATH, &res(408, ""))
            .unwrap_err();
        assert!(matches!(err, BrokerError::Timeout { .. }));
    }

    #[test]
    fn other_4xx_are_rejected_and_5xx_are_bad_responses() {
        let p = parser();
        for status in [400, 403, 404, 412, 499] {
            let err = p.parse_provision_or_bind(INSTANCE_PATH, &res(status, "")).unwrap_err();
            assert!(
                matches!(err, BrokerError::RequestRejected { .. }),
                "status {status} should be RequestRejected"
            );
        }
        for status in [500, 502, 503, 599] {
            let err = p.parse_provision_or_bind(INSTANCE_PATH, &res(status, "")).unwrap_err();
            assert!(
                matches!(err, BrokerError::BadResponse { .. }),
                "status {status} should be BadResponse"
            );
        }
    }

    #[test]
    fn every_status_code_resolves_to_exactly_one_outcome_or_taxonomy_error() {
        let p = parser();
        for status in 100..=599u16 {
            let results = [
                p.parse_provision_or_bind(INSTANCE_PATH, &res(status, "garbage body")),
                p.parse_deprovision_or_unbind(INSTANCE_PATH, &res(status, "garbage body")),
                p.parse_catalog("/v2/catalog", &res(status, "garbage body")),
                p.parse_update(INSTANCE_PATH, &res(status, "garbage body")),
                p.parse_fetch_state(INSTANCE_PATH, &res(status, "garbage body")),
            ];
            for result in results {
                if let Err(err) = result {
                    // Configuration errors are unreachable here; everything
                    // must carry broker context.
                    assert!(err.status().is_some(), "status {status}: {err:?}");
                }
            }
        }
    }

    #[test]
    fn invalid_base_url_surfaces_as_configuration_error() {
        let err = ResponseParser::new("not a base url")
            .parse_catalog("/v2/catalog", &res(200, "{}"))
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidRequestUri { .. }));
    }
}
