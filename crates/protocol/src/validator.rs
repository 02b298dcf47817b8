//! Composable response classifiers.
//!
//! Each operation dispatcher assembles a small tree of [`Validator`]
//! variants for the status code it observed; the tree then classifies the
//! response into exactly one of a [`ValidationOutcome`] or a
//! [`BrokerError`]. Validators are stateless and hold only
//! constructor-bound configuration, so trees are cheap to build per call
//! and safe to share across threads.

use once_cell::sync::Lazy;
use osb_types::BrokerError;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::json::{parse_object_or_default, parse_response_json, truncate_body_preview};
use crate::response::RawResponse;

/// Binding sub-resources live under an instance path; some table rows
/// treat them more strictly than the instance itself.
static SERVICE_BINDINGS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/v2/service_instances/[[:alnum:]-]+/service_bindings")
        .expect("service bindings pattern should compile")
});

/// Normalized success payload: the broker's parsed body, possibly
/// augmented with a `last_operation` object.
pub type ValidationOutcome = Map<String, Value>;

/// Error kind a failing validator is bound to raise.
///
/// The kind is resolved against the response context at raise time, so
/// message extraction (body `description`/`message` fields) happens in the
/// error constructors rather than in the dispatch tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    BadResponse,
    RequestRejected,
    Conflict,
    AsyncRequired,
}

impl ErrorKind {
    fn raise(self, response: &RawResponse) -> BrokerError {
        match self {
            Self::BadResponse => {
                BrokerError::bad_response(&response.uri, response.method, response.status, &response.body)
            }
            Self::RequestRejected => {
                BrokerError::request_rejected(&response.uri, response.method, response.status, &response.body)
            }
            Self::Conflict => BrokerError::conflict(&response.uri, response.method, response.status, &response.body),
            Self::AsyncRequired => {
                BrokerError::async_required(&response.uri, response.method, response.status, &response.body)
            }
        }
    }

    fn raise_ignoring_description(self, response: &RawResponse) -> BrokerError {
        match self {
            Self::BadResponse => BrokerError::bad_response_ignoring_description(
                &response.uri,
                response.method,
                response.status,
                &response.body,
            ),
            other => other.raise(response),
        }
    }
}

/// One node of a classification tree.
#[derive(Clone, Debug)]
pub enum Validator {
    /// Terminal success. Tolerantly parses the body to an object, derives
    /// the operation state (bound state first, else the body's own `state`
    /// field), and merges a normalized `last_operation` block. With no
    /// state at all the body is returned unchanged (catalog fetch).
    Success { state: Option<&'static str> },
    /// Terminal success returning `{}` without touching the body.
    /// Used where the status code alone carries the meaning (204, 410).
    SuccessEmpty,
    /// Terminal failure with the bound kind.
    Fail(ErrorKind),
    /// Terminal failure that must not use the body's `description` field
    /// as its message (the status itself is the failure signal and any
    /// description in the body is incidental).
    FailIgnoringDescription(ErrorKind),
    /// Requires the body to parse as a JSON object before delegating.
    /// Parse failure is logged as a warning; a missing or non-object
    /// parse result raises `ResponseMalformed` quoting the literal body.
    JsonObject(Box<Validator>),
    /// Requires the body's `state` field to belong to an allowed set
    /// before delegating. A missing or unparsable body yields no state,
    /// which is never a member of any set.
    State {
        allowed: &'static [&'static str],
        inner: Box<Validator>,
    },
    /// Branches on whether the request URI addresses a service-binding
    /// sub-resource.
    IfBindingPath {
        on_match: Box<Validator>,
        otherwise: Box<Validator>,
    },
    /// Raises the bound error when a body field's value belongs to a set;
    /// otherwise (including on an unparsable body) delegates to the
    /// fallback.
    FailWhenField {
        key: &'static str,
        values: &'static [&'static str],
        error: ErrorKind,
        fallback: Box<Validator>,
    },
}

impl Validator {
    pub fn success(state: &'static str) -> Self {
        Self::Success { state: Some(state) }
    }

    /// Success without a bound state: the body's own `state` field (if
    /// any) drives the `last_operation` merge.
    pub fn passthrough() -> Self {
        Self::Success { state: None }
    }

    pub fn json_object(inner: Validator) -> Self {
        Self::JsonObject(Box::new(inner))
    }

    pub fn state(allowed: &'static [&'static str], inner: Validator) -> Self {
        Self::State {
            allowed,
            inner: Box::new(inner),
        }
    }

    pub fn if_binding_path(on_match: Validator, otherwise: Validator) -> Self {
        Self::IfBindingPath {
            on_match: Box::new(on_match),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn fail_when_field(
        key: &'static str,
        values: &'static [&'static str],
        error: ErrorKind,
        fallback: Validator,
    ) -> Self {
        Self::FailWhenField {
            key,
            values,
            error,
            fallback: Box::new(fallback),
        }
    }

    /// Classify a response: exactly one of an outcome or a typed error.
    pub fn validate(&self, response: &RawResponse) -> Result<ValidationOutcome, BrokerError> {
        match self {
            Self::Success { state } => {
                let body = parse_object_or_default(&response.body);
                Ok(merge_last_operation(body, *state))
            }
            Self::SuccessEmpty => Ok(Map::new()),
            Self::Fail(kind) => Err(kind.raise(response)),
            Self::FailIgnoringDescription(kind) => Err(kind.raise_ignoring_description(response)),
            Self::JsonObject(inner) => {
                let parsed = parse_response_json(&response.body);
                if parsed.is_none() {
                    warn!(
                        status = response.status,
                        body = %truncate_body_preview(&response.body, 200),
                        "broker response body is not valid JSON"
                    );
                }
                match parsed {
                    Some(Value::Object(_)) => inner.validate(response),
                    _ => Err(BrokerError::response_malformed(
                        &response.uri,
                        response.method,
                        response.status,
                        &response.body,
                        format!(
                            "expected valid JSON object in body, broker returned '{}'",
                            response.body
                        ),
                    )),
                }
            }
            Self::State { allowed, inner } => {
                let observed = parse_response_json(&response.body)
                    .and_then(|parsed| parsed.get("state").and_then(Value::as_str).map(str::to_string));
                match observed {
                    Some(ref state) if allowed.contains(&state.as_str()) => inner.validate(response),
                    observed => Err(BrokerError::response_malformed(
                        &response.uri,
                        response.method,
                        response.status,
                        &response.body,
                        format!(
                            "expected state was 'succeeded', broker returned '{}'",
                            observed.as_deref().unwrap_or_default()
                        ),
                    )),
                }
            }
            Self::IfBindingPath { on_match, otherwise } => {
                if SERVICE_BINDINGS_PATTERN.is_match(&response.uri) {
                    on_match.validate(response)
                } else {
                    otherwise.validate(response)
                }
            }
            Self::FailWhenField {
                key,
                values,
                error,
                fallback,
            } => match parse_response_json(&response.body) {
                Some(parsed) => {
                    let matched = parsed
                        .get(*key)
                        .and_then(Value::as_str)
                        .is_some_and(|value| values.contains(&value));
                    if matched {
                        Err(error.raise(response))
                    } else {
                        fallback.validate(response)
                    }
                }
                None => fallback.validate(response),
            },
        }
    }
}

/// Derive the effective operation state and merge the normalized
/// `last_operation` block into the body.
///
/// Any top-level `state` key is stripped; it either becomes the effective
/// state (when no state is bound) or is discarded in favor of the bound
/// one. A top-level `description` moves under `last_operation`. With no
/// effective state the body passes through untouched.
fn merge_last_operation(mut body: ValidationOutcome, bound_state: Option<&str>) -> ValidationOutcome {
    let body_state = body.remove("state").filter(|value| !value.is_null());
    let state = match bound_state {
        Some(state) => Some(Value::String(state.to_string())),
        None => body_state,
    };
    let Some(state) = state else {
        return body;
    };

    let mut last_operation = Map::new();
    last_operation.insert("state".to_string(), state);
    if let Some(description) = body.remove("description") {
        last_operation.insert("description".to_string(), description);
    }
    body.insert("last_operation".to_string(), Value::Object(last_operation));
    body
}
