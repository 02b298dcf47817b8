//! Response-validation layer for the Open Service Broker v2 contract.
//!
//! A broker operation can legitimately answer with dozens of different
//! (status code, body shape, state field) combinations, and the meaning of
//! each combination differs per operation kind: a 410 is an error for a
//! provision but idempotent success for a deprovision, a 202 is "still
//! working" for an instance but a hard error on a binding sub-resource.
//! This crate classifies every combination deterministically, returning
//! either a normalized result mapping or one precisely-typed
//! [`osb_types::BrokerError`] — and never panics on broker-supplied
//! garbage.
//!
//! The layer performs no I/O. Callers complete the HTTP exchange
//! themselves and hand the finished [`osb_types::BrokerResponse`] to one
//! of the [`ResponseParser`] entry points.
//!
//! # Example
//!
//! ```
//! use osb_protocol::ResponseParser;
//! use osb_types::BrokerResponse;
//!
//! let parser = ResponseParser::new("https://broker.example.com");
//! let response = BrokerResponse::new(202, r#"{"operation": "task_10"}"#);
//! let outcome = parser
//!     .parse_provision_or_bind("/v2/service_instances/abc-123", &response)
//!     .unwrap();
//! assert_eq!(outcome["last_operation"]["state"], "in progress");
//! ```

pub mod json;
pub mod parser;
pub mod response;
pub mod validator;

pub use parser::ResponseParser;
pub use response::RawResponse;
pub use validator::{ValidationOutcome, Validator};
