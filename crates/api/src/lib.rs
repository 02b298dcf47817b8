//! Broker HTTP client utilities.
//!
//! This crate provides a lightweight client for talking to an Open
//! Service Broker v2 endpoint. It focuses on:
//!
//! - Constructing an HTTP client with sensible defaults
//! - Validating the configured broker base URL for safety
//! - Building requests with consistent User-Agent, Accept and
//!   `X-Broker-Api-Version` headers and basic-auth credentials
//! - Collapsing completed exchanges into the [`BrokerResponse`] value the
//!   validation layer consumes
//!
//! The primary entry point is [`BrokerClient`]. Create an instance via
//! [`BrokerClient::new`], then either issue raw exchanges with
//! [`BrokerClient::execute`] or use the per-operation helpers
//! ([`BrokerClient::catalog`], [`BrokerClient::provision`], …) which run
//! the matching response dispatcher for you.
//!
//! # Example
//!
//! ```ignore
//! use osb_api::{BrokerClient, BrokerCredentials};
//! use anyhow::Result;
//!
//! async fn fetch() -> Result<()> {
//!     let credentials = BrokerCredentials::new("admin", "secret");
//!     let client = BrokerClient::new("https://broker.example.com", credentials)?;
//!     let catalog = client.catalog().await?;
//!     println!("services: {:?}", catalog.get("services"));
//!     Ok(())
//! }
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use osb_protocol::{ResponseParser, ValidationOutcome};
use osb_types::{BrokerMethod, BrokerResponse};
use reqwest::{Client, RequestBuilder, Url, header};
use serde_json::Value;
use tracing::debug;

/// OSB API version advertised on every request.
const BROKER_API_VERSION: &str = "2.13";

/// Hostnames allowed to skip the HTTPS requirement for local development.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// Basic-auth credentials for a broker endpoint.
#[derive(Clone, Debug)]
pub struct BrokerCredentials {
    pub username: String,
    pub password: String,
}

impl BrokerCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Thin wrapper around a configured `reqwest::Client` for broker access.
///
/// The client pre-configures default headers, validates the base URL once
/// at construction, and pairs every exchange with the response parser for
/// the invoked operation.
#[derive(Clone, Debug)]
pub struct BrokerClient {
    base_url: String,
    credentials: BrokerCredentials,
    http: Client,
    parser: ResponseParser,
    user_agent: String,
}

impl BrokerClient {
    /// Construct a [`BrokerClient`] for a validated base URL.
    ///
    /// Non-localhost hosts must use HTTPS; broker credentials travel as
    /// basic auth on every request.
    pub fn new(base_url: impl Into<String>, credentials: BrokerCredentials) -> Result<Self> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        default_headers.insert(
            "X-Broker-Api-Version",
            header::HeaderValue::from_static(BROKER_API_VERSION),
        );

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(60))
            .build()
            .context("build http client")?;

        Ok(Self {
            parser: ResponseParser::new(base_url.clone()),
            base_url,
            credentials,
            http,
            user_agent: format!("osb-client/0.1; {}", env::consts::OS),
        })
    }

    /// Build a `reqwest::RequestBuilder` for a method and broker-relative
    /// path, with auth and the configured User-Agent applied.
    pub fn request(&self, method: BrokerMethod, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, method = %method, "building broker request");

        self.http
            .request(to_reqwest_method(method), url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(header::USER_AGENT, &self.user_agent)
    }

    /// Execute an exchange and collapse it into the completed-response
    /// value the validation layer consumes.
    ///
    /// Transport failures (connection, TLS, timeout before any status
    /// line) surface here; everything that produced a status code is
    /// returned as a [`BrokerResponse`] and left to the dispatchers.
    pub async fn execute(&self, method: BrokerMethod, path: &str, body: Option<&Value>) -> Result<BrokerResponse> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("broker request failed: {method} {path}"))?;
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        debug!(method = %method, path, status, body_len = text.len(), "broker request completed");

        Ok(BrokerResponse::new(status, text))
    }

    /// GET the broker catalog and classify the response.
    pub async fn catalog(&self) -> Result<ValidationOutcome> {
        let path = "/v2/catalog";
        let response = self.execute(BrokerMethod::Get, path, None).await?;
        Ok(self.parser.parse_catalog(path, &response)?)
    }

    /// PUT a provision request for a service instance.
    pub async fn provision(&self, path: &str, body: &Value) -> Result<ValidationOutcome> {
        let response = self.execute(BrokerMethod::Put, path, Some(body)).await?;
        Ok(self.parser.parse_provision_or_bind(path, &response)?)
    }

    /// PUT a bind request for a service-binding sub-resource.
    pub async fn bind(&self, path: &str, body: &Value) -> Result<ValidationOutcome> {
        let response = self.execute(BrokerMethod::Put, path, Some(body)).await?;
        Ok(self.parser.parse_provision_or_bind(path, &response)?)
    }

    /// DELETE a service instance or binding.
    pub async fn deprovision(&self, path: &str) -> Result<ValidationOutcome> {
        let response = self.execute(BrokerMethod::Delete, path, None).await?;
        Ok(self.parser.parse_deprovision_or_unbind(path, &response)?)
    }

    /// PATCH a service instance with an update request.
    pub async fn update(&self, path: &str, body: &Value) -> Result<ValidationOutcome> {
        let response = self.execute(BrokerMethod::Patch, path, Some(body)).await?;
        Ok(self.parser.parse_update(path, &response)?)
    }

    /// GET the last-operation state for a service instance.
    pub async fn fetch_state(&self, path: &str) -> Result<ValidationOutcome> {
        let response = self.execute(BrokerMethod::Get, path, None).await?;
        Ok(self.parser.parse_fetch_state(path, &response)?)
    }
}

fn to_reqwest_method(method: BrokerMethod) -> reqwest::Method {
    match method {
        BrokerMethod::Get => reqwest::Method::GET,
        BrokerMethod::Put => reqwest::Method::PUT,
        BrokerMethod::Patch => reqwest::Method::PATCH,
        BrokerMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Validate that a broker base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: scheme must be HTTPS
fn validate_base_url(base: &str) -> Result<()> {
    let parsed_base_url = Url::parse(base).map_err(|e| anyhow!("invalid broker base URL '{}': {}", base, e))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| anyhow!("broker base URL must include a host"))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(anyhow!(
            "broker base URL must use https for non-localhost hosts; got '{}://'",
            parsed_base_url.scheme()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_base_url_accepts_https_hosts() {
        assert!(validate_base_url("https://broker.example.com").is_ok());
        assert!(validate_base_url("https://broker.example.com/prefix").is_ok());
    }

    #[test]
    fn validate_base_url_allows_any_scheme_for_localhost() {
        assert!(validate_base_url("http://localhost:8080").is_ok());
        assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
    }

    #[test]
    fn validate_base_url_rejects_plain_http_elsewhere() {
        assert!(validate_base_url("http://broker.example.com").is_err());
    }

    #[test]
    fn validate_base_url_rejects_garbage() {
        assert!(validate_base_url("not a url").is_err());
        assert!(validate_base_url("data:text/plain,hi").is_err());
    }

    #[test]
    fn client_construction_validates_base_url() {
        let credentials = BrokerCredentials::new("admin", "secret");
        assert!(BrokerClient::new("https://broker.example.com", credentials.clone()).is_ok());
        assert!(BrokerClient::new("http://broker.example.com", credentials).is_err());
    }

    #[test]
    fn method_conversion_covers_all_verbs() {
        assert_eq!(to_reqwest_method(BrokerMethod::Get), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(BrokerMethod::Put), reqwest::Method::PUT);
        assert_eq!(to_reqwest_method(BrokerMethod::Patch), reqwest::Method::PATCH);
        assert_eq!(to_reqwest_method(BrokerMethod::Delete), reqwest::Method::DELETE);
    }
}
