//! Upstream flight-data provider.
//!
//! The proxy talks to the provider through the [`FlightProvider`] trait so the
//! HTTP implementation ([`AviationStackProvider`]) can be swapped for a fake in
//! tests. Providers report transport-level outcomes only; turning an empty
//! result or an embedded error object into a response is the proxy's job.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::flight::{FlightStatusQuery, DATE_FORMAT};

/// Transport-level failures talking to the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request exceeded its timeout budget.
    #[error("provider request timed out")]
    Timeout,

    /// DNS, connect or other transport failure.
    #[error("provider unreachable: {0}")]
    Network(String),

    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The provider's own error message, if the body carried one.
        message: Option<String>,
    },

    /// The response body was not the expected JSON.
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
}

impl ProviderError {
    fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Decoded provider response body.
///
/// Records stay raw JSON so the proxy can forward them untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProviderPayload {
    /// Matching flight records.
    pub data: Option<Vec<serde_json::Value>>,
    /// Embedded error, present instead of `data` on failure. Usually an
    /// object with `code` and `message`, but any JSON value is accepted.
    pub error: Option<serde_json::Value>,
}

impl ProviderPayload {
    /// The `message` of an embedded error object, if there is one.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref()?.get("message")?.as_str()
    }
}

/// Where the provider access key comes from.
///
/// The key is resolved on every request, never cached.
#[derive(Clone, PartialEq, Eq)]
pub enum AccessKey {
    /// Read from the named environment variable.
    Env(String),
    /// A fixed value; `None` behaves like an unset variable.
    Fixed(Option<String>),
}

impl AccessKey {
    /// Resolve the key. Empty values count as missing.
    #[must_use]
    pub fn resolve(&self) -> Option<String> {
        let key = match self {
            Self::Env(name) => std::env::var(name).ok(),
            Self::Fixed(value) => value.clone(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

impl std::fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env(name) => f.debug_tuple("Env").field(name).finish(),
            Self::Fixed(value) => f
                .debug_tuple("Fixed")
                .field(&value.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// A source of flight records.
#[async_trait::async_trait]
pub trait FlightProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Look up `query`, returning at most one record.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, transport failure, a non-success status
    /// or an undecodable body.
    async fn fetch(
        &self,
        access_key: &str,
        query: &FlightStatusQuery,
    ) -> std::result::Result<ProviderPayload, ProviderError>;
}

/// HTTP client for the `AviationStack` `/flights` endpoint.
#[derive(Debug, Clone)]
pub struct AviationStackProvider {
    client: reqwest::Client,
    flights_url: String,
}

impl AviationStackProvider {
    /// Create a provider for `base_url` with the given timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the user agent
    /// is not a valid header value.
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(user_agent).map_err(|e| {
            crate::Error::config_validation(format!("invalid user agent '{user_agent}': {e}"))
        })?;
        headers.insert(USER_AGENT, agent);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            flights_url: format!("{}/flights", base_url.trim_end_matches('/')),
        })
    }

    /// Create a provider from the `[provider]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.provider.base_url,
            config.provider_timeout(),
            &config.provider.user_agent,
        )
    }
}

#[async_trait::async_trait]
impl FlightProvider for AviationStackProvider {
    fn name(&self) -> &'static str {
        "aviationstack"
    }

    async fn fetch(
        &self,
        access_key: &str,
        query: &FlightStatusQuery,
    ) -> std::result::Result<ProviderPayload, ProviderError> {
        let mut params = vec![
            ("access_key", access_key.to_string()),
            ("flight_iata", query.flight_code.clone()),
            ("limit", "1".to_string()),
        ];
        if let Some(date) = query.date {
            params.push(("flight_date", date.format(DATE_FORMAT).to_string()));
        }

        debug!(url = %self.flights_url, flight = %query.flight_code, "Querying provider");

        let response = self
            .client
            .get(&self.flights_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProviderPayload>(&body)
                .ok()
                .and_then(|payload| payload.error_message().map(str::to_string));
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
