//! HTTP client for the proxy endpoint.
//!
//! [`ProxyClient`] is the production [`FlightSource`] used by the poller. It
//! enforces its own abort budget, independent of the proxy's provider timeout.

use std::time::Duration;

use reqwest::header::CACHE_CONTROL;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::flight::{
    ErrorEnvelope, FlightRecord, FlightStatusEnvelope, FlightStatusQuery, DATE_FORMAT,
};
use crate::poller::FlightSource;
use crate::proxy::routes::FLIGHT_ROUTE;

/// Why a poll failed. `Display` is the message shown to the user.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request exceeded the client-side budget.
    #[error("Request timed out. Please try again.")]
    Timeout,

    /// The proxy answered with a non-success status.
    #[error("{}", server_message(*.status, .message.as_deref()))]
    Server {
        /// HTTP status code.
        status: u16,
        /// The proxy's `error` field, if present.
        message: Option<String>,
    },

    /// The request never got a response.
    #[error("{0}")]
    Transport(String),

    /// The response body was not a flight envelope.
    #[error("Invalid response from server: {0}")]
    Decode(String),
}

fn server_message(status: u16, message: Option<&str>) -> String {
    message.map_or_else(|| format!("Server error: {status}"), str::to_string)
}

impl ClientError {
    /// Message shown in the `Error` state.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Client for `GET /api/flight` on a running proxy.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    query: FlightStatusQuery,
}

impl ProxyClient {
    /// Create a client for the proxy at `proxy_url` that always asks for `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(proxy_url: &str, query: FlightStatusQuery, timeout: Duration) -> Result<Self> {
        let raw = format!("{}{FLIGHT_ROUTE}", proxy_url.trim_end_matches('/'));
        let endpoint =
            reqwest::Url::parse(&raw).map_err(|e| Error::invalid_url(&raw, e.to_string()))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            query,
        })
    }

    /// Create a client from the `[client]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.client.proxy_url,
            FlightStatusQuery::new(config.client.flight.clone(), config.client.date),
            config.request_timeout(),
        )
    }

    /// The query this client sends.
    #[must_use]
    pub fn query(&self) -> &FlightStatusQuery {
        &self.query
    }

    /// Fetch and decode one envelope.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on timeout, transport failure, a non-success
    /// status or an undecodable body.
    pub async fn fetch_envelope(
        &self,
    ) -> std::result::Result<FlightStatusEnvelope<FlightRecord>, ClientError> {
        let mut params = vec![("flight", self.query.flight_code.clone())];
        if let Some(date) = self.query.date {
            params.push(("date", date.format(DATE_FORMAT).to_string()));
        }

        debug!(url = %self.endpoint, flight = %self.query.flight_code, "Polling proxy");

        let response = self
            .client
            .get(self.endpoint.clone())
            .header(CACHE_CONTROL, "no-cache")
            .query(&params)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(&e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .map(|envelope| envelope.error)
                .filter(|message| !message.is_empty());
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl FlightSource for ProxyClient {
    async fn fetch(&self) -> std::result::Result<FlightRecord, ClientError> {
        self.fetch_envelope().await.map(|envelope| envelope.flight)
    }
}
