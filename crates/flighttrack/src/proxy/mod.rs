//! The flight-status proxy endpoint.
//!
//! [`FlightProxy`] is the stateless core: it checks the credential, validates
//! the query, makes one provider call and maps every outcome onto either a
//! [`FlightStatusEnvelope`] or a [`ProxyError`]. The HTTP surface lives in
//! [`routes`].

pub mod routes;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::flight::{
    ErrorEnvelope, FlightStatusEnvelope, FlightStatusQuery, DATE_FORMAT, DEFAULT_FLIGHT_CODE,
    MIN_FLIGHT_CODE_LEN,
};
use crate::provider::{AccessKey, AviationStackProvider, FlightProvider, ProviderError};

pub use routes::{router, serve, shutdown_signal};

/// Message used when the provider fails without saying why.
pub const GENERIC_PROVIDER_MESSAGE: &str = "Flight data service unavailable";

/// Every way a lookup can fail. `Display` is the user-facing message.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The provider credential is not configured.
    #[error("API key not configured. Please check your environment variables.")]
    Configuration,

    /// The query is malformed.
    #[error("{message}")]
    Validation {
        /// What was wrong with the query.
        message: String,
    },

    /// The provider did not answer within the timeout.
    #[error("Request timeout. Please try again.")]
    Timeout,

    /// The provider could not be reached.
    #[error("Network error. Please check your connection.")]
    Network {
        /// Transport error text, for logs only.
        detail: String,
    },

    /// The provider reported an error.
    #[error("{message}")]
    Provider {
        /// The provider's message, or a generic one.
        message: String,
    },

    /// The provider returned no matching record.
    #[error("{}", not_found_message(.flight_code, *.date))]
    NotFound {
        /// The requested flight code.
        flight_code: String,
        /// The requested date, if any.
        date: Option<NaiveDate>,
    },

    /// Anything else.
    #[error("An unexpected error occurred. Please try again later.")]
    Unknown {
        /// Underlying error text, for logs only.
        detail: String,
    },
}

const CHECK_HINT: &str = "Please check the flight number and try again.";

fn not_found_message(flight_code: &str, date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => {
            let date = date.format(DATE_FORMAT);
            format!("Flight {flight_code} not found for {date}. {CHECK_HINT}")
        }
        None => format!("Flight {flight_code} not found. {CHECK_HINT}"),
    }
}

impl ProxyError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration | Self::Unknown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation { .. } | Self::Provider { .. } => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Network { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// The JSON body for this error.
    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.to_string())
    }
}

impl From<ProviderError> for ProxyError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout => Self::Timeout,
            ProviderError::Network(detail) => Self::Network { detail },
            ProviderError::Status { message, .. } => Self::Provider {
                message: message.unwrap_or_else(|| GENERIC_PROVIDER_MESSAGE.to_string()),
            },
            ProviderError::Decode(detail) => Self::Unknown { detail },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.envelope())).into_response()
    }
}

/// Raw query parameters of `GET /api/flight`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FlightParams {
    /// Flight code; defaults to [`DEFAULT_FLIGHT_CODE`] when absent.
    pub flight: Option<String>,
    /// Optional `YYYY-MM-DD` date.
    pub date: Option<String>,
}

impl FlightParams {
    /// Parameters for a flight and optional date.
    #[must_use]
    pub fn new(flight: Option<String>, date: Option<String>) -> Self {
        Self { flight, date }
    }

    /// Validate into a query.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the flight code is shorter than
    /// [`MIN_FLIGHT_CODE_LEN`] or the date is not `YYYY-MM-DD`.
    pub fn into_query(self) -> Result<FlightStatusQuery, ProxyError> {
        let flight_code = self
            .flight
            .unwrap_or_else(|| DEFAULT_FLIGHT_CODE.to_string());
        if flight_code.chars().count() < MIN_FLIGHT_CODE_LEN {
            return Err(ProxyError::validation("Invalid flight number format"));
        }

        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_date(raw)?),
        };

        Ok(FlightStatusQuery { flight_code, date })
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, ProxyError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ProxyError::validation("Invalid date format. Expected YYYY-MM-DD"))
}

/// Stateless lookup core shared by the HTTP handler and `flighttrack check`.
#[derive(Clone)]
pub struct FlightProxy {
    provider: Arc<dyn FlightProvider>,
    access_key: AccessKey,
}

impl std::fmt::Debug for FlightProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightProxy")
            .field("provider", &self.provider.name())
            .field("access_key", &self.access_key)
            .finish()
    }
}

impl FlightProxy {
    /// Create a proxy over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn FlightProvider>, access_key: AccessKey) -> Self {
        Self {
            provider,
            access_key,
        }
    }

    /// Create a proxy for the configured `AviationStack` endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's HTTP client cannot be built.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let provider = AviationStackProvider::from_config(config)?;
        Ok(Self::new(
            Arc::new(provider),
            AccessKey::Env(config.provider.access_key_env.clone()),
        ))
    }

    /// Resolve the provider credential.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Configuration`] if no credential is set.
    pub fn access_key(&self) -> Result<String, ProxyError> {
        self.access_key.resolve().ok_or_else(|| {
            error!("Provider API key not configured");
            ProxyError::Configuration
        })
    }

    /// Look up one flight.
    ///
    /// The credential is checked before the parameters, and both before any
    /// outbound call.
    ///
    /// # Errors
    ///
    /// Returns a [`ProxyError`] describing why no record could be returned.
    pub async fn lookup(&self, params: FlightParams) -> Result<FlightStatusEnvelope, ProxyError> {
        let access_key = self.access_key()?;
        let query = params.into_query()?;

        info!(
            flight = %query.flight_code,
            date = ?query.date,
            provider = self.provider.name(),
            "Fetching flight status"
        );

        let payload = self
            .provider
            .fetch(&access_key, &query)
            .await
            .map_err(|e| {
                warn!(flight = %query.flight_code, error = %e, "Provider request failed");
                ProxyError::from(e)
            })?;

        if let Some(api_error) = &payload.error {
            warn!(
                flight = %query.flight_code,
                error = %api_error,
                "Provider reported an error"
            );
            return Err(ProxyError::Provider {
                message: payload
                    .error_message()
                    .unwrap_or(GENERIC_PROVIDER_MESSAGE)
                    .to_string(),
            });
        }

        let Some(flight) = payload.data.unwrap_or_default().into_iter().next() else {
            info!(flight = %query.flight_code, date = ?query.date, "No data found for flight");
            return Err(ProxyError::NotFound {
                flight_code: query.flight_code,
                date: query.date,
            });
        };

        info!(flight = %query.flight_code, "Fetched flight status");
        Ok(FlightStatusEnvelope {
            flight,
            timestamp: Utc::now(),
            requested_date: query.date,
        })
    }
}
