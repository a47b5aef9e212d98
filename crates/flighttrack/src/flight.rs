//! Core flight-status types.
//!
//! These types describe one lookup: the query the proxy receives, the record
//! the provider returns and the envelopes the proxy answers with. Field names
//! follow the provider's JSON so records pass through unchanged.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Flight tracked when no code is given.
pub const DEFAULT_FLIGHT_CODE: &str = "IX322";

/// Shortest flight code the proxy will forward.
pub const MIN_FLIGHT_CODE_LEN: usize = 2;

/// Wire format of the optional `date` parameter.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Status of a flight as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightStatus {
    /// Not yet departed.
    Scheduled,
    /// In the air.
    Active,
    /// Arrived at the destination.
    Landed,
    /// Will not operate.
    Cancelled,
    /// An incident was reported.
    Incident,
    /// Landing somewhere other than the scheduled destination.
    Diverted,
    /// Missing or unrecognized status token.
    Unknown,
}

impl FlightStatus {
    /// Parse a provider status token. Unrecognized tokens map to `Unknown`.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Self::Scheduled,
            "active" => Self::Active,
            "landed" => Self::Landed,
            "cancelled" => Self::Cancelled,
            "incident" => Self::Incident,
            "diverted" => Self::Diverted,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Active => write!(f, "active"),
            Self::Landed => write!(f, "landed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Incident => write!(f, "incident"),
            Self::Diverted => write!(f, "diverted"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A validated lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightStatusQuery {
    /// IATA flight identifier, e.g. `IX322`.
    pub flight_code: String,
    /// Optional flight date.
    pub date: Option<NaiveDate>,
}

impl FlightStatusQuery {
    /// Create a query for the given flight and optional date.
    #[must_use]
    pub fn new(flight_code: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Self {
            flight_code: flight_code.into(),
            date,
        }
    }
}

/// One end of a flight: the departure or the arrival.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightEndpoint {
    /// Airport name.
    pub airport: Option<String>,
    /// Airport timezone name.
    pub timezone: Option<String>,
    /// Airport IATA code.
    pub iata: Option<String>,
    /// Terminal, if assigned.
    pub terminal: Option<String>,
    /// Gate, if assigned.
    pub gate: Option<String>,
    /// Scheduled time (ISO-8601).
    pub scheduled: Option<String>,
    /// Estimated time (ISO-8601).
    pub estimated: Option<String>,
    /// Actual time (ISO-8601).
    pub actual: Option<String>,
}

impl FlightEndpoint {
    /// Parse the scheduled time.
    #[must_use]
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        parse_instant(self.scheduled.as_deref())
    }

    /// Parse the estimated time.
    #[must_use]
    pub fn estimated_at(&self) -> Option<DateTime<Utc>> {
        parse_instant(self.estimated.as_deref())
    }

    /// Parse the actual time.
    #[must_use]
    pub fn actual_at(&self) -> Option<DateTime<Utc>> {
        parse_instant(self.actual.as_deref())
    }

    /// Whether an actual time has been reported.
    #[must_use]
    pub fn has_actual(&self) -> bool {
        self.actual.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Operating airline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Airline {
    /// Airline name.
    pub name: Option<String>,
    /// Airline IATA code.
    pub iata: Option<String>,
}

/// Flight identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightIdent {
    /// Flight number without the airline prefix.
    pub number: Option<String>,
    /// Full IATA flight code.
    pub iata: Option<String>,
}

/// Typed view of one provider flight record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightRecord {
    /// Raw lowercase status token.
    pub flight_status: Option<String>,
    /// Departure details.
    #[serde(deserialize_with = "null_as_default")]
    pub departure: FlightEndpoint,
    /// Arrival details.
    #[serde(deserialize_with = "null_as_default")]
    pub arrival: FlightEndpoint,
    /// Operating airline.
    #[serde(deserialize_with = "null_as_default")]
    pub airline: Airline,
    /// Flight identifiers.
    #[serde(deserialize_with = "null_as_default")]
    pub flight: FlightIdent,
}

/// Decode an explicit `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl FlightRecord {
    /// The parsed flight status.
    #[must_use]
    pub fn status(&self) -> FlightStatus {
        self.flight_status
            .as_deref()
            .map_or(FlightStatus::Unknown, FlightStatus::from_token)
    }
}

/// Successful proxy response.
///
/// The proxy keeps `flight` as the provider's raw JSON so nothing is renamed
/// or dropped; clients decode it into a [`FlightRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightStatusEnvelope<F = serde_json::Value> {
    /// The first matching provider record.
    pub flight: F,
    /// When the proxy retrieved the record.
    pub timestamp: DateTime<Utc>,
    /// Echo of the requested date, if one was given.
    #[serde(
        rename = "requestedDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_date: Option<NaiveDate>,
}

/// Failed proxy response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Human-readable failure description.
    pub error: String,
}

impl ErrorEnvelope {
    /// Create an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Parse an ISO-8601 instant as sent by the provider.
///
/// Accepts RFC 3339 with an offset and, failing that, a naive
/// `YYYY-MM-DDTHH:MM:SS` which is taken as UTC.
#[must_use]
pub fn parse_instant(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
