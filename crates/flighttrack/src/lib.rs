//! `flighttrack` - Follow one flight's live status
//!
//! This library provides a stateless proxy endpoint in front of the
//! `AviationStack` flight-data API and a polling client that turns its answers
//! into a progress view for a single tracked flight (IX322 by default).

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod flight;
pub mod logging;
pub mod poller;
pub mod progress;
pub mod provider;
pub mod proxy;
pub mod render;
pub mod watch;

pub use client::{ClientError, ProxyClient};
pub use config::Config;
pub use error::{Error, Result};
pub use flight::{FlightRecord, FlightStatus, FlightStatusEnvelope, FlightStatusQuery};
pub use logging::init_logging;
pub use poller::{FlightSource, Phase, PollState, PollerHandle};
pub use progress::FlightProgress;
pub use provider::{AviationStackProvider, FlightProvider};
pub use proxy::{FlightParams, FlightProxy, ProxyError};
