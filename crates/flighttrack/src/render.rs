//! Plain-text rendering of poller state for the terminal watch view.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::flight::{FlightEndpoint, FlightRecord};
use crate::poller::{Phase, PollState};
use crate::progress::FlightProgress;

/// Width of the progress bar in characters.
const BAR_WIDTH: usize = 30;

/// Render `state` as of `now`.
///
/// `flight_code` names the flight when no record has arrived yet.
#[must_use]
pub fn render_state(state: &PollState, flight_code: &str, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    if let Some(record) = &state.flight {
        render_record(&mut out, record, now);
    } else {
        let _ = writeln!(out, "Flight {flight_code}");
        if state.phase == Phase::Idle {
            let _ = writeln!(out, "Waiting for first update...");
        }
    }

    if state.is_loading() {
        let _ = writeln!(out, "Loading flight status...");
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "Error: {error}");
    }

    if let Some(updated) = state.last_updated {
        let _ = writeln!(
            out,
            "Last updated: {}  (refresh #{})",
            updated.format("%H:%M:%S UTC"),
            state.refresh_count
        );
    }

    out
}

/// Render one flight record with its progress as of `now`.
#[must_use]
pub fn render_flight(record: &FlightRecord, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    render_record(&mut out, record, now);
    out
}

fn render_record(out: &mut String, record: &FlightRecord, now: DateTime<Utc>) {
    let progress = FlightProgress::compute(record, now);

    let code = record.flight.iata.as_deref().unwrap_or("Unknown flight");
    if let Some(airline) = record.airline.name.as_deref() {
        let _ = writeln!(out, "{} {code} ({airline})", progress.icon);
    } else {
        let _ = writeln!(out, "{} {code}", progress.icon);
    }
    let status = record.status().to_string().to_uppercase();
    let _ = writeln!(out, "Status: {status}");
    let _ = writeln!(out);

    render_endpoint(out, "From", &record.departure);
    render_endpoint(out, "To", &record.arrival);
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "[{}] {:>3}%  {}",
        progress_bar(progress.percent),
        progress.percent,
        progress.stage.label()
    );
    let _ = writeln!(out, "{}", progress.remaining);
}

fn render_endpoint(out: &mut String, label: &str, endpoint: &FlightEndpoint) {
    let iata = endpoint.iata.as_deref().unwrap_or("---");
    let airport = endpoint.airport.as_deref().unwrap_or("Unknown airport");
    let _ = writeln!(out, "{label:<5} {iata}  {airport}");

    let mut details = Vec::new();
    if let Some(terminal) = &endpoint.terminal {
        details.push(format!("Terminal {terminal}"));
    }
    if let Some(gate) = &endpoint.gate {
        details.push(format!("Gate {gate}"));
    }
    if !details.is_empty() {
        let _ = writeln!(out, "      {}", details.join(", "));
    }

    for (name, value) in [
        ("Scheduled", endpoint.scheduled_at()),
        ("Estimated", endpoint.estimated_at()),
        ("Actual", endpoint.actual_at()),
    ] {
        if let Some(at) = value {
            let _ = writeln!(out, "      {name:<10} {}", at.format("%Y-%m-%d %H:%M UTC"));
        }
    }
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) * BAR_WIDTH / 100;
    format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}
