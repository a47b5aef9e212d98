//! Flight progress derived from a provider record.
//!
//! Progress is interpolated linearly between departure and arrival times.
//! Terminal statuses short-circuit: a landed flight is always 100 and a
//! cancelled one 0, whatever the timestamps say.

use chrono::{DateTime, Utc};

use crate::flight::{FlightRecord, FlightStatus};

/// Progress reported for an active flight whose times can't be interpolated.
pub const FALLBACK_PROGRESS: u8 = 10;

/// Coarse position along the route, used for colouring and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    /// 0%.
    NotDeparted,
    /// Below 25%.
    Departing,
    /// Below 75%.
    Cruising,
    /// Below 100%.
    Approaching,
    /// 100%.
    Arrived,
}

impl ProgressStage {
    /// Stage for a percentage in `0..=100`.
    #[must_use]
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            0 => Self::NotDeparted,
            1..=24 => Self::Departing,
            25..=74 => Self::Cruising,
            75..=99 => Self::Approaching,
            _ => Self::Arrived,
        }
    }

    /// Short label for display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NotDeparted => "Departure",
            Self::Departing => "Departing",
            Self::Cruising => "In Flight",
            Self::Approaching => "Approaching",
            Self::Arrived => "Arrival",
        }
    }
}

/// Everything the presentation layer needs to draw the progress bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightProgress {
    /// Completion in percent, `0..=100`.
    pub percent: u8,
    /// Coarse stage for `percent`.
    pub stage: ProgressStage,
    /// Icon for the current status.
    pub icon: &'static str,
    /// Human-readable remaining time.
    pub remaining: String,
}

impl FlightProgress {
    /// Derive progress for `record` as of `now`.
    #[must_use]
    pub fn compute(record: &FlightRecord, now: DateTime<Utc>) -> Self {
        let percent = progress_percent(record, now);
        Self {
            percent,
            stage: ProgressStage::from_percent(percent),
            icon: status_icon(record.status(), percent),
            remaining: time_remaining(record, percent, now),
        }
    }
}

/// Completion percentage of `record` as of `now`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_percent(record: &FlightRecord, now: DateTime<Utc>) -> u8 {
    let status = record.status();

    if status == FlightStatus::Landed || record.arrival.has_actual() {
        return 100;
    }
    if matches!(status, FlightStatus::Cancelled | FlightStatus::Incident) {
        return 0;
    }
    if status == FlightStatus::Scheduled || !record.departure.has_actual() {
        return 0;
    }
    if status != FlightStatus::Active {
        return 0;
    }

    let departed = record
        .departure
        .actual_at()
        .or_else(|| record.departure.estimated_at())
        .or_else(|| record.departure.scheduled_at());
    let arriving = record
        .arrival
        .estimated_at()
        .or_else(|| record.arrival.scheduled_at());

    let (Some(departed), Some(arriving)) = (departed, arriving) else {
        return FALLBACK_PROGRESS;
    };

    let total = (arriving - departed).num_seconds();
    if total <= 0 {
        return FALLBACK_PROGRESS;
    }
    let elapsed = (now - departed).num_seconds();

    let ratio = elapsed as f64 / total as f64;
    (ratio * 100.0).clamp(0.0, 100.0).round() as u8
}

/// Icon for a status at a given progress.
#[must_use]
pub fn status_icon(status: FlightStatus, percent: u8) -> &'static str {
    match status {
        FlightStatus::Cancelled => "❌",
        FlightStatus::Incident => "⚠️",
        FlightStatus::Diverted => "🔄",
        _ if percent == 0 => "🛫",
        _ if percent >= 100 => "🛬",
        _ => "✈️",
    }
}

/// Remaining flight time as display text.
#[must_use]
pub fn time_remaining(record: &FlightRecord, percent: u8, now: DateTime<Utc>) -> String {
    if percent >= 100 || record.status() == FlightStatus::Landed {
        return "Flight completed!".to_string();
    }
    if percent == 0 || !record.departure.has_actual() {
        return "Not departed yet".to_string();
    }

    let Some(arriving) = record
        .arrival
        .estimated_at()
        .or_else(|| record.arrival.scheduled_at())
    else {
        return "Time unknown".to_string();
    };

    let remaining = arriving - now;
    if remaining.num_seconds() <= 0 {
        return "Should have arrived".to_string();
    }

    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m remaining")
    } else {
        format!("{minutes}m remaining")
    }
}
