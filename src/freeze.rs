//! Event phase and the freeze cutoff applied to public views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    NotStarted,
    Running,
    Frozen,
    Ended,
}

/// Freeze instant, if the event is configured to freeze
///
/// `freeze` without a `freeze_time` is treated as unfrozen.
pub fn freeze_time(event: &Event) -> Option<DateTime<Utc>> {
    if !event.freeze {
        return None;
    }
    if event.freeze_time.is_none() {
        warn!("Event {} has freeze enabled but no freeze_time", event.id);
    }
    event.freeze_time
}

/// Whether public views are currently held at the freeze instant
pub fn is_frozen(event: &Event, now: DateTime<Utc>) -> bool {
    freeze_time(event).is_some_and(|at| now >= at)
}

/// As-of instant for every externally visible computation
pub fn score_cutoff(event: &Event, now: DateTime<Utc>) -> DateTime<Utc> {
    match freeze_time(event) {
        Some(at) => at.min(now),
        None => now,
    }
}

pub fn event_phase(event: &Event, now: DateTime<Utc>) -> EventPhase {
    if now < event.starts_at {
        EventPhase::NotStarted
    } else if now > event.ends_at {
        EventPhase::Ended
    } else if is_frozen(event, now) {
        EventPhase::Frozen
    } else {
        EventPhase::Running
    }
}
