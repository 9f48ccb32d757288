//! Notification Normalizer
//!
//! Adapts the three notification paths into one canonical candidate type
//! so the filter rules are written once.

use crate::store::StoreEvent;
use crate::types::{CallRecord, CallStatus};

/// Which path delivered a candidate. Only used for logging; the filter
/// treats all sources identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSource {
    Insert,
    Update,
    Poll,
}

impl std::fmt::Display for NotificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationSource::Insert => write!(f, "insert"),
            NotificationSource::Update => write!(f, "update"),
            NotificationSource::Poll => write!(f, "poll"),
        }
    }
}

/// One potential incoming call, regardless of which path delivered it
#[derive(Debug, Clone)]
pub struct RingCandidate {
    pub record: CallRecord,
    pub source: NotificationSource,
}

/// Normalize a store notification into a ring candidate.
///
/// Inserts always qualify for filtering. Updates qualify only when the
/// status transitioned into ringing from a non-ringing state - other
/// updates (answers, candidates, termination) are not incoming-call
/// signals.
pub fn from_store_event(event: &StoreEvent) -> Option<RingCandidate> {
    match event {
        StoreEvent::Inserted { record } => Some(RingCandidate {
            record: record.clone(),
            source: NotificationSource::Insert,
        }),
        StoreEvent::Updated {
            record,
            previous_status,
        } => {
            if record.status == CallStatus::Ringing && *previous_status != CallStatus::Ringing {
                Some(RingCandidate {
                    record: record.clone(),
                    source: NotificationSource::Update,
                })
            } else {
                None
            }
        }
    }
}

/// Normalize one poll result
pub fn from_poll(record: CallRecord) -> RingCandidate {
    RingCandidate {
        record,
        source: NotificationSource::Poll,
    }
}
