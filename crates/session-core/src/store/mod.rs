//! Call Record Store interface
//!
//! The shared record is the only mutable resource both parties touch. The
//! store exposes three notification paths (insert, update, poll); arrival
//! order across them is not guaranteed, so every consumer must be
//! idempotent against re-delivery.

pub mod memory;

pub use memory::MemoryCallRecordStore;

use crate::errors::Result;
use crate::types::{CallId, CallRecord, CallStatus, CandidateEntry, EndReason, Party, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Precondition for a guarded update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePrecondition {
    /// Apply unconditionally
    None,
    /// Apply only while the record is not terminal
    NotEnded,
    /// Apply only while the record has exactly this status
    StatusIs(CallStatus),
}

/// Fields a guarded update may set.
///
/// The explicit degraded-write mode: when the store lacks a capability the
/// coordinator writes `minimal()` instead of retrying on error text.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub status: Option<CallStatus>,
    pub answer: Option<crate::types::SignalBlob>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ended_by: Option<Role>,
    pub end_reason: Option<EndReason>,
}

impl RecordPatch {
    /// Patch that only moves the status
    pub fn status(status: CallStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Full terminal patch
    pub fn terminal(status: CallStatus, ended_by: Role, reason: EndReason) -> Self {
        Self {
            status: Some(status),
            ended_at: Some(Utc::now()),
            ended_by: Some(ended_by),
            end_reason: Some(reason),
            ..Default::default()
        }
    }

    /// Minimal field set for stores that reject extended termination
    /// metadata: the status flip alone still terminates the call for the
    /// peer's detectors.
    pub fn minimal(&self) -> Self {
        Self {
            status: self.status,
            ended_at: self.ended_at,
            ..Default::default()
        }
    }
}

/// Typed capability flags the store reports up front, so the coordinator
/// branches on flags rather than error-message substrings
#[derive(Debug, Clone, Copy)]
pub struct StoreCapabilities {
    /// Whether records carry the `recipient_type` disambiguator
    pub supports_recipient_type: bool,
    /// Whether the store accepts `ended_by`/`end_reason` on terminal writes
    pub supports_termination_metadata: bool,
}

impl Default for StoreCapabilities {
    fn default() -> Self {
        Self {
            supports_recipient_type: true,
            supports_termination_metadata: true,
        }
    }
}

/// A change notification from the store
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A brand-new record was inserted
    Inserted { record: CallRecord },
    /// An existing record changed; `previous_status` is the status before
    /// this write, needed to detect transitions into ringing
    Updated {
        record: CallRecord,
        previous_status: CallStatus,
    },
}

impl StoreEvent {
    pub fn record(&self) -> &CallRecord {
        match self {
            StoreEvent::Inserted { record } => record,
            StoreEvent::Updated { record, .. } => record,
        }
    }
}

/// Filter for the periodic fallback poll
#[derive(Debug, Clone)]
pub struct RecordFilter {
    /// Match records whose callee identity equals this value
    pub callee_id: String,
    /// Match records with any of these statuses
    pub statuses: Vec<CallStatus>,
}

/// The shared, durable call record store.
///
/// All round trips are non-blocking; an acknowledged update is never
/// silently dropped.
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    /// Persist a new record atomically: it becomes visible to the other
    /// party only with its offer and status already set.
    async fn create(&self, record: CallRecord) -> Result<CallId>;

    /// Read a record by id; `None` when no such record exists
    async fn read(&self, id: &CallId) -> Result<Option<CallRecord>>;

    /// Guarded update. Returns `Ok(true)` when the precondition held and
    /// the fields were applied, `Ok(false)` when the precondition was lost
    /// to a concurrent writer. Losing the race is not an error.
    async fn update(
        &self,
        id: &CallId,
        precondition: UpdatePrecondition,
        fields: RecordPatch,
    ) -> Result<bool>;

    /// Read-merge-append to one party's candidate slot. Concurrent appends
    /// to the other party's slot are never lost; same-slot appends from one
    /// endpoint are assumed sequential.
    async fn append_candidates(
        &self,
        id: &CallId,
        party: Party,
        entries: Vec<CandidateEntry>,
    ) -> Result<()>;

    /// Subscribe to insert/update notifications
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    /// Fallback query for records matching `filter` created after `since`
    async fn poll_matching(
        &self,
        filter: &RecordFilter,
        since: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>>;

    /// Capabilities this store reports up front
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }
}
