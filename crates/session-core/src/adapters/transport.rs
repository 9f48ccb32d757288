//! Transport Engine seam
//!
//! The engine that actually establishes the peer connection lives outside
//! this crate; the coordinator only drives it through these primitives and
//! treats its connection-state stream as the authoritative failure signal.

use crate::errors::Result;
use crate::types::{CandidateEntry, SignalBlob};
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

/// Connection state reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// Outcome of `set_remote_description`. A remote description that is
/// already set is tolerated, not an error: the same fact may arrive via an
/// update notification and a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetRemoteOutcome {
    Applied,
    AlreadySet,
}

/// Outcome of `add_candidate`. Duplicate candidates are swallowed by
/// callers; anything else surfaces as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddCandidateOutcome {
    Applied,
    Duplicate,
}

/// The media transport engine consumed by the coordinator
#[async_trait]
pub trait TransportEngine: Send + Sync {
    /// Whether at least one outbound media track is attached
    async fn has_outbound_tracks(&self) -> bool;

    /// Produce a local offer
    async fn create_offer(&self) -> Result<SignalBlob>;

    /// Produce a local answer for the given remote offer
    async fn create_answer(&self, remote_offer: &SignalBlob) -> Result<SignalBlob>;

    /// Apply the remote description. Idempotent per session.
    async fn set_remote_description(&self, blob: &SignalBlob) -> Result<SetRemoteOutcome>;

    /// Apply one remote candidate
    async fn add_candidate(&self, entry: &CandidateEntry) -> Result<AddCandidateOutcome>;

    /// Watch the connection state
    fn connection_states(&self) -> watch::Receiver<ConnectionState>;

    /// Whether remote media has arrived
    fn remote_media_present(&self) -> bool;

    /// Watch remote media arrival
    fn remote_media_states(&self) -> watch::Receiver<bool>;

    /// Take the stream of locally generated candidates. Yields `Some` once;
    /// the coordinator owns the receiver for the session's lifetime.
    fn take_local_candidates(&self) -> Option<mpsc::Receiver<CandidateEntry>>;

    /// Tear the connection down. Safe to call more than once; the
    /// coordinator still guarantees it calls this exactly once per session.
    async fn teardown(&self);
}
