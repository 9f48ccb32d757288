//! Core types for famcall-session-core
//!
//! This module defines the fundamental types used throughout the crate:
//! identifiers, roles, the shared call record, and the session event stream
//! surfaced to UI consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Call ID type - identifies one shared call record
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new() -> Self {
        Self(format!("call-{}", uuid::Uuid::new_v4()))
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Family role of an endpoint
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Parent,
    Child,
    FamilyMember,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Parent => "parent",
            Role::Child => "child",
            Role::FamilyMember => "family_member",
        };
        write!(f, "{s}")
    }
}

/// Which side of the call this endpoint is on.
///
/// Each party owns exactly one candidate slot on the shared record.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Caller,
    Callee,
}

impl Party {
    /// The slot the remote side writes to
    pub fn other(&self) -> Party {
        match self {
            Party::Caller => Party::Callee,
            Party::Callee => Party::Caller,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Caller => write!(f, "caller"),
            Party::Callee => write!(f, "callee"),
        }
    }
}

/// Status of the shared call record.
///
/// Monotone along Initiating -> Ringing -> Active -> Ended, with Rejected
/// and Missed as terminal alternates reachable only from non-terminal states.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiating,
    Ringing,
    Active,
    Rejected,
    Missed,
    Ended,
}

impl CallStatus {
    /// Terminal statuses admit no further status mutation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Rejected | CallStatus::Missed | CallStatus::Ended
        )
    }

    /// Whether the record status may move from `self` to `next`
    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (CallStatus::Initiating, CallStatus::Ringing) => true,
            (CallStatus::Initiating, CallStatus::Active) => true,
            (CallStatus::Ringing, CallStatus::Active) => true,
            (_, CallStatus::Rejected) | (_, CallStatus::Missed) | (_, CallStatus::Ended) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallStatus::Initiating => "initiating",
            CallStatus::Ringing => "ringing",
            CallStatus::Active => "active",
            CallStatus::Rejected => "rejected",
            CallStatus::Missed => "missed",
            CallStatus::Ended => "ended",
        };
        write!(f, "{s}")
    }
}

/// Why a call ended.
///
/// Open taxonomy - the termination coordinator does not validate beyond
/// non-emptiness, so unknown reasons round-trip through `Other`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Hangup,
    Declined,
    Busy,
    NoAnswer,
    Failed,
    NetworkLost,
    Other(String),
}

impl EndReason {
    pub fn as_str(&self) -> &str {
        match self {
            EndReason::Hangup => "hangup",
            EndReason::Declined => "declined",
            EndReason::Busy => "busy",
            EndReason::NoAnswer => "no_answer",
            EndReason::Failed => "failed",
            EndReason::NetworkLost => "network_lost",
            EndReason::Other(s) => s.as_str(),
        }
    }

    /// An `Other` reason must be non-empty
    pub fn is_valid(&self) -> bool {
        !self.as_str().is_empty()
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque signaling blob (SDP offer or answer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalBlob(pub String);

impl SignalBlob {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }
}

/// One connectivity candidate exchanged through a record slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEntry {
    /// Opaque candidate payload
    pub payload: String,
    /// Media line index hint, when the transport provides one
    pub media_index: Option<u32>,
}

impl CandidateEntry {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            media_index: None,
        }
    }
}

/// The shared rendezvous record both parties read and write.
///
/// Created by the initiator, mutated by both sides, never deleted by this
/// subsystem. Each field group has a single designated writer per call
/// except the termination fields, which use a guarded race-tolerant update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: CallId,
    pub caller_role: Role,
    pub caller_id: String,
    /// Legacy routing hint for the recipient. May overlap across adult
    /// roles; `recipient_type` is authoritative when present.
    pub callee_role: Role,
    pub callee_id: String,
    /// Disambiguates parent vs family-member recipients whose identifiers
    /// may otherwise overlap
    pub recipient_type: Option<Role>,
    pub status: CallStatus,
    /// Written at most once, by the initiator, together with creation
    pub offer: Option<SignalBlob>,
    /// Written at most once, by the responder, after consuming the offer
    pub answer: Option<SignalBlob>,
    /// Append-only candidate slot owned by the caller
    pub caller_candidates: Vec<CandidateEntry>,
    /// Append-only candidate slot owned by the callee
    pub callee_candidates: Vec<CandidateEntry>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ended_by: Option<Role>,
    pub end_reason: Option<EndReason>,
}

impl CallRecord {
    /// Build a fresh record for an outgoing call. The offer is attached by
    /// the signaling coordinator before the record is persisted, so a
    /// ringing record is never visible without one.
    pub fn new_outgoing(
        caller_role: Role,
        caller_id: impl Into<String>,
        callee_role: Role,
        callee_id: impl Into<String>,
        recipient_type: Option<Role>,
    ) -> Self {
        Self {
            id: CallId::new(),
            caller_role,
            caller_id: caller_id.into(),
            callee_role,
            callee_id: callee_id.into(),
            recipient_type,
            status: CallStatus::Ringing,
            offer: None,
            answer: None,
            caller_candidates: Vec::new(),
            callee_candidates: Vec::new(),
            created_at: Utc::now(),
            ended_at: None,
            ended_by: None,
            end_reason: None,
        }
    }

    /// The candidate slot owned by `party`
    pub fn candidate_slot(&self, party: Party) -> &[CandidateEntry] {
        match party {
            Party::Caller => &self.caller_candidates,
            Party::Callee => &self.callee_candidates,
        }
    }

    pub fn candidate_slot_mut(&mut self, party: Party) -> &mut Vec<CandidateEntry> {
        match party {
            Party::Caller => &mut self.caller_candidates,
            Party::Callee => &mut self.callee_candidates,
        }
    }

    /// A record is terminal once its status is terminal or `ended_at` is set
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal() || self.ended_at.is_some()
    }
}

/// Local per-endpoint session state. Not persisted; destroyed when the
/// owning coordinator is dropped.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Outgoing,
    Incoming,
    Connecting,
    InCall,
    Ended,
}

impl SessionState {
    /// Ended is terminal for this session instance; a reset creates a
    /// fresh Idle instance
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ended)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Outgoing => "outgoing",
            SessionState::Incoming => "incoming",
            SessionState::Connecting => "connecting",
            SessionState::InCall => "in_call",
            SessionState::Ended => "ended",
        };
        write!(f, "{s}")
    }
}

/// Identity and resolved role of the local endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEndpoint {
    pub identity: String,
    pub role: Role,
}

/// Target of an outgoing call after role resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub identity: String,
    pub role: Role,
    /// Carried onto the record so overlapping adult identities route
    /// correctly on the far side
    pub recipient_type: Option<Role>,
}

/// Events emitted to UI consumers of the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The local session state changed
    StateChanged {
        state: SessionState,
        call_id: Option<CallId>,
        remote_media_present: bool,
    },
    /// A qualifying incoming call was surfaced (exactly once per call id)
    IncomingCall {
        call_id: CallId,
        caller_id: String,
        caller_role: Role,
    },
    /// The displayed incoming call was cleared
    IncomingCleared { call_id: CallId },
    /// Both transport connectivity and remote media are present
    CallEstablished { call_id: CallId },
    /// The session reached its terminal state
    CallTerminated {
        call_id: Option<CallId>,
        reason: Option<EndReason>,
    },
}
