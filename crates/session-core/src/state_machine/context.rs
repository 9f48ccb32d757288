//! Per-session context
//!
//! One coordinator owns exactly one `SessionContext`. All handler state
//! that older designs kept in ambient globals (last surfaced id, current
//! incoming call, teardown markers) lives here instead.

use crate::types::{
    CallId, CallRecord, CallTarget, EndReason, LocalEndpoint, Party, SessionState,
};

/// Mutable state of one local session instance
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Identity and role of this endpoint
    pub local: LocalEndpoint,
    /// Current lifecycle state
    pub state: SessionState,
    /// Which side of the call we are on, once committed
    pub party: Option<Party>,
    /// The shared record this session is bound to, once known
    pub call_id: Option<CallId>,
    /// Target of a pending outgoing call, staged by the start event
    pub pending_target: Option<CallTarget>,
    /// Snapshot of the record that surfaced as incoming
    pub incoming_record: Option<CallRecord>,
    /// Reason staged by a local end event
    pub pending_end_reason: Option<EndReason>,
    /// Whether the local transport has a remote description applied
    pub remote_description_set: bool,
    /// Condition flags for the connecting -> in_call check
    pub transport_connected: bool,
    pub remote_media: bool,
    /// Set once transport teardown has run; every path into `ended` checks
    /// this so teardown happens exactly once
    pub teardown_done: bool,
    /// Whether this endpoint wrote the terminal record state itself
    pub ended_locally: bool,
}

impl SessionContext {
    pub fn new(local: LocalEndpoint) -> Self {
        Self {
            local,
            state: SessionState::Idle,
            party: None,
            call_id: None,
            pending_target: None,
            incoming_record: None,
            pending_end_reason: None,
            remote_description_set: false,
            transport_connected: false,
            remote_media: false,
            teardown_done: false,
            ended_locally: false,
        }
    }

    /// Whether `id` is the call this session is bound to
    pub fn is_current_call(&self, id: &CallId) -> bool {
        self.call_id.as_ref() == Some(id)
    }

    /// Both establish conditions hold
    pub fn establish_conditions_met(&self) -> bool {
        self.transport_connected && self.remote_media
    }
}
