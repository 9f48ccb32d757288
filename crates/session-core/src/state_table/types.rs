//! State table types
//!
//! The session lifecycle is driven by a declarative table: a
//! `StateKey { party, state, event }` lookup yields the `Transition` to run.
//! Events carry payloads at runtime; keys are normalized so the table
//! matches on the event kind, not on field values.

use crate::types::{
    CallId, CallStatus, CallTarget, EndReason, Party, SessionState,
};
use std::collections::{HashMap, HashSet};

/// Key for looking up transitions in the state table
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct StateKey {
    pub party: Party,
    pub state: SessionState,
    pub event: Event,
}

/// Events that drive the session state machine.
///
/// User actions, detector output, store observations, transport signals
/// and timer expiries all funnel into this one type; arrival order across
/// sources is not guaranteed, so transitions must tolerate re-delivery.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Event {
    // User-initiated
    StartOutgoingCall { target: NormalizedTarget },
    AcceptCall,
    RejectCall,
    EndCall { reason: NormalizedReason },

    // Detector output
    IncomingCallDetected { call_id: NormalizedCallId },

    // Store observations
    RemoteAnswerObserved,
    RemoteTerminationObserved { status: NormalizedStatus },

    // Transport signals
    TransportConnected,
    TransportFailed,
    RemoteMediaArrived,

    // Internal coordination
    CheckEstablished,
    RingTimeout { call_id: NormalizedCallId },
    ConnectTimeout { call_id: NormalizedCallId },
}

/// Wrapper types that hash/compare as equal regardless of payload, so one
/// table entry matches every runtime value of the field.
#[derive(Debug, Clone)]
pub struct NormalizedTarget(pub Option<CallTarget>);
#[derive(Debug, Clone)]
pub struct NormalizedReason(pub Option<EndReason>);
#[derive(Debug, Clone)]
pub struct NormalizedCallId(pub Option<CallId>);
#[derive(Debug, Clone)]
pub struct NormalizedStatus(pub Option<CallStatus>);

macro_rules! normalized_eq {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, _other: &Self) -> bool {
                true
            }
        }
        impl Eq for $ty {}
        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, _state: &mut H) {}
        }
    };
}

normalized_eq!(NormalizedTarget);
normalized_eq!(NormalizedReason);
normalized_eq!(NormalizedCallId);
normalized_eq!(NormalizedStatus);

impl Event {
    /// Build a start-call event carrying its target
    pub fn start_outgoing(target: CallTarget) -> Self {
        Event::StartOutgoingCall {
            target: NormalizedTarget(Some(target)),
        }
    }

    /// Build an end-call event carrying its reason
    pub fn end_call(reason: EndReason) -> Self {
        Event::EndCall {
            reason: NormalizedReason(Some(reason)),
        }
    }

    pub fn incoming_detected(call_id: CallId) -> Self {
        Event::IncomingCallDetected {
            call_id: NormalizedCallId(Some(call_id)),
        }
    }

    pub fn remote_termination(status: CallStatus) -> Self {
        Event::RemoteTerminationObserved {
            status: NormalizedStatus(Some(status)),
        }
    }

    pub fn ring_timeout(call_id: CallId) -> Self {
        Event::RingTimeout {
            call_id: NormalizedCallId(Some(call_id)),
        }
    }

    pub fn connect_timeout(call_id: CallId) -> Self {
        Event::ConnectTimeout {
            call_id: NormalizedCallId(Some(call_id)),
        }
    }

    /// Placeholder value used when building table keys
    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::StartOutgoingCall { .. } => "StartOutgoingCall",
            Event::AcceptCall => "AcceptCall",
            Event::RejectCall => "RejectCall",
            Event::EndCall { .. } => "EndCall",
            Event::IncomingCallDetected { .. } => "IncomingCallDetected",
            Event::RemoteAnswerObserved => "RemoteAnswerObserved",
            Event::RemoteTerminationObserved { .. } => "RemoteTerminationObserved",
            Event::TransportConnected => "TransportConnected",
            Event::TransportFailed => "TransportFailed",
            Event::RemoteMediaArrived => "RemoteMediaArrived",
            Event::CheckEstablished => "CheckEstablished",
            Event::RingTimeout { .. } => "RingTimeout",
            Event::ConnectTimeout { .. } => "ConnectTimeout",
        }
    }

    /// The party a pre-call event implies, for lookups before the session
    /// has committed to a side
    pub fn implied_party(&self) -> Option<Party> {
        match self {
            Event::StartOutgoingCall { .. } => Some(Party::Caller),
            Event::IncomingCallDetected { .. } => Some(Party::Callee),
            _ => None,
        }
    }
}

/// Table-building placeholders, so table code reads declaratively
pub mod placeholders {
    use super::*;

    pub fn start_outgoing_call() -> Event {
        Event::StartOutgoingCall {
            target: NormalizedTarget(None),
        }
    }

    pub fn end_call() -> Event {
        Event::EndCall {
            reason: NormalizedReason(None),
        }
    }

    pub fn incoming_call_detected() -> Event {
        Event::IncomingCallDetected {
            call_id: NormalizedCallId(None),
        }
    }

    pub fn remote_termination_observed() -> Event {
        Event::RemoteTerminationObserved {
            status: NormalizedStatus(None),
        }
    }

    pub fn ring_timeout() -> Event {
        Event::RingTimeout {
            call_id: NormalizedCallId(None),
        }
    }

    pub fn connect_timeout() -> Event {
        Event::ConnectTimeout {
            call_id: NormalizedCallId(None),
        }
    }
}

/// Guards that must be satisfied for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Transport reports connected and remote media is present
    AllEstablishConditions,
    /// The remote description has been applied locally
    HasRemoteDescription,
}

/// Actions executed during a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Verify tracks, create the offer, persist record + offer atomically
    CreateRecordWithOffer,
    /// Responder flow: consume the offer, produce and persist the answer
    ConsumeOfferProduceAnswer,
    /// Initiator flow: apply the observed answer, idempotently
    ConsumeRemoteAnswer,
    /// Drain the pre-remote-description candidate buffer in order
    FlushCandidateBuffer,
    /// Guarded terminal write; reason defaults to the triggering event's
    WriteTermination {
        status: CallStatus,
        reason: Option<EndReason>,
    },
    /// Tear the transport down (exactly once per session)
    Teardown,
    /// Clear the displayed incoming call immediately
    ClearIncoming,
    /// Arm the ring window for an outgoing call
    StartRingTimer,
    /// Arm the connect window for a connecting call
    StartConnectTimer,
}

/// Condition flag updates applied before actions run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionUpdates {
    pub transport_connected: Option<bool>,
    pub remote_media: Option<bool>,
}

impl ConditionUpdates {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn set_transport_connected(value: bool) -> Self {
        Self {
            transport_connected: Some(value),
            ..Default::default()
        }
    }

    pub fn set_remote_media(value: bool) -> Self {
        Self {
            remote_media: Some(value),
            ..Default::default()
        }
    }
}

/// Session events to publish after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    StateChanged,
    IncomingSurfaced,
    CallEstablished,
    CallTerminated,
}

/// Transition definition - what happens when an event occurs in a state
#[derive(Debug, Clone)]
pub struct Transition {
    /// Conditions that must hold for this transition
    pub guards: Vec<Guard>,
    /// Actions to execute, in order
    pub actions: Vec<Action>,
    /// Next state (if changing)
    pub next_state: Option<SessionState>,
    /// Condition flags to update
    pub condition_updates: ConditionUpdates,
    /// Session events to publish after the transition
    pub publish: Vec<Emit>,
    /// Internal events to enqueue after the transition
    pub follow_ups: Vec<Event>,
}

impl Transition {
    /// A transition that only changes state
    pub fn to_state(next: SessionState) -> Self {
        Self {
            guards: vec![],
            actions: vec![],
            next_state: Some(next),
            condition_updates: ConditionUpdates::none(),
            publish: vec![Emit::StateChanged],
            follow_ups: vec![],
        }
    }
}

/// The complete transition table for one coordinator
pub struct StateTable {
    transitions: HashMap<StateKey, Transition>,
}

impl StateTable {
    pub fn new() -> Self {
        Self {
            transitions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: StateKey, transition: Transition) {
        self.transitions.insert(key, transition);
    }

    pub fn get(&self, key: &StateKey) -> Option<&Transition> {
        self.transitions.get(key)
    }

    pub fn has_transition(&self, key: &StateKey) -> bool {
        self.transitions.contains_key(key)
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Collect all states referenced by the table
    pub fn collect_used_states(&self) -> HashSet<SessionState> {
        let mut states = HashSet::new();
        for (key, transition) in &self.transitions {
            states.insert(key.state);
            if let Some(next) = transition.next_state {
                states.insert(next);
            }
        }
        states
    }

    /// Validate that every non-terminal state in use has an exit
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for state in self.collect_used_states() {
            if state.is_terminal() {
                continue;
            }
            let has_exit = self
                .transitions
                .iter()
                .any(|(key, t)| key.state == state && t.next_state.is_some());
            if !has_exit {
                errors.push(format!("state {state} has no exit transitions"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for StateTable {
    fn default() -> Self {
        Self::new()
    }
}
