//! Callee-side transitions

use crate::state_table::builder::StateTableBuilder;
use crate::state_table::types::{placeholders, Action, ConditionUpdates, Emit, Event, Transition};
use crate::types::{CallStatus, EndReason, Party, SessionState};

/// Add the callee (responder) transitions to the table
pub fn add_callee_transitions(builder: &mut StateTableBuilder) {
    // Idle -> Incoming: the detector surfaced a qualifying call
    builder.add_transition(
        Party::Callee,
        SessionState::Idle,
        placeholders::incoming_call_detected(),
        Transition {
            guards: vec![],
            actions: vec![],
            next_state: Some(SessionState::Incoming),
            condition_updates: ConditionUpdates::none(),
            publish: vec![Emit::StateChanged, Emit::IncomingSurfaced],
            follow_ups: vec![],
        },
    );

    // Incoming -> Connecting: local user accepted
    builder.add_transition(
        Party::Callee,
        SessionState::Incoming,
        Event::AcceptCall,
        Transition {
            guards: vec![],
            actions: vec![
                Action::ConsumeOfferProduceAnswer,
                Action::FlushCandidateBuffer,
                Action::StartConnectTimer,
                Action::ClearIncoming,
            ],
            next_state: Some(SessionState::Connecting),
            condition_updates: ConditionUpdates::none(),
            publish: vec![Emit::StateChanged],
            // Conditions may already hold if the transport raced ahead
            follow_ups: vec![Event::CheckEstablished],
        },
    );

    // Incoming -> Ended: local user declined
    builder.add_transition(
        Party::Callee,
        SessionState::Incoming,
        Event::RejectCall,
        Transition {
            guards: vec![],
            actions: vec![
                Action::WriteTermination {
                    status: CallStatus::Rejected,
                    reason: Some(EndReason::Declined),
                },
                Action::Teardown,
                Action::ClearIncoming,
            ],
            next_state: Some(SessionState::Ended),
            condition_updates: ConditionUpdates::none(),
            publish: vec![Emit::StateChanged, Emit::CallTerminated],
            follow_ups: vec![],
        },
    );
}
