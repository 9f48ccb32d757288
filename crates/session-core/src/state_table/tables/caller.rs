//! Caller-side transitions

use crate::state_table::builder::StateTableBuilder;
use crate::state_table::types::{placeholders, Action, ConditionUpdates, Emit, Transition};
use crate::types::{CallStatus, EndReason, Party, SessionState};

/// Add the caller (initiator) transitions to the table
pub fn add_caller_transitions(builder: &mut StateTableBuilder) {
    // Idle -> Outgoing: create the record with its offer, start ringing
    builder.add_transition(
        Party::Caller,
        SessionState::Idle,
        placeholders::start_outgoing_call(),
        Transition {
            guards: vec![],
            actions: vec![Action::CreateRecordWithOffer, Action::StartRingTimer],
            next_state: Some(SessionState::Outgoing),
            condition_updates: ConditionUpdates::none(),
            publish: vec![Emit::StateChanged],
            follow_ups: vec![],
        },
    );

    // Outgoing -> Connecting: the remote answer appeared on the record
    builder.add_transition(
        Party::Caller,
        SessionState::Outgoing,
        crate::state_table::types::Event::RemoteAnswerObserved,
        Transition {
            guards: vec![],
            actions: vec![
                Action::ConsumeRemoteAnswer,
                Action::FlushCandidateBuffer,
                Action::StartConnectTimer,
            ],
            next_state: Some(SessionState::Connecting),
            condition_updates: ConditionUpdates::none(),
            publish: vec![Emit::StateChanged],
            // Conditions may already hold if the transport raced ahead
            follow_ups: vec![crate::state_table::types::Event::CheckEstablished],
        },
    );

    // Outgoing -> Ended: nobody answered within the ring window
    builder.add_transition(
        Party::Caller,
        SessionState::Outgoing,
        placeholders::ring_timeout(),
        Transition {
            guards: vec![],
            actions: vec![
                Action::WriteTermination {
                    status: CallStatus::Missed,
                    reason: Some(EndReason::NoAnswer),
                },
                Action::Teardown,
            ],
            next_state: Some(SessionState::Ended),
            condition_updates: ConditionUpdates::none(),
            publish: vec![Emit::StateChanged, Emit::CallTerminated],
            follow_ups: vec![],
        },
    );
}
