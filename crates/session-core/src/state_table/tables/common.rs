//! Transitions shared by caller and callee

use crate::state_table::builder::StateTableBuilder;
use crate::state_table::types::{
    placeholders, Action, ConditionUpdates, Emit, Event, Guard, Transition,
};
use crate::types::{CallStatus, EndReason, SessionState};

const NON_TERMINAL_STATES: &[SessionState] = &[
    SessionState::Idle,
    SessionState::Outgoing,
    SessionState::Incoming,
    SessionState::Connecting,
    SessionState::InCall,
];

/// Add transitions that apply to both parties
pub fn add_common_transitions(builder: &mut StateTableBuilder) {
    // Any non-terminal state -> Ended: local end. Idempotent - once Ended
    // there is no entry, so a second end_call is a no-op.
    for &state in NON_TERMINAL_STATES {
        builder.add_for_both(
            state,
            placeholders::end_call(),
            Transition {
                guards: vec![],
                actions: vec![
                    Action::WriteTermination {
                        status: CallStatus::Ended,
                        reason: None, // taken from the event
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

    // Any non-terminal state -> Ended: the peer terminated. Teardown only,
    // no write-back to the record.
    for &state in &NON_TERMINAL_STATES[1..] {
        builder.add_for_both(
            state,
            placeholders::remote_termination_observed(),
            Transition {
                guards: vec![],
                actions: vec![Action::Teardown, Action::ClearIncoming],
                next_state: Some(SessionState::Ended),
                condition_updates: ConditionUpdates::none(),
                publish: vec![Emit::StateChanged, Emit::CallTerminated],
                follow_ups: vec![],
            },
        );

        // Transport failure is authoritative: end with network_lost
        builder.add_for_both(
            state,
            Event::TransportFailed,
            Transition {
                guards: vec![],
                actions: vec![
                    Action::WriteTermination {
                        status: CallStatus::Ended,
                        reason: Some(EndReason::NetworkLost),
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

    // Transport and media readiness arrive in any order, possibly before
    // the session reaches Connecting. Each occurrence updates its flag and
    // re-checks; the check only fires a transition in Connecting.
    for &state in &[
        SessionState::Outgoing,
        SessionState::Incoming,
        SessionState::Connecting,
    ] {
        builder.add_for_both(
            state,
            Event::TransportConnected,
            Transition {
                guards: vec![],
                actions: vec![],
                next_state: None,
                condition_updates: ConditionUpdates::set_transport_connected(true),
                publish: vec![],
                follow_ups: vec![Event::CheckEstablished],
            },
        );
        builder.add_for_both(
            state,
            Event::RemoteMediaArrived,
            Transition {
                guards: vec![],
                actions: vec![],
                next_state: None,
                condition_updates: ConditionUpdates::set_remote_media(true),
                publish: vec![],
                follow_ups: vec![Event::CheckEstablished],
            },
        );
    }

    // Connecting -> InCall: both conditions met
    builder.add_for_both(
        SessionState::Connecting,
        Event::CheckEstablished,
        Transition {
            guards: vec![Guard::AllEstablishConditions],
            actions: vec![],
            next_state: Some(SessionState::InCall),
            condition_updates: ConditionUpdates::none(),
            publish: vec![Emit::StateChanged, Emit::CallEstablished],
            follow_ups: vec![],
        },
    );

    // Connecting -> Ended: never reached transport-connected in time
    builder.add_for_both(
        SessionState::Connecting,
        placeholders::connect_timeout(),
        Transition {
            guards: vec![],
            actions: vec![
                Action::WriteTermination {
                    status: CallStatus::Ended,
                    reason: Some(EndReason::Failed),
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
