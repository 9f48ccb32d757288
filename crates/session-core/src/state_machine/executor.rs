//! State machine executor
//!
//! Looks up the transition for (party, state, event), checks its guards,
//! runs its actions, applies the state change and publishes session
//! events. Events with no matching transition are ignored - that is what
//! makes duplicate and stale deliveries safe.

use super::actions::execute_action;
use super::context::SessionContext;
use crate::adapters::transport::TransportEngine;
use crate::candidates::CandidateExchange;
use crate::detector::DetectorContext;
use crate::errors::Result;
use crate::signaling::SignalingCoordinator;
use crate::state_table::{Event, Guard, StateKey, StateTable, Transition};
use crate::termination::TerminationCoordinator;
use crate::types::{Party, SessionEvent, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

/// Timing knobs the executor needs for its timer actions
#[derive(Debug, Clone, Copy)]
pub struct TimerConfig {
    pub ring_timeout: Duration,
    pub connect_timeout: Duration,
}

/// Result of processing one event
#[derive(Debug, Clone)]
pub struct ProcessEventResult {
    pub transitioned: bool,
    pub old_state: SessionState,
    pub new_state: SessionState,
}

impl ProcessEventResult {
    fn unchanged(state: SessionState) -> Self {
        Self {
            transitioned: false,
            old_state: state,
            new_state: state,
        }
    }
}

/// Drives one session through the transition table
pub struct StateMachine {
    table: StateTable,
    pub(crate) signaling: SignalingCoordinator,
    pub(crate) termination: TerminationCoordinator,
    pub(crate) transport: Arc<dyn TransportEngine>,
    pub(crate) timers: TimerConfig,
    /// Internal events loop back through the coordinator queue
    pub(crate) internal_tx: mpsc::Sender<Event>,
    /// Session events for UI consumers
    pub(crate) events_tx: broadcast::Sender<SessionEvent>,
}

impl StateMachine {
    pub fn new(
        table: StateTable,
        signaling: SignalingCoordinator,
        termination: TerminationCoordinator,
        transport: Arc<dyn TransportEngine>,
        timers: TimerConfig,
        internal_tx: mpsc::Sender<Event>,
        events_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            table,
            signaling,
            termination,
            transport,
            timers,
            internal_tx,
            events_tx,
        }
    }

    /// Process one event against the session context
    pub async fn process_event(
        &self,
        ctx: &mut SessionContext,
        exchange: &mut CandidateExchange,
        detector: &mut DetectorContext,
        event: Event,
    ) -> Result<ProcessEventResult> {
        let party = self.effective_party(ctx, &event);
        let key = StateKey {
            party,
            state: ctx.state,
            event: event.clone(),
        };

        let transition = match self.table.get(&key) {
            Some(transition) => transition.clone(),
            None => {
                debug!(
                    "no transition for {} in {} ({}), ignoring",
                    event.kind_name(),
                    ctx.state,
                    party
                );
                return Ok(ProcessEventResult::unchanged(ctx.state));
            }
        };

        if !self.guards_hold(ctx, &transition) {
            debug!(
                "guards not met for {} in {}, holding",
                event.kind_name(),
                ctx.state
            );
            return Ok(ProcessEventResult::unchanged(ctx.state));
        }

        self.stash_payload(ctx, &event);

        if let Some(connected) = transition.condition_updates.transport_connected {
            ctx.transport_connected = connected;
        }
        if let Some(media) = transition.condition_updates.remote_media {
            ctx.remote_media = media;
        }

        for action in &transition.actions {
            execute_action(self, action, ctx, exchange, detector).await?;
        }

        let old_state = ctx.state;
        if let Some(next) = transition.next_state {
            ctx.state = next;
            info!(
                "session transition {} -> {} on {}",
                old_state,
                next,
                event.kind_name()
            );
        }

        self.publish(ctx, &transition);

        for follow_up in transition.follow_ups {
            // Queue full means the loop is already saturated with events;
            // the periodic poll re-derives anything dropped here
            let _ = self.internal_tx.try_send(follow_up);
        }

        Ok(ProcessEventResult {
            transitioned: transition.next_state.is_some(),
            old_state,
            new_state: ctx.state,
        })
    }

    /// Which side's table to consult. Before the session commits to a
    /// side, pre-call events imply it; shared transitions are registered
    /// for both parties, so the default is arbitrary.
    fn effective_party(&self, ctx: &SessionContext, event: &Event) -> Party {
        ctx.party
            .or_else(|| event.implied_party())
            .unwrap_or(Party::Caller)
    }

    fn guards_hold(&self, ctx: &SessionContext, transition: &Transition) -> bool {
        transition.guards.iter().all(|guard| match guard {
            Guard::AllEstablishConditions => ctx.establish_conditions_met(),
            Guard::HasRemoteDescription => ctx.remote_description_set,
        })
    }

    /// Move event payloads into the context for actions to consume
    fn stash_payload(&self, ctx: &mut SessionContext, event: &Event) {
        match event {
            Event::StartOutgoingCall { target } => {
                ctx.pending_target = target.0.clone();
            }
            Event::EndCall { reason } => {
                ctx.pending_end_reason = reason.0.clone();
            }
            Event::IncomingCallDetected { call_id } => {
                if let Some(id) = &call_id.0 {
                    ctx.call_id = Some(id.clone());
                    ctx.party = Some(Party::Callee);
                }
            }
            _ => {}
        }
    }

    fn publish(&self, ctx: &SessionContext, transition: &Transition) {
        use crate::state_table::Emit;
        for emit in &transition.publish {
            let event = match emit {
                Emit::StateChanged => SessionEvent::StateChanged {
                    state: ctx.state,
                    call_id: ctx.call_id.clone(),
                    remote_media_present: ctx.remote_media,
                },
                Emit::IncomingSurfaced => match &ctx.incoming_record {
                    Some(record) => SessionEvent::IncomingCall {
                        call_id: record.id.clone(),
                        caller_id: record.caller_id.clone(),
                        caller_role: record.caller_role,
                    },
                    None => continue,
                },
                Emit::CallEstablished => match &ctx.call_id {
                    Some(id) => SessionEvent::CallEstablished {
                        call_id: id.clone(),
                    },
                    None => continue,
                },
                Emit::CallTerminated => SessionEvent::CallTerminated {
                    call_id: ctx.call_id.clone(),
                    reason: ctx.pending_end_reason.clone(),
                },
            };
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }
    }
}
