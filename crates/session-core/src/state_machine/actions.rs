//! Action interpreter
//!
//! Executes the actions named by a transition against the signaling,
//! candidate and termination components.

use super::context::SessionContext;
use super::executor::StateMachine;
use crate::candidates::CandidateExchange;
use crate::detector::DetectorContext;
use crate::errors::{Result, SessionError};
use crate::state_table::{Action, Event};
use crate::types::{EndReason, SessionEvent};
use tracing::{debug, warn};

/// Execute one action from the state table
pub async fn execute_action(
    machine: &StateMachine,
    action: &Action,
    ctx: &mut SessionContext,
    exchange: &mut CandidateExchange,
    detector: &mut DetectorContext,
) -> Result<()> {
    debug!("executing action {:?}", action);

    match action {
        Action::CreateRecordWithOffer => {
            let target = ctx
                .pending_target
                .take()
                .ok_or_else(|| SessionError::invalid_state("no call target staged"))?;
            machine.signaling.start_call(ctx, target).await?;
        }

        Action::ConsumeOfferProduceAnswer => {
            machine.signaling.answer_call(ctx).await?;
        }

        Action::ConsumeRemoteAnswer => {
            machine.signaling.consume_remote_answer(ctx).await?;
        }

        Action::FlushCandidateBuffer => {
            exchange.flush(ctx).await?;
        }

        Action::WriteTermination { status, reason } => {
            let reason = reason
                .clone()
                .or_else(|| ctx.pending_end_reason.clone())
                .unwrap_or(EndReason::Hangup);
            ctx.pending_end_reason = Some(reason.clone());
            if let Some(call_id) = ctx.call_id.clone() {
                // A failed terminal write is not surfaced: the peer's own
                // disconnect detection is the backstop, and the local
                // session ends either way
                match machine
                    .termination
                    .end_call_with_status(&call_id, *status, ctx.local.role, reason)
                    .await
                {
                    Ok(_) => ctx.ended_locally = true,
                    Err(err) => {
                        warn!("termination write for {} failed: {}", call_id, err);
                    }
                }
            }
        }

        Action::Teardown => {
            if ctx.teardown_done {
                debug!("teardown already done, skipping");
            } else {
                machine.transport.teardown().await;
                ctx.teardown_done = true;
            }
        }

        Action::ClearIncoming => {
            if let Some(cleared) = detector.clear_displayed() {
                let _ = machine
                    .events_tx
                    .send(SessionEvent::IncomingCleared { call_id: cleared });
            }
        }

        Action::StartRingTimer => {
            if let Some(call_id) = ctx.call_id.clone() {
                let tx = machine.internal_tx.clone();
                let window = machine.timers.ring_timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    // Stale expiry finds no transition and is ignored
                    let _ = tx.send(Event::ring_timeout(call_id)).await;
                });
            }
        }

        Action::StartConnectTimer => {
            if let Some(call_id) = ctx.call_id.clone() {
                let tx = machine.internal_tx.clone();
                let window = machine.timers.connect_timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    let _ = tx.send(Event::connect_timeout(call_id)).await;
                });
            }
        }
    }

    Ok(())
}
