//! Signaling Coordinator
//!
//! Creates and consumes the offer/answer artifacts against the shared call
//! record, enforcing the write-once ordering: the offer exists from record
//! creation, the answer only after the responder consumed the offer.

use crate::adapters::transport::{SetRemoteOutcome, TransportEngine};
use crate::errors::{Result, SessionError};
use crate::state_machine::context::SessionContext;
use crate::store::{CallRecordStore, RecordPatch, UpdatePrecondition};
use crate::types::{CallRecord, CallStatus, CallTarget, Party};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Offer/answer exchange against the call record
pub struct SignalingCoordinator {
    store: Arc<dyn CallRecordStore>,
    transport: Arc<dyn TransportEngine>,
}

impl SignalingCoordinator {
    pub fn new(store: Arc<dyn CallRecordStore>, transport: Arc<dyn TransportEngine>) -> Self {
        Self { store, transport }
    }

    /// Initiator flow: verify outbound tracks, produce the offer, persist
    /// record and offer atomically. There is never a visible ringing record
    /// without an offer.
    pub async fn start_call(
        &self,
        ctx: &mut SessionContext,
        target: CallTarget,
    ) -> Result<CallRecord> {
        if !self.transport.has_outbound_tracks().await {
            return Err(SessionError::NoMediaTracks);
        }

        let offer = self.transport.create_offer().await?;
        let mut record = CallRecord::new_outgoing(
            ctx.local.role,
            ctx.local.identity.clone(),
            target.role,
            target.identity,
            target.recipient_type,
        );
        if !self.store.capabilities().supports_recipient_type {
            // Degraded write mode: drop the disambiguator rather than fail
            warn!("store lacks recipient_type support, writing without it");
            record.recipient_type = None;
        }
        record.offer = Some(offer);

        let id = self.store.create(record.clone()).await?;
        info!("outgoing call {} created for {}", id, record.callee_id);
        ctx.call_id = Some(id);
        ctx.party = Some(Party::Caller);
        Ok(record)
    }

    /// Responder flow: verify outbound tracks, consume the offer, produce
    /// the answer, and persist answer + active status in one guarded write.
    pub async fn answer_call(&self, ctx: &mut SessionContext) -> Result<()> {
        if !self.transport.has_outbound_tracks().await {
            return Err(SessionError::NoMediaTracks);
        }

        let call_id = ctx
            .call_id
            .clone()
            .ok_or_else(|| SessionError::invalid_state("no call bound to this session"))?;
        let record = self
            .store
            .read(&call_id)
            .await?
            .ok_or_else(|| SessionError::call_not_found(call_id.0.clone()))?;

        if record.is_terminal() {
            return Err(SessionError::invalid_state(format!(
                "call {call_id} already terminal ({})",
                record.status
            )));
        }
        let offer = record
            .offer
            .as_ref()
            .ok_or_else(|| SessionError::invalid_state("record has no offer to answer"))?;

        // Offer must be remote before an answer can exist
        self.transport.set_remote_description(offer).await?;
        ctx.remote_description_set = true;

        let answer = self.transport.create_answer(offer).await?;
        let mut patch = RecordPatch::status(CallStatus::Active);
        patch.answer = Some(answer);

        let applied = self
            .store
            .update(&call_id, UpdatePrecondition::NotEnded, patch)
            .await?;
        if !applied {
            // The record went terminal while the accept was in flight
            return Err(SessionError::invalid_state(format!(
                "call {call_id} ended before the answer was persisted"
            )));
        }
        ctx.party = Some(Party::Callee);
        info!("answered call {}", call_id);
        Ok(())
    }

    /// Initiator-side answer consumption. Safe to run any number of times
    /// for the same fact: once a remote description is set, repeated
    /// observations are skipped silently.
    pub async fn consume_remote_answer(&self, ctx: &mut SessionContext) -> Result<()> {
        if ctx.remote_description_set {
            debug!("remote description already set, skipping answer consumption");
            return Ok(());
        }
        let call_id = ctx
            .call_id
            .clone()
            .ok_or_else(|| SessionError::invalid_state("no call bound to this session"))?;
        let record = self
            .store
            .read(&call_id)
            .await?
            .ok_or_else(|| SessionError::call_not_found(call_id.0.clone()))?;

        let answer = match &record.answer {
            Some(answer) => answer,
            None => {
                debug!("call {} has no answer yet", call_id);
                return Ok(());
            }
        };

        match self.transport.set_remote_description(answer).await? {
            SetRemoteOutcome::Applied => {
                info!("remote answer applied for call {}", call_id);
            }
            SetRemoteOutcome::AlreadySet => {
                debug!("transport already had a remote description");
            }
        }
        ctx.remote_description_set = true;
        Ok(())
    }
}
