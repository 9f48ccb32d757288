//! Incoming-call filter pipeline
//!
//! Applied identically to candidates from all three sources, in order:
//! recipient identity, recipient type (authoritative over the legacy role
//! field), no self-notification, qualifying status with idempotent
//! promotion, and suppression while an active call screen is up.

use super::normalizer::RingCandidate;
use crate::errors::Result;
use crate::store::{CallRecordStore, RecordPatch, UpdatePrecondition};
use crate::types::{CallRecord, CallStatus, LocalEndpoint};
use std::sync::Arc;
use tracing::{debug, trace};

/// Role/recipient filter for one endpoint
pub struct IncomingCallFilter {
    store: Arc<dyn CallRecordStore>,
    local: LocalEndpoint,
}

impl IncomingCallFilter {
    pub fn new(store: Arc<dyn CallRecordStore>, local: LocalEndpoint) -> Self {
        Self { store, local }
    }

    /// Run the pipeline. Returns the (possibly promoted) record when it
    /// qualifies as an incoming call for this endpoint.
    pub async fn qualify(
        &self,
        candidate: RingCandidate,
        on_call_screen: bool,
    ) -> Result<Option<CallRecord>> {
        let mut record = candidate.record;

        // Suppressed entirely while an active call screen is up
        if on_call_screen {
            trace!("suppressing {} candidate: on call screen", candidate.source);
            return Ok(None);
        }

        // Recipient identity must match the role-specific field
        if record.callee_id != self.local.identity {
            return Ok(None);
        }

        // recipient_type wins over the legacy callee_role hint, which can
        // overlap across adult roles
        let targeted_role = record.recipient_type.unwrap_or(record.callee_role);
        if targeted_role != self.local.role {
            debug!(
                "dropping {}: targets {} not {}",
                record.id, targeted_role, self.local.role
            );
            return Ok(None);
        }

        // No self-notification
        if record.caller_role == self.local.role {
            return Ok(None);
        }

        match record.status {
            CallStatus::Ringing => {}
            CallStatus::Initiating => {
                if !self.promote_to_ringing(&mut record).await? {
                    return Ok(None);
                }
            }
            _ => return Ok(None),
        }

        debug!(
            "incoming call {} qualified via {}",
            record.id, candidate.source
        );
        Ok(Some(record))
    }

    /// Promote `initiating` to `ringing` with one guarded update. Losing
    /// the race is fine when another detector promoted first, but the race
    /// may also be lost to a terminator, so a lost update re-reads and only
    /// qualifies when the record actually rings.
    async fn promote_to_ringing(&self, record: &mut CallRecord) -> Result<bool> {
        let applied = self
            .store
            .update(
                &record.id,
                UpdatePrecondition::StatusIs(CallStatus::Initiating),
                RecordPatch::status(CallStatus::Ringing),
            )
            .await?;
        if applied {
            record.status = CallStatus::Ringing;
            return Ok(true);
        }
        trace!("promotion of {} lost the race, re-reading", record.id);
        match self.store.read(&record.id).await? {
            Some(current) if current.status == CallStatus::Ringing => {
                *record = current;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
