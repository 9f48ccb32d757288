//! Termination Coordinator
//!
//! Idempotent end-of-call writes. Any number of concurrent terminators
//! produce exactly one terminal record state; losing the guarded-update
//! race is success, not an error.

use crate::errors::{Result, SessionError};
use crate::store::{CallRecordStore, RecordPatch, UpdatePrecondition};
use crate::types::{CallId, CallRecord, CallStatus, EndReason, Role};
use std::sync::Arc;
use tracing::{debug, info};

/// Writes the terminal state of call records
pub struct TerminationCoordinator {
    store: Arc<dyn CallRecordStore>,
}

impl TerminationCoordinator {
    pub fn new(store: Arc<dyn CallRecordStore>) -> Self {
        Self { store }
    }

    /// End a call with `status = ended`
    pub async fn end_call(
        &self,
        id: &CallId,
        actor_role: Role,
        reason: EndReason,
    ) -> Result<CallRecord> {
        self.end_call_with_status(id, CallStatus::Ended, actor_role, reason)
            .await
    }

    /// End a call with an explicit terminal status (`ended`, `rejected` or
    /// `missed`).
    ///
    /// Reads first: an already-terminal record is returned unchanged with
    /// no write. Otherwise a guarded update races any concurrent
    /// terminator; whichever side loses re-reads and returns the winning
    /// terminal record.
    pub async fn end_call_with_status(
        &self,
        id: &CallId,
        status: CallStatus,
        actor_role: Role,
        reason: EndReason,
    ) -> Result<CallRecord> {
        debug_assert!(status.is_terminal());
        if !reason.is_valid() {
            return Err(SessionError::invalid_state("empty end reason"));
        }

        let record = self
            .store
            .read(id)
            .await?
            .ok_or_else(|| SessionError::call_not_found(id.0.clone()))?;
        if record.is_terminal() {
            debug!("call {} already terminal ({}), no write", id, record.status);
            return Ok(record);
        }

        let patch = RecordPatch::terminal(status, actor_role, reason);
        let patch = if self.store.capabilities().supports_termination_metadata {
            patch
        } else {
            patch.minimal()
        };

        let applied = self
            .store
            .update(id, UpdatePrecondition::NotEnded, patch)
            .await?;
        if applied {
            info!("call {} ended by {} ({})", id, actor_role, status);
        } else {
            debug!("lost termination race for {}, re-reading", id);
        }

        // Either our write or the concurrent winner's; both are terminal
        self.store
            .read(id)
            .await?
            .ok_or_else(|| SessionError::call_not_found(id.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCallRecordStore;
    use crate::types::{CallRecord, SignalBlob};

    fn test_record() -> CallRecord {
        let mut record = CallRecord::new_outgoing(
            Role::Parent,
            "parent-1",
            Role::Child,
            "child-1",
            None,
        );
        record.offer = Some(SignalBlob::new("offer"));
        record
    }

    #[tokio::test]
    async fn second_end_returns_unchanged_record() {
        let store = Arc::new(MemoryCallRecordStore::new());
        let coordinator = TerminationCoordinator::new(store.clone());
        let id = store.create(test_record()).await.unwrap();

        let first = coordinator
            .end_call(&id, Role::Parent, EndReason::Hangup)
            .await
            .unwrap();
        let second = coordinator
            .end_call(&id, Role::Child, EndReason::Declined)
            .await
            .unwrap();

        assert_eq!(first.status, CallStatus::Ended);
        assert_eq!(second.ended_by, Some(Role::Parent));
        assert_eq!(second.end_reason, Some(EndReason::Hangup));
        assert_eq!(first.ended_at, second.ended_at);
    }

    #[tokio::test]
    async fn concurrent_ends_write_once() {
        let store = Arc::new(MemoryCallRecordStore::new());
        let id = store.create(test_record()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let coordinator = TerminationCoordinator::new(store);
                let role = if i % 2 == 0 { Role::Parent } else { Role::Child };
                coordinator.end_call(&id, role, EndReason::Hangup).await
            }));
        }

        let mut ended_at = None;
        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            assert_eq!(record.status, CallStatus::Ended);
            let at = record.ended_at.expect("terminal record has ended_at");
            match ended_at {
                None => ended_at = Some(at),
                Some(seen) => assert_eq!(seen, at, "ended_at must be set exactly once"),
            }
        }
    }

    #[tokio::test]
    async fn empty_reason_is_rejected() {
        let store = Arc::new(MemoryCallRecordStore::new());
        let coordinator = TerminationCoordinator::new(store.clone());
        let id = store.create(test_record()).await.unwrap();
        let result = coordinator
            .end_call(&id, Role::Parent, EndReason::Other(String::new()))
            .await;
        assert!(matches!(result, Err(SessionError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn degraded_store_gets_minimal_terminal_patch() {
        let store = Arc::new(MemoryCallRecordStore::with_capabilities(
            crate::store::StoreCapabilities {
                supports_recipient_type: true,
                supports_termination_metadata: false,
            },
        ));
        let coordinator = TerminationCoordinator::new(store.clone());
        let id = store.create(test_record()).await.unwrap();

        let record = coordinator
            .end_call(&id, Role::Parent, EndReason::Hangup)
            .await
            .unwrap();
        assert_eq!(record.status, CallStatus::Ended);
        assert!(record.ended_at.is_some());
        // Metadata deliberately omitted in degraded mode
        assert_eq!(record.ended_by, None);
        assert_eq!(record.end_reason, None);
    }
}
