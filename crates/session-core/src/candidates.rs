//! Candidate Exchange
//!
//! Each party writes only its own append-only slot on the record and reads
//! the other party's slot. Candidates seen before the transport has a
//! remote description are buffered in order and drained on flush; after
//! the flush they are applied directly. Duplicate rejections from the
//! transport are swallowed; other application errors are logged and do not
//! abort the session.

use crate::adapters::transport::{AddCandidateOutcome, TransportEngine};
use crate::errors::{Result, SessionError};
use crate::state_machine::context::SessionContext;
use crate::store::CallRecordStore;
use crate::types::{CallRecord, CandidateEntry};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// A candidate waiting for the remote description
#[derive(Debug, Clone)]
enum Buffered {
    /// Locally generated, pending write to our slot
    Local(CandidateEntry),
    /// Observed in the remote slot, pending application to the transport
    Remote(CandidateEntry),
}

/// Per-session candidate routing state
pub struct CandidateExchange {
    store: Arc<dyn CallRecordStore>,
    transport: Arc<dyn TransportEngine>,
    /// Ordered pre-flush buffer
    buffer: VecDeque<Buffered>,
    /// How many entries of the remote slot have been consumed; re-delivered
    /// updates only yield the tail past this cursor
    remote_cursor: usize,
    flushed: bool,
}

impl CandidateExchange {
    pub fn new(store: Arc<dyn CallRecordStore>, transport: Arc<dyn TransportEngine>) -> Self {
        Self {
            store,
            transport,
            buffer: VecDeque::new(),
            remote_cursor: 0,
            flushed: false,
        }
    }

    /// Handle a locally generated candidate: buffered until the flush,
    /// afterwards appended straight to our slot.
    pub async fn on_local_candidate(
        &mut self,
        ctx: &SessionContext,
        entry: CandidateEntry,
    ) -> Result<()> {
        if !self.flushed {
            debug!("buffering local candidate");
            self.buffer.push_back(Buffered::Local(entry));
            return Ok(());
        }
        self.append_own(ctx, vec![entry]).await
    }

    /// Handle an observed record update: diff the remote slot against the
    /// cursor and route any new entries. Safe against re-delivery.
    pub async fn on_record_update(
        &mut self,
        ctx: &SessionContext,
        record: &CallRecord,
    ) -> Result<()> {
        let own_party = match ctx.party {
            Some(party) => party,
            None => return Ok(()),
        };
        let remote_slot = record.candidate_slot(own_party.other());
        if remote_slot.len() <= self.remote_cursor {
            return Ok(());
        }
        let fresh: Vec<CandidateEntry> = remote_slot[self.remote_cursor..].to_vec();
        self.remote_cursor = remote_slot.len();

        for entry in fresh {
            if self.flushed {
                self.apply(&entry).await;
            } else {
                debug!("buffering remote candidate");
                self.buffer.push_back(Buffered::Remote(entry));
            }
        }
        Ok(())
    }

    /// Drain the buffer in original order. Called once the remote
    /// description is set; idempotent thereafter.
    pub async fn flush(&mut self, ctx: &SessionContext) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        debug!("flushing {} buffered candidates", self.buffer.len());

        let mut own_batch = Vec::new();
        while let Some(buffered) = self.buffer.pop_front() {
            match buffered {
                Buffered::Local(entry) => own_batch.push(entry),
                Buffered::Remote(entry) => {
                    // Preserve slot order: pending own entries first
                    if !own_batch.is_empty() {
                        self.append_own(ctx, std::mem::take(&mut own_batch)).await?;
                    }
                    self.apply(&entry).await;
                }
            }
        }
        if !own_batch.is_empty() {
            self.append_own(ctx, own_batch).await?;
        }
        Ok(())
    }

    async fn append_own(&self, ctx: &SessionContext, entries: Vec<CandidateEntry>) -> Result<()> {
        let (call_id, party) = match (&ctx.call_id, ctx.party) {
            (Some(id), Some(party)) => (id, party),
            _ => return Ok(()),
        };
        if let Err(err) = self.store.append_candidates(call_id, party, entries).await {
            // Non-fatal: the transport's connection monitoring is the
            // authoritative failure signal
            warn!("candidate append failed for {}: {}", call_id, err);
        }
        Ok(())
    }

    async fn apply(&self, entry: &CandidateEntry) {
        match self.transport.add_candidate(entry).await {
            Ok(AddCandidateOutcome::Applied) => {}
            Ok(AddCandidateOutcome::Duplicate) => {
                debug!("duplicate candidate swallowed");
            }
            Err(SessionError::CandidateRejected { detail }) => {
                warn!("candidate rejected by transport: {detail}");
            }
            Err(err) => {
                warn!("candidate application failed: {}", err);
            }
        }
    }

    /// Number of candidates currently buffered
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer has been flushed
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }
}
