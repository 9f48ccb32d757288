//! In-memory call record store
//!
//! Backs tests and single-process deployments. Guarded updates and slot
//! appends are atomic under one write lock, which gives the same
//! observable guarantees the production store contract requires:
//! precondition-checked writes and loss-free disjoint slot appends.

use super::{
    CallRecordStore, RecordFilter, RecordPatch, StoreCapabilities, StoreEvent, UpdatePrecondition,
};
use crate::errors::{Result, SessionError};
use crate::types::{CallId, CallRecord, CandidateEntry, Party};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// Event channel capacity; stale receivers observe `Lagged` and fall back
/// to polling, which the coordinator already treats as a first-class path.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// In-memory store with broadcast change notifications
pub struct MemoryCallRecordStore {
    records: Arc<RwLock<HashMap<CallId, CallRecord>>>,
    /// Index from callee identity to record ids, for poll queries
    by_callee: Arc<DashMap<String, Vec<CallId>>>,
    events: broadcast::Sender<StoreEvent>,
    capabilities: StoreCapabilities,
}

impl MemoryCallRecordStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            by_callee: Arc::new(DashMap::new()),
            events,
            capabilities: StoreCapabilities::default(),
        }
    }

    /// Store reporting reduced capabilities, for exercising degraded writes
    pub fn with_capabilities(capabilities: StoreCapabilities) -> Self {
        let mut store = Self::new();
        store.capabilities = capabilities;
        store
    }

    fn apply_patch(record: &mut CallRecord, fields: &RecordPatch) {
        if let Some(status) = fields.status {
            record.status = status;
        }
        if let Some(answer) = &fields.answer {
            record.answer = Some(answer.clone());
        }
        if let Some(ended_at) = fields.ended_at {
            record.ended_at = Some(ended_at);
        }
        if let Some(ended_by) = fields.ended_by {
            record.ended_by = Some(ended_by);
        }
        if let Some(reason) = &fields.end_reason {
            record.end_reason = Some(reason.clone());
        }
    }

    fn precondition_holds(record: &CallRecord, precondition: &UpdatePrecondition) -> bool {
        match precondition {
            UpdatePrecondition::None => true,
            UpdatePrecondition::NotEnded => !record.is_terminal(),
            UpdatePrecondition::StatusIs(status) => record.status == *status,
        }
    }
}

impl Default for MemoryCallRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallRecordStore for MemoryCallRecordStore {
    async fn create(&self, record: CallRecord) -> Result<CallId> {
        let id = record.id.clone();
        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(SessionError::store(format!("record {id} already exists")));
        }
        self.by_callee
            .entry(record.callee_id.clone())
            .or_default()
            .push(id.clone());
        records.insert(id.clone(), record.clone());
        info!("created call record {} (status {})", id, record.status);
        // Receivers may not exist yet; that is what the poll path is for
        let _ = self.events.send(StoreEvent::Inserted { record });
        Ok(id)
    }

    async fn read(&self, id: &CallId) -> Result<Option<CallRecord>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn update(
        &self,
        id: &CallId,
        precondition: UpdatePrecondition,
        fields: RecordPatch,
    ) -> Result<bool> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| SessionError::call_not_found(id.0.clone()))?;

        if !Self::precondition_holds(record, &precondition) {
            debug!("guarded update on {} lost: precondition {:?}", id, precondition);
            return Ok(false);
        }

        let previous_status = record.status;
        Self::apply_patch(record, &fields);
        debug!(
            "updated record {}: {} -> {}",
            id, previous_status, record.status
        );
        let _ = self.events.send(StoreEvent::Updated {
            record: record.clone(),
            previous_status,
        });
        Ok(true)
    }

    async fn append_candidates(
        &self,
        id: &CallId,
        party: Party,
        entries: Vec<CandidateEntry>,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| SessionError::call_not_found(id.0.clone()))?;

        let previous_status = record.status;
        record.candidate_slot_mut(party).extend(entries);
        let _ = self.events.send(StoreEvent::Updated {
            record: record.clone(),
            previous_status,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    async fn poll_matching(
        &self,
        filter: &RecordFilter,
        since: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>> {
        let records = self.records.read().await;
        let ids = match self.by_callee.get(&filter.callee_id) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };
        let mut matches: Vec<CallRecord> = ids
            .iter()
            .filter_map(|id| records.get(id))
            .filter(|record| filter.statuses.contains(&record.status))
            .filter(|record| record.created_at >= since)
            .cloned()
            .collect();
        matches.sort_by_key(|record| record.created_at);
        Ok(matches)
    }

    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }
}
