//! Shared test fixtures: a scriptable transport engine and two-endpoint
//! setup helpers.
#![allow(dead_code)]

use famcall_session_core::adapters::roles::StaticRoleResolver;
use famcall_session_core::adapters::transport::{
    AddCandidateOutcome, ConnectionState, SetRemoteOutcome, TransportEngine,
};
use famcall_session_core::config::CoordinatorConfig;
use famcall_session_core::coordinator::SessionCoordinator;
use famcall_session_core::errors::{Result, SessionError};
use famcall_session_core::store::MemoryCallRecordStore;
use famcall_session_core::types::{CandidateEntry, Role, SessionEvent, SignalBlob};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

/// Transport double driven explicitly by the test
pub struct MockTransport {
    label: String,
    has_tracks: AtomicBool,
    reject_candidates: AtomicBool,
    remote_description: Mutex<Option<SignalBlob>>,
    applied_candidates: Mutex<Vec<CandidateEntry>>,
    conn_tx: watch::Sender<ConnectionState>,
    media_tx: watch::Sender<bool>,
    local_tx: mpsc::Sender<CandidateEntry>,
    local_rx: Mutex<Option<mpsc::Receiver<CandidateEntry>>>,
    teardowns: AtomicUsize,
}

impl MockTransport {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        let (conn_tx, _) = watch::channel(ConnectionState::New);
        let (media_tx, _) = watch::channel(false);
        let (local_tx, local_rx) = mpsc::channel(32);
        Arc::new(Self {
            label: label.into(),
            has_tracks: AtomicBool::new(true),
            reject_candidates: AtomicBool::new(false),
            remote_description: Mutex::new(None),
            applied_candidates: Mutex::new(Vec::new()),
            conn_tx,
            media_tx,
            local_tx,
            local_rx: Mutex::new(Some(local_rx)),
            teardowns: AtomicUsize::new(0),
        })
    }

    pub fn drop_tracks(&self) {
        self.has_tracks.store(false, Ordering::SeqCst);
    }

    /// Make `add_candidate` fail with `CandidateRejected` from now on
    pub fn reject_candidates(&self) {
        self.reject_candidates.store(true, Ordering::SeqCst);
    }

    pub fn set_connected(&self) {
        let _ = self.conn_tx.send(ConnectionState::Connected);
    }

    pub fn fail_connection(&self) {
        let _ = self.conn_tx.send(ConnectionState::Failed);
    }

    pub fn arrive_remote_media(&self) {
        let _ = self.media_tx.send(true);
    }

    /// Emit a locally gathered candidate into the coordinator
    pub async fn emit_local_candidate(&self, payload: &str) {
        self.local_tx
            .send(CandidateEntry::new(payload))
            .await
            .expect("coordinator holds the receiver");
    }

    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub fn remote_description(&self) -> Option<SignalBlob> {
        self.remote_description.lock().unwrap().clone()
    }

    pub fn applied_candidates(&self) -> Vec<CandidateEntry> {
        self.applied_candidates.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportEngine for MockTransport {
    async fn has_outbound_tracks(&self) -> bool {
        self.has_tracks.load(Ordering::SeqCst)
    }

    async fn create_offer(&self) -> Result<SignalBlob> {
        Ok(SignalBlob::new(format!("{}-offer", self.label)))
    }

    async fn create_answer(&self, remote_offer: &SignalBlob) -> Result<SignalBlob> {
        Ok(SignalBlob::new(format!(
            "{}-answer-to-{}",
            self.label, remote_offer.0
        )))
    }

    async fn set_remote_description(&self, blob: &SignalBlob) -> Result<SetRemoteOutcome> {
        let mut slot = self.remote_description.lock().unwrap();
        if slot.is_some() {
            return Ok(SetRemoteOutcome::AlreadySet);
        }
        *slot = Some(blob.clone());
        Ok(SetRemoteOutcome::Applied)
    }

    async fn add_candidate(&self, entry: &CandidateEntry) -> Result<AddCandidateOutcome> {
        if self.reject_candidates.load(Ordering::SeqCst) {
            return Err(SessionError::CandidateRejected {
                detail: format!("{} refuses {}", self.label, entry.payload),
            });
        }
        let mut applied = self.applied_candidates.lock().unwrap();
        if applied.iter().any(|seen| seen == entry) {
            return Ok(AddCandidateOutcome::Duplicate);
        }
        applied.push(entry.clone());
        Ok(AddCandidateOutcome::Applied)
    }

    fn connection_states(&self) -> watch::Receiver<ConnectionState> {
        self.conn_tx.subscribe()
    }

    fn remote_media_present(&self) -> bool {
        *self.media_tx.borrow()
    }

    fn remote_media_states(&self) -> watch::Receiver<bool> {
        self.media_tx.subscribe()
    }

    fn take_local_candidates(&self) -> Option<mpsc::Receiver<CandidateEntry>> {
        self.local_rx.lock().unwrap().take()
    }

    async fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        let _ = self.conn_tx.send(ConnectionState::Closed);
    }
}

/// Config with timing tightened so tests run fast
pub fn fast_config(identity: &str, role: Role) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::new(identity, role);
    config.poll_interval = Duration::from_millis(50);
    config.grace_window = Duration::from_millis(100);
    config.ring_timeout = Duration::from_secs(5);
    config.connect_timeout = Duration::from_secs(5);
    config
}

/// Resolver knowing the standard family of the tests
pub fn family_resolver() -> Arc<StaticRoleResolver> {
    Arc::new(
        StaticRoleResolver::new()
            .with_role("parent-1", Role::Parent)
            .with_role("child-1", Role::Child)
            .with_role("aunt-1", Role::FamilyMember),
    )
}

/// One endpoint under test
pub struct Endpoint {
    pub coordinator: Arc<SessionCoordinator>,
    pub transport: Arc<MockTransport>,
    pub events: broadcast::Receiver<SessionEvent>,
}

pub fn endpoint(
    store: &Arc<MemoryCallRecordStore>,
    identity: &str,
    role: Role,
) -> Endpoint {
    let config = fast_config(identity, role);
    endpoint_with(store, config)
}

pub fn endpoint_with(store: &Arc<MemoryCallRecordStore>, config: CoordinatorConfig) -> Endpoint {
    init_tracing();
    let transport = MockTransport::new(config.local_identity.clone());
    let coordinator = SessionCoordinator::new(
        config,
        store.clone(),
        transport.clone(),
        family_resolver(),
    );
    let events = coordinator.events();
    Endpoint {
        coordinator,
        transport,
        events,
    }
}

/// Install the test subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait for the first event matching `predicate`, failing after 2 seconds
pub async fn expect_event<F>(
    events: &mut broadcast::Receiver<SessionEvent>,
    what: &str,
    mut predicate: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    let deadline = Duration::from_secs(2);
    tokio::time::timeout(deadline, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(err) => panic!("event stream closed waiting for {what}: {err}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}
