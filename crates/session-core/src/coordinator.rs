//! Session Coordinator
//!
//! The top-level orchestrator: owns the session state machine and runs one
//! logical event loop over user commands, store notifications, poll ticks,
//! transport signals and timer expiries. No handler blocks the loop, and
//! every handler is safe to run for duplicate or stale deliveries of the
//! same fact.

use crate::adapters::roles::{resolve_or_default, RoleResolver};
use crate::adapters::transport::{ConnectionState, TransportEngine};
use crate::candidates::CandidateExchange;
use crate::config::CoordinatorConfig;
use crate::detector::{normalizer, DetectorContext, IncomingCallFilter, RingCandidate};
use crate::errors::{Result, SessionError};
use crate::signaling::SignalingCoordinator;
use crate::state_machine::executor::TimerConfig;
use crate::state_machine::{SessionContext, StateMachine};
use crate::state_table::{standard_table, Event};
use crate::store::{CallRecordStore, RecordFilter, StoreEvent};
use crate::termination::TerminationCoordinator;
use crate::types::{
    CallId, CallRecord, CallStatus, CallTarget, CandidateEntry, EndReason, SessionEvent,
    SessionState,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// User commands handled by the coordinator loop
enum Command {
    StartOutgoing {
        target_identity: String,
        reply: oneshot::Sender<Result<CallId>>,
    },
    Accept {
        call_id: CallId,
        reply: oneshot::Sender<Result<()>>,
    },
    Reject {
        call_id: CallId,
        reply: oneshot::Sender<Result<()>>,
    },
    End {
        reason: EndReason,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Public handle to one call session coordinator.
///
/// One instance covers one session lifecycle; after `ended`, callers
/// create a fresh instance (the moral equivalent of navigating away and
/// back).
pub struct SessionCoordinator {
    command_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<SessionEvent>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionCoordinator {
    /// Create a coordinator and start its event loop
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn CallRecordStore>,
        transport: Arc<dyn TransportEngine>,
        resolver: Arc<dyn RoleResolver>,
    ) -> Arc<Self> {
        let (command_tx, command_rx) = mpsc::channel(config.channel_capacity);
        let (internal_tx, internal_rx) = mpsc::channel(config.channel_capacity);
        let (events_tx, _) = broadcast::channel(config.channel_capacity);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let local = config.local_endpoint();
        let machine = StateMachine::new(
            standard_table(),
            SignalingCoordinator::new(store.clone(), transport.clone()),
            TerminationCoordinator::new(store.clone()),
            transport.clone(),
            TimerConfig {
                ring_timeout: config.ring_timeout,
                connect_timeout: config.connect_timeout,
            },
            internal_tx,
            events_tx.clone(),
        );

        let loop_state = CoordinatorLoop {
            config,
            store: store.clone(),
            transport: transport.clone(),
            resolver,
            machine,
            filter: IncomingCallFilter::new(store.clone(), local.clone()),
            ctx: SessionContext::new(local),
            exchange: CandidateExchange::new(store, transport.clone()),
            detector: DetectorContext::new(),
            events_tx: events_tx.clone(),
            state_tx,
        };

        tokio::spawn(loop_state.run(command_rx, internal_rx));

        Arc::new(Self {
            command_tx,
            events_tx,
            state_rx,
        })
    }

    /// Start an outgoing call to `target_identity`
    pub async fn start_outgoing_call(&self, target_identity: impl Into<String>) -> Result<CallId> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::StartOutgoing {
            target_identity: target_identity.into(),
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| SessionError::internal("coordinator loop gone"))?
    }

    /// Accept the currently displayed incoming call
    pub async fn accept_incoming_call(&self, call_id: CallId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Accept { call_id, reply }).await?;
        rx.await
            .map_err(|_| SessionError::internal("coordinator loop gone"))?
    }

    /// Decline the currently displayed incoming call
    pub async fn reject_incoming_call(&self, call_id: CallId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reject { call_id, reply }).await?;
        rx.await
            .map_err(|_| SessionError::internal("coordinator loop gone"))?
    }

    /// End the current call. Idempotent - ending twice is not an error.
    pub async fn end_call(&self, reason: EndReason) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::End { reason, reply }).await?;
        rx.await
            .map_err(|_| SessionError::internal("coordinator loop gone"))?
    }

    /// Subscribe to session events
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch session state changes
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::internal("coordinator loop gone"))
    }
}

/// State owned by the event loop task
struct CoordinatorLoop {
    config: CoordinatorConfig,
    store: Arc<dyn CallRecordStore>,
    transport: Arc<dyn TransportEngine>,
    resolver: Arc<dyn RoleResolver>,
    machine: StateMachine,
    filter: IncomingCallFilter,
    ctx: SessionContext,
    exchange: CandidateExchange,
    detector: DetectorContext,
    events_tx: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
}

impl CoordinatorLoop {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut internal_rx: mpsc::Receiver<Event>,
    ) {
        let mut store_events = self.store.subscribe();
        let mut conn_rx = self.transport.connection_states();
        let mut media_rx = self.transport.remote_media_states();
        let mut local_candidates = self
            .transport
            .take_local_candidates()
            .unwrap_or_else(|| mpsc::channel(1).1);
        let (grace_tx, mut grace_rx) = mpsc::channel::<CallId>(16);
        let mut poll_timer = tokio::time::interval(self.config.poll_interval);
        let mut conn_open = true;
        let mut media_open = true;

        // Initial poll happens on the first tick, which fires immediately
        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                Some(event) = internal_rx.recv() => {
                    let _ = self.process(event).await;
                }
                result = store_events.recv() => {
                    match result {
                        Ok(event) => self.handle_store_event(event, &grace_tx).await,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            // The poll path re-derives whatever was missed
                            warn!("store event stream lagged by {missed}");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            store_events = self.store.subscribe();
                        }
                    }
                }
                Some(entry) = local_candidates.recv() => {
                    self.handle_local_candidate(entry).await;
                }
                changed = conn_rx.changed(), if conn_open => {
                    match changed {
                        Ok(()) => {
                            let state = *conn_rx.borrow_and_update();
                            self.handle_connection_state(state).await;
                        }
                        // Transport gone; its Failed state already fired
                        Err(_) => conn_open = false,
                    }
                }
                changed = media_rx.changed(), if media_open => {
                    match changed {
                        Ok(()) => {
                            if *media_rx.borrow_and_update() {
                                let _ = self.process(Event::RemoteMediaArrived).await;
                            }
                        }
                        Err(_) => media_open = false,
                    }
                }
                Some(call_id) = grace_rx.recv() => {
                    self.handle_grace_elapsed(call_id).await;
                }
                _ = poll_timer.tick() => {
                    self.run_poll(&grace_tx).await;
                }
            }
        }
        debug!("coordinator loop for {} stopped", self.ctx.local.identity);
    }

    /// Feed one event through the state machine and publish the state
    async fn process(&mut self, event: Event) -> Result<()> {
        let result = self
            .machine
            .process_event(&mut self.ctx, &mut self.exchange, &mut self.detector, event)
            .await;
        match &result {
            Ok(outcome) if outcome.transitioned => {
                let _ = self.state_tx.send(self.ctx.state);
            }
            Ok(_) => {}
            Err(err) => {
                if err.is_recoverable() {
                    warn!("recoverable session error: {err}");
                } else {
                    debug!("session event failed: {err}");
                }
            }
        }
        result.map(|_| ())
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartOutgoing {
                target_identity,
                reply,
            } => {
                let outcome = self.start_outgoing(target_identity).await;
                let _ = reply.send(outcome);
            }
            Command::Accept { call_id, reply } => {
                let outcome = self.accept(call_id).await;
                let _ = reply.send(outcome);
            }
            Command::Reject { call_id, reply } => {
                let outcome = self.reject(call_id).await;
                let _ = reply.send(outcome);
            }
            Command::End { reason, reply } => {
                let outcome = self.process(Event::end_call(reason)).await;
                let _ = reply.send(outcome);
            }
        }
    }

    async fn start_outgoing(&mut self, target_identity: String) -> Result<CallId> {
        if self.ctx.state != SessionState::Idle {
            return Err(SessionError::invalid_state(format!(
                "cannot start a call while {}",
                self.ctx.state
            )));
        }
        // Ambiguous adult roles fall back to parent; known misrouting risk
        let role = resolve_or_default(self.resolver.as_ref(), &target_identity).await;
        let target = CallTarget {
            identity: target_identity,
            role,
            recipient_type: Some(role),
        };
        self.process(Event::start_outgoing(target)).await?;
        self.ctx
            .call_id
            .clone()
            .ok_or_else(|| SessionError::internal("call id missing after start"))
    }

    async fn accept(&mut self, call_id: CallId) -> Result<()> {
        if self.ctx.state != SessionState::Incoming || !self.ctx.is_current_call(&call_id) {
            return Err(SessionError::invalid_state(format!(
                "no incoming call {call_id} to accept"
            )));
        }
        match self.process(Event::AcceptCall).await {
            Ok(()) => Ok(()),
            Err(err @ SessionError::InvalidState { .. }) => {
                // The record went terminal while the accept was in flight;
                // fail the accept cleanly and let the session observe the
                // termination
                let status = self.read_status(&call_id).await.unwrap_or(CallStatus::Ended);
                let _ = self.process(Event::remote_termination(status)).await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn reject(&mut self, call_id: CallId) -> Result<()> {
        if self.ctx.state != SessionState::Incoming || !self.ctx.is_current_call(&call_id) {
            return Err(SessionError::invalid_state(format!(
                "no incoming call {call_id} to reject"
            )));
        }
        self.process(Event::RejectCall).await
    }

    async fn handle_local_candidate(&mut self, entry: CandidateEntry) {
        // No signaling writes after the session ended
        if self.ctx.state == SessionState::Ended {
            return;
        }
        if let Err(err) = self.exchange.on_local_candidate(&self.ctx, entry).await {
            warn!("local candidate handling failed: {err}");
        }
    }

    async fn handle_connection_state(&mut self, state: ConnectionState) {
        debug!("transport connection state: {state:?}");
        match state {
            ConnectionState::Connected => {
                let _ = self.process(Event::TransportConnected).await;
            }
            ConnectionState::Failed => {
                let _ = self.process(Event::TransportFailed).await;
            }
            ConnectionState::New | ConnectionState::Connecting | ConnectionState::Closed => {}
        }
    }

    async fn handle_store_event(&mut self, event: StoreEvent, grace_tx: &mpsc::Sender<CallId>) {
        let record = event.record().clone();

        if self.ctx.is_current_call(&record.id) {
            self.handle_current_record(&record, grace_tx).await;
        }

        // Displayed-but-not-bound records still drive incoming clearing
        if let StoreEvent::Updated { record, .. } = &event {
            self.track_displayed(record, grace_tx).await;
        }

        if let Some(candidate) = normalizer::from_store_event(&event) {
            self.detect(candidate).await;
        }
    }

    /// Handling for any observation of the record this session is bound
    /// to. Shared between update notifications and the fallback poll, so
    /// the same fact arriving on both paths converges.
    async fn handle_current_record(&mut self, record: &CallRecord, grace_tx: &mpsc::Sender<CallId>) {
        if let Err(err) = self.exchange.on_record_update(&self.ctx, record).await {
            warn!("candidate routing failed: {err}");
        }

        if self.ctx.state == SessionState::Outgoing
            && record.status == CallStatus::Active
            && record.answer.is_some()
        {
            let _ = self.process(Event::RemoteAnswerObserved).await;
        }

        if record.is_terminal() && !self.ctx.ended_locally {
            if self.ctx.state == SessionState::Incoming {
                // Deferred: an in-flight local accept/decline may still be
                // racing this termination (grace window)
                self.schedule_grace(record.id.clone(), grace_tx);
            } else if self.ctx.state != SessionState::Ended {
                let _ = self.process(Event::remote_termination(record.status)).await;
            }
        }
    }

    /// Clear or schedule clearing of the displayed incoming call as its
    /// record moves on
    async fn track_displayed(&mut self, record: &CallRecord, grace_tx: &mpsc::Sender<CallId>) {
        if self.detector.displayed() != Some(&record.id) {
            return;
        }
        match record.status {
            CallStatus::Active => {
                // The peer (or another device) is answering: clear now
                if let Some(cleared) = self.detector.clear_displayed_if(&record.id) {
                    let _ = self
                        .events_tx
                        .send(SessionEvent::IncomingCleared { call_id: cleared });
                }
            }
            CallStatus::Ended | CallStatus::Rejected | CallStatus::Missed => {
                self.schedule_grace(record.id.clone(), grace_tx);
            }
            _ => {}
        }
    }

    fn schedule_grace(&self, call_id: CallId, grace_tx: &mpsc::Sender<CallId>) {
        let tx = grace_tx.clone();
        let window = self.config.grace_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = tx.send(call_id).await;
        });
    }

    async fn handle_grace_elapsed(&mut self, call_id: CallId) {
        // The accept may have won the race; only act if still displayed or
        // still sitting in incoming
        if let Some(cleared) = self.detector.clear_displayed_if(&call_id) {
            let _ = self
                .events_tx
                .send(SessionEvent::IncomingCleared { call_id: cleared });
        }
        if self.ctx.state == SessionState::Incoming && self.ctx.is_current_call(&call_id) {
            if let Ok(Some(record)) = self.store.read(&call_id).await {
                if record.is_terminal() {
                    let _ = self.process(Event::remote_termination(record.status)).await;
                }
            }
        }
    }

    /// Periodic fallback: re-derive incoming calls and re-read the bound
    /// record, since push notifications may be dropped or reordered
    async fn run_poll(&mut self, grace_tx: &mpsc::Sender<CallId>) {
        if let Some(call_id) = self.ctx.call_id.clone() {
            if self.ctx.state != SessionState::Ended {
                match self.store.read(&call_id).await {
                    Ok(Some(record)) => self.handle_current_record(&record, grace_tx).await,
                    Ok(None) => debug!("bound record {} missing on poll", call_id),
                    Err(err) => warn!("poll read failed: {err}"),
                }
            }
        }

        if self.ctx.state == SessionState::Idle {
            let filter = RecordFilter {
                callee_id: self.ctx.local.identity.clone(),
                statuses: vec![CallStatus::Initiating, CallStatus::Ringing],
            };
            let since = Utc::now()
                - chrono::Duration::from_std(self.config.recent_call_window)
                    .unwrap_or_else(|_| chrono::Duration::seconds(60));
            match self.store.poll_matching(&filter, since).await {
                Ok(records) => {
                    for record in records {
                        self.detect(normalizer::from_poll(record)).await;
                    }
                }
                Err(err) => warn!("incoming-call poll failed: {err}"),
            }
        }
    }

    /// Run one candidate through the filter pipeline and surface it if it
    /// qualifies and has not been surfaced before
    async fn detect(&mut self, candidate: RingCandidate) {
        let on_call_screen = self.ctx.state != SessionState::Idle;
        let record = match self.filter.qualify(candidate, on_call_screen).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(err) => {
                warn!("incoming-call filtering failed: {err}");
                return;
            }
        };
        if !self.detector.should_surface(&record.id) {
            debug!("call {} already surfaced, deduped", record.id);
            return;
        }
        self.detector.mark_surfaced(record.id.clone());
        self.ctx.incoming_record = Some(record.clone());
        if self
            .process(Event::incoming_detected(record.id))
            .await
            .is_err()
        {
            info!("incoming call transition failed");
        }
    }

    async fn read_status(&self, call_id: &CallId) -> Option<CallStatus> {
        self.store
            .read(call_id)
            .await
            .ok()
            .flatten()
            .map(|record| record.status)
    }
}
