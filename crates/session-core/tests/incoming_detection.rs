//! Incoming-call detection across the three delivery paths, surfacing
//! exactly once, and incoming-state clearing with the grace window.

mod common;

use common::{endpoint, expect_event};
use famcall_session_core::store::{CallRecordStore, MemoryCallRecordStore};
use famcall_session_core::types::{
    CallRecord, CallStatus, EndReason, Role, SessionEvent, SessionState, SignalBlob,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn ringing_record_for(callee_id: &str, recipient: Role) -> CallRecord {
    let mut record = CallRecord::new_outgoing(
        Role::Child,
        "child-1",
        recipient,
        callee_id,
        Some(recipient),
    );
    record.offer = Some(SignalBlob::new("offer"));
    record
}

#[tokio::test]
async fn poll_detects_calls_created_before_subscription() {
    let store = Arc::new(MemoryCallRecordStore::new());

    // The record exists before the callee coordinator comes up, so no
    // insert notification will ever reach it
    let record = ringing_record_for("parent-1", Role::Parent);
    let call_id = store.create(record).await.unwrap();

    let mut parent = endpoint(&store, "parent-1", Role::Parent);
    let surfaced = expect_event(&mut parent.events, "polled incoming call", |event| {
        matches!(event, SessionEvent::IncomingCall { .. })
    })
    .await;
    let SessionEvent::IncomingCall {
        call_id: surfaced_id,
        ..
    } = surfaced
    else {
        unreachable!()
    };
    assert_eq!(surfaced_id, call_id);
}

#[tokio::test]
async fn repeated_deliveries_surface_once() {
    let store = Arc::new(MemoryCallRecordStore::new());
    let mut parent = endpoint(&store, "parent-1", Role::Parent);

    // Insert notification delivers first; several poll ticks then re-read
    // the same ringing record
    let record = ringing_record_for("parent-1", Role::Parent);
    store.create(record).await.unwrap();

    expect_event(&mut parent.events, "incoming call", |event| {
        matches!(event, SessionEvent::IncomingCall { .. })
    })
    .await;

    // Three poll intervals worth of re-delivery
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut extra = 0;
    while let Ok(event) = parent.events.try_recv() {
        if matches!(event, SessionEvent::IncomingCall { .. }) {
            extra += 1;
        }
    }
    assert_eq!(extra, 0, "the same call must not surface twice");
}

#[tokio::test]
async fn initiating_record_is_promoted_and_surfaced() {
    let store = Arc::new(MemoryCallRecordStore::new());
    let mut parent = endpoint(&store, "parent-1", Role::Parent);

    let mut record = ringing_record_for("parent-1", Role::Parent);
    record.status = CallStatus::Initiating;
    let call_id = store.create(record).await.unwrap();

    expect_event(&mut parent.events, "incoming call", |event| {
        matches!(event, SessionEvent::IncomingCall { .. })
    })
    .await;
    let stored = store.read(&call_id).await.unwrap().unwrap();
    assert_eq!(stored.status, CallStatus::Ringing, "detector promotes");
}

#[tokio::test]
async fn call_for_other_adult_role_never_surfaces() {
    let store = Arc::new(MemoryCallRecordStore::new());
    let mut parent = endpoint(&store, "parent-1", Role::Parent);

    // Legacy role field matches the parent, but the authoritative
    // recipient_type targets a family member
    let mut record = ringing_record_for("parent-1", Role::Parent);
    record.recipient_type = Some(Role::FamilyMember);
    store.create(record).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(event) = parent.events.try_recv() {
        assert!(
            !matches!(event, SessionEvent::IncomingCall { .. }),
            "misrouted call surfaced"
        );
    }
    assert_eq!(parent.coordinator.state(), SessionState::Idle);
}

#[tokio::test]
async fn second_call_is_suppressed_while_incoming_displayed() {
    let store = Arc::new(MemoryCallRecordStore::new());
    let mut parent = endpoint(&store, "parent-1", Role::Parent);

    store
        .create(ringing_record_for("parent-1", Role::Parent))
        .await
        .unwrap();
    expect_event(&mut parent.events, "first incoming call", |event| {
        matches!(event, SessionEvent::IncomingCall { .. })
    })
    .await;

    // A different caller rings while the first call is on screen
    let mut second = CallRecord::new_outgoing(
        Role::FamilyMember,
        "aunt-1",
        Role::Parent,
        "parent-1",
        Some(Role::Parent),
    );
    second.offer = Some(SignalBlob::new("offer-2"));
    store.create(second).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(event) = parent.events.try_recv() {
        assert!(
            !matches!(event, SessionEvent::IncomingCall { .. }),
            "second call must not preempt the displayed one"
        );
    }
}

#[tokio::test]
async fn remote_hangup_clears_incoming_after_grace_window() {
    let store = Arc::new(MemoryCallRecordStore::new());
    let mut parent = endpoint(&store, "parent-1", Role::Parent);
    let child = endpoint(&store, "child-1", Role::Child);

    let call_id = child
        .coordinator
        .start_outgoing_call("parent-1")
        .await
        .unwrap();
    expect_event(&mut parent.events, "incoming call", |event| {
        matches!(event, SessionEvent::IncomingCall { .. })
    })
    .await;

    let before = std::time::Instant::now();
    child.coordinator.end_call(EndReason::Hangup).await.unwrap();

    let cleared = expect_event(&mut parent.events, "incoming cleared", |event| {
        matches!(event, SessionEvent::IncomingCleared { .. })
    })
    .await;
    let SessionEvent::IncomingCleared { call_id: cleared_id } = cleared else {
        unreachable!()
    };
    assert_eq!(cleared_id, call_id);
    assert!(
        before.elapsed() >= Duration::from_millis(100),
        "clearing waits out the grace window"
    );
    // And the callee session converges to ended without writing back
    expect_event(&mut parent.events, "callee terminated", |event| {
        matches!(event, SessionEvent::CallTerminated { .. })
    })
    .await;
    let record = store.read(&call_id).await.unwrap().unwrap();
    assert_eq!(record.ended_by, Some(Role::Child));
}
