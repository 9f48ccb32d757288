//! # Call Session Coordination Engine
//!
//! Race-safe coordination of one-to-one call sessions over a shared,
//! asynchronously replicated call record. Two endpoints - a caller and a
//! callee, each holding one of the parent / child / family-member roles -
//! converge on one record through guarded writes, while notifications about
//! that record may arrive on several unordered paths (insert events, update
//! events, a fallback poll).
//!
//! ## Architecture
//!
//! ```text
//!  SessionCoordinator          public API + single event loop
//!       |
//!  StateMachine                declarative transition table executor
//!       |
//!  +---------------+----------------+----------------+
//!  | Signaling     | Candidates     | Termination    |  record protocols
//!  +---------------+----------------+----------------+
//!       |                                   |
//!  CallRecordStore (trait)        TransportEngine (trait)
//! ```
//!
//! The coordinator owns all per-session state ([`state_machine::SessionContext`],
//! [`detector::DetectorContext`]); there are no process-wide singletons, so
//! multiple sessions in one process never interfere.
//!
//! ## Example
//!
//! ```no_run
//! use famcall_session_core::adapters::roles::StaticRoleResolver;
//! use famcall_session_core::adapters::transport::TransportEngine;
//! use famcall_session_core::config::CoordinatorConfig;
//! use famcall_session_core::coordinator::SessionCoordinator;
//! use famcall_session_core::store::MemoryCallRecordStore;
//! use famcall_session_core::types::{EndReason, Role};
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn TransportEngine>) -> famcall_session_core::errors::Result<()> {
//! let store = Arc::new(MemoryCallRecordStore::new());
//! let resolver = Arc::new(StaticRoleResolver::new().with_role("parent-1", Role::Parent));
//!
//! let coordinator = SessionCoordinator::new(
//!     CoordinatorConfig::new("child-1", Role::Child),
//!     store,
//!     transport,
//!     resolver,
//! );
//!
//! let call_id = coordinator.start_outgoing_call("parent-1").await?;
//! // ... later
//! coordinator.end_call(EndReason::Hangup).await?;
//! # let _ = call_id;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod candidates;
pub mod config;
pub mod coordinator;
pub mod detector;
pub mod errors;
pub mod signaling;
pub mod state_machine;
pub mod state_table;
pub mod store;
pub mod termination;
pub mod types;

pub use config::CoordinatorConfig;
pub use coordinator::SessionCoordinator;
pub use errors::{Result, SessionError};
pub use types::{
    CallId, CallRecord, CallStatus, EndReason, Party, Role, SessionEvent, SessionState,
};
