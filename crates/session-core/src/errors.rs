//! Error types for the session coordination engine

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while coordinating a call session.
///
/// The media, write-failure and transport variants are produced by
/// `TransportEngine` and `CallRecordStore` implementations; the
/// coordinator only classifies them.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No outbound media tracks available when an offer/answer was requested.
    /// Fatal to the attempted call leg; no record is created or answered.
    #[error("no outbound media tracks available")]
    NoMediaTracks,

    /// Local media capture failed; surfaced to the user, no record mutation
    #[error("local media unavailable: {message}")]
    MediaUnavailable { message: String },

    /// A write against the call record store failed
    #[error("signaling write failure: {message}")]
    SignalingWriteFailure { message: String },

    /// The transport rejected a candidate for a reason other than duplication.
    /// Non-fatal: callers log and continue.
    #[error("candidate rejected by transport: {detail}")]
    CandidateRejected { detail: String },

    /// The role resolver could not determine a role for this identity
    #[error("ambiguous role for identity: {identity}")]
    RoleAmbiguous { identity: String },

    /// Operation not valid in the current session state
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// No call record exists for this id
    #[error("call not found: {call_id}")]
    CallNotFound { call_id: String },

    /// Call record store error
    #[error("store error: {message}")]
    Store { message: String },

    /// Transport engine error
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SessionError {
    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a call-not-found error
    pub fn call_not_found(call_id: impl Into<String>) -> Self {
        Self::CallNotFound {
            call_id: call_id.into(),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when the session can keep running after this error.
    ///
    /// Candidate rejections and transient write failures are tolerated; the
    /// transport's own connection-state monitoring is the authoritative
    /// failure signal for the call itself.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CandidateRejected { .. } | Self::SignalingWriteFailure { .. }
        )
    }
}
