//! Coordinator configuration
//!
//! All timing constants observed in deployments are tunable here; the
//! defaults carry no semantic weight.

use crate::types::{LocalEndpoint, Role};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for a session coordinator instance
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    /// Identity of the local endpoint
    pub local_identity: String,
    /// Resolved role of the local endpoint
    pub local_role: Role,
    /// How long an outgoing call may ring before ending with `no_answer`
    #[serde(default = "default_ring_timeout")]
    pub ring_timeout: Duration,
    /// How long `connecting` may last before ending with `failed`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Delay before clearing incoming-call state after a remote terminal
    /// transition, so an in-flight local accept/decline is not preempted
    #[serde(default = "default_grace_window")]
    pub grace_window: Duration,
    /// Periodic fallback poll interval for incoming-call detection
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Only records created within this window qualify as incoming on poll
    #[serde(default = "default_recent_call_window")]
    pub recent_call_window: Duration,
    /// Capacity of the coordinator's internal event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_ring_timeout() -> Duration {
    Duration::from_secs(45)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_grace_window() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_recent_call_window() -> Duration {
    Duration::from_secs(60)
}

fn default_channel_capacity() -> usize {
    256
}

impl CoordinatorConfig {
    /// Config for the given endpoint with default timing
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self {
            local_identity: identity.into(),
            local_role: role,
            ring_timeout: default_ring_timeout(),
            connect_timeout: default_connect_timeout(),
            grace_window: default_grace_window(),
            poll_interval: default_poll_interval(),
            recent_call_window: default_recent_call_window(),
            channel_capacity: default_channel_capacity(),
        }
    }

    /// The local endpoint described by this config
    pub fn local_endpoint(&self) -> LocalEndpoint {
        LocalEndpoint {
            identity: self.local_identity.clone(),
            role: self.local_role,
        }
    }
}
