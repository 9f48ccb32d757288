//! Seams to the external collaborators: the transport engine that owns the
//! actual peer connection and the resolver mapping identities to roles.

pub mod roles;
pub mod transport;

pub use roles::{resolve_or_default, RoleResolver, StaticRoleResolver};
pub use transport::{
    AddCandidateOutcome, ConnectionState, SetRemoteOutcome, TransportEngine,
};
