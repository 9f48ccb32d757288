pub mod actions;
pub mod context;
pub mod executor;

pub use context::SessionContext;
pub use executor::{ProcessEventResult, StateMachine};
