//! Transition tables
//!
//! Split by perspective: the caller-side flow, the callee-side flow, and
//! the transitions shared by both.

mod callee;
mod caller;
mod common;

pub use callee::add_callee_transitions;
pub use caller::add_caller_transitions;
pub use common::add_common_transitions;
