//! Declarative session state table
//!
//! Built per coordinator instance - there is no module-level table.

pub mod builder;
pub mod tables;
pub mod types;

pub use builder::StateTableBuilder;
pub use types::*;

/// Build the standard transition table
pub fn standard_table() -> StateTable {
    let mut builder = StateTableBuilder::new();
    tables::add_caller_transitions(&mut builder);
    tables::add_callee_transitions(&mut builder);
    tables::add_common_transitions(&mut builder);
    let table = builder.build();
    debug_assert!(table.validate().is_ok());
    table
}
