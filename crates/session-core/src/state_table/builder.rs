//! Builder helpers for assembling the state table

use super::types::{Event, StateKey, StateTable, Transition};
use crate::types::{Party, SessionState};

/// Accumulates transitions into a `StateTable`
pub struct StateTableBuilder {
    table: StateTable,
}

impl StateTableBuilder {
    pub fn new() -> Self {
        Self {
            table: StateTable::new(),
        }
    }

    /// Add a full transition
    pub fn add_transition(
        &mut self,
        party: Party,
        state: SessionState,
        event: Event,
        transition: Transition,
    ) {
        self.table
            .insert(StateKey { party, state, event }, transition);
    }

    /// Add a plain state change with no guards or actions
    pub fn add_state_change(
        &mut self,
        party: Party,
        state: SessionState,
        event: Event,
        next: SessionState,
    ) {
        self.add_transition(party, state, event, Transition::to_state(next));
    }

    /// Add the same transition for both parties
    pub fn add_for_both(&mut self, state: SessionState, event: Event, transition: Transition) {
        for party in [Party::Caller, Party::Callee] {
            self.add_transition(party, state, event.clone(), transition.clone());
        }
    }

    pub fn build(self) -> StateTable {
        self.table
    }
}

impl Default for StateTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
