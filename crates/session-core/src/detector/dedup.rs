//! Detector dedup context
//!
//! Per-session replacement for the ambient "last processed call id" /
//! "current incoming call" globals: the context is owned by one
//! coordinator and passed into every handler.

use crate::types::CallId;
use tracing::debug;

/// Deduplication state for incoming-call surfacing
#[derive(Debug, Default)]
pub struct DetectorContext {
    /// Last call id surfaced to the UI
    last_surfaced: Option<CallId>,
    /// Call id currently displayed as incoming, if any
    displayed: Option<CallId>,
}

impl DetectorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this call id should surface. Each qualifying call surfaces
    /// exactly once until explicitly cleared, no matter how many detectors
    /// deliver it.
    pub fn should_surface(&self, id: &CallId) -> bool {
        self.last_surfaced.as_ref() != Some(id) && self.displayed.as_ref() != Some(id)
    }

    /// Record that this call id has been surfaced
    pub fn mark_surfaced(&mut self, id: CallId) {
        debug!("surfacing incoming call {}", id);
        self.last_surfaced = Some(id.clone());
        self.displayed = Some(id);
    }

    /// Clear the displayed call if it matches `id`; returns the cleared id
    pub fn clear_displayed_if(&mut self, id: &CallId) -> Option<CallId> {
        if self.displayed.as_ref() == Some(id) {
            self.displayed.take()
        } else {
            None
        }
    }

    /// Clear whatever is displayed; returns the cleared id
    pub fn clear_displayed(&mut self) -> Option<CallId> {
        self.displayed.take()
    }

    /// The currently displayed incoming call, if any
    pub fn displayed(&self) -> Option<&CallId> {
        self.displayed.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surfaces_each_call_exactly_once() {
        let mut ctx = DetectorContext::new();
        let id = CallId::new();

        assert!(ctx.should_surface(&id));
        ctx.mark_surfaced(id.clone());

        // Re-delivery from any other source is suppressed
        assert!(!ctx.should_surface(&id));

        // Clearing the display alone does not re-surface the same call
        ctx.clear_displayed();
        assert!(!ctx.should_surface(&id));

        // A different call surfaces normally
        let other = CallId::new();
        assert!(ctx.should_surface(&other));
    }

    #[test]
    fn clear_if_only_matches_displayed() {
        let mut ctx = DetectorContext::new();
        let id = CallId::new();
        let other = CallId::new();
        ctx.mark_surfaced(id.clone());

        assert_eq!(ctx.clear_displayed_if(&other), None);
        assert_eq!(ctx.displayed(), Some(&id));
        assert_eq!(ctx.clear_displayed_if(&id), Some(id));
        assert_eq!(ctx.displayed(), None);
    }
}
