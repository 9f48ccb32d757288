//! Incoming Call Detector & Deduper
//!
//! Three independently-firing sources (insert notifications, update
//! notifications, the fallback poll) are normalized into one canonical
//! candidate type, run through a single filter pipeline, and deduplicated
//! against per-session context so each qualifying call surfaces exactly
//! once.

pub mod dedup;
pub mod filter;
pub mod normalizer;

pub use dedup::DetectorContext;
pub use filter::IncomingCallFilter;
pub use normalizer::{NotificationSource, RingCandidate};
