//! Core types and reconciliation engine for the calbridge ecosystem.
//!
//! The engine mirrors events between calendar backends — one-way with
//! full detail, one-way as content-free "busy" placeholders, or two-way —
//! by stable identity, with duplicate collapse, recurrence-rule inference
//! for series that lost their rule in translation, and persisted series
//! bookkeeping that keeps repeated passes idempotent.
//!
//! Backends are reached through the [`backend::CalendarBackend`]
//! capability; the bundled implementation shells out to provider binaries
//! speaking a JSON protocol, so wire-level CalDAV or REST never enters
//! this crate.

pub mod backend;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod event;
pub mod identity;
pub mod privacy;
pub mod recurrence;
pub mod series;
pub mod state;
pub mod window;

pub use error::{BridgeError, BridgeResult};
pub use event::{Event, EventStatus, EventTime};
