//! Real-time state synchronization core for a security-operations dashboard.
//!
//! Three components do the work: [`connection::ConnectionManager`] keeps one
//! logical WebSocket alive with bounded-retry reconnection,
//! [`dispatcher::EventDispatcher`] multiplexes typed envelopes to
//! independent consumers, and [`store::DashboardStore`] merges dispatched
//! deltas into shared entity collections with idempotent, bounded mutations.

/// Command-line argument definitions.
pub mod cli;
/// Runtime configuration model.
pub mod config;
/// Connection lifecycle and reconnection policy.
pub mod connection;
/// Typed publish/subscribe event registry.
pub mod dispatcher;
/// Error types used across the crate.
pub mod error;
/// Event tags, envelope codec and payload union.
pub mod events;
/// Metrics setup and global counters.
pub mod monitoring;
/// In-memory entity collections and mutation contract.
pub mod store;
/// Dispatcher-to-store wiring.
pub mod sync;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Entity records, payloads and merge patches.
pub mod types;
/// Console status view.
pub mod ui;

/// Primary crate error type.
pub use error::SecwatchError;
