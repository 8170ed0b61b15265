//! Core library for the LearnFlow study assistant.
//!
//! The extension forwards highlighted text here; this crate decides which
//! provider to call, asks it for an explanation, and always hands back
//! something displayable:
//! - [`agents`] resolves credentials and providers, builds prompts, calls the
//!   completion endpoint and sequences the explain/chat operations.
//! - [`explanation`] holds the explanation document, its parser and fallback.
//! - [`history`] caches the last explanation and the user's saved topics.
//! - [`api`] exposes the message protocol the host process serves.
//! - [`db`] opens the SQLite settings store and applies migrations.
//! - [`errors`] is the error catalogue with codes and explanations.
//! - [`logging`] writes structured diagnostics to the event log table.

pub mod agents;
pub mod api;
pub mod db;
pub mod errors;
pub mod explanation;
pub mod history;
pub mod logging;

pub use errors::LearnFlowError;
pub use explanation::Explanation;
