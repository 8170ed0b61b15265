//! Message surface the browser extension talks to.
//!
//! Versioned modules (currently `v1`) keep the wire contract stable while
//! the handlers behind it change.

pub mod v1;
