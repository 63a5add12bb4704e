//! Foundation utilities shared by every postflow crate: error types, exit codes,
//! structured logging, atomic file writes, state paths, and session locking.

pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod lock;
pub mod logging;
pub mod paths;
