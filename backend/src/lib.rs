//! Balance attestation gate.
//!
//! Issues anonymous sessions, exchanges them for bearer tokens, and accepts each
//! threshold proof submission at most once.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod gate;
pub mod models;
pub mod replay;
pub mod session;
pub mod state;
pub mod store;
pub mod sweeper;
