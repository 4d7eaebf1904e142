//! The sync worker daemon.
//!
//! Wires the real panel client into the sync engine and polls for pending sync jobs on an interval. The
//! external trigger (admin UI action) only ever inserts `Pending` job rows; this process is the single
//! consumer that drives them to a terminal state.
pub mod config;
pub mod errors;
pub mod integrations;
pub mod worker;
