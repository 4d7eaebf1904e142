//! The engine's public API layer.
//!
//! [`sync_flow_api::SyncApi`] is the orchestrator that drives pending sync jobs to a terminal state.
//! [`jobs_api::JobApi`] creates jobs and answers the status queries the admin UI polls.
//! [`cabinets_api::CabinetApi`] is the cabinet CRUD surface.
pub mod cabinets_api;
pub mod errors;
pub mod job_objects;
pub mod jobs_api;
pub mod persister;
pub mod sync_flow_api;
