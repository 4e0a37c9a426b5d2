//! Manuscript API — thin HTTP read-through over the knowledge graph
//! (`spec.md` §6 "External Interfaces"). Every handler delegates to
//! `manuscript-core` repository traits or a `manuscript-cognitive` service;
//! this crate owns no analysis logic of its own.

pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use routes::router;
pub use server::serve;
pub use state::AppState;
