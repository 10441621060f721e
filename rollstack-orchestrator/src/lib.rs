//! Rollstack Orchestrator
//!
//! Control plane for rollup stack deployments. Requests arrive over HTTP,
//! are validated and persisted by the services, and the long-running work is
//! executed as cancellable tasks on the scheduler while the driver's log
//! output is ingested alongside.

pub mod api;
pub mod config;
pub mod db;
pub mod driver;
pub mod ingest;
pub mod repository;
pub mod scheduler;
pub mod service;
