//! Data Transfer Objects
//!
//! Request payloads accepted by the orchestrator, the views it returns and
//! the envelope every response is wrapped in. Field names follow the
//! camelCase JSON used by the HTTP API.

pub mod envelope;
pub mod integration;
pub mod log;
pub mod stack;
