//! Rollstack Core
//!
//! Core types shared by the rollstack control plane.
//!
//! This crate contains:
//! - Domain types: stacks, deployments, integrations and logs, together with
//!   the status enums and the transitions they allow
//! - DTOs: request payloads, query views and the uniform response envelope

pub mod domain;
pub mod dto;
