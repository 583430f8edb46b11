//! Record use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into record lifecycle APIs.
//! - Keep CLI and framework layers decoupled from store details.

pub mod record_service;
