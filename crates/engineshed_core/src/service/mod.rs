//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep callers decoupled from storage details.

pub mod collection_service;
