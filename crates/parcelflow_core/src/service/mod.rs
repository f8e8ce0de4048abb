//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate engine and repository calls into use-case level APIs.
//! - Keep transport layers decoupled from storage details.

pub mod notification_service;
pub mod parcel_service;
