//! Thin LLM client library used as the review pipeline's external
//! `LanguageModel` collaborator.
//!
//! This crate owns only the wire-level concerns (HTTP transport, provider
//! config, health checks). It deliberately knows nothing about review
//! prompts, findings, or diff bundles — those live in `mr-reviewer` and are
//! built on top of [`service_profiles::LlmServiceProfiles::generate_fast`]
//! and friends.

pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use error_handler::AiLlmError;
