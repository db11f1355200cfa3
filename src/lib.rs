//! Tender Recommendation API Library
//!
//! Evaluates public tenders against company profiles with an LLM judge,
//! caches the verdicts per company and serves them over HTTP.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `circuit_breaker`: Circuit breaker around judge calls.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema.
//! - `db_storage`: Postgres store implementations.
//! - `errors`: Error handling types.
//! - `evaluation`: Bounded bulk evaluation and single-tender refresh.
//! - `extraction`: Company profile extraction from descriptions.
//! - `handlers`: HTTP request handlers and router.
//! - `judge`: Judge trait and the OpenAI-compatible client.
//! - `memory_store`: In-memory store implementations.
//! - `models`: Core data models.
//! - `prompt`: Judge prompt construction.
//! - `services`: Recommendation reader and company profiles.
//! - `stores`: Storage traits.
//! - `tender_source`: Tender corpus.

pub mod api;
pub mod core;
pub mod integrations;

pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod evaluation;
pub mod extraction;
pub mod handlers;
pub mod judge;
pub mod memory_store;
pub mod models;
pub mod prompt;
pub mod services;
pub mod stores;
pub mod tender_source;
