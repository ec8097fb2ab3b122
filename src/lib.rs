//! FomoScore library
//!
//! Aggregates Twitter, wallet and Verida (Telegram) activity into a bounded
//! 0-10 engagement score, persisted per user behind a durable store with
//! automatic in-memory fallback.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Scoring, keyword scanning and the score service.
//! - `data`: Store backends and the fallback coordinator.
//! - `integrations`: Verida collaborator client and payload parsing.
//! - `config`: Configuration management.
//! - `db`: Database pool and schema bootstrap.
//! - `db_storage`: Postgres user store.
//! - `errors`: Error handling types.
//! - `fallback`: Durable/memory routing.
//! - `handlers`: HTTP request handlers.
//! - `health`: Durable backend health and reconnect probe.
//! - `keywords`: Keyword engagement scanner.
//! - `memory_store`: In-memory user store.
//! - `models`: Records, updates and API models.
//! - `scoring`: Score normalizer.
//! - `services`: Score orchestration.
//! - `source_models`: Lenient collaborator payload extraction.
//! - `store`: Store contract and error taxonomy.
//! - `verida_client`: Verida vault REST client.
//! - `verida_token`: Verida auth token parsing.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;

pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod fallback;
pub mod handlers;
pub mod health;
pub mod keywords;
pub mod memory_store;
pub mod models;
pub mod scoring;
pub mod services;
pub mod source_models;
pub mod store;
pub mod verida_client;
pub mod verida_token;
