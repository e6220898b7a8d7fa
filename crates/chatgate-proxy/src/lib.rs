//! # chatgate-proxy
//!
//! OpenAI-compatible HTTP surface over [`chatgate_hf::ChatOrchestrator`]:
//! `POST /v1/chat/completions` (SSE or JSON), `GET /v1/models` and
//! `GET /health`.

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod server;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, router, serve};
