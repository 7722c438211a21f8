//! Streams LLM output to browser clients in the Vercel AI SDK data stream protocol.

pub mod auth;
pub mod config;
pub mod converters;
pub mod data_stream;
pub mod error;
pub mod llm_client;
pub mod logging;
pub mod models;
pub mod request_id;
pub mod router;
