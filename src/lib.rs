// somnia - LLM-backed synthetic sleep data and servo prediction service

pub mod config;
pub mod domain;
pub mod models;
pub mod pipeline;
pub mod server;
