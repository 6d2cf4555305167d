//! Core library: prompt scanning, PII detection, the session vault and the secure chain.

pub mod analyzer;
pub mod chain;
pub mod classifier;
pub mod config;
pub mod error;
pub mod faker;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod scanner;
pub mod vault;
pub mod vaultstore;

pub use error::GatewayError;
