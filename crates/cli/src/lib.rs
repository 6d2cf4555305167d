//! Public library modules for the gateway binary
pub mod audit;
pub mod commands;
pub mod logging;
pub mod server;
