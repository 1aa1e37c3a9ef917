pub mod bridge;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod relay;
pub mod session;
pub mod tools;
