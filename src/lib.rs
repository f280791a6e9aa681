pub mod config;
pub mod errors;
pub mod interaction;
pub mod mcp_server;
pub mod metrics;
pub mod overrides;
pub mod patients;
pub mod persistence;
pub mod security;
