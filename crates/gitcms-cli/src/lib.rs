//! gitcms CLI and HTTP surface
//!
//! The binary (`src/main.rs`) only parses arguments; the commands and the
//! axum router live here so integration tests can drive them directly.

pub mod app;
pub mod commands;
pub mod server;
