//! CLI command handlers.

pub mod check;
pub mod common;
pub mod download;
