//! Behavioral timeline CLI library.
//!
//! This crate provides the `bt` command-line interface over `bt-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
