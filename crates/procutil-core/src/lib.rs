//! procutil core - platform-independent process abstractions
//!
//! This crate provides the command model, configuration, error types and
//! traits shared by the platform-specific implementations.

pub mod command;
pub mod config;
pub mod error;
pub mod process;
pub mod stdio;
pub mod table;

pub use command::*;
pub use config::*;
pub use error::*;
pub use process::*;
