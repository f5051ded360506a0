//! # squad save bot common library
//!
//! Shared code for the squad save bot services including:
//! - Common error types
//! - Event types (SsbEvent enum) and the EventBus
//! - Configuration loading and data folder resolution

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
