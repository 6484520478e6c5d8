//! # stumpcast common library
//!
//! Shared code for the stumpcast podcast assembly service:
//! - Error types used across component boundaries
//! - Configuration loading and root folder resolution
//! - Domain event types and the broadcast EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
