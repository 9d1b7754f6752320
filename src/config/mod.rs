//! Configuration module for mdexport
//!
//! This module handles export preferences, including
//! serialization/deserialization to/from JSON and persistent storage
//! in the platform-specific config directory.

mod persistence;
mod settings;

pub use persistence::*;
pub use settings::*;
