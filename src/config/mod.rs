//! Configuration module for pixelaria
//!
//! Provides types and parsing for `pixelaria.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
