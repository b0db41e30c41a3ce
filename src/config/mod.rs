// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] mirrors the TOML file.
//! - [`loader`] reads it from disk.
//! - [`validate`] turns a [`RawConfigFile`] into a checked [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
