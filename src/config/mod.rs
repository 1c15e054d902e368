// src/config/mod.rs

//! Configuration loading and validation for bootrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate commands and paths (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path, DEFAULT_CONFIG_FILE};
pub use model::{
    CompilerSection, ConfigFile, GeneratorSection, PathsSection, RawConfigFile, WorkerSection,
};
