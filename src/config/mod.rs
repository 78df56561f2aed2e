// src/config/mod.rs

//! Configuration loading and validation for pipdag.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: read a config file from disk.
//! - `validate.rs`: the validation pass that turns a `RawConfigFile` into a
//!   `ConfigFile` (unique names, modes, MODEL back-references, masks).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{
    BatchSection, ClassificationConfig, ConfigFile, DataPrepConfig, GlobalSection, LcfitConfig,
    RawConfigFile, SimulationConfig,
};
