// src/config/mod.rs

//! Configuration loading, profile overlay and validation.
//!
//! Responsibilities:
//! - Hold the TOML-backed raw table and the typed snapshot (`model.rs`).
//! - Overlay `[profiles.<name>]` tables onto the raw table (`profile.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate snapshot invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod profile;
pub mod validate;

pub use loader::{config_path, load_and_resolve, load_from_path, DEFAULT_CONFIG_FILE};
pub use model::{BuildConfig, RawConfig};
pub use profile::{apply_profile, effective_profile_name, resolve, DEFAULT_PROFILE};
