//! Configuration and resolution engine for the aim launcher.
//!
//! Provides TOML/YAML configuration with:
//! - Keys (credential references: plain, `base64:`, `${ENV}`)
//! - Vendors with named endpoints and `base` inheritance
//! - Tools with profiles and declarative field mappings
//! - Config file layering (user config + project-local overrides)
//!
//! The entry point is [`Resolver`], which turns a tool, key and profile
//! into a [`RuntimeConfig`]: the env vars and arguments to launch the tool
//! with.

pub mod args;
pub mod builtin;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod layers;
pub mod mapping;
pub mod resolver;
pub mod secrets;
pub mod store;
pub mod types;
pub mod validate;
pub mod vendors;

pub use builtin::seed_builtins;
pub use discovery::{
    find_project_config, load_config, load_config_file, load_config_from,
    load_config_with_options, log_dir, save_config, user_config_dir, user_config_path,
    ConfigSource, LoadedConfig,
};
pub use error::{ConfigError, ErrorCategory, Result};
pub use layers::{Layer, Sourced};
pub use mapping::{FieldRef, Selector};
pub use resolver::{Overrides, RedactedRuntime, Resolver, RuntimeConfig, Sources};
pub use secrets::{
    resolve_credential, resolve_reference, CredentialError, Environment, ProcessEnv,
    ResolvedSecret, SecretSource,
};
pub use store::ConfigStore;
pub use types::*;
pub use validate::{validate, Issue, Level, ValidationReport};
pub use vendors::{resolve_vendor, ResolvedVendor};
