//! Configuration and resolution error types.
//!
//! Every variant carries a stable machine-readable code (`AIM-<CAT>-<NNN>`),
//! a category that the CLI maps to a process exit code, and remediation
//! suggestions for display.

use std::time::Duration;

use crate::secrets::CredentialError;

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write a config file.
    #[error("failed to write config file '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Failed to parse or serialize YAML.
    #[error("failed to parse YAML config: {0}")]
    ParseYaml(String),

    /// The `version` field names a schema this build does not understand.
    #[error("config version '{0}' is not supported (expected \"2\")")]
    UnsupportedVersion(String),

    /// A timeout value could not be normalised into a duration.
    #[error("invalid timeout '{value}': {reason}")]
    InvalidTimeout { value: String, reason: String },

    /// A field-mapping path does not match any known shape.
    #[error("invalid field path '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: String },

    /// A config mutation would leave the tree with a validation error.
    #[error("invalid config at '{field}': {message}")]
    Invalid { field: String, message: String },

    /// Requested tool is not declared.
    #[error("tool '{name}' not found")]
    ToolNotFound { name: String, available: Vec<String> },

    /// Requested key (credential) is not declared.
    #[error("key '{name}' not found")]
    CredentialNotFound { name: String, available: Vec<String> },

    /// No key was given and `settings.default_key` is unset.
    #[error("no key specified and no default key configured")]
    NoDefaultKey,

    /// Referenced vendor is not declared.
    #[error("vendor '{name}' not found")]
    VendorNotFound { name: String },

    /// A vendor's `base` chain loops back on itself.
    #[error("cyclic vendor inheritance: {}", chain.join(" -> "))]
    CyclicVendorInheritance { chain: Vec<String> },

    /// The selected endpoint does not exist on the resolved vendor.
    #[error("vendor '{vendor}' does not support endpoint '{endpoint}'")]
    EndpointNotSupported { vendor: String, endpoint: String },

    /// The credential restricts endpoints and the selected one is not allowed.
    #[error("key '{key}' is not allowed to use endpoint '{endpoint}'")]
    EndpointNotAllowed {
        key: String,
        endpoint: String,
        allowed: Vec<String>,
    },

    /// The tool has no profile entry for the effective profile name.
    #[error("profile '{profile}' not configured for tool '{tool}'")]
    ProfileNotConfiguredForTool { profile: String, tool: String },

    /// Neither the caller, the key, nor the settings name a profile.
    #[error("cannot determine a profile for tool '{tool}' with key '{key}'")]
    NoProfileResolvable { tool: String, key: String },

    /// The key's reference could not be turned into a secret value.
    #[error("key '{key}': {source}")]
    Credential {
        key: String,
        #[source]
        source: CredentialError,
    },

    /// The tool's command could not be found on `PATH`.
    #[error("command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    /// The tool's process could not be started or waited on.
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The tool ran past its resolved timeout and was killed.
    #[error("command '{command}' timed out after {}", humantime::format_duration(*timeout))]
    ExecutionTimeout { command: String, timeout: Duration },
}

/// Broad error classes, each mapped to a distinct process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Config file shape, parse, or I/O problems.
    Config,
    /// Key lookup and secret resolution.
    Key,
    /// Vendor lookup, inheritance and endpoints.
    Vendor,
    /// Tool lookup and command availability.
    Tool,
    /// Profile selection.
    Profile,
    /// Subprocess execution.
    Exec,
}

impl ErrorCategory {
    /// Short tag used inside error codes.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "CFG",
            ErrorCategory::Key => "KEY",
            ErrorCategory::Vendor => "VEN",
            ErrorCategory::Tool => "TOO",
            ErrorCategory::Profile => "PRO",
            ErrorCategory::Exec => "EXE",
        }
    }

    /// Process exit code for this category.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::Config => 2,
            ErrorCategory::Key => 3,
            ErrorCategory::Vendor => 4,
            ErrorCategory::Tool => 5,
            ErrorCategory::Exec => 6,
            ErrorCategory::Profile => 7,
        }
    }
}

impl ConfigError {
    /// Stable machine-readable code, e.g. `AIM-VEN-002`.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::ReadFile { .. } => "AIM-CFG-001",
            ConfigError::WriteFile { .. } => "AIM-CFG-002",
            ConfigError::Parse(_) | ConfigError::ParseYaml(_) => "AIM-CFG-003",
            ConfigError::Serialize(_) => "AIM-CFG-004",
            ConfigError::UnsupportedVersion(_) => "AIM-CFG-005",
            ConfigError::InvalidTimeout { .. } => "AIM-CFG-006",
            ConfigError::InvalidFieldPath { .. } => "AIM-CFG-007",
            ConfigError::Invalid { .. } => "AIM-CFG-008",
            ConfigError::ToolNotFound { .. } => "AIM-TOO-001",
            ConfigError::CommandNotFound { .. } => "AIM-TOO-002",
            ConfigError::CredentialNotFound { .. } => "AIM-KEY-001",
            ConfigError::EndpointNotAllowed { .. } => "AIM-KEY-002",
            ConfigError::Credential { source, .. } => source.code(),
            ConfigError::NoDefaultKey => "AIM-KEY-005",
            ConfigError::VendorNotFound { .. } => "AIM-VEN-001",
            ConfigError::EndpointNotSupported { .. } => "AIM-VEN-002",
            ConfigError::CyclicVendorInheritance { .. } => "AIM-VEN-003",
            ConfigError::ProfileNotConfiguredForTool { .. } => "AIM-PRO-001",
            ConfigError::NoProfileResolvable { .. } => "AIM-PRO-002",
            ConfigError::ExecutionTimeout { .. } => "AIM-EXE-001",
            ConfigError::Spawn { .. } => "AIM-EXE-002",
        }
    }

    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConfigError::ReadFile { .. }
            | ConfigError::WriteFile { .. }
            | ConfigError::Parse(_)
            | ConfigError::Serialize(_)
            | ConfigError::ParseYaml(_)
            | ConfigError::UnsupportedVersion(_)
            | ConfigError::InvalidTimeout { .. }
            | ConfigError::InvalidFieldPath { .. }
            | ConfigError::Invalid { .. } => ErrorCategory::Config,
            ConfigError::ToolNotFound { .. } | ConfigError::CommandNotFound { .. } => {
                ErrorCategory::Tool
            }
            ConfigError::CredentialNotFound { .. }
            | ConfigError::EndpointNotAllowed { .. }
            | ConfigError::Credential { .. }
            | ConfigError::NoDefaultKey => ErrorCategory::Key,
            ConfigError::VendorNotFound { .. }
            | ConfigError::EndpointNotSupported { .. }
            | ConfigError::CyclicVendorInheritance { .. } => ErrorCategory::Vendor,
            ConfigError::ProfileNotConfiguredForTool { .. }
            | ConfigError::NoProfileResolvable { .. } => ErrorCategory::Profile,
            ConfigError::ExecutionTimeout { .. } | ConfigError::Spawn { .. } => {
                ErrorCategory::Exec
            }
        }
    }

    /// Process exit code the CLI should use for this error.
    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    /// Human-readable remediation hints.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ReadFile { .. } => {
                vec!["Run 'aim config init' to create a config file".to_string()]
            }
            ConfigError::UnsupportedVersion(_) => {
                vec!["Set 'version = \"2\"' at the top of your config".to_string()]
            }
            ConfigError::InvalidTimeout { .. } => vec![
                "Use a duration string such as \"30s\" or \"5m\", or integer milliseconds"
                    .to_string(),
            ],
            ConfigError::InvalidFieldPath { .. } => vec![
                "Valid paths: keys.{current_key}.key, profiles.{current_profile}.base_url, \
                 profiles.{current_profile}.model, profiles.{current_profile}.timeout"
                    .to_string(),
            ],
            ConfigError::Invalid { .. } => {
                vec!["Run 'aim config validate' for the full report".to_string()]
            }
            ConfigError::ToolNotFound { available, .. } => {
                with_available("Add the tool under [tools] in your config", available)
            }
            ConfigError::CommandNotFound { .. } => {
                vec!["Install the tool or check your PATH".to_string()]
            }
            ConfigError::CredentialNotFound { available, .. } => {
                with_available("Add the key under [keys] in your config", available)
            }
            ConfigError::NoDefaultKey => vec![
                "Pass --key <name>".to_string(),
                "Or set 'default_key' in [settings]".to_string(),
            ],
            ConfigError::VendorNotFound { .. } => vec![
                "Define the vendor under [vendors]".to_string(),
                "Or enable 'seed_builtins' in [settings] to use a built-in vendor".to_string(),
            ],
            ConfigError::CyclicVendorInheritance { .. } => {
                vec!["Remove the 'base' entry that closes the loop".to_string()]
            }
            ConfigError::EndpointNotSupported { .. } => vec![
                "Add the endpoint to the vendor's [endpoints] table".to_string(),
                "Or point the profile's 'endpoints' override at an existing endpoint"
                    .to_string(),
            ],
            ConfigError::EndpointNotAllowed { allowed, .. } => vec![
                format!("Allowed endpoints for this key: {}", allowed.join(", ")),
                "Add the endpoint to the key's 'endpoints' list, or remove the restriction"
                    .to_string(),
            ],
            ConfigError::ProfileNotConfiguredForTool { tool, .. } => {
                vec![format!("Add a [tools.{}.profiles.<name>] entry", tool)]
            }
            ConfigError::NoProfileResolvable { .. } => vec![
                "Pass --profile <name>".to_string(),
                "Or set 'vendor' on the key, or 'default_provider' in [settings]".to_string(),
            ],
            ConfigError::Credential { source, .. } => source.suggestions(),
            ConfigError::ExecutionTimeout { .. } => {
                vec!["Increase the timeout with --timeout".to_string()]
            }
            ConfigError::WriteFile { .. }
            | ConfigError::Spawn { .. }
            | ConfigError::Parse(_)
            | ConfigError::Serialize(_)
            | ConfigError::ParseYaml(_) => Vec::new(),
        }
    }
}

fn with_available(hint: &str, available: &[String]) -> Vec<String> {
    let mut out = vec![hint.to_string()];
    if !available.is_empty() {
        out.push(format!("Available: {}", available.join(", ")));
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
