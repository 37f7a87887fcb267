//! Field mapping: resolved values → the environment a tool expects.
//!
//! A mapping table pairs an env var name with a [`FieldRef`]. Field paths are
//! parsed once, when the config is loaded, from a small fixed grammar:
//!
//! | path                                  | value                     |
//! |---------------------------------------|---------------------------|
//! | `keys.{current_key}.key`              | resolved credential       |
//! | `profiles.{current_profile}.base_url` | resolved base URL         |
//! | `profiles.{current_profile}.model`    | resolved model            |
//! | `profiles.{current_profile}.timeout`  | resolved timeout, in ms   |
//!
//! A literal name may stand in for the placeholder. It is kept for display;
//! resolution always reads the active key and profile.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Profile, Tool};
use crate::ConfigError;

const CURRENT_KEY: &str = "{current_key}";
const CURRENT_PROFILE: &str = "{current_profile}";

// ─────────────────────────────────────────────────────────────────────────────
// Field paths
// ─────────────────────────────────────────────────────────────────────────────

/// The name segment of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// `{current_key}` / `{current_profile}`.
    Current,
    /// A literal name.
    Named(String),
}

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldRef {
    /// `keys.<name>.key`
    CredentialKey(Selector),
    /// `profiles.<name>.base_url`
    ProfileBaseUrl(Selector),
    /// `profiles.<name>.model`
    ProfileModel(Selector),
    /// `profiles.<name>.timeout`
    ProfileTimeout(Selector),
}

impl FieldRef {
    /// Value this path produces, or `None` when empty.
    pub fn resolve(&self, values: &FieldValues<'_>) -> Option<String> {
        let value = match self {
            FieldRef::CredentialKey(_) => values.api_key.to_string(),
            FieldRef::ProfileBaseUrl(_) => values.base_url.to_string(),
            FieldRef::ProfileModel(_) => values.model.to_string(),
            FieldRef::ProfileTimeout(_) => values.timeout.as_millis().to_string(),
        };
        Some(value).filter(|v| !v.is_empty())
    }

    fn selector(&self) -> &Selector {
        match self {
            FieldRef::CredentialKey(s)
            | FieldRef::ProfileBaseUrl(s)
            | FieldRef::ProfileModel(s)
            | FieldRef::ProfileTimeout(s) => s,
        }
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidFieldPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn parse_selector(path: &str, segment: &str, placeholder: &str) -> Result<Selector, ConfigError> {
    if segment == placeholder {
        return Ok(Selector::Current);
    }
    if segment.is_empty() {
        return Err(invalid(path, "empty name segment"));
    }
    if segment.starts_with('{') || segment.ends_with('}') {
        return Err(invalid(
            path,
            format!("unknown placeholder '{}', expected '{}'", segment, placeholder),
        ));
    }
    Ok(Selector::Named(segment.to_string()))
}

impl FromStr for FieldRef {
    type Err = ConfigError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = path.split('.').collect();
        let [root, name, field] = parts.as_slice() else {
            return Err(invalid(path, "expected <section>.<name>.<field>"));
        };

        match *root {
            "keys" => {
                let selector = parse_selector(path, name, CURRENT_KEY)?;
                match *field {
                    "key" => Ok(FieldRef::CredentialKey(selector)),
                    other => Err(invalid(
                        path,
                        format!("unknown key field '{}', expected 'key'", other),
                    )),
                }
            }
            "profiles" => {
                let selector = parse_selector(path, name, CURRENT_PROFILE)?;
                match *field {
                    "base_url" => Ok(FieldRef::ProfileBaseUrl(selector)),
                    "model" => Ok(FieldRef::ProfileModel(selector)),
                    "timeout" => Ok(FieldRef::ProfileTimeout(selector)),
                    other => Err(invalid(
                        path,
                        format!(
                            "unknown profile field '{}', expected base_url, model or timeout",
                            other
                        ),
                    )),
                }
            }
            other => Err(invalid(
                path,
                format!("unknown section '{}', expected 'keys' or 'profiles'", other),
            )),
        }
    }
}

impl TryFrom<String> for FieldRef {
    type Error = ConfigError;

    fn try_from(path: String) -> Result<Self, Self::Error> {
        path.parse()
    }
}

impl From<FieldRef> for String {
    fn from(field: FieldRef) -> Self {
        field.to_string()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (root, placeholder, field) = match self {
            FieldRef::CredentialKey(_) => ("keys", CURRENT_KEY, "key"),
            FieldRef::ProfileBaseUrl(_) => ("profiles", CURRENT_PROFILE, "base_url"),
            FieldRef::ProfileModel(_) => ("profiles", CURRENT_PROFILE, "model"),
            FieldRef::ProfileTimeout(_) => ("profiles", CURRENT_PROFILE, "timeout"),
        };
        let name = match self.selector() {
            Selector::Current => placeholder,
            Selector::Named(name) => name.as_str(),
        };
        write!(f, "{}.{}.{}", root, name, field)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Environment synthesis
// ─────────────────────────────────────────────────────────────────────────────

/// Already-resolved values a field path can read.
#[derive(Debug, Clone, Copy)]
pub struct FieldValues<'a> {
    pub api_key: &'a str,
    pub base_url: &'a str,
    pub model: &'a str,
    pub timeout: Duration,
}

/// Everything [`build_environment`] reads.
#[derive(Debug, Clone, Copy)]
pub struct MappingInput<'a> {
    pub tool: &'a Tool,
    pub profile: &'a Profile,
    pub values: FieldValues<'a>,
    /// Vendor-specific variable the key must also be exposed under.
    pub key_env_var: Option<&'a str>,
}

/// Build the tool's environment variables.
///
/// Order of application:
/// 1. profile field mapping
/// 2. tool field mapping, only for variables step 1 did not set
/// 3. vendor key variable, if not already set
/// 4. tool default env, overwriting
/// 5. profile env, overwriting
pub fn build_environment(input: &MappingInput<'_>) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    for (name, field) in &input.profile.field_mapping {
        if let Some(value) = field.resolve(&input.values) {
            env.insert(name.clone(), value);
        }
    }

    for (name, field) in &input.tool.field_mapping {
        if env.contains_key(name) {
            continue;
        }
        if let Some(value) = field.resolve(&input.values) {
            env.insert(name.clone(), value);
        }
    }

    if let Some(var) = input.key_env_var.filter(|v| !v.is_empty())
        && !input.values.api_key.is_empty()
    {
        env.entry(var.to_string())
            .or_insert_with(|| input.values.api_key.to_string());
    }

    for (name, value) in &input.tool.defaults.env {
        env.insert(name.clone(), value.clone());
    }

    for (name, value) in &input.profile.env {
        env.insert(name.clone(), value.clone());
    }

    env
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
