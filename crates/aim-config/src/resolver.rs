//! Runtime resolution: turns (tool, key, profile) into everything needed to
//! launch the tool.
//!
//! [`Resolver`] borrows a config tree and an [`Environment`] and never
//! mutates either. Each call to [`Resolver::resolve`] either produces a full
//! [`RuntimeConfig`] or fails on the first problem.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::args::{build_cli_args, ArgsInput};
use crate::endpoint::{select_base_url, select_endpoint, select_model};
use crate::layers::{first_layer, Layer, Sourced};
use crate::mapping::{build_environment, FieldValues, MappingInput};
use crate::secrets::{self, Environment, ProcessEnv, SecretSource};
use crate::types::{AimConfig, ArgsPosition, Credential, Profile, Tool, DEFAULT_TIMEOUT_MS};
use crate::vendors::{resolve_vendor, ResolvedVendor};
use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

/// Which layer supplied each layered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sources {
    pub endpoint: Layer,
    pub base_url: Layer,
    pub model: Layer,
    pub timeout: Layer,
}

/// A fully resolved tool run.
#[derive(Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Canonical tool name.
    pub tool: String,
    /// Executable to launch.
    pub command: String,
    /// Key name.
    pub key: String,
    /// Effective profile name.
    pub profile: String,
    /// Vendor name.
    pub provider: String,
    /// Selected endpoint name.
    pub endpoint: String,
    /// Resolved secret.
    pub api_key: String,
    /// Where the secret came from.
    pub api_key_source: SecretSource,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    /// Variables to merge over the inherited environment.
    pub env_vars: BTreeMap<String, String>,
    /// Synthesized arguments.
    pub cli_args: Vec<String>,
    pub args_position: ArgsPosition,
    pub sources: Sources,
}

impl RuntimeConfig {
    /// Full argument list for the tool: synthesized args placed around `user_args`.
    pub fn command_line(&self, user_args: &[String]) -> Vec<String> {
        let mut line = Vec::with_capacity(self.cli_args.len() + user_args.len());
        match self.args_position {
            ArgsPosition::Prepend => {
                line.extend(self.cli_args.iter().cloned());
                line.extend(user_args.iter().cloned());
            }
            ArgsPosition::Append => {
                line.extend(user_args.iter().cloned());
                line.extend(self.cli_args.iter().cloned());
            }
        }
        line
    }

    /// Copy safe to print or serialize: the secret is shortened everywhere.
    pub fn redacted(&self) -> RedactedRuntime {
        RedactedRuntime {
            tool: self.tool.clone(),
            command: self.command.clone(),
            key: self.key.clone(),
            profile: self.profile.clone(),
            provider: self.provider.clone(),
            endpoint: self.endpoint.clone(),
            api_key: secrets::preview(&self.api_key),
            api_key_source: self.api_key_source.to_string(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            timeout_ms: self.timeout.as_millis() as u64,
            env_vars: self.redacted_env(),
            cli_args: self.cli_args.clone(),
            args_position: self.args_position,
            sources: self.sources,
        }
    }

    /// `env_vars` with any value equal to the secret shortened.
    pub fn redacted_env(&self) -> BTreeMap<String, String> {
        self.masked_env(secrets::preview)
    }

    fn masked_env(&self, mask: fn(&str) -> String) -> BTreeMap<String, String> {
        self.env_vars
            .iter()
            .map(|(name, value)| {
                let shown = if !self.api_key.is_empty() && *value == self.api_key {
                    mask(value)
                } else {
                    value.clone()
                };
                (name.clone(), shown)
            })
            .collect()
    }
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("tool", &self.tool)
            .field("command", &self.command)
            .field("key", &self.key)
            .field("profile", &self.profile)
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_key_source", &self.api_key_source)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("env_vars", &self.masked_env(|_| "<redacted>".to_string()))
            .field("cli_args", &self.cli_args)
            .field("args_position", &self.args_position)
            .field("sources", &self.sources)
            .finish()
    }
}

/// Serializable view of a [`RuntimeConfig`] without the secret.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedactedRuntime {
    pub tool: String,
    pub command: String,
    pub key: String,
    pub profile: String,
    pub provider: String,
    pub endpoint: String,
    pub api_key: String,
    pub api_key_source: String,
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub env_vars: BTreeMap<String, String>,
    pub cli_args: Vec<String>,
    pub args_position: ArgsPosition,
    pub sources: Sources,
}

/// Caller-supplied values applied after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub model: Option<String>,
    pub timeout: Option<Duration>,
}

impl Overrides {
    fn is_empty(&self) -> bool {
        self.model.as_deref().is_none_or(str::is_empty) && self.timeout.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves tool runs against a borrowed config tree.
pub struct Resolver<'a> {
    config: &'a AimConfig,
    env: &'a dyn Environment,
}

impl<'a> Resolver<'a> {
    /// Resolver reading the process environment.
    pub fn new(config: &'a AimConfig) -> Self {
        Self {
            config,
            env: &ProcessEnv,
        }
    }

    /// Resolver reading an injected environment.
    pub fn with_env(config: &'a AimConfig, env: &'a dyn Environment) -> Self {
        Self { config, env }
    }

    /// Resolve a tool run.
    ///
    /// An empty `key_name` falls back to `settings.default_key`. An empty
    /// `profile_name` falls back to the key's vendor, then to
    /// `settings.default_provider`.
    pub fn resolve(&self, tool_name: &str, key_name: &str, profile_name: &str) -> Result<RuntimeConfig> {
        let (tool_key, tool) = self.lookup_tool(tool_name)?;
        let (key_name, key) = self.lookup_key(key_name)?;
        let profile_name = self.profile_name(tool_key, key_name, key, profile_name)?;
        let profile = tool.profiles.get(profile_name.as_str()).ok_or_else(|| {
            ConfigError::ProfileNotConfiguredForTool {
                profile: profile_name.clone(),
                tool: tool_key.to_string(),
            }
        })?;

        debug!(tool = tool_key, key = key_name, profile = %profile_name, "resolving");

        let secret = secrets::resolve_reference(&key.value, self.env).map_err(|source| {
            ConfigError::Credential {
                key: key_name.to_string(),
                source,
            }
        })?;

        let provider = provider_name(profile, key, &profile_name);
        let vendor = resolve_vendor(self.config, &provider)?;
        let selection = select_endpoint(&vendor, tool, profile, key_name, key)?;
        let base_url = select_base_url(profile, &selection.endpoint);
        let model = select_model(profile, &selection.endpoint);
        let timeout = self.select_timeout(tool_key, tool, profile, &vendor)?;

        debug!(
            provider = %provider,
            endpoint = %selection.name.value,
            base_url_from = %base_url.layer,
            model_from = %model.layer,
            timeout_from = %timeout.layer,
            key_source = %secret.source,
            "resolved layers"
        );

        let mut rt = RuntimeConfig {
            tool: tool_key.to_string(),
            command: tool.command.clone(),
            key: key_name.to_string(),
            profile: profile_name,
            provider,
            endpoint: selection.name.value,
            api_key: secret.value,
            api_key_source: secret.source,
            base_url: base_url.value,
            model: model.value,
            timeout: timeout.value,
            env_vars: BTreeMap::new(),
            cli_args: Vec::new(),
            args_position: tool.args_position,
            sources: Sources {
                endpoint: selection.name.layer,
                base_url: base_url.layer,
                model: model.layer,
                timeout: timeout.layer,
            },
        };
        synthesize(&mut rt, tool, profile, &vendor);

        Ok(rt)
    }

    /// Resolve with the configured default key and the key's own profile.
    pub fn resolve_with_defaults(&self, tool_name: &str) -> Result<RuntimeConfig> {
        let tool_name = if tool_name.is_empty() {
            self.config.settings.default_tool.as_deref().unwrap_or_default()
        } else {
            tool_name
        };
        self.resolve(tool_name, "", "")
    }

    /// Apply caller overrides and rebuild the environment and arguments.
    pub fn apply_overrides(&self, rt: &mut RuntimeConfig, overrides: &Overrides) -> Result<()> {
        if overrides.is_empty() {
            return Ok(());
        }

        if let Some(model) = overrides.model.as_deref().filter(|m| !m.is_empty()) {
            rt.model = model.to_string();
            rt.sources.model = Layer::Override;
        }
        if let Some(timeout) = overrides.timeout {
            rt.timeout = timeout;
            rt.sources.timeout = Layer::Override;
        }

        let (_, tool) = self.lookup_tool(&rt.tool)?;
        let profile = tool.profiles.get(rt.profile.as_str()).ok_or_else(|| {
            ConfigError::ProfileNotConfiguredForTool {
                profile: rt.profile.clone(),
                tool: rt.tool.clone(),
            }
        })?;
        let vendor = resolve_vendor(self.config, &rt.provider)?;
        synthesize(rt, tool, profile, &vendor);

        debug!(tool = %rt.tool, model = %rt.model, timeout = ?rt.timeout, "applied overrides");
        Ok(())
    }

    fn lookup_tool(&self, name: &str) -> Result<(&'a str, &'a Tool)> {
        let canonical = self.config.canonical_tool_name(name);
        self.config
            .tools
            .get_key_value(canonical)
            .map(|(k, t)| (k.as_str(), t))
            .ok_or_else(|| ConfigError::ToolNotFound {
                name: name.to_string(),
                available: self.config.tools.keys().cloned().collect(),
            })
    }

    fn lookup_key(&self, name: &str) -> Result<(&'a str, &'a Credential)> {
        let name = if name.is_empty() {
            self.config
                .settings
                .default_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(ConfigError::NoDefaultKey)?
        } else {
            name
        };
        self.config
            .keys
            .get_key_value(name)
            .map(|(k, c)| (k.as_str(), c))
            .ok_or_else(|| ConfigError::CredentialNotFound {
                name: name.to_string(),
                available: self.config.keys.keys().cloned().collect(),
            })
    }

    fn profile_name(
        &self,
        tool: &str,
        key_name: &str,
        key: &Credential,
        explicit: &str,
    ) -> Result<String> {
        let name = first_layer([
            (Layer::Override, Some(explicit)),
            (Layer::Credential, key.vendor_name()),
            (Layer::Settings, self.config.settings.default_provider.as_deref()),
        ])
        .ok_or_else(|| ConfigError::NoProfileResolvable {
            tool: tool.to_string(),
            key: key_name.to_string(),
        })?;
        debug!(profile = name.value, from = %name.layer, "profile selected");
        Ok(name.value.to_string())
    }

    /// Profile → tool defaults → vendor → settings → vendor tool default → built-in.
    fn select_timeout(
        &self,
        tool_name: &str,
        tool: &Tool,
        profile: &Profile,
        vendor: &ResolvedVendor,
    ) -> Result<Sourced<Duration>> {
        let ms = |v: Option<u64>| v.map(Duration::from_millis);
        let hint = vendor.tool_hints(tool_name).and_then(|h| h.timeout);

        let found = first_layer([
            (Layer::Profile, ms(profile.timeout)),
            (Layer::ToolDefaults, ms(tool.defaults.timeout)),
            (Layer::Vendor, ms(vendor.timeout)),
            (Layer::Settings, self.config.settings_timeout()?),
            (Layer::VendorToolDefault, ms(hint)),
            (Layer::Builtin, Some(Duration::from_millis(DEFAULT_TIMEOUT_MS))),
        ]);
        Ok(found.unwrap_or_else(|| {
            Sourced::new(Duration::from_millis(DEFAULT_TIMEOUT_MS), Layer::Builtin)
        }))
    }
}

/// Vendor for a profile: its `provider`, else the key's vendor, else the profile name.
fn provider_name(profile: &Profile, key: &Credential, profile_name: &str) -> String {
    first_layer([
        (Layer::Profile, Some(profile.provider.as_str())),
        (Layer::Credential, key.vendor_name()),
        (Layer::Override, Some(profile_name)),
    ])
    .map(|s| s.value.to_string())
    .unwrap_or_default()
}

/// Rebuild `env_vars` and `cli_args` from the resolved fields of `rt`.
fn synthesize(rt: &mut RuntimeConfig, tool: &Tool, profile: &Profile, vendor: &ResolvedVendor) {
    let key_env_var = vendor
        .tool_hints(&rt.tool)
        .and_then(|h| h.env_key.as_deref());

    rt.env_vars = build_environment(&MappingInput {
        tool,
        profile,
        values: FieldValues {
            api_key: &rt.api_key,
            base_url: &rt.base_url,
            model: &rt.model,
            timeout: rt.timeout,
        },
        key_env_var,
    });

    rt.cli_args = build_cli_args(&ArgsInput {
        style: tool.args,
        provider: &rt.provider,
        display_name: &vendor.display_name,
        base_url: &rt.base_url,
        model: &rt.model,
        env_key: key_env_var,
        env_vars: &rt.env_vars,
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
