//! Configuration types mapping to the config file schema.
//!
//! Top-level config:
//! ```toml
//! version = "2"
//! [settings]                      # defaults and process-wide timeout
//! [aliases]                       # short tool names
//! [keys.<name>]                   # credentials
//! [vendors.<name>]                # API vendors and their endpoints
//! [tools.<name>]                  # tool launch and field mapping
//! [tools.<name>.profiles.<name>]  # per-tool provider bindings
//! ```
//!
//! Every map is a `BTreeMap` so iteration order, and therefore every
//! resolved environment, is deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mapping::FieldRef;
use crate::secrets::{self, SecretSource};
use crate::{ConfigError, Result};

/// Schema version understood by this build.
pub const CONFIG_VERSION: &str = "2";

/// Timeout used when no layer sets one.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Declarative env-var-name → field-path table.
pub type FieldMapping = BTreeMap<String, FieldRef>;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration tree.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimConfig {
    /// Schema version; `"2"` when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Global settings.
    pub settings: Settings,

    /// Tool aliases (`cc = "claude-code"`).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,

    /// Credentials by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub keys: BTreeMap<String, Credential>,

    /// Vendors by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub vendors: BTreeMap<String, Vendor>,

    /// Tools by canonical name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, Tool>,
}

impl AimConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AimConfig = toml::from_str(toml_str)?;
        config.checked()
    }

    /// Parse from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let config: AimConfig =
            serde_yaml::from_str(yaml_str).map_err(|e| ConfigError::ParseYaml(e.to_string()))?;
        config.checked()
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Load-time checks that serde cannot express.
    fn checked(self) -> Result<Self> {
        if let Some(ref version) = self.version
            && version != CONFIG_VERSION
        {
            return Err(ConfigError::UnsupportedVersion(version.clone()));
        }
        for timeout in [&self.settings.timeout, &self.settings.command_timeout]
            .into_iter()
            .flatten()
        {
            timeout.to_duration()?;
        }
        Ok(self)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Named entries (keys, vendors, tools, aliases) are replaced whole;
    /// settings are overridden field by field.
    pub fn merge(&mut self, other: AimConfig) {
        if other.version.is_some() {
            self.version = other.version;
        }

        self.settings.merge(other.settings);

        for (name, target) in other.aliases {
            self.aliases.insert(name, target);
        }

        for (name, key) in other.keys {
            self.keys.insert(name, key);
        }

        for (name, vendor) in other.vendors {
            self.vendors.insert(name, vendor);
        }

        for (name, tool) in other.tools {
            self.tools.insert(name, tool);
        }
    }

    /// Resolve a tool alias to its canonical name.
    pub fn canonical_tool_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Look up a key by name.
    pub fn key(&self, name: &str) -> Option<&Credential> {
        self.keys.get(name)
    }

    /// Look up a vendor by name (no inheritance applied).
    pub fn vendor(&self, name: &str) -> Option<&Vendor> {
        self.vendors.get(name)
    }

    /// Look up a tool by canonical name or alias.
    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.get(self.canonical_tool_name(name))
    }

    /// Look up the profile entry of a tool.
    pub fn tool_profile(&self, tool: &str, profile: &str) -> Option<&Profile> {
        self.tool(tool)?.profiles.get(profile)
    }

    /// Process-wide timeout from `[settings]`, if set and non-zero.
    pub fn settings_timeout(&self) -> Result<Option<Duration>> {
        match self.settings.timeout {
            Some(ref t) => Ok(Some(t.to_duration()?).filter(|d| !d.is_zero())),
            None => Ok(None),
        }
    }

    /// Copy safe to print: key values are shortened unless they are
    /// `${VAR}` references, which name the secret without holding it.
    pub fn redacted(&self) -> AimConfig {
        let mut copy = self.clone();
        for key in copy.keys.values_mut() {
            if !matches!(SecretSource::of(&key.value), SecretSource::EnvVar(_)) {
                key.value = secrets::preview(&key.value);
            }
        }
        copy
    }

    /// Deadline for a launched tool process, if set and non-zero.
    ///
    /// Independent of the request timeout chain; unset means the tool runs
    /// until it exits.
    pub fn command_timeout(&self) -> Result<Option<Duration>> {
        match self.settings.command_timeout {
            Some(ref t) => Ok(Some(t.to_duration()?).filter(|d| !d.is_zero())),
            None => Ok(None),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Global settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tool used when none is named on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_tool: Option<String>,
    /// Key used when `--key` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_key: Option<String>,
    /// Last-resort profile name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    /// Request timeout for every tool (`"5m"` or milliseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutValue>,
    /// Deadline after which `aim run` kills the launched tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<TimeoutValue>,
    /// Populate built-in vendors and tools at load time (default: true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_builtins: Option<bool>,
}

impl Settings {
    /// Whether the built-in seed step should run.
    pub fn seed_builtins(&self) -> bool {
        self.seed_builtins.unwrap_or(true)
    }

    fn merge(&mut self, other: Settings) {
        if other.default_tool.is_some() {
            self.default_tool = other.default_tool;
        }
        if other.default_key.is_some() {
            self.default_key = other.default_key;
        }
        if other.default_provider.is_some() {
            self.default_provider = other.default_provider;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.command_timeout.is_some() {
            self.command_timeout = other.command_timeout;
        }
        if other.seed_builtins.is_some() {
            self.seed_builtins = other.seed_builtins;
        }
    }
}

/// A timeout as written in the config: integer milliseconds or a duration string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeoutValue {
    /// Milliseconds.
    Millis(u64),
    /// Duration string such as `"30s"`, `"5m"`, `"1h30m"`.
    Text(String),
}

impl TimeoutValue {
    /// Normalise into a [`Duration`].
    ///
    /// A string made only of digits is read as milliseconds.
    pub fn to_duration(&self) -> Result<Duration> {
        match self {
            TimeoutValue::Millis(ms) => Ok(Duration::from_millis(*ms)),
            TimeoutValue::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                    let ms = trimmed
                        .parse::<u64>()
                        .map_err(|e| ConfigError::InvalidTimeout {
                            value: text.clone(),
                            reason: e.to_string(),
                        })?;
                    return Ok(Duration::from_millis(ms));
                }
                humantime::parse_duration(trimmed).map_err(|e| ConfigError::InvalidTimeout {
                    value: text.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keys
// ─────────────────────────────────────────────────────────────────────────────

/// A credential: a secret reference plus the vendor it authenticates against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credential {
    /// Secret reference: plain, `base64:...`, or `${ENV_VAR}`.
    pub value: String,
    /// Vendor this key belongs to; also the key's default profile name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Endpoints this key may be used with. Absent or empty: unrestricted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<BTreeSet<String>>,
    /// Per-protocol endpoint selection (protocol → endpoint name).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub protocols: BTreeMap<String, String>,
    /// Free-form note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Credential {
    /// Build a key bound to a vendor.
    pub fn new(value: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            vendor: Some(vendor.into()),
            ..Default::default()
        }
    }

    /// Vendor name, if non-empty.
    pub fn vendor_name(&self) -> Option<&str> {
        self.vendor.as_deref().filter(|v| !v.is_empty())
    }

    /// Whether `endpoint` passes this key's allow-list.
    pub fn allows_endpoint(&self, endpoint: &str) -> bool {
        match self.endpoints {
            Some(ref allowed) if !allowed.is_empty() => allowed.contains(endpoint),
            _ => true,
        }
    }

    /// Allow-list as a vector, for error reporting.
    pub fn allowed_endpoints(&self) -> Vec<String> {
        self.endpoints
            .as_ref()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vendors
// ─────────────────────────────────────────────────────────────────────────────

/// An upstream API vendor: named endpoints plus optional inheritance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vendor {
    /// Vendor whose endpoints this one inherits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Human-readable name, used in generated tool arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Provider-global timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Endpoints by name (conventionally the protocol: `openai`, `anthropic`).
    pub endpoints: BTreeMap<String, Endpoint>,
    /// Per-tool hints for this vendor.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, VendorToolHints>,
}

impl Vendor {
    /// Look up an endpoint by name.
    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    /// Hints for `tool`, if any.
    pub fn tool_hints(&self, tool: &str) -> Option<&VendorToolHints> {
        self.tools.get(tool)
    }
}

/// One URL + default model within a vendor.
///
/// Accepts either a table (`{ url = "...", default_model = "..." }`) or a
/// bare URL string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EndpointRepr")]
pub struct Endpoint {
    /// Base URL.
    pub url: String,
    /// Model used when no profile overrides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl Endpoint {
    /// Build an endpoint with a default model.
    pub fn new(url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            default_model: Some(default_model.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EndpointRepr {
    Url(String),
    Full {
        url: String,
        #[serde(default)]
        default_model: Option<String>,
    },
}

impl From<EndpointRepr> for Endpoint {
    fn from(repr: EndpointRepr) -> Self {
        match repr {
            EndpointRepr::Url(url) => Endpoint {
                url,
                default_model: None,
            },
            EndpointRepr::Full { url, default_model } => Endpoint { url, default_model },
        }
    }
}

/// Vendor-specific settings for one tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorToolHints {
    /// Env var the tool reads this vendor's key from (e.g. `GLM_API_KEY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_key: Option<String>,
    /// Fallback timeout in milliseconds for this vendor + tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// How a tool is launched and how resolved values reach it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tool {
    /// Executable name or path.
    pub command: String,
    /// Default protocol; used directly as the endpoint name.
    pub protocol: String,
    /// Command-line argument synthesis style.
    pub args: ArgStyle,
    /// Where synthesized arguments go relative to user arguments.
    pub args_position: ArgsPosition,
    /// Tool-level defaults.
    #[serde(skip_serializing_if = "ToolDefaults::is_empty")]
    pub defaults: ToolDefaults,
    /// Tool-level field mapping.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub field_mapping: FieldMapping,
    /// Provider bindings by profile name.
    pub profiles: BTreeMap<String, Profile>,
}

/// Tool-level defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefaults {
    /// Timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Static environment variables.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ToolDefaults {
    fn is_empty(&self) -> bool {
        self.timeout.is_none() && self.env.is_empty()
    }
}

/// A named binding of a tool to a provider, with optional overrides.
///
/// Accepts a bare provider name as shorthand (`deepseek = "deepseek"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ProfileRepr")]
pub struct Profile {
    /// Vendor this profile talks to. Empty: the key's vendor.
    pub provider: String,
    /// Base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Timeout override in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Per-protocol endpoint overrides (protocol → endpoint name).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoints: BTreeMap<String, String>,
    /// Static environment variables; always win.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Profile field mapping; wins over the tool's for the same variable.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub field_mapping: FieldMapping,
}

impl Profile {
    /// Build a profile for a provider with no overrides.
    pub fn for_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }
}

/// A profile as written: a bare provider name or a full table.
///
/// Deserialized by hand rather than `untagged` so errors inside the table
/// (a bad field path, say) keep their own message.
enum ProfileRepr {
    Provider(String),
    Full(ProfileFields),
}

impl<'de> Deserialize<'de> for ProfileRepr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ReprVisitor;

        impl<'de> serde::de::Visitor<'de> for ReprVisitor {
            type Value = ProfileRepr;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a provider name or a profile table")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                Ok(ProfileRepr::Provider(v.to_string()))
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                ProfileFields::deserialize(serde::de::value::MapAccessDeserializer::new(map))
                    .map(ProfileRepr::Full)
            }
        }

        deserializer.deserialize_any(ReprVisitor)
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ProfileFields {
    provider: String,
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<u64>,
    endpoints: BTreeMap<String, String>,
    env: BTreeMap<String, String>,
    field_mapping: FieldMapping,
}

impl From<ProfileRepr> for Profile {
    fn from(repr: ProfileRepr) -> Self {
        match repr {
            ProfileRepr::Provider(provider) => Profile::for_provider(provider),
            ProfileRepr::Full(f) => Profile {
                provider: f.provider,
                base_url: f.base_url,
                model: f.model,
                timeout: f.timeout,
                endpoints: f.endpoints,
                env: f.env,
                field_mapping: f.field_mapping,
            },
        }
    }
}

/// How extra command-line arguments are synthesized for a tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgStyle {
    /// No arguments; everything goes through env vars.
    #[default]
    None,
    /// `-c model_provider=...` overrides understood by codex.
    Codex,
    /// `-m provider/model`.
    ModelFlag,
}

/// Placement of synthesized arguments relative to user arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgsPosition {
    /// Before user arguments.
    #[default]
    Prepend,
    /// After user arguments.
    Append,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
