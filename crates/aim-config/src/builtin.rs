//! Built-in vendors and tools.
//!
//! [`seed_builtins`] copies these into a config tree once, at load time.
//! Resolution never looks here; it only sees what was seeded.

use std::collections::BTreeMap;

use tracing::debug;

use crate::mapping::{FieldRef, Selector};
use crate::types::{AimConfig, ArgStyle, Endpoint, Profile, Tool, Vendor, VendorToolHints};

/// Names of the built-in vendors.
pub const BUILTIN_VENDORS: &[&str] = &["deepseek", "glm", "kimi", "qwen"];

/// Names of the built-in tools.
pub const BUILTIN_TOOLS: &[&str] = &["claude-code", "codex", "opencode"];

struct VendorSpec {
    name: &'static str,
    display_name: &'static str,
    openai: (&'static str, &'static str),
    anthropic: (&'static str, &'static str),
    claude_timeout: u64,
    codex_env_key: &'static str,
    codex_timeout: u64,
}

const VENDORS: &[VendorSpec] = &[
    VendorSpec {
        name: "deepseek",
        display_name: "DeepSeek",
        openai: ("https://api.deepseek.com/v1", "deepseek-chat"),
        anthropic: ("https://api.deepseek.com/anthropic", "deepseek-chat"),
        claude_timeout: 60_000,
        codex_env_key: "DEEPSEEK_API_KEY",
        codex_timeout: 60_000,
    },
    VendorSpec {
        name: "glm",
        display_name: "GLM",
        openai: ("https://open.bigmodel.cn/api/paas/v4", "glm-4.7"),
        anthropic: ("https://open.bigmodel.cn/api/anthropic", "glm-4.7"),
        claude_timeout: 3_000_000,
        codex_env_key: "GLM_API_KEY",
        codex_timeout: 300_000,
    },
    VendorSpec {
        name: "kimi",
        display_name: "Kimi",
        openai: ("https://api.moonshot.cn/v1", "kimi-k2.5"),
        anthropic: ("https://api.moonshot.cn/anthropic", "kimi-k2.5"),
        claude_timeout: 60_000,
        codex_env_key: "KIMI_API_KEY",
        codex_timeout: 60_000,
    },
    VendorSpec {
        name: "qwen",
        display_name: "Qwen",
        openai: ("https://dashscope.aliyuncs.com/compatible-mode/v1", "qwen3-max"),
        anthropic: (
            "https://dashscope.aliyuncs.com/api/v2/apps/claude-code-proxy",
            "qwen3-max",
        ),
        claude_timeout: 60_000,
        codex_env_key: "QWEN_API_KEY",
        codex_timeout: 60_000,
    },
];

/// Every built-in vendor, by name.
pub fn builtin_vendors() -> BTreeMap<String, Vendor> {
    VENDORS
        .iter()
        .map(|spec| {
            let vendor = Vendor {
                display_name: Some(spec.display_name.to_string()),
                endpoints: BTreeMap::from([
                    ("openai".to_string(), Endpoint::new(spec.openai.0, spec.openai.1)),
                    (
                        "anthropic".to_string(),
                        Endpoint::new(spec.anthropic.0, spec.anthropic.1),
                    ),
                ]),
                tools: BTreeMap::from([
                    (
                        "claude-code".to_string(),
                        VendorToolHints {
                            env_key: None,
                            timeout: Some(spec.claude_timeout),
                        },
                    ),
                    (
                        "codex".to_string(),
                        VendorToolHints {
                            env_key: Some(spec.codex_env_key.to_string()),
                            timeout: Some(spec.codex_timeout),
                        },
                    ),
                ]),
                ..Default::default()
            };
            (spec.name.to_string(), vendor)
        })
        .collect()
}

fn vendor_profiles() -> BTreeMap<String, Profile> {
    BUILTIN_VENDORS
        .iter()
        .map(|name| (name.to_string(), Profile::for_provider(*name)))
        .collect()
}

fn fields(pairs: &[(&str, FieldRef)]) -> BTreeMap<String, FieldRef> {
    pairs
        .iter()
        .map(|(name, field)| (name.to_string(), field.clone()))
        .collect()
}

/// Every built-in tool, by name.
pub fn builtin_tools() -> BTreeMap<String, Tool> {
    let key = FieldRef::CredentialKey(Selector::Current);
    let base_url = FieldRef::ProfileBaseUrl(Selector::Current);
    let model = FieldRef::ProfileModel(Selector::Current);
    let timeout = FieldRef::ProfileTimeout(Selector::Current);

    let mut claude = Tool {
        command: "claude".to_string(),
        protocol: "anthropic".to_string(),
        field_mapping: fields(&[
            ("ANTHROPIC_AUTH_TOKEN", key.clone()),
            ("ANTHROPIC_BASE_URL", base_url.clone()),
            ("ANTHROPIC_MODEL", model.clone()),
            ("API_TIMEOUT_MS", timeout),
        ]),
        profiles: vendor_profiles(),
        ..Default::default()
    };
    claude.defaults.env.insert(
        "CLAUDE_CODE_DISABLE_NONESSENTIAL_TRAFFIC".to_string(),
        "1".to_string(),
    );

    let codex = Tool {
        command: "codex".to_string(),
        protocol: "openai".to_string(),
        args: ArgStyle::Codex,
        field_mapping: fields(&[("OPENAI_API_KEY", key.clone())]),
        profiles: vendor_profiles(),
        ..Default::default()
    };

    let opencode = Tool {
        command: "opencode".to_string(),
        protocol: "openai".to_string(),
        args: ArgStyle::ModelFlag,
        field_mapping: fields(&[
            ("OPENAI_API_KEY", key),
            ("OPENAI_BASE_URL", base_url),
            ("OPENAI_MODEL", model),
        ]),
        profiles: vendor_profiles(),
        ..Default::default()
    };

    BTreeMap::from([
        ("claude-code".to_string(), claude),
        ("codex".to_string(), codex),
        ("opencode".to_string(), opencode),
    ])
}

/// Built-in tool aliases.
pub fn builtin_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("cc".to_string(), "claude-code".to_string()),
        ("claude".to_string(), "claude-code".to_string()),
    ])
}

/// Add built-in vendors, tools and aliases the config does not define.
///
/// A user-defined vendor replaces the built-in one entirely. A user entry
/// for a built-in tool that leaves `command` empty is a partial override:
/// it is completed from the built-in tool, keeping every field and profile
/// the user did set. A tool with its own `command` is left untouched.
pub fn seed_builtins(config: &mut AimConfig) {
    let mut seeded = 0usize;

    for (name, vendor) in builtin_vendors() {
        if !config.vendors.contains_key(&name) {
            config.vendors.insert(name, vendor);
            seeded += 1;
        }
    }

    for (name, tool) in builtin_tools() {
        match config.tools.get_mut(&name) {
            None => {
                config.tools.insert(name, tool);
                seeded += 1;
            }
            Some(user) if user.command.is_empty() => {
                debug!(tool = %name, "completing partial built-in tool");
                complete_tool(user, tool);
                seeded += 1;
            }
            Some(_) => {}
        }
    }

    for (alias, target) in builtin_aliases() {
        if !config.aliases.contains_key(&alias) && !config.tools.contains_key(&alias) {
            config.aliases.insert(alias, target);
        }
    }

    debug!(seeded, "seeded built-in definitions");
}

/// Fill what `user` leaves unset from `builtin`.
fn complete_tool(user: &mut Tool, builtin: Tool) {
    user.command = builtin.command;
    if user.protocol.is_empty() {
        user.protocol = builtin.protocol;
    }
    if user.args == ArgStyle::None {
        user.args = builtin.args;
    }
    if user.defaults.timeout.is_none() {
        user.defaults.timeout = builtin.defaults.timeout;
    }
    for (var, value) in builtin.defaults.env {
        user.defaults.env.entry(var).or_insert(value);
    }
    for (var, field) in builtin.field_mapping {
        user.field_mapping.entry(var).or_insert(field);
    }
    for (name, profile) in builtin.profiles {
        let entry = user.profiles.entry(name).or_default();
        if entry.provider.is_empty() {
            entry.provider = profile.provider;
        }
    }
}
