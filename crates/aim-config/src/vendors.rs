//! Vendor resolution with `base` inheritance.
//!
//! A vendor that names a `base` starts from the fully resolved base and lays
//! its own entries on top: endpoints and per-tool hints are overridden by
//! name, everything the vendor does not mention is inherited unchanged.

use std::collections::BTreeMap;

use tracing::debug;

use crate::types::{AimConfig, Endpoint, Vendor, VendorToolHints};
use crate::{ConfigError, Result};

/// A vendor with its inheritance chain flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVendor {
    /// Name the vendor was requested under.
    pub name: String,
    /// Display name, falling back to `name`.
    pub display_name: String,
    /// Provider-global timeout in milliseconds.
    pub timeout: Option<u64>,
    /// Merged endpoints.
    pub endpoints: BTreeMap<String, Endpoint>,
    /// Merged per-tool hints.
    pub tools: BTreeMap<String, VendorToolHints>,
    /// Vendors consulted, requested vendor first.
    pub lineage: Vec<String>,
}

impl ResolvedVendor {
    /// Look up an endpoint by name.
    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    /// Hints for `tool`, if any.
    pub fn tool_hints(&self, tool: &str) -> Option<&VendorToolHints> {
        self.tools.get(tool)
    }

    /// Endpoint names, sorted.
    pub fn endpoint_names(&self) -> Vec<String> {
        self.endpoints.keys().cloned().collect()
    }
}

/// Follow the `base` chain from `name`, returning vendors leaf first.
///
/// Fails on an unknown vendor anywhere in the chain, or when the chain
/// revisits a vendor.
pub fn vendor_chain<'a>(config: &'a AimConfig, name: &str) -> Result<Vec<(&'a str, &'a Vendor)>> {
    let mut chain: Vec<(&'a str, &'a Vendor)> = Vec::new();
    let mut current = name.to_string();

    loop {
        let (key, vendor) = config
            .vendors
            .get_key_value(current.as_str())
            .ok_or_else(|| ConfigError::VendorNotFound {
                name: current.clone(),
            })?;
        chain.push((key.as_str(), vendor));

        let Some(base) = vendor.base.as_deref().filter(|b| !b.is_empty()) else {
            break;
        };
        if chain.iter().any(|(seen, _)| *seen == base) {
            let mut names: Vec<String> = chain.iter().map(|(n, _)| n.to_string()).collect();
            names.push(base.to_string());
            return Err(ConfigError::CyclicVendorInheritance { chain: names });
        }
        current = base.to_string();
    }

    Ok(chain)
}

/// Resolve a vendor by name, applying inheritance.
pub fn resolve_vendor(config: &AimConfig, name: &str) -> Result<ResolvedVendor> {
    let chain = vendor_chain(config, name)?;

    let mut resolved = ResolvedVendor {
        name: name.to_string(),
        display_name: String::new(),
        timeout: None,
        endpoints: BTreeMap::new(),
        tools: BTreeMap::new(),
        lineage: chain.iter().map(|(n, _)| n.to_string()).collect(),
    };

    // Root first so each descendant overrides its ancestors.
    for (_, vendor) in chain.iter().rev() {
        if let Some(display) = vendor.display_name.as_deref().filter(|d| !d.is_empty()) {
            resolved.display_name = display.to_string();
        }
        if vendor.timeout.is_some() {
            resolved.timeout = vendor.timeout;
        }
        for (endpoint_name, endpoint) in &vendor.endpoints {
            resolved
                .endpoints
                .insert(endpoint_name.clone(), endpoint.clone());
        }
        for (tool, hints) in &vendor.tools {
            let merged = resolved.tools.entry(tool.clone()).or_default();
            if hints.env_key.is_some() {
                merged.env_key = hints.env_key.clone();
            }
            if hints.timeout.is_some() {
                merged.timeout = hints.timeout;
            }
        }
    }

    if resolved.display_name.is_empty() {
        resolved.display_name = name.to_string();
    }

    debug!(
        vendor = name,
        lineage = ?resolved.lineage,
        endpoints = ?resolved.endpoint_names(),
        "resolved vendor"
    );

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VENDORS: &str = r#"
[vendors.glm]
display_name = "GLM"
timeout = 3000000

[vendors.glm.endpoints]
openai = { url = "https://open.bigmodel.cn/api/paas/v4", default_model = "glm-4.6" }
anthropic = { url = "https://open.bigmodel.cn/api/anthropic", default_model = "glm-4.6" }

[vendors.glm.tools.codex]
env_key = "GLM_API_KEY"
timeout = 300000

[vendors.glm-beta]
base = "glm"

[vendors.glm-beta.endpoints.anthropic]
url = "https://beta.bigmodel.cn/anthropic"
default_model = "glm-4.7"

[vendors.glm-beta.tools.codex]
timeout = 600000

[vendors.glm-nightly]
base = "glm-beta"
display_name = "GLM Nightly"
"#;

    fn config() -> AimConfig {
        AimConfig::from_toml(VENDORS).unwrap()
    }

    #[test]
    fn test_plain_vendor() {
        let vendor = resolve_vendor(&config(), "glm").unwrap();
        assert_eq!(vendor.display_name, "GLM");
        assert_eq!(vendor.lineage, vec!["glm"]);
        assert_eq!(vendor.endpoint_names(), vec!["anthropic", "openai"]);
    }

    #[test]
    fn test_inherited_endpoint_unchanged() {
        let cfg = config();
        let base = resolve_vendor(&cfg, "glm").unwrap();
        let beta = resolve_vendor(&cfg, "glm-beta").unwrap();

        assert_eq!(beta.endpoint("openai"), base.endpoint("openai"));
        assert_eq!(
            beta.endpoint("anthropic").unwrap(),
            &Endpoint::new("https://beta.bigmodel.cn/anthropic", "glm-4.7")
        );

        // Exactly the overridden endpoint differs.
        let differing: Vec<_> = beta
            .endpoints
            .iter()
            .filter(|(name, ep)| base.endpoint(name) != Some(*ep))
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(differing, vec!["anthropic"]);
    }

    #[test]
    fn test_multi_level_inheritance() {
        let vendor = resolve_vendor(&config(), "glm-nightly").unwrap();
        assert_eq!(vendor.lineage, vec!["glm-nightly", "glm-beta", "glm"]);
        assert_eq!(vendor.display_name, "GLM Nightly");
        assert_eq!(vendor.timeout, Some(3_000_000));
        assert_eq!(
            vendor.endpoint("anthropic").unwrap().url,
            "https://beta.bigmodel.cn/anthropic"
        );

        // Tool hints merge field by field.
        let hints = vendor.tool_hints("codex").unwrap();
        assert_eq!(hints.env_key.as_deref(), Some("GLM_API_KEY"));
        assert_eq!(hints.timeout, Some(600_000));
    }

    #[test]
    fn test_display_name_falls_back_to_requested_name() {
        let cfg = AimConfig::from_toml("[vendors.solo.endpoints]\nopenai = \"https://x/v1\"").unwrap();
        assert_eq!(resolve_vendor(&cfg, "solo").unwrap().display_name, "solo");
    }

    #[test]
    fn test_unknown_vendor() {
        let err = resolve_vendor(&config(), "nope").unwrap_err();
        assert!(matches!(err, ConfigError::VendorNotFound { ref name } if name == "nope"));
    }

    #[test]
    fn test_dangling_base() {
        let cfg = AimConfig::from_toml("[vendors.a]\nbase = \"missing\"").unwrap();
        let err = resolve_vendor(&cfg, "a").unwrap_err();
        assert!(matches!(err, ConfigError::VendorNotFound { ref name } if name == "missing"));
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let cfg = AimConfig::from_toml("[vendors.a]\nbase = \"a\"").unwrap();
        let err = resolve_vendor(&cfg, "a").unwrap_err();
        match err {
            ConfigError::CyclicVendorInheritance { chain } => assert_eq!(chain, vec!["a", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mutual_reference_is_cyclic() {
        let cfg = AimConfig::from_toml(
            "[vendors.a]\nbase = \"b\"\n[vendors.b]\nbase = \"c\"\n[vendors.c]\nbase = \"a\"",
        )
        .unwrap();
        let err = resolve_vendor(&cfg, "a").unwrap_err();
        assert_eq!(err.to_string(), "cyclic vendor inheritance: a -> b -> c -> a");
        assert_eq!(err.code(), "AIM-VEN-003");
    }
}
