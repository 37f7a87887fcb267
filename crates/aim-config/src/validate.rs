//! On-demand validation of a whole config tree.
//!
//! Unlike resolution, which stops at the first problem, validation collects
//! every issue it finds so they can be shown together.

use std::fmt;

use serde::Serialize;

use crate::secrets::{resolve_reference, CredentialError, Environment};
use crate::types::AimConfig;
use crate::vendors::{resolve_vendor, ResolvedVendor};

/// Severity of an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
}

/// One problem found in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub level: Level,
    /// Dotted path of the offending entry, e.g. `keys.work.vendor`.
    pub field: String,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            Level::Error => "error",
            Level::Warning => "warning",
        };
        write!(f, "{}: {}: {}", level, self.field, self.message)
    }
}

/// All issues found by [`validate`], in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.level == Level::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.level == Level::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(Level::Error, field, message);
    }

    fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(Level::Warning, field, message);
    }

    fn push(&mut self, level: Level, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(Issue {
            level,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// Check the whole tree.
pub fn validate(config: &AimConfig, env: &dyn Environment) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_vendors(config, &mut report);
    check_keys(config, env, &mut report);
    check_tools(config, &mut report);
    check_settings(config, &mut report);
    report
}

/// Resolved vendor, or `None` when it is missing or its chain is broken.
fn vendor_ok(config: &AimConfig, name: &str) -> Option<ResolvedVendor> {
    resolve_vendor(config, name).ok()
}

fn check_vendors(config: &AimConfig, report: &mut ValidationReport) {
    for name in config.vendors.keys() {
        let vendor = match resolve_vendor(config, name) {
            Ok(v) => v,
            Err(e) => {
                report.error(format!("vendors.{}.base", name), e.to_string());
                continue;
            }
        };

        if vendor.endpoints.is_empty() {
            report.error(format!("vendors.{}.endpoints", name), "no endpoints defined");
        }
        for (endpoint_name, endpoint) in &vendor.endpoints {
            if endpoint.url.trim().is_empty() {
                report.error(
                    format!("vendors.{}.endpoints.{}.url", name, endpoint_name),
                    "empty URL",
                );
            }
        }
    }
}

fn check_keys(config: &AimConfig, env: &dyn Environment, report: &mut ValidationReport) {
    for (name, key) in &config.keys {
        match resolve_reference(&key.value, env) {
            Ok(secret) if secret.value.is_empty() => {
                report.error(format!("keys.{}.value", name), "empty key value");
            }
            Ok(_) => {}
            Err(e @ CredentialError::EnvVarNotSet { .. }) => {
                report.warning(format!("keys.{}.value", name), e.to_string());
            }
            Err(e) => report.error(format!("keys.{}.value", name), e.to_string()),
        }

        let Some(vendor_name) = key.vendor_name() else {
            report.warning(
                format!("keys.{}.vendor", name),
                "no vendor set; --profile or settings.default_provider will be required",
            );
            continue;
        };
        if !config.vendors.contains_key(vendor_name) {
            report.error(
                format!("keys.{}.vendor", name),
                format!("unknown vendor '{}'", vendor_name),
            );
            continue;
        }
        let Some(vendor) = vendor_ok(config, vendor_name) else {
            continue;
        };

        for endpoint in key.endpoints.iter().flatten() {
            if vendor.endpoint(endpoint).is_none() {
                report.error(
                    format!("keys.{}.endpoints", name),
                    format!("vendor '{}' has no endpoint '{}'", vendor_name, endpoint),
                );
            }
        }
        for (protocol, endpoint) in &key.protocols {
            if vendor.endpoint(endpoint).is_none() {
                report.error(
                    format!("keys.{}.protocols.{}", name, protocol),
                    format!("vendor '{}' has no endpoint '{}'", vendor_name, endpoint),
                );
            }
        }
    }
}

fn check_tools(config: &AimConfig, report: &mut ValidationReport) {
    for (name, tool) in &config.tools {
        if tool.command.trim().is_empty() {
            report.error(format!("tools.{}.command", name), "no command set");
        }
        if tool.protocol.trim().is_empty() {
            report.error(format!("tools.{}.protocol", name), "no protocol set");
        }

        for (profile_name, profile) in &tool.profiles {
            let field = format!("tools.{}.profiles.{}", name, profile_name);
            if profile.provider.is_empty() {
                continue;
            }
            if !config.vendors.contains_key(&profile.provider) {
                report.error(
                    format!("{}.provider", field),
                    format!("unknown vendor '{}'", profile.provider),
                );
                continue;
            }
            let Some(vendor) = vendor_ok(config, &profile.provider) else {
                continue;
            };

            for (protocol, endpoint) in &profile.endpoints {
                if vendor.endpoint(endpoint).is_none() {
                    report.error(
                        format!("{}.endpoints.{}", field, protocol),
                        format!("vendor '{}' has no endpoint '{}'", profile.provider, endpoint),
                    );
                }
            }
            if !profile.endpoints.contains_key(&tool.protocol)
                && !tool.protocol.is_empty()
                && vendor.endpoint(&tool.protocol).is_none()
            {
                report.warning(
                    field,
                    format!(
                        "vendor '{}' has no '{}' endpoint; only keys overriding it will resolve",
                        profile.provider, tool.protocol
                    ),
                );
            }
        }
    }

    for (alias, target) in &config.aliases {
        if !config.tools.contains_key(target) {
            report.error(
                format!("aliases.{}", alias),
                format!("unknown tool '{}'", target),
            );
        }
    }
}

fn check_settings(config: &AimConfig, report: &mut ValidationReport) {
    let settings = &config.settings;

    if let Some(ref key) = settings.default_key
        && !config.keys.contains_key(key)
    {
        report.error("settings.default_key", format!("unknown key '{}'", key));
    }
    if let Some(ref tool) = settings.default_tool
        && config.tool(tool).is_none()
    {
        report.error("settings.default_tool", format!("unknown tool '{}'", tool));
    }
    if let Some(ref provider) = settings.default_provider
        && !config.vendors.contains_key(provider)
    {
        report.warning(
            "settings.default_provider",
            format!("no vendor named '{}'", provider),
        );
    }
}
