//! Listing commands for keys, vendors and tools.

use anyhow::Result;
use console::{Style, style};
use serde::Serialize;

use aim_config::{SecretSource, resolve_vendor};

use super::Context;

#[derive(Debug, Serialize)]
struct KeyRow<'a> {
    name: &'a str,
    vendor: Option<&'a str>,
    source: String,
    endpoints: Vec<String>,
    default: bool,
}

#[derive(Debug, Serialize)]
struct VendorRow {
    name: String,
    display_name: String,
    lineage: Vec<String>,
    endpoints: Vec<EndpointRow>,
}

#[derive(Debug, Serialize)]
struct EndpointRow {
    name: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_model: Option<String>,
}

#[derive(Debug, Serialize)]
struct ToolRow<'a> {
    name: &'a str,
    command: &'a str,
    protocol: &'a str,
    profiles: Vec<&'a str>,
    aliases: Vec<&'a str>,
    default: bool,
}

/// List configured keys. Secrets are never printed.
pub async fn keys(ctx: &Context) -> Result<()> {
    let loaded = ctx.load()?;
    let config = &loaded.config;
    let default = config.settings.default_key.as_deref();

    let rows: Vec<KeyRow> = config
        .keys
        .iter()
        .map(|(name, key)| KeyRow {
            name,
            vendor: key.vendor_name(),
            source: SecretSource::of(&key.value).to_string(),
            endpoints: key.allowed_endpoints(),
            default: default == Some(name.as_str()),
        })
        .collect();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No keys configured. Run 'aim config init' to create a config file.");
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Keys").bold());
    for row in &rows {
        let marker = if row.default { "*" } else { " " };
        let endpoints = if row.endpoints.is_empty() {
            "any endpoint".to_string()
        } else {
            row.endpoints.join(", ")
        };
        println!(
            " {}{:<16} {:<12} {:<26} {}",
            marker,
            row.name,
            row.vendor.unwrap_or("-"),
            row.source,
            dim.apply_to(endpoints)
        );
    }
    Ok(())
}

/// List vendors with inherited endpoints flattened.
pub async fn vendors(ctx: &Context) -> Result<()> {
    let loaded = ctx.load()?;
    let config = &loaded.config;

    let mut rows = Vec::with_capacity(config.vendors.len());
    for name in config.vendors.keys() {
        let vendor = resolve_vendor(config, name)?;
        rows.push(VendorRow {
            endpoints: vendor
                .endpoints
                .iter()
                .map(|(ep, e)| EndpointRow {
                    name: ep.clone(),
                    url: e.url.clone(),
                    default_model: e.default_model.clone(),
                })
                .collect(),
            name: vendor.name,
            display_name: vendor.display_name,
            lineage: vendor.lineage,
        });
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Vendors").bold());
    for row in &rows {
        let inherits = if row.lineage.len() > 1 {
            format!(" (inherits {})", row.lineage[1..].join(" -> "))
        } else {
            String::new()
        };
        println!("  {}{}", style(&row.name).bold(), dim.apply_to(inherits));
        for ep in &row.endpoints {
            let model = ep
                .default_model
                .as_deref()
                .map(|m| format!(" [{}]", m))
                .unwrap_or_default();
            println!("    {:<12} {}{}", ep.name, ep.url, dim.apply_to(model));
        }
    }
    Ok(())
}

/// List tools with their profiles and aliases.
pub async fn tools(ctx: &Context) -> Result<()> {
    let loaded = ctx.load()?;
    let config = &loaded.config;
    let default = config.settings.default_tool.as_deref();

    let rows: Vec<ToolRow> = config
        .tools
        .iter()
        .map(|(name, tool)| ToolRow {
            name,
            command: &tool.command,
            protocol: &tool.protocol,
            profiles: tool.profiles.keys().map(String::as_str).collect(),
            aliases: config
                .aliases
                .iter()
                .filter(|(_, target)| *target == name)
                .map(|(alias, _)| alias.as_str())
                .collect(),
            default: default == Some(name.as_str()),
        })
        .collect();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Tools").bold());
    for row in &rows {
        let marker = if row.default { "*" } else { " " };
        let aliases = if row.aliases.is_empty() {
            String::new()
        } else {
            format!(" (alias: {})", row.aliases.join(", "))
        };
        println!(
            " {}{:<14} {:<10} {:<10}{}",
            marker, row.name, row.command, row.protocol, aliases
        );
        if !row.profiles.is_empty() {
            println!("   {}", dim.apply_to(format!("profiles: {}", row.profiles.join(", "))));
        }
    }
    Ok(())
}
