//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;

use aim_config::{ConfigError, Level, ProcessEnv, SecretSource};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Show configuration file path
    Path,

    /// Initialize a config file with a starter template
    Init {
        /// Create project-local config (./.aim.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Check the configuration for errors and warnings
    Validate,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx).await,
        ConfigCommand::Which => cmd_which(ctx).await,
        ConfigCommand::Path => cmd_path(ctx).await,
        ConfigCommand::Init { local } => cmd_init(local).await,
        ConfigCommand::Validate => cmd_validate(ctx).await,
    }
}

async fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load()?;
    let config = &loaded.config;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }
    if ctx.verbose {
        print!("{}", config.redacted().to_toml()?);
        return Ok(());
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();

    println!("# aim Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using built-in defaults)\n");
    } else {
        println!("{}", bold.apply_to("Config files:"));
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    if config.keys.is_empty() {
        println!("No keys configured\n");
    } else {
        println!("{}", bold.apply_to("Keys:"));
        for (name, key) in &config.keys {
            let marker = if config.settings.default_key.as_deref() == Some(name.as_str()) {
                "*"
            } else {
                " "
            };
            println!(
                "  {}{:<14} {:<12} {}",
                marker,
                name,
                key.vendor_name().unwrap_or("-"),
                dim.apply_to(key_status(&key.value)),
            );
        }
        println!();
    }

    println!("{}", bold.apply_to("Vendors:"));
    for (name, vendor) in &config.vendors {
        let endpoints: Vec<&str> = vendor.endpoints.keys().map(String::as_str).collect();
        let base = vendor
            .base
            .as_deref()
            .map(|b| format!(" (base: {})", b))
            .unwrap_or_default();
        println!("  {:<14} {}{}", name, endpoints.join(", "), base);
    }
    println!();

    println!("{}", bold.apply_to("Tools:"));
    for (name, tool) in &config.tools {
        let profiles: Vec<&str> = tool.profiles.keys().map(String::as_str).collect();
        println!(
            "  {:<14} {:<10} {}",
            name,
            tool.command,
            dim.apply_to(profiles.join(", "))
        );
    }
    if !config.aliases.is_empty() {
        println!();
        println!("{}", bold.apply_to("Aliases:"));
        for (alias, target) in &config.aliases {
            println!("  {:<14} -> {}", alias, target);
        }
    }

    if !loaded.warnings.is_empty() {
        println!();
        let yellow = Style::new().yellow();
        for warning in &loaded.warnings {
            println!("{} {}", yellow.apply_to("warning:"), warning);
        }
    }

    Ok(())
}

fn key_status(reference: &str) -> String {
    match SecretSource::of(reference) {
        SecretSource::EnvVar(var) if std::env::var(&var).is_ok() => format!("${{{}}} ✓", var),
        SecretSource::EnvVar(var) => format!("${{{}}} (not set)", var),
        other => other.to_string(),
    }
}

async fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load()?;

    if ctx.json_output {
        let sources: Vec<_> = loaded
            .sources
            .iter()
            .map(|s| serde_json::json!({ "path": s.path, "loaded": s.loaded }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    println!("Config file search order (later overrides earlier):\n");

    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'aim config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

async fn cmd_path(ctx: &Context) -> Result<()> {
    let path = match ctx.config_path {
        Some(ref path) => Some(path.clone()),
        None => aim_config::user_config_path(),
    };
    match path {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("Could not determine config directory"),
    }
    Ok(())
}

async fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from(".aim.toml")
    } else {
        let dir = aim_config::user_config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&dir)?;
        dir.join("config.toml")
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    std::fs::write(&path, TEMPLATE)?;
    println!("✓ Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Export your API key, e.g. export DEEPSEEK_API_KEY=sk-...");
    println!("  2. Run 'aim run --dry-run' to check the resolved launch");

    Ok(())
}

const TEMPLATE: &str = r#"# aim configuration
version = "2"

[settings]
default_tool = "claude-code"
default_key = "deepseek"
# timeout = "60s"            # request timeout handed to the tool
# command_timeout = "2h"     # kill 'aim run' tools after this long

# Keys reference secrets: plain text, "base64:..." or "${ENV_VAR}".
[keys.deepseek]
value = "${DEEPSEEK_API_KEY}"
vendor = "deepseek"

# [keys.work-glm]
# value = "${GLM_API_KEY}"
# vendor = "glm"
# endpoints = ["anthropic"]

# Vendors inherit endpoints from a base vendor.
# [vendors.my-proxy]
# base = "deepseek"
# endpoints.openai = "https://proxy.example.com/v1"

# Tools are seeded with claude-code, codex and opencode. Entries for them
# only need the parts you change.
# [tools.claude-code.profiles.deepseek]
# model = "deepseek-chat"
"#;

async fn cmd_validate(ctx: &Context) -> Result<()> {
    let loaded = ctx.load()?;
    let report = aim_config::validate(&loaded.config, &ProcessEnv);

    if ctx.json_output {
        let issues: Vec<_> = report
            .issues
            .iter()
            .map(|i| {
                serde_json::json!({
                    "level": match i.level { Level::Error => "error", Level::Warning => "warning" },
                    "field": i.field,
                    "message": i.message,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&issues)?);
    } else if report.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        for issue in &report.issues {
            println!("{}", issue);
        }
        println!();
        println!(
            "{} error(s), {} warning(s)",
            report.errors().count(),
            report.warnings().count()
        );
    }

    match report.errors().next() {
        Some(first) => Err(ConfigError::Invalid {
            field: first.field.clone(),
            message: first.message.clone(),
        }
        .into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        let config = aim_config::AimConfig::from_toml(TEMPLATE).unwrap();
        assert_eq!(config.settings.default_tool.as_deref(), Some("claude-code"));
        assert_eq!(
            config.key("deepseek").and_then(|k| k.vendor_name()),
            Some("deepseek")
        );
    }

    #[test]
    fn test_key_status_plaintext() {
        assert_eq!(key_status("sk-abc"), "config file (plaintext)");
        assert_eq!(key_status("base64:c2s="), "config file (base64)");
    }

    #[test]
    fn test_key_status_env_unset() {
        assert_eq!(
            key_status("${AIM_TEST_SURELY_UNSET_VAR}"),
            "${AIM_TEST_SURELY_UNSET_VAR} (not set)"
        );
    }
}
