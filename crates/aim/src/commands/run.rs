//! Run command - launch a tool with the resolved environment.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::Style;
use tokio::process::Command;
use tracing::{debug, info, warn};

use aim_config::{ConfigError, RuntimeConfig};

use super::{Context, Selection};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: Selection,

    /// Print what would be launched without launching it
    #[arg(long)]
    pub dry_run: bool,

    /// Launch the tool as-is, without injecting env vars or arguments
    #[arg(long)]
    pub native: bool,

    /// Kill the tool after this long (e.g. "30m"); defaults to settings.command_timeout
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Arguments passed through to the tool
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// Run the run command; returns the tool's exit code.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<i32> {
    let loaded = ctx.load()?;
    let config = &loaded.config;
    let deadline = match args.timeout {
        Some(limit) => Some(limit).filter(|d| !d.is_zero()),
        None => config.command_timeout()?,
    };

    if args.native {
        let name = args.selection.tool_name(config)?;
        let tool = config.tool(name).ok_or_else(|| ConfigError::ToolNotFound {
            name: name.to_string(),
            available: config.tools.keys().cloned().collect(),
        })?;
        if args.dry_run {
            print_plan(&tool.command, &args.args, &BTreeMap::new(), None, deadline, ctx)?;
            return Ok(0);
        }
        info!(tool = name, "launching without injection");
        return Ok(spawn(&tool.command, &args.args, &BTreeMap::new(), deadline).await?);
    }

    let rt = args.selection.resolve(config)?;
    let line = rt.command_line(&args.args);

    if args.dry_run {
        print_plan(&rt.command, &line, &rt.redacted_env(), Some(&rt), deadline, ctx)?;
        return Ok(0);
    }

    info!(
        tool = %rt.tool,
        key = %rt.key,
        profile = %rt.profile,
        endpoint = %rt.endpoint,
        model = %rt.model,
        "launching"
    );
    Ok(spawn(&rt.command, &line, &rt.env_vars, deadline).await?)
}

/// Spawn `command`, wait for it, and return its exit code.
///
/// With a deadline the child is killed once it elapses. The request
/// timeout the tool was configured with never bounds the process.
async fn spawn(
    command: &str,
    args: &[String],
    env: &BTreeMap<String, String>,
    timeout: Option<Duration>,
) -> Result<i32, ConfigError> {
    let mut child = Command::new(command)
        .args(args)
        .envs(env)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => ConfigError::CommandNotFound {
                command: command.to_string(),
            },
            _ => ConfigError::Spawn {
                command: command.to_string(),
                source: e,
            },
        })?;

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                debug!(command, ?limit, "timeout elapsed, killing child");
                if let Err(e) = child.kill().await {
                    warn!(command, error = %e, "failed to kill timed-out child");
                }
                return Err(ConfigError::ExecutionTimeout {
                    command: command.to_string(),
                    timeout: limit,
                });
            }
        },
        None => child.wait().await,
    }
    .map_err(|e| ConfigError::Spawn {
        command: command.to_string(),
        source: e,
    })?;

    debug!(command, ?status, "child exited");
    Ok(status.code().unwrap_or(1))
}

#[derive(serde::Serialize)]
struct Plan<'a> {
    command: &'a str,
    args: &'a [String],
    env: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deadline_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<aim_config::RedactedRuntime>,
}

fn print_plan(
    command: &str,
    args: &[String],
    env: &BTreeMap<String, String>,
    rt: Option<&RuntimeConfig>,
    deadline: Option<Duration>,
    ctx: &Context,
) -> Result<()> {
    if ctx.json_output {
        let plan = Plan {
            command,
            args,
            env,
            deadline_ms: deadline.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            resolved: rt.map(RuntimeConfig::redacted),
        };
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();

    println!("{}", bold.apply_to("Dry run"));
    if let Some(rt) = rt {
        println!("  {} {}", dim.apply_to("tool:    "), rt.tool);
        println!("  {} {}", dim.apply_to("key:     "), rt.key);
        println!("  {} {}", dim.apply_to("profile: "), rt.profile);
        println!("  {} {}", dim.apply_to("provider:"), rt.provider);
        println!(
            "  {} {} ({})",
            dim.apply_to("endpoint:"),
            rt.endpoint,
            rt.sources.endpoint
        );
        println!(
            "  {} {} ({})",
            dim.apply_to("base url:"),
            rt.base_url,
            rt.sources.base_url
        );
        println!("  {} {} ({})", dim.apply_to("model:   "), rt.model, rt.sources.model);
        println!(
            "  {} {} ({})",
            dim.apply_to("request: "),
            humantime::format_duration(rt.timeout),
            rt.sources.timeout
        );
        println!("  {} {}", dim.apply_to("key from:"), rt.api_key_source);
    }

    let kill_after = deadline
        .map(|d| humantime::format_duration(d).to_string())
        .unwrap_or_else(|| "none".to_string());
    println!("  {} {}", dim.apply_to("deadline:"), kill_after);

    if !env.is_empty() {
        println!();
        println!("{}", bold.apply_to("Environment"));
        for (name, value) in env {
            println!("  {}={}", name, value);
        }
    }

    println!();
    println!("{}", bold.apply_to("Command"));
    let mut line = vec![command.to_string()];
    line.extend(args.iter().cloned());
    println!("  {}", line.join(" "));

    Ok(())
}
