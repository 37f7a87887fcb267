//! aim - run AI coding assistants under a chosen key and provider profile
//!
//! Main entry point for the aim CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use aim_config::ConfigError;

mod commands;

use commands::{config, env, list, run};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// aim - run AI coding assistants under a chosen key and provider profile
#[derive(Parser)]
#[command(name = "aim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of the discovered user and project files
    #[arg(long, global = true, env = "AIM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch a tool with the resolved key, endpoint and model
    Run(run::RunArgs),

    /// Print the resolved environment as shell exports
    Env(env::EnvArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// List configured keys
    Keys,

    /// List vendors and their endpoints
    Vendors,

    /// List tools and their profiles
    Tools,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "aim=debug,aim_config=debug,info"
    } else {
        "aim=info,aim_config=info,warn"
    };
    let console_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new(filter));

    let log_dir = aim_config::log_dir().unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "aim.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "aim=trace,aim_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_path: cli.config,
    };

    match dispatch(cli.command, &ctx).await {
        Ok(code) => exit_code(code),
        Err(err) => report(&err, &ctx),
    }
}

async fn dispatch(command: Commands, ctx: &commands::Context) -> Result<i32> {
    match command {
        Commands::Run(args) => run::run(args, ctx).await,
        Commands::Env(args) => env::run(args, ctx).await.map(|()| 0),
        Commands::Config(args) => config::run(args, ctx).await.map(|()| 0),
        Commands::Keys => list::keys(ctx).await.map(|()| 0),
        Commands::Vendors => list::vendors(ctx).await.map(|()| 0),
        Commands::Tools => list::tools(ctx).await.map(|()| 0),
    }
}

/// Print `err` and pick the exit code for its category.
fn report(err: &anyhow::Error, ctx: &commands::Context) -> ExitCode {
    let Some(config_err) = err.downcast_ref::<ConfigError>() else {
        if ctx.json_output {
            println!("{}", serde_json::json!({ "error": { "message": format!("{:#}", err) } }));
        } else {
            eprintln!("error: {:#}", err);
        }
        return ExitCode::FAILURE;
    };

    if ctx.json_output {
        let body = serde_json::json!({
            "error": {
                "code": config_err.code(),
                "message": config_err.to_string(),
                "suggestions": config_err.suggestions(),
            }
        });
        println!("{}", body);
    } else {
        eprintln!("error[{}]: {}", config_err.code(), config_err);
        for suggestion in config_err.suggestions() {
            eprintln!("  hint: {}", suggestion);
        }
    }
    exit_code(config_err.exit_code())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
