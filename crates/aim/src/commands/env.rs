//! Env command - print the resolved environment as shell exports.
//!
//! Intended for `eval "$(aim env codex)"`; values are printed unredacted.

use anyhow::Result;
use clap::Args;

use super::{Context, Selection};

/// Arguments for the env command.
#[derive(Args, Debug)]
pub struct EnvArgs {
    #[command(flatten)]
    pub selection: Selection,
}

/// Run the env command.
pub async fn run(args: EnvArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load()?;
    let rt = args.selection.resolve(&loaded.config)?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&rt.env_vars)?);
        return Ok(());
    }

    for (name, value) in &rt.env_vars {
        println!("export {}={}", name, shell_quote(value));
    }
    Ok(())
}

/// Single-quote `value` for POSIX shells.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
