//! CLI integration tests for the aim command-line interface.
//!
//! Every test points `AIM_CONFIG_DIR` at a temp dir so the user's own
//! config and logs are never touched.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SECRET: &str = "sk-abcdef123456";

const CONFIG: &str = r#"
version = "2"

[settings]
default_tool = "shell"
default_key = "test"

[keys.test]
value = "${AIM_TEST_KEY}"
vendor = "acme"

[keys.unset]
value = "${AIM_TEST_UNSET_KEY}"
vendor = "acme"

[vendors.acme]
display_name = "Acme"
endpoints.openai = { url = "https://api.acme.test/v1", default_model = "acme-1" }

[tools.shell]
command = "sh"
protocol = "openai"
profiles.acme = "acme"

[tools.shell.field_mapping]
OPENAI_API_KEY = "keys.{current_key}.key"
OPENAI_BASE_URL = "profiles.{current_profile}.base_url"
OPENAI_MODEL = "profiles.{current_profile}.model"

[tools.sleeper]
command = "sleep"
protocol = "openai"
profiles.acme = "acme"

[tools.ghost]
command = "aim-test-no-such-binary"
protocol = "openai"
profiles.acme = "acme"
"#;

/// Get a command for the aim binary, isolated from the user's environment.
fn aim(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("aim").unwrap();
    cmd.env_remove("AIM_CONFIG")
        .env_remove("RUST_LOG")
        .env("AIM_CONFIG_DIR", home)
        .env("AIM_TEST_KEY", SECRET)
        .env_remove("AIM_TEST_UNSET_KEY")
        .current_dir(home);
    cmd
}

/// Temp dir holding `config.toml` with `contents`.
fn workspace(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    aim(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("aim"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("env"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    aim(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("aim"));
}

#[test]
fn test_run_help_shows_flags() {
    let dir = TempDir::new().unwrap();
    aim(dir.path())
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--key"))
        .stdout(predicate::str::contains("--profile"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    aim(dir.path()).arg("frobnicate").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Env Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_env_prints_exports() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["env", "shell"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("export OPENAI_API_KEY='{}'", SECRET)))
        .stdout(predicate::str::contains(
            "export OPENAI_BASE_URL='https://api.acme.test/v1'",
        ))
        .stdout(predicate::str::contains("export OPENAI_MODEL='acme-1'"));
}

#[test]
fn test_env_model_override() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["env", "shell", "--model", "acme-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("export OPENAI_MODEL='acme-2'"));
}

#[test]
fn test_env_json() {
    let (dir, config) = workspace(CONFIG);
    let output = aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--json", "env"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let env: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(env["OPENAI_API_KEY"], SECRET);
    assert_eq!(env["OPENAI_MODEL"], "acme-1");
}

// ─────────────────────────────────────────────────────────────────────────────
// Run Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_dry_run_hides_secret() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "shell", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"))
        .stdout(predicate::str::contains("https://api.acme.test/v1"))
        .stdout(predicate::str::contains(SECRET).not());
}

#[test]
fn test_dry_run_json() {
    let (dir, config) = workspace(CONFIG);
    let output = aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--json", "run", "shell", "--dry-run", "--", "-c", "true"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains(SECRET));

    let plan: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(plan["command"], "sh");
    assert_eq!(plan["args"], serde_json::json!(["-c", "true"]));
    assert_eq!(plan["resolved"]["endpoint"], "openai");
    assert_eq!(plan["resolved"]["sources"]["model"], "endpoint");
    assert!(plan.get("deadline_ms").is_none());
}

#[test]
fn test_run_injects_env() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "shell", "--", "-c", "echo \"$OPENAI_MODEL\""])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme-1"));
}

#[test]
fn test_run_propagates_exit_code() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "shell", "--", "-c", "exit 3"])
        .assert()
        .code(3);
}

#[test]
fn test_native_skips_injection() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "shell", "--native", "--", "-c", "echo \"[$OPENAI_MODEL]\""])
        .env_remove("OPENAI_MODEL")
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_run_timeout_kills_tool() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "sleeper", "--timeout", "200ms", "--", "5"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("AIM-EXE-001"));
}

#[test]
fn test_request_timeout_does_not_bound_process() {
    let (dir, config) = workspace(
        r#"
version = "2"

[keys.k]
value = "sk-k"
vendor = "acme"

[vendors.acme.endpoints]
openai = "https://api.acme.test/v1"

[tools.sleeper]
command = "sleep"
protocol = "openai"
profiles.acme = { provider = "acme", timeout = 300 }
"#,
    );
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "sleeper", "-k", "k", "--", "1"])
        .assert()
        .success();
}

#[test]
fn test_settings_command_timeout_kills_tool() {
    let (dir, config) = workspace(&CONFIG.replace(
        "[settings]\n",
        "[settings]\ncommand_timeout = \"200ms\"\n",
    ));
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "sleeper", "--", "5"])
        .assert()
        .code(6);
}

#[test]
fn test_run_missing_binary() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "ghost"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("AIM-TOO-002"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_tool_exit_code() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["run", "nope", "--dry-run"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("AIM-TOO-001"));
}

#[test]
fn test_unknown_key_exit_code() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["env", "shell", "--key", "missing"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("AIM-KEY-001"));
}

#[test]
fn test_unset_env_key_exit_code() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["env", "shell", "--key", "unset"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("AIM_TEST_UNSET_KEY"));
}

#[test]
fn test_json_error() {
    let (dir, config) = workspace(CONFIG);
    let output = aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--json", "env", "nope"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["error"]["code"], "AIM-TOO-001");
}

#[test]
fn test_invalid_field_path_rejected() {
    let (dir, config) = workspace(
        r#"
version = "2"
[tools.bad]
command = "sh"
field_mapping.OPENAI_API_KEY = "keys.{current_key}.secret"
"#,
    );
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("tools")
        .assert()
        .code(2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_uses_config_dir() {
    let dir = TempDir::new().unwrap();
    aim(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            dir.path().join("config.toml").display().to_string(),
        ));
}

#[test]
fn test_config_init_creates_file() {
    let dir = TempDir::new().unwrap();
    aim(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));
    assert!(dir.path().join("config.toml").is_file());

    aim(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_config_init_local() {
    let dir = TempDir::new().unwrap();
    aim(dir.path())
        .args(["config", "init", "--local"])
        .assert()
        .success();
    assert!(dir.path().join(".aim.toml").is_file());
}

#[test]
fn test_init_template_profile_edit_resolves() {
    let dir = TempDir::new().unwrap();
    aim(dir.path()).args(["config", "init"]).assert().success();

    let path = dir.path().join("config.toml");
    let edited = std::fs::read_to_string(&path)
        .unwrap()
        .replace(
            "# [tools.claude-code.profiles.deepseek]\n# model",
            "[tools.claude-code.profiles.deepseek]\nmodel",
        );
    assert!(edited.contains("\n[tools.claude-code.profiles.deepseek]\nmodel"));
    std::fs::write(&path, edited).unwrap();

    aim(dir.path())
        .env("DEEPSEEK_API_KEY", "sk-deepseek-live")
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::contains("export ANTHROPIC_AUTH_TOKEN='sk-deepseek-live'"))
        .stdout(predicate::str::contains("export ANTHROPIC_MODEL='deepseek-chat'"))
        .stdout(predicate::str::contains("export ANTHROPIC_BASE_URL='https://api.deepseek.com/anthropic'"));
}

#[test]
fn test_config_show_masks_plaintext_keys() {
    let (dir, config) = workspace(
        r#"
version = "2"
[keys.plain]
value = "sk-plain-supersecret-999"
vendor = "deepseek"

[keys.env]
value = "${AIM_TEST_KEY}"
vendor = "deepseek"
"#,
    );
    for flag in ["--json", "--verbose"] {
        aim(dir.path())
            .arg("--config")
            .arg(&config)
            .args([flag, "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("sk-plain-supersecret-999").not())
            .stdout(predicate::str::contains("sk-plain..."))
            .stdout(predicate::str::contains("${AIM_TEST_KEY}"))
            .stdout(predicate::str::contains(SECRET).not());
    }
}

#[test]
fn test_config_validate_ok() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "validate"])
        .assert()
        .success();
}

#[test]
fn test_config_validate_reports_errors() {
    let (dir, config) = workspace(
        r#"
version = "2"
[keys.bad]
value = "sk-x"
vendor = "nowhere"
"#,
    );
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "validate"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("keys.bad.vendor"));
}

#[test]
fn test_config_which_lists_sources() {
    let dir = TempDir::new().unwrap();
    aim(dir.path())
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("search order"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_tools_lists_builtins_and_config() {
    let (dir, config) = workspace(CONFIG);
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("claude-code"))
        .stdout(predicate::str::contains("codex"))
        .stdout(predicate::str::contains("shell"));
}

#[test]
fn test_keys_never_print_secret() {
    let (dir, config) = workspace(
        r#"
version = "2"
[keys.plain]
value = "sk-plaintext-secret"
vendor = "deepseek"
"#,
    );
    aim(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("keys")
        .assert()
        .success()
        .stdout(predicate::str::contains("plain"))
        .stdout(predicate::str::contains("sk-plaintext-secret").not());
}

#[test]
fn test_vendors_json() {
    let (dir, config) = workspace(CONFIG);
    let output = aim(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--json", "vendors"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let vendors: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = vendors
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["name"].as_str())
        .collect();
    assert!(names.contains(&"acme"));
    assert!(names.contains(&"deepseek"));
}
