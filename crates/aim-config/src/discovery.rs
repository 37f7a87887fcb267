//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `$AIM_CONFIG_DIR/config.{toml,yaml,yml}`, or the platform config dir
//! 2. `.aim.toml` / `.aim.yaml`, searched from the project dir upward
//!
//! An explicit `--config <path>` replaces both (see [`load_config_from`]).
//! Built-in vendors and tools are seeded after merging unless
//! `settings.seed_builtins = false`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::builtin::seed_builtins;
use crate::secrets::SecretSource;
use crate::{AimConfig, ConfigError, Result};

/// Project-local config filenames, in lookup order.
const PROJECT_CONFIG_FILES: &[&str] = &[".aim.toml", ".aim.yaml", ".aim.yml"];

/// User config filenames within the config directory, in lookup order.
const USER_CONFIG_FILES: &[&str] = &["config.toml", "config.yaml", "config.yml"];

/// Application name for platform directory resolution.
const APP_NAME: &str = "aim";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "AIM_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged (and seeded) configuration.
    pub config: AimConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g. plaintext keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }

    /// Highest-precedence loaded file, if any.
    pub fn primary_source(&self) -> Option<&Path> {
        self.loaded_from().last().copied()
    }
}

/// Discover and merge config from the user dir and `project_dir` (or cwd).
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], with an explicit user config directory.
///
/// `config_dir` overrides both `AIM_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = AimConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config
    let user_dir = match config_dir {
        Some(dir) => Some(dir.to_path_buf()),
        None => user_config_dir(),
    };
    if let Some(dir) = user_dir {
        let path = first_existing(&dir, USER_CONFIG_FILES)
            .unwrap_or_else(|| dir.join(USER_CONFIG_FILES[0]));
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let start = match project_dir {
        Some(dir) => Some(dir.to_path_buf()),
        None => std::env::current_dir().ok(),
    };
    if let Some(path) = start.as_deref().and_then(find_project_config) {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    finish(config, sources, warnings)
}

/// Load exactly one file, skipping discovery.
///
/// Unlike discovered layers, a missing or unparsable file is an error.
pub fn load_config_from(path: &Path) -> Result<LoadedConfig> {
    let config = load_config_file(path)?;
    let sources = vec![ConfigSource {
        path: path.to_path_buf(),
        loaded: true,
    }];
    finish(config, sources, Vec::new())
}

fn finish(
    mut config: AimConfig,
    sources: Vec<ConfigSource>,
    mut warnings: Vec<String>,
) -> Result<LoadedConfig> {
    check_plaintext_keys(&config, &mut warnings);

    if config.settings.seed_builtins() {
        seed_builtins(&mut config);
    }

    for w in &warnings {
        warn!("{}", w);
    }

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Parse one config file; format chosen by extension (`.yaml`/`.yml` or TOML).
pub fn load_config_file(path: &Path) -> Result<AimConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    if is_yaml(path) {
        AimConfig::from_yaml(&contents)
    } else {
        AimConfig::from_toml(&contents)
    }
}

/// Save configuration to a file, as YAML or TOML by extension.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &AimConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = if is_yaml(path) {
        config.to_yaml()?
    } else {
        config.to_toml()?
    };
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    debug!(path = %path.display(), "saved config");
    Ok(())
}

/// User config directory for aim.
///
/// Checks `AIM_CONFIG_DIR` first, then the platform default
/// (`~/.config/aim` on Linux, `~/Library/Application Support/aim` on macOS).
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Path of the user config file: the first existing candidate, else `config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    let dir = user_config_dir()?;
    Some(first_existing(&dir, USER_CONFIG_FILES).unwrap_or_else(|| dir.join(USER_CONFIG_FILES[0])))
}

/// Directory for log files.
pub fn log_dir() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join("logs"))
}

/// Nearest project config at or above `start`.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find_map(|dir| first_existing(dir, PROJECT_CONFIG_FILES))
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut AimConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            debug!(path = %path.display(), "loaded config layer");
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

/// Warn about keys whose value sits in the file in the clear.
fn check_plaintext_keys(config: &AimConfig, warnings: &mut Vec<String>) {
    for (name, key) in &config.keys {
        if !key.value.is_empty() && SecretSource::of(&key.value).is_plaintext() {
            warnings.push(format!(
                "[keys.{}] contains a plaintext key. \
                 Consider \"${{ENV_VAR}}\" or \"base64:...\" instead.",
                name
            ));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
