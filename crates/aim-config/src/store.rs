//! Shared, lock-guarded handle to a config tree.
//!
//! Readers (resolution) hold the read lock for the whole call, so a writer
//! can never change the tree underneath a resolution in progress.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::resolver::{Resolver, RuntimeConfig};
use crate::secrets::Environment;
use crate::types::AimConfig;
use crate::validate::validate;
use crate::{ConfigError, Result};

/// Cloneable handle; clones share one tree.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    inner: Arc<RwLock<AimConfig>>,
}

impl ConfigStore {
    pub fn new(config: AimConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Run `f` with shared access to the tree.
    pub fn read<T>(&self, f: impl FnOnce(&AimConfig) -> T) -> T {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Resolve a tool run against the process environment.
    pub fn resolve(&self, tool: &str, key: &str, profile: &str) -> Result<RuntimeConfig> {
        let guard = self.inner.read();
        Resolver::new(&guard).resolve(tool, key, profile)
    }

    /// Resolve a tool run against an injected environment.
    pub fn resolve_with_env(
        &self,
        env: &dyn Environment,
        tool: &str,
        key: &str,
        profile: &str,
    ) -> Result<RuntimeConfig> {
        let guard = self.inner.read();
        Resolver::with_env(&guard, env).resolve(tool, key, profile)
    }

    /// Mutate the tree under the write lock.
    ///
    /// `f` works on a copy. The copy replaces the tree only when `f` succeeds
    /// and the result has no validation errors; otherwise the tree is
    /// unchanged.
    pub fn update<T>(
        &self,
        env: &dyn Environment,
        f: impl FnOnce(&mut AimConfig) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.inner.write();
        let mut draft = guard.clone();
        let out = f(&mut draft)?;

        let report = validate(&draft, env);
        if let Some(issue) = report.errors().next() {
            return Err(ConfigError::Invalid {
                field: issue.field.clone(),
                message: issue.message.clone(),
            });
        }

        *guard = draft;
        debug!("config tree updated");
        Ok(out)
    }

    /// Owned copy of the current tree.
    pub fn snapshot(&self) -> AimConfig {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Credential;
    use std::collections::HashMap;
    use std::thread;

    const BASE: &str = r#"
[keys.ds]
value = "sk-test"
vendor = "deepseek"

[vendors.deepseek.endpoints]
openai = { url = "https://api.deepseek.com/v1", default_model = "deepseek-chat" }

[tools.codex]
command = "codex"
protocol = "openai"
field_mapping = { OPENAI_API_KEY = "keys.{current_key}.key" }
profiles = { deepseek = "deepseek" }
"#;

    fn store() -> ConfigStore {
        ConfigStore::new(AimConfig::from_toml(BASE).unwrap())
    }

    #[test]
    fn test_clones_share_tree() {
        let a = store();
        let b = a.clone();
        let env: HashMap<String, String> = HashMap::new();

        a.update(&env, |cfg| {
            cfg.keys
                .insert("other".to_string(), Credential::new("sk-2", "deepseek"));
            Ok(())
        })
        .unwrap();

        assert!(b.read(|cfg| cfg.keys.contains_key("other")));
    }

    #[test]
    fn test_resolve_through_store() {
        let env: HashMap<String, String> = HashMap::new();
        let rt = store().resolve_with_env(&env, "codex", "ds", "").unwrap();
        assert_eq!(rt.env_vars["OPENAI_API_KEY"], "sk-test");
    }

    #[test]
    fn test_failed_update_leaves_tree_unchanged() {
        let store = store();
        let before = store.snapshot();
        let env: HashMap<String, String> = HashMap::new();

        let err = store
            .update(&env, |cfg| {
                cfg.keys.remove("ds");
                Err::<(), _>(ConfigError::NoDefaultKey)
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoDefaultKey));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_invalid_update_rejected() {
        let store = store();
        let env: HashMap<String, String> = HashMap::new();

        let err = store
            .update(&env, |cfg| {
                cfg.keys
                    .insert("bad".to_string(), Credential::new("sk", "no-such-vendor"));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "keys.bad.vendor"));
        assert!(!store.read(|cfg| cfg.keys.contains_key("bad")));
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let store = store();
        let env: HashMap<String, String> = HashMap::new();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    let env: HashMap<String, String> = HashMap::new();
                    for _ in 0..50 {
                        let rt = store.resolve_with_env(&env, "codex", "ds", "").unwrap();
                        assert!(rt.env_vars["OPENAI_API_KEY"].starts_with("sk-"));
                    }
                })
            })
            .collect();

        for i in 0..20 {
            store
                .update(&env, |cfg| {
                    if let Some(key) = cfg.keys.get_mut("ds") {
                        key.value = format!("sk-{}", i);
                    }
                    Ok(())
                })
                .unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.read(|cfg| cfg.keys["ds"].value.clone()), "sk-19");
    }
}
