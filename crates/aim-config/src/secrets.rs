//! Credential references: turning a key's `value` into the secret it names.
//!
//! Three reference forms are understood:
//! 1. `base64:<standard-base64>`: strictly decoded
//! 2. `${ENV_VAR}`: looked up in the environment, no nested expansion
//! 3. anything else: the secret itself, verbatim
//!
//! Environment access goes through [`Environment`] so resolution is a pure
//! function of the reference and the supplied environment.

use std::collections::{BTreeMap, HashMap};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Prefix marking a base64-encoded reference.
const BASE64_PREFIX: &str = "base64:";

/// Number of secret characters shown by [`preview`].
const PREVIEW_CHARS: usize = 8;

/// Read-only view of environment variables.
pub trait Environment {
    /// Value of `name`, or `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl Environment for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Errors raised while resolving a credential reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// `base64:` payload is malformed or not UTF-8.
    #[error("invalid base64 key: {reason}")]
    InvalidEncoding { reason: String },

    /// `${NAME}` refers to an unset or empty variable.
    #[error("environment variable '{name}' not set")]
    EnvVarNotSet { name: String },
}

impl CredentialError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CredentialError::InvalidEncoding { .. } => "AIM-KEY-003",
            CredentialError::EnvVarNotSet { .. } => "AIM-KEY-004",
        }
    }

    /// Remediation hints.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            CredentialError::InvalidEncoding { .. } => vec![
                "Re-encode the key with standard base64 (e.g. `printf %s KEY | base64`)"
                    .to_string(),
            ],
            CredentialError::EnvVarNotSet { name } => vec![
                format!("Export {} in your shell", name),
                "Or replace the reference with the key value".to_string(),
            ],
        }
    }
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Plaintext in the config file.
    Plaintext,
    /// Base64 literal in the config file.
    Base64,
    /// Environment variable.
    EnvVar(String),
}

impl SecretSource {
    /// Classify a reference without resolving it.
    pub fn of(reference: &str) -> Self {
        if reference.starts_with(BASE64_PREFIX) {
            SecretSource::Base64
        } else if let Some(name) = env_var_name(reference) {
            SecretSource::EnvVar(name.to_string())
        } else {
            SecretSource::Plaintext
        }
    }

    /// True when the config file holds the secret in the clear.
    pub fn is_plaintext(&self) -> bool {
        matches!(self, SecretSource::Plaintext)
    }
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::Plaintext => write!(f, "config file (plaintext)"),
            SecretSource::Base64 => write!(f, "config file (base64)"),
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
        }
    }
}

/// Result of credential resolution with provenance.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve a reference against the supplied environment.
pub fn resolve_reference(
    reference: &str,
    env: &dyn Environment,
) -> Result<ResolvedSecret, CredentialError> {
    if let Some(encoded) = reference.strip_prefix(BASE64_PREFIX) {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CredentialError::InvalidEncoding {
                reason: e.to_string(),
            })?;
        let value = String::from_utf8(bytes).map_err(|e| CredentialError::InvalidEncoding {
            reason: e.to_string(),
        })?;
        return Ok(ResolvedSecret {
            value,
            source: SecretSource::Base64,
        });
    }

    if let Some(name) = env_var_name(reference) {
        return match env.var(name) {
            Some(value) if !value.is_empty() => Ok(ResolvedSecret {
                value,
                source: SecretSource::EnvVar(name.to_string()),
            }),
            _ => Err(CredentialError::EnvVarNotSet {
                name: name.to_string(),
            }),
        };
    }

    Ok(ResolvedSecret {
        value: reference.to_string(),
        source: SecretSource::Plaintext,
    })
}

/// Resolve a reference against the process environment.
pub fn resolve_credential(reference: &str) -> Result<String, CredentialError> {
    resolve_reference(reference, &ProcessEnv).map(|s| s.value)
}

/// Shortened form of a secret for display: the first few characters then `...`.
///
/// Never more than half the secret is shown.
pub fn preview(secret: &str) -> String {
    let shown = PREVIEW_CHARS.min(secret.chars().count() / 2);
    let head: String = secret.chars().take(shown).collect();
    format!("{}...", head)
}

/// `NAME` for a `${NAME}` reference.
fn env_var_name(reference: &str) -> Option<&str> {
    reference.strip_prefix("${")?.strip_suffix('}')
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_plain_reference_verbatim() {
        let empty = env(&[]);
        for plain in ["sk-abc", "", "base64", "$HOME", "{x}", "${unterminated", "a${B}"] {
            let resolved = resolve_reference(plain, &empty).unwrap();
            assert_eq!(resolved.value, plain);
            assert_eq!(resolved.source, SecretSource::Plaintext);
        }
    }

    #[test]
    fn test_base64_round_trip() {
        let empty = env(&[]);
        for secret in ["sk-test", "", "ключ-🔑", "with spaces and = signs"] {
            let reference = format!("base64:{}", STANDARD.encode(secret));
            let resolved = resolve_reference(&reference, &empty).unwrap();
            assert_eq!(resolved.value, secret);
            assert_eq!(resolved.source, SecretSource::Base64);
        }
    }

    #[test]
    fn test_base64_malformed() {
        let err = resolve_reference("base64:not*base64", &env(&[])).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidEncoding { .. }));
        assert_eq!(err.code(), "AIM-KEY-003");
    }

    #[test]
    fn test_base64_rejects_missing_padding() {
        // "sk" encodes to "c2s="; strict decoding refuses the unpadded form.
        let err = resolve_reference("base64:c2s", &env(&[])).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_base64_rejects_non_utf8() {
        let reference = format!("base64:{}", STANDARD.encode([0xff, 0xfe]));
        let err = resolve_reference(&reference, &env(&[])).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_env_reference_set() {
        let vars = env(&[("TEST_API_KEY", "sk-from-env")]);
        let resolved = resolve_reference("${TEST_API_KEY}", &vars).unwrap();
        assert_eq!(resolved.value, "sk-from-env");
        assert_eq!(
            resolved.source,
            SecretSource::EnvVar("TEST_API_KEY".to_string())
        );
    }

    #[test]
    fn test_env_reference_unset_or_empty() {
        let err = resolve_reference("${TEST_API_KEY}", &env(&[])).unwrap_err();
        assert_eq!(
            err,
            CredentialError::EnvVarNotSet {
                name: "TEST_API_KEY".to_string()
            }
        );

        let vars = env(&[("TEST_API_KEY", "")]);
        let err = resolve_reference("${TEST_API_KEY}", &vars).unwrap_err();
        assert!(matches!(err, CredentialError::EnvVarNotSet { ref name } if name == "TEST_API_KEY"));
    }

    #[test]
    fn test_env_reference_not_expanded_twice() {
        let vars = env(&[("OUTER", "${INNER}"), ("INNER", "secret")]);
        let resolved = resolve_reference("${OUTER}", &vars).unwrap();
        assert_eq!(resolved.value, "${INNER}");
    }

    #[test]
    fn test_repeated_resolution_identical() {
        let vars = env(&[("K", "v")]);
        let a = resolve_reference("${K}", &vars).unwrap();
        let b = resolve_reference("${K}", &vars).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_secret_source_classification() {
        assert_eq!(SecretSource::of("sk-1"), SecretSource::Plaintext);
        assert_eq!(SecretSource::of("base64:eA=="), SecretSource::Base64);
        assert_eq!(
            SecretSource::of("${GLM_KEY}"),
            SecretSource::EnvVar("GLM_KEY".to_string())
        );
        assert!(SecretSource::of("sk-1").is_plaintext());
        assert!(!SecretSource::of("${X}").is_plaintext());
    }

    #[test]
    fn test_debug_redacts_value() {
        let resolved = resolve_reference("sk-very-secret", &env(&[])).unwrap();
        let dbg = format!("{:?}", resolved);
        assert!(!dbg.contains("sk-very-secret"));
        assert!(dbg.contains("redacted"));
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("sk-1234567890abcdef"), "sk-12345...");
        assert_eq!(preview("sk-1234567890"), "sk-123...");
        assert_eq!(preview("sk-probe"), "sk-p...");
        assert_eq!(preview("abc"), "a...");
        assert_eq!(preview("x"), "...");
        assert_eq!(preview(""), "...");
    }
}
