//! Credential bindings - secrets resolved into stage-scoped variables

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// A secret value that refuses to render in diagnostics.
///
/// `Debug` and `Display` both print `[redacted]`; the wrapped value is only
/// reachable through [`Secret::expose`]. Redaction is structural - there is
/// no way to format a `Secret` into a log line by accident.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read the wrapped value. Call sites are the audit surface.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Errors from credential resolution. Fatal to the requesting stage, never
/// to the run's post-hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential `{0}` not found in store")]
    NotFound(String),

    #[error("access to credential `{0}` denied")]
    AccessDenied(String),
}

/// A stage's declared requirement to resolve a named credential into a pair
/// of environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBinding {
    /// Identifier of the credential in the store
    pub credential_id: String,

    /// Variable the username is exposed as
    pub username_var: String,

    /// Variable the secret is exposed as
    pub secret_var: String,
}

impl CredentialBinding {
    pub fn new(
        credential_id: impl Into<String>,
        username_var: impl Into<String>,
        secret_var: impl Into<String>,
    ) -> Self {
        Self {
            credential_id: credential_id.into(),
            username_var: username_var.into(),
            secret_var: secret_var.into(),
        }
    }

    /// Binding with the conventional variable names `<ID>_USR` / `<ID>_PSW`
    /// (identifier uppercased, `-` mapped to `_`).
    pub fn conventional(credential_id: impl Into<String>) -> Self {
        let credential_id = credential_id.into();
        let prefix = conventional_prefix(&credential_id);
        Self {
            username_var: format!("{}_USR", prefix),
            secret_var: format!("{}_PSW", prefix),
            credential_id,
        }
    }

    /// The variable names this binding will inject.
    pub fn variable_names(&self) -> HashSet<String> {
        HashSet::from([self.username_var.clone(), self.secret_var.clone()])
    }
}

fn conventional_prefix(credential_id: &str) -> String {
    credential_id.to_uppercase().replace('-', "_")
}

/// A username/secret pair freshly resolved from a store.
///
/// Lives only as long as the requesting stage's environment scope; the
/// engine never caches resolutions across stages or runs.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub username: Secret,
    pub secret: Secret,
}

/// External secret store collaborator.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a credential by identifier.
    async fn resolve(&self, credential_id: &str) -> Result<ResolvedCredential, CredentialError>;
}

/// Store backed by a captured variable map, using the conventional
/// `<ID>_USR` / `<ID>_PSW` naming.
pub struct EnvCredentialStore {
    vars: HashMap<String, String>,
}

impl EnvCredentialStore {
    /// Capture the ambient process environment as the backing map.
    pub fn from_ambient() -> Self {
        Self::new(std::env::vars().collect())
    }

    pub fn new(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn resolve(&self, credential_id: &str) -> Result<ResolvedCredential, CredentialError> {
        let prefix = conventional_prefix(credential_id);
        let username = self.vars.get(&format!("{}_USR", prefix));
        let secret = self.vars.get(&format!("{}_PSW", prefix));

        match (username, secret) {
            (Some(username), Some(secret)) => Ok(ResolvedCredential {
                username: Secret::new(username.clone()),
                secret: Secret::new(secret.clone()),
            }),
            _ => Err(CredentialError::NotFound(credential_id.to_string())),
        }
    }
}

/// Fixed-content store for tests and ephemeral use; entries can be
/// deny-listed to exercise the access-denied path.
#[derive(Default)]
pub struct StaticCredentialStore {
    entries: HashMap<String, (String, String)>,
    denied: HashSet<String>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(
        mut self,
        credential_id: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.entries
            .insert(credential_id.into(), (username.into(), secret.into()));
        self
    }

    pub fn with_denied(mut self, credential_id: impl Into<String>) -> Self {
        self.denied.insert(credential_id.into());
        self
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn resolve(&self, credential_id: &str) -> Result<ResolvedCredential, CredentialError> {
        if self.denied.contains(credential_id) {
            return Err(CredentialError::AccessDenied(credential_id.to_string()));
        }
        match self.entries.get(credential_id) {
            Some((username, secret)) => Ok(ResolvedCredential {
                username: Secret::new(username.clone()),
                secret: Secret::new(secret.clone()),
            }),
            None => Err(CredentialError::NotFound(credential_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_never_renders_its_value() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{}", secret), "[redacted]");
        assert_eq!(format!("{:?}", secret), "[redacted]");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_resolved_credential_debug_is_redacted() {
        let resolved = ResolvedCredential {
            username: Secret::new("robot"),
            secret: Secret::new("hunter2"),
        };
        let rendered = format!("{:?}", resolved);
        assert!(!rendered.contains("robot"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_conventional_binding_names() {
        let binding = CredentialBinding::conventional("package-index");
        assert_eq!(binding.username_var, "PACKAGE_INDEX_USR");
        assert_eq!(binding.secret_var, "PACKAGE_INDEX_PSW");
        assert_eq!(binding.credential_id, "package-index");
    }

    #[tokio::test]
    async fn test_env_store_resolves_conventional_vars() {
        let store = EnvCredentialStore::new(HashMap::from([
            ("PACKAGE_INDEX_USR".to_string(), "robot".to_string()),
            ("PACKAGE_INDEX_PSW".to_string(), "hunter2".to_string()),
        ]));

        let resolved = store.resolve("package-index").await.unwrap();
        assert_eq!(resolved.username.expose(), "robot");
        assert_eq!(resolved.secret.expose(), "hunter2");
    }

    #[tokio::test]
    async fn test_env_store_missing_half_is_not_found() {
        let store = EnvCredentialStore::new(HashMap::from([(
            "PACKAGE_INDEX_USR".to_string(),
            "robot".to_string(),
        )]));

        let err = store.resolve("package-index").await.unwrap_err();
        assert_eq!(err, CredentialError::NotFound("package-index".to_string()));
    }

    #[tokio::test]
    async fn test_static_store_denied() {
        let store = StaticCredentialStore::new()
            .with_credential("package-index", "robot", "hunter2")
            .with_denied("package-index");

        let err = store.resolve("package-index").await.unwrap_err();
        assert_eq!(
            err,
            CredentialError::AccessDenied("package-index".to_string())
        );
    }

    #[tokio::test]
    async fn test_static_store_not_found() {
        let store = StaticCredentialStore::new();
        let err = store.resolve("missing").await.unwrap_err();
        assert_eq!(err, CredentialError::NotFound("missing".to_string()));
    }
}
