//! Environment scopes - bounded-lifetime overlays of process environment

use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Error raised when scope handles are not released in LIFO order.
///
/// This is an engine invariant violation, not an operational failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeMismatchError {
    #[error("scope handle {0} released out of order")]
    OutOfOrder(u64),

    #[error("scope handle {0} released but no scope is entered")]
    NotEntered(u64),
}

/// Proof of a successful [`EnvironmentScope::enter`]; required to exit.
///
/// Deliberately not `Clone`: one enter, one exit.
#[derive(Debug, PartialEq, Eq)]
pub struct ScopeHandle {
    token: u64,
}

struct Layer {
    values: HashMap<String, String>,
    secret_keys: HashSet<String>,
    token: u64,
}

/// An overlay stack over a snapshot of the process environment.
///
/// The base layer is captured once and never changes; each `enter` pushes an
/// overlay whose values win on key collision, and each `exit` pops back to
/// the prior overlay. Handles must be released strictly last-in-first-out.
///
/// The scope never mutates the actual process environment - subprocesses are
/// handed [`EnvironmentScope::effective`] explicitly, so nothing running
/// concurrently can observe an overlay it does not own.
///
/// Overlay keys can be marked secret; their values are redacted from the
/// `Debug` rendering.
pub struct EnvironmentScope {
    base: HashMap<String, String>,
    layers: Vec<Layer>,
    next_token: u64,
}

impl EnvironmentScope {
    /// Snapshot the ambient process environment as the base layer.
    pub fn from_ambient() -> Self {
        Self::with_base(std::env::vars().collect())
    }

    /// Build a scope over an explicit base map.
    pub fn with_base(base: HashMap<String, String>) -> Self {
        Self {
            base,
            layers: Vec::new(),
            next_token: 1,
        }
    }

    /// Push an overlay; the returned handle must be passed back to [`exit`].
    ///
    /// [`exit`]: EnvironmentScope::exit
    pub fn enter(&mut self, overlay: HashMap<String, String>) -> ScopeHandle {
        self.enter_with_secrets(overlay, HashSet::new())
    }

    /// Push an overlay whose `secret_keys` are redacted from diagnostics.
    pub fn enter_with_secrets(
        &mut self,
        overlay: HashMap<String, String>,
        secret_keys: HashSet<String>,
    ) -> ScopeHandle {
        let token = self.next_token;
        self.next_token += 1;
        self.layers.push(Layer {
            values: overlay,
            secret_keys,
            token,
        });
        ScopeHandle { token }
    }

    /// Pop the top overlay. Safe to call from failure-handling paths; the
    /// only error is releasing handles out of LIFO order.
    pub fn exit(&mut self, handle: ScopeHandle) -> Result<(), ScopeMismatchError> {
        match self.layers.last() {
            Some(top) if top.token == handle.token => {
                self.layers.pop();
                Ok(())
            }
            Some(_) => Err(ScopeMismatchError::OutOfOrder(handle.token)),
            None => Err(ScopeMismatchError::NotEntered(handle.token)),
        }
    }

    /// The merged variable set as a subprocess would see it.
    pub fn effective(&self) -> HashMap<String, String> {
        let mut merged = self.base.clone();
        for layer in &self.layers {
            for (key, value) in &layer.values {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Look up a single variable through the overlays, innermost first.
    pub fn get(&self, key: &str) -> Option<&str> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.values.get(key) {
                return Some(value);
            }
        }
        self.base.get(key).map(String::as_str)
    }

    /// Number of overlays currently entered (the base does not count).
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl fmt::Debug for EnvironmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EnvironmentScope");
        s.field("base_vars", &self.base.len());
        let layers: Vec<HashMap<&str, &str>> = self
            .layers
            .iter()
            .map(|layer| {
                layer
                    .values
                    .iter()
                    .map(|(k, v)| {
                        if layer.secret_keys.contains(k) {
                            (k.as_str(), "[redacted]")
                        } else {
                            (k.as_str(), v.as_str())
                        }
                    })
                    .collect()
            })
            .collect();
        s.field("layers", &layers);
        s.finish()
    }
}
