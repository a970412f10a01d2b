//! Environment scoping and credential material
//!
//! Everything a stage's subprocesses see comes from here: an overlay stack
//! over a snapshot of the process environment, and credential bindings
//! resolved into stage-scoped, redacted variables.

pub mod credentials;
pub mod scope;

pub use credentials::{
    CredentialBinding, CredentialError, CredentialStore, EnvCredentialStore, ResolvedCredential,
    Secret, StaticCredentialStore,
};
pub use scope::{EnvironmentScope, ScopeHandle, ScopeMismatchError};
