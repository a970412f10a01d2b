//! Artifact naming for the publish stage

use std::path::{Path, PathBuf};

/// Derived naming scheme locating build output for upload.
///
/// Computed from the package name and configuration, never stored as
/// pipeline state. Archive file names are lowercase by builder convention
/// regardless of how the package name is spelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    package: String,
    upload_root: PathBuf,
    extension: String,
}

impl ArtifactReference {
    pub fn new(
        package: impl Into<String>,
        upload_root: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            upload_root: upload_root.into(),
            extension: extension.into(),
        }
    }

    /// Glob selecting every archive built for this package:
    /// `<upload_root>/<package>-*.<extension>`.
    pub fn glob(&self) -> String {
        format!(
            "{}/{}-*.{}",
            self.upload_root.display(),
            self.package.to_lowercase(),
            self.extension
        )
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }
}
