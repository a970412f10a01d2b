//! Pipeline configuration from YAML

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Publish options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Overwrite an existing artifact of the same name on publish
    #[serde(default = "default_force")]
    pub force: bool,

    /// Publish lane for non-release (dev) builds
    #[serde(default = "default_label_channel")]
    pub label_channel: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            force: default_force(),
            label_channel: default_label_channel(),
        }
    }
}

/// How much run history to keep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Runs older than this many days are pruned
    #[serde(default = "default_max_days")]
    pub max_days: u32,

    /// At most this many runs are kept per pipeline
    #[serde(default = "default_max_builds")]
    pub max_builds: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_days: default_max_days(),
            max_builds: default_max_builds(),
        }
    }
}

/// Top-level configuration, read once at pipeline start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name; defaults to `<package_name>-release`
    #[serde(default)]
    pub name: Option<String>,

    /// Name of the package being built
    pub package_name: String,

    /// Extension of the archives the builder produces
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,

    /// Configuration dependency cloned into the workspace before building
    #[serde(default)]
    pub config_repository: Option<String>,

    /// Channels the builder resolves against, in order
    #[serde(default)]
    pub channels: Vec<String>,

    /// Workspace directory; torn down by the cleanup hook
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Where built archives land; defaults to `<workspace>/artifacts`
    #[serde(default)]
    pub upload_root: Option<String>,

    /// Credential resolved for the publish stage
    #[serde(default = "default_credential_id")]
    pub credential_id: String,

    /// HOME override exported for every stage of the run
    #[serde(default)]
    pub home_directory_override: Option<String>,

    /// `uid:gid` the always-hook normalizes workspace ownership to
    #[serde(default)]
    pub workspace_owner: Option<String>,

    #[serde(default)]
    pub options: PipelineOptions,

    #[serde(default)]
    pub retention: RetentionPolicy,
}

fn default_force() -> bool {
    true
}

fn default_label_channel() -> String {
    "dev".to_string()
}

fn default_max_days() -> u32 {
    30
}

fn default_max_builds() -> u32 {
    50
}

fn default_archive_extension() -> String {
    "tar.bz2".to_string()
}

fn default_workspace() -> String {
    "build".to_string()
}

fn default_credential_id() -> String {
    "package-index".to_string()
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.package_name.trim().is_empty() {
            anyhow::bail!("package_name must not be empty");
        }
        if self
            .package_name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '*' | '?'))
        {
            anyhow::bail!(
                "package_name `{}` contains path or glob metacharacters",
                self.package_name
            );
        }
        if self.archive_extension.is_empty() || self.archive_extension.starts_with('.') {
            anyhow::bail!(
                "archive_extension `{}` must be non-empty without a leading dot",
                self.archive_extension
            );
        }
        if self.options.label_channel.trim().is_empty() {
            anyhow::bail!("options.label_channel must not be empty");
        }
        if self.retention.max_days == 0 {
            anyhow::bail!("retention.max_days must be at least 1");
        }
        if self.retention.max_builds == 0 {
            anyhow::bail!("retention.max_builds must be at least 1");
        }
        Ok(())
    }

    /// Effective pipeline name.
    pub fn pipeline_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}-release", self.package_name))
    }

    /// Effective upload root.
    pub fn upload_root(&self) -> PathBuf {
        match &self.upload_root {
            Some(root) => PathBuf::from(root),
            None => Path::new(&self.workspace).join("artifacts"),
        }
    }

    /// Build the standard release pipeline from this configuration.
    pub fn to_pipeline(&self) -> crate::core::pipeline::Pipeline {
        crate::core::pipeline::Pipeline::release_flow(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = "package_name: ts-dome\n";
        let config = PipelineConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.package_name, "ts-dome");
        assert_eq!(config.pipeline_name(), "ts-dome-release");
        assert_eq!(config.archive_extension, "tar.bz2");
        assert_eq!(config.credential_id, "package-index");
        assert!(config.options.force);
        assert_eq!(config.options.label_channel, "dev");
        assert_eq!(config.upload_root(), PathBuf::from("build/artifacts"));
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
name: "dome-release"
package_name: ts-dome
archive_extension: tar.bz2
config_repository: "https://example.com/config.git"
channels: ["main-channel", "extra"]
workspace: ci-build
upload_root: ci-build/out
credential_id: index-bot
home_directory_override: /var/lib/ci
workspace_owner: "1003:1003"
options:
  force: false
  label_channel: nightly
retention:
  max_days: 14
  max_builds: 10
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.pipeline_name(), "dome-release");
        assert_eq!(config.channels, vec!["main-channel", "extra"]);
        assert_eq!(config.upload_root(), PathBuf::from("ci-build/out"));
        assert!(!config.options.force);
        assert_eq!(config.options.label_channel, "nightly");
        assert_eq!(config.retention.max_days, 14);
        assert_eq!(config.retention.max_builds, 10);
    }

    #[test]
    fn test_empty_package_name_fails() {
        assert!(PipelineConfig::from_yaml("package_name: \"\"\n").is_err());
    }

    #[test]
    fn test_glob_metacharacters_in_package_name_fail() {
        assert!(PipelineConfig::from_yaml("package_name: \"ts/dome\"\n").is_err());
        assert!(PipelineConfig::from_yaml("package_name: \"ts*\"\n").is_err());
    }

    #[test]
    fn test_zero_retention_fails() {
        let yaml = "package_name: ts-dome\nretention:\n  max_days: 0\n";
        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_leading_dot_extension_fails() {
        let yaml = "package_name: ts-dome\narchive_extension: \".tar.bz2\"\n";
        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }
}
