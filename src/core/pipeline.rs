//! Pipeline definition - ordered stages plus unconditional hooks

use crate::core::artifact::ArtifactReference;
use crate::core::config::PipelineConfig;
use crate::core::guard::Guard;
use crate::core::stage::{CommandSpec, Stage};
use crate::env::credentials::CredentialBinding;
use std::collections::HashMap;

/// An unconditional post-run action. Hooks have no guard: they execute for
/// every run, whatever the stage loop did.
#[derive(Debug, Clone)]
pub struct Hook {
    pub name: String,
    pub body: Vec<CommandSpec>,
}

impl Hook {
    pub fn new(name: impl Into<String>, body: Vec<CommandSpec>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

/// A pipeline definition: ordered stages, then always-hooks, then
/// cleanup-hooks. Declaration order is the only scheduling relation.
///
/// Conditional inclusion is expressed by each stage's guard, not by
/// branching here - adding a stage is a declaration, not new control flow.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,

    /// Pipeline-level environment, entered for the whole run (stages and
    /// hooks alike)
    pub env: HashMap<String, String>,

    pub stages: Vec<Stage>,

    /// Maintenance actions run after the stage loop, whatever its outcome
    pub always_hooks: Vec<Hook>,

    /// Workspace teardown, run after the always-hooks
    pub cleanup_hooks: Vec<Hook>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env: HashMap::new(),
            stages: Vec::new(),
            always_hooks: Vec::new(),
            cleanup_hooks: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_always_hook(mut self, hook: Hook) -> Self {
        self.always_hooks.push(hook);
        self
    }

    pub fn with_cleanup_hook(mut self, hook: Hook) -> Self {
        self.cleanup_hooks.push(hook);
        self
    }

    /// Look up a stage by name.
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The standard build-and-publish flow:
    ///
    /// 1. `clone-config` - fetch the configuration dependency (always)
    /// 2. `build-release` - build on the release channels (release tags)
    /// 3. `build-dev` - build with the dev label (everything else)
    /// 4. `publish` - force-upload the artifacts (release tags, credentialed)
    ///
    /// plus ownership normalization as an always-hook and workspace teardown
    /// as a cleanup-hook.
    pub fn release_flow(config: &PipelineConfig) -> Self {
        let mut pipeline = Pipeline::new(config.pipeline_name())
            .with_env("PACKAGE_NAME", config.package_name.clone());
        if let Some(home) = &config.home_directory_override {
            pipeline = pipeline.with_env("HOME", home.clone());
        }

        if let Some(repository) = &config.config_repository {
            let destination = format!("{}/config", config.workspace);
            pipeline = pipeline.with_stage(
                Stage::new("clone-config", Guard::Always).with_command(CommandSpec::new(
                    "git",
                    ["clone", repository.as_str(), destination.as_str()],
                )),
            );
        }

        let upload_root = config.upload_root();
        let mut build_args = vec!["build".to_string()];
        for channel in &config.channels {
            build_args.push("--channel".to_string());
            build_args.push(channel.clone());
        }
        build_args.push("--output-folder".to_string());
        build_args.push(upload_root.display().to_string());

        let mut release_args = build_args.clone();
        release_args.push(".".to_string());
        pipeline = pipeline.with_stage(
            Stage::new("build-release", Guard::ReleaseTag)
                .with_command(CommandSpec::new("conda", release_args)),
        );

        let mut dev_args = build_args;
        dev_args.push("--label".to_string());
        dev_args.push(config.options.label_channel.clone());
        dev_args.push(".".to_string());
        pipeline = pipeline.with_stage(
            Stage::new("build-dev", Guard::ReleaseTag.negate())
                .with_command(CommandSpec::new("conda", dev_args)),
        );

        let artifact = ArtifactReference::new(
            config.package_name.clone(),
            upload_root,
            config.archive_extension.clone(),
        );
        let mut upload_args = vec!["upload".to_string()];
        if config.options.force {
            upload_args.push("--force".to_string());
        }
        upload_args.push(artifact.glob());
        pipeline = pipeline.with_stage(
            Stage::new("publish", Guard::ReleaseTag)
                .with_credential(CredentialBinding::conventional(&config.credential_id))
                .with_command(CommandSpec::new("anaconda", ["login"]))
                .with_command(CommandSpec::new("anaconda", upload_args)),
        );

        if let Some(owner) = &config.workspace_owner {
            pipeline = pipeline.with_always_hook(Hook::new(
                "normalize-ownership",
                vec![CommandSpec::new(
                    "chown",
                    ["-R", owner.as_str(), config.workspace.as_str()],
                )],
            ));
        }

        pipeline.with_cleanup_hook(Hook::new(
            "teardown-workspace",
            vec![CommandSpec::new(
                "rm",
                ["-rf", config.workspace.as_str()],
            )],
        ))
    }
}
