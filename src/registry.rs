//! Global stage lists, global configuration and the live flag.

use crate::config::{ConfigPatch, GlobalConfig};
use crate::stage::SharedStage;

/// State shared by every pipeline run of a [`Session`](crate::Session).
///
/// Runs read the stage lists when they reach the corresponding phase, so a
/// mutation is visible to in-flight runs that have not reached it yet.
/// Independently configured builds must not share one registry concurrently.
#[derive(Clone, Default)]
pub struct Registry {
    pre_stages: Vec<SharedStage>,
    post_stages: Vec<SharedStage>,
    global_config: GlobalConfig,
    live_enabled: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pre(&mut self, stages: impl IntoIterator<Item = SharedStage>) {
        self.pre_stages.extend(stages);
    }

    pub fn add_post(&mut self, stages: impl IntoIterator<Item = SharedStage>) {
        self.post_stages.extend(stages);
    }

    /// Shallow-merge into the global configuration and return the result.
    pub fn set_config(&mut self, patch: ConfigPatch) -> GlobalConfig {
        self.global_config.merge(patch);
        self.global_config.clone()
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.global_config
    }

    /// Empty stage lists, default configuration, live disabled.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn enable_live(&mut self) {
        self.live_enabled = true;
    }

    pub fn is_live(&self) -> bool {
        self.live_enabled
    }

    pub fn pre_stages(&self) -> &[SharedStage] {
        &self.pre_stages
    }

    pub fn post_stages(&self) -> &[SharedStage] {
        &self.post_stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MinifySetting;
    use crate::stage;

    #[test]
    fn test_reset_restores_defaults() {
        let mut registry = Registry::new();
        registry.add_pre([stage::from_fn("a", Ok)]);
        registry.add_post([stage::from_fn("b", Ok), stage::from_fn("c", Ok)]);
        registry.set_config(ConfigPatch {
            minify: Some(MinifySetting::Enabled(true)),
            sourcemap: Some(false),
        });
        registry.enable_live();

        registry.reset();

        assert!(registry.pre_stages().is_empty());
        assert!(registry.post_stages().is_empty());
        assert_eq!(
            registry.config(),
            &GlobalConfig {
                minify: MinifySetting::Enabled(false),
                sourcemap: true,
            }
        );
        assert!(!registry.is_live());

        registry.reset();
        assert_eq!(registry.config(), &GlobalConfig::default());
    }

    #[test]
    fn test_stage_lists_append_in_order() {
        let mut registry = Registry::new();
        registry.add_pre([stage::from_fn("p1", Ok)]);
        registry.add_pre([stage::from_fn("p2", Ok)]);

        let names: Vec<&str> = registry.pre_stages().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["p1", "p2"]);
    }

    #[test]
    fn test_set_config_returns_merged() {
        let mut registry = Registry::new();
        let merged = registry.set_config(ConfigPatch::minify(true));
        assert_eq!(merged.minify, MinifySetting::Enabled(true));
        assert!(merged.sourcemap);
    }
}
