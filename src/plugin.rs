//! Bundler plugin setup: copies the registry-level parts of a configuration
//! (`pre`, `post`, `minify`) into the session.

use crate::config::{ConfigPatch, FileConfig};
use crate::error::PipelineError;
use crate::session::Session;

/// Apply plugin-level configuration to the session registry.
///
/// `live` and `remedy` need a transport and a host hook respectively; the
/// caller wires those (see the `markmod` binary).
pub async fn apply_plugin(session: &Session, config: &FileConfig) -> Result<(), PipelineError> {
    session.add_pre(config.pre.iter().cloned()).await?;
    session.add_post(config.post.iter().cloned()).await?;

    if config.minify.is_some() || config.sourcemap.is_some() {
        session
            .set_config(ConfigPatch {
                minify: config.minify.clone(),
                sourcemap: config.sourcemap,
            })
            .await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MinifySetting;
    use std::path::Path;

    #[tokio::test]
    async fn test_apply_plugin_registers_global_stages() {
        let session = Session::new("/proj");
        let config = FileConfig::from_yaml_str(
            "pre: trim\npost: [strip-comments, trim]\nminify: true\n",
            Some(Path::new("/proj")),
        )
        .unwrap();

        apply_plugin(&session, &config).await.unwrap();

        assert_eq!(session.pre_stages().await.len(), 1);
        assert_eq!(session.post_stages().await.len(), 2);
        assert_eq!(session.config().await.minify, MinifySetting::Enabled(true));
        assert!(session.config().await.sourcemap);
    }

    #[tokio::test]
    async fn test_apply_plugin_unknown_stage() {
        let session = Session::new("/proj");
        let config = FileConfig::from_yaml_str("post: missing\n", None).unwrap();
        assert!(apply_plugin(&session, &config).await.is_err());
    }
}
