//! Remedy entry mode.
//!
//! Lets the pipeline run on files that may already be pre-built modules, e.g.
//! markup shipped by a dependency that was bundled elsewhere. Files that
//! already start with a module export are kept as they are; everything else
//! matching the pattern goes through [`transform`](crate::transform::transform).

use std::path::Path;

use regex::Regex;

use crate::config::{FileConfig, Matcher};
use crate::emitter::EmitOptions;
use crate::error::PipelineError;
use crate::session::Session;
use crate::transform::{transform, TransformOutput};

pub struct Remedy {
    matcher: Matcher,
    config: FileConfig,
    prebuilt: Regex,
}

impl Remedy {
    /// `config.matcher` selects files (default `\.html$`, case-insensitive).
    /// The same config is used for every file, no manifest lookup happens.
    pub fn new(config: FileConfig) -> Result<Self, PipelineError> {
        let matcher = match &config.matcher {
            Some(matcher) => matcher.clone(),
            None => Matcher::new(r"\.html$", "i")?,
        };
        let prebuilt = Regex::new(r"^module\.exports\s?=")
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        Ok(Self {
            matcher,
            config,
            prebuilt,
        })
    }

    pub async fn apply(
        &self,
        session: &Session,
        filename: impl AsRef<Path>,
        code: String,
        options: &EmitOptions,
    ) -> Result<TransformOutput, PipelineError> {
        let filename = filename.as_ref();
        if !self.matcher.is_match(&filename.to_string_lossy()) {
            return Ok(TransformOutput::PassThrough(code));
        }

        if self.prebuilt.is_match(&code) {
            tracing::debug!("{}: already a module", filename.display());
            return Ok(TransformOutput::PassThrough(code));
        }

        let mut config = self.config.clone();
        config.matcher = Some(self.matcher.clone());
        if config.basedir.is_none() {
            config.basedir = Some(session.root().to_path_buf());
        }
        transform(session, filename, code, Some(config), options).await
    }
}
