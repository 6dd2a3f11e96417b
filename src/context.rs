//! Processing context threaded through every pipeline stage.

use std::sync::Arc;

use crate::config::FileConfig;

/// The `{config, filename, src}` triple passed from stage to stage.
///
/// `filename` is the file identity (root-relative, `/`-separated) and is used
/// as the live reload routing key. Stages receive their own copy of the
/// context and hand back a new one; only the returned `src` is carried
/// forward by the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    pub config: Arc<FileConfig>,
    pub filename: String,
    pub src: String,
}

impl ProcessingContext {
    pub fn new(config: Arc<FileConfig>, filename: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            config,
            filename: filename.into(),
            src: src.into(),
        }
    }

    /// Same context with a replaced source.
    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = src.into();
        self
    }
}
