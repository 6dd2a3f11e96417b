//! Per-file transform entry point used by a host bundler.
//!
//! Takes the raw code of one file and returns the code the bundler should use
//! instead: either the untouched input (file not handled) or a generated
//! module.

use std::path::Path;

use crate::config::FileConfig;
use crate::emitter::{emit_module, EmitOptions};
use crate::error::PipelineError;
use crate::pipeline::create_handler;
use crate::session::Session;

/// Outcome of transforming one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutput {
    /// Not handled; the original code is kept
    PassThrough(String),
    /// Generated module text
    Module(String),
}

impl TransformOutput {
    pub fn into_code(self) -> String {
        match self {
            TransformOutput::PassThrough(code) | TransformOutput::Module(code) => code,
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, TransformOutput::Module(_))
    }
}

fn looks_like_markup(code: &str) -> bool {
    code.trim_start().starts_with('<')
}

pub async fn transform(
    session: &Session,
    filename: impl AsRef<Path>,
    code: String,
    config: Option<FileConfig>,
    options: &EmitOptions,
) -> Result<TransformOutput, PipelineError> {
    let filename = filename.as_ref();
    let handler = match create_handler(session, filename, config).await? {
        Some(handler) => handler,
        None => return Ok(TransformOutput::PassThrough(code)),
    };

    if handler.config().check_markup && !looks_like_markup(&code) {
        tracing::debug!("{}: not markup, passing through", handler.filename());
        return Ok(TransformOutput::PassThrough(code));
    }

    let result = handler.run(code).await?;
    let live = session.is_live().await;
    Ok(TransformOutput::Module(emit_module(session.root(), &result, live, options)))
}
