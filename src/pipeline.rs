//! Source processor: builds a handler for one file and runs it through the
//! five pipeline phases.
//!
//! ```text
//! parse selection -> global pre -> local processors -> global post -> finalize
//! ```
//!
//! Phases and the stages inside them run strictly in order, one at a time.
//! Any stage failure aborts the run and is returned to the caller.

use std::path::Path;
use std::sync::Arc;

use crate::config::{FileConfig, Matcher};
use crate::context::ProcessingContext;
use crate::error::{Phase, PipelineError};
use crate::identity::absolutize;
use crate::session::Session;
use crate::stage::SharedStage;

/// Reusable processor for one source file
#[derive(Clone)]
pub struct Handler {
    session: Session,
    config: Arc<FileConfig>,
    filename: String,
    parsers: Vec<SharedStage>,
    processors: Vec<SharedStage>,
}

/// Build a handler for `filename`.
///
/// Returns `Ok(None)` when the file does not exist or its identity does not
/// satisfy the configured `match` pattern. When `config` is `None` it is
/// discovered from the nearest manifest. Stage names are resolved here, so an
/// unknown stage fails before any source is processed.
pub async fn create_handler(
    session: &Session,
    filename: impl AsRef<Path>,
    config: Option<FileConfig>,
) -> Result<Option<Handler>, PipelineError> {
    let path = absolutize(session.root(), filename.as_ref());

    if !tokio::fs::try_exists(&path).await? {
        tracing::debug!("Skipping {}: file does not exist", path.display());
        return Ok(None);
    }

    let identity = session.identity(&path);

    let mut config = match config {
        Some(config) => config,
        None => FileConfig::discover(&path).await?,
    };

    let basedir = config
        .basedir
        .clone()
        .map(|dir| absolutize(session.root(), &dir))
        .unwrap_or_else(|| session.root().to_path_buf());
    config.basedir = Some(basedir.clone());

    let matcher = config.matcher.get_or_insert_with(Matcher::default_markup);
    if !matcher.is_match(&identity) {
        tracing::debug!(
            "Skipping {}: does not match /{}/{}",
            identity,
            matcher.pattern(),
            matcher.flags()
        );
        return Ok(None);
    }

    let stages = session.stages();
    let parsers = stages.resolve_all(&config.parsers, &basedir, session.root())?;
    let processors = stages.resolve_all(&config.processors, &basedir, session.root())?;

    Ok(Some(Handler {
        session: session.clone(),
        config: Arc::new(config),
        filename: identity,
        parsers,
        processors,
    }))
}

impl Handler {
    /// Identity of the file this handler processes.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn config(&self) -> &Arc<FileConfig> {
        &self.config
    }

    /// Process raw source text.
    pub async fn run(&self, src: impl Into<String>) -> Result<ProcessingContext, PipelineError> {
        let initial = ProcessingContext::new(self.config.clone(), self.filename.clone(), src);

        let ctx = self.select_parser(initial).await?;

        let pre = self.session.pre_stages().await;
        let ctx = compose(Phase::Pre, &pre, ctx).await?;

        let ctx = compose(Phase::Local, &self.processors, ctx).await?;

        let post = self.session.post_stages().await;
        let ctx = compose(Phase::Post, &post, ctx).await?;

        self.finalize(ctx).await
    }

    /// First parser whose output differs from the input wins; the rest are
    /// not invoked. No parser changing the source keeps the input.
    async fn select_parser(&self, initial: ProcessingContext) -> Result<ProcessingContext, PipelineError> {
        for parser in &self.parsers {
            let out = parser
                .run(initial.clone())
                .await
                .map_err(|e| PipelineError::stage(Phase::Parse, parser.name(), e))?;

            if out.src != initial.src {
                tracing::debug!("{}: selected parser '{}'", self.filename, parser.name());
                return Ok(initial.with_src(out.src));
            }
        }
        Ok(initial)
    }

    async fn finalize(&self, ctx: ProcessingContext) -> Result<ProcessingContext, PipelineError> {
        let config = self.session.config().await;
        match config.minify.options() {
            Some(options) => {
                let src = self
                    .session
                    .minifier()
                    .minify(&ctx.src, &options)
                    .await
                    .map_err(|e| PipelineError::stage(Phase::Finalize, "minify", e))?;
                Ok(ctx.with_src(src))
            }
            None => Ok(ctx),
        }
    }
}

/// Run `stages` in order, each on the previous stage's output.
async fn compose(
    phase: Phase,
    stages: &[SharedStage],
    mut ctx: ProcessingContext,
) -> Result<ProcessingContext, PipelineError> {
    for stage in stages {
        tracing::debug!("{}: running {} stage '{}'", ctx.filename, phase, stage.name());
        let out = stage
            .run(ctx.clone())
            .await
            .map_err(|e| PipelineError::stage(phase, stage.name(), e))?;
        ctx.src = out.src;
    }
    Ok(ctx)
}
