//! Stage table for resolving stage names used in configuration.
//!
//! Stage implementations are registered under stable names at startup and
//! looked up when a handler is built. Names that look like paths (`./x`,
//! `../x`, `/x`) are resolved against the configuration's base directory and
//! looked up by their root-relative identity, so a project can register
//! `stages/banner` and reference it as `./stages/banner` from its manifest.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::context::ProcessingContext;
use crate::error::PipelineError;
use crate::identity::file_identity;
use crate::stage::{self, SharedStage, StageRef};

/// Registry of named stages
#[derive(Clone, Default)]
pub struct StageTable {
    stages: HashMap<String, SharedStage>,
}

impl StageTable {
    /// Create a new empty stage table
    pub fn new() -> Self {
        Self {
            stages: HashMap::new(),
        }
    }

    /// Table pre-populated with the built-in stages (`trim`, `strip-comments`)
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register("trim", stage::from_fn("trim", trim));
        table.register("strip-comments", stage::from_fn("strip-comments", strip_comments));
        table
    }

    /// Register a stage
    ///
    /// # Example
    ///
    /// ```ignore
    /// use markmod::{stage, StageTable};
    ///
    /// let mut table = StageTable::new();
    /// table.register("shout", stage::from_fn("shout", |ctx| {
    ///     let src = ctx.src.to_uppercase();
    ///     Ok(ctx.with_src(src))
    /// }));
    /// ```
    pub fn register(&mut self, name: impl Into<String>, stage: SharedStage) {
        self.stages.insert(name.into(), stage);
    }

    /// Check if a stage is registered
    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Get list of all registered stage names
    pub fn list_stages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stages.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a stage name.
    ///
    /// Exact names win; path-like names are joined to `basedir` and looked up
    /// by their identity relative to `root`.
    pub fn resolve(&self, name: &str, basedir: &Path, root: &Path) -> Result<SharedStage, PipelineError> {
        if let Some(stage) = self.stages.get(name) {
            return Ok(stage.clone());
        }

        if is_path_like(name) {
            let key = file_identity(root, &basedir.join(name));
            if let Some(stage) = self.stages.get(&key) {
                return Ok(stage.clone());
            }
        }

        Err(PipelineError::StageNotFound {
            name: name.to_string(),
            basedir: basedir.to_path_buf(),
        })
    }

    /// Resolve a list of references; direct stages pass through.
    pub fn resolve_all(
        &self,
        refs: &[StageRef],
        basedir: &Path,
        root: &Path,
    ) -> Result<Vec<SharedStage>, PipelineError> {
        refs.iter()
            .map(|r| match r {
                StageRef::Direct(stage) => Ok(stage.clone()),
                StageRef::Named(name) => self.resolve(name, basedir, root),
            })
            .collect()
    }
}

fn is_path_like(name: &str) -> bool {
    name.starts_with("./") || name.starts_with("../") || Path::new(name).is_absolute()
}

fn trim(ctx: ProcessingContext) -> stage::StageResult {
    let src = ctx.src.trim().to_string();
    Ok(ctx.with_src(src))
}

fn comment_pattern() -> &'static Regex {
    static COMMENTS: OnceLock<Regex> = OnceLock::new();
    COMMENTS.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"))
}

fn strip_comments(ctx: ProcessingContext) -> stage::StageResult {
    let src = comment_pattern().replace_all(&ctx.src, "").into_owned();
    Ok(ctx.with_src(src))
}

/// Shared handle to an immutable table, as held by a session
pub type SharedStageTable = Arc<StageTable>;
