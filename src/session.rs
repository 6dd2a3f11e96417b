//! Session: the working root, the stage table, the minifier and the registry.
//!
//! A session replaces process-wide state. Clones share one registry; two
//! sessions created with [`Session::new`] are fully independent, so tests and
//! independent builds in one process do not interfere.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::{ConfigPatch, GlobalConfig};
use crate::error::PipelineError;
use crate::identity::{clean_path, file_identity};
use crate::minify::{BasicMinifier, Minifier};
use crate::registry::Registry;
use crate::stage::{SharedStage, StageRef};
use crate::stage_table::{SharedStageTable, StageTable};

struct SessionInner {
    root: PathBuf,
    registry: RwLock<Registry>,
    stages: SharedStageTable,
    minifier: Arc<dyn Minifier>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

/// Builder for sessions with a custom stage table or minifier
pub struct SessionBuilder {
    root: PathBuf,
    stages: StageTable,
    minifier: Arc<dyn Minifier>,
}

impl SessionBuilder {
    pub fn stages(mut self, stages: StageTable) -> Self {
        self.stages = stages;
        self
    }

    pub fn minifier(mut self, minifier: Arc<dyn Minifier>) -> Self {
        self.minifier = minifier;
        self
    }

    pub fn build(self) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                root: self.root,
                registry: RwLock::new(Registry::new()),
                stages: Arc::new(self.stages),
                minifier: self.minifier,
            }),
        }
    }
}

fn absolute_root(root: PathBuf) -> PathBuf {
    if root.is_absolute() {
        return clean_path(&root);
    }
    match std::env::current_dir() {
        Ok(cwd) => clean_path(&cwd.join(root)),
        Err(_) => clean_path(&root),
    }
}

impl Session {
    /// Session rooted at `root` with built-in stages and the basic minifier.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::builder(root).build()
    }

    pub fn builder(root: impl Into<PathBuf>) -> SessionBuilder {
        SessionBuilder {
            root: absolute_root(root.into()),
            stages: StageTable::with_builtins(),
            minifier: Arc::new(BasicMinifier::new()),
        }
    }

    /// Working root all identities are relative to.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn stages(&self) -> &StageTable {
        &self.inner.stages
    }

    pub fn minifier(&self) -> Arc<dyn Minifier> {
        self.inner.minifier.clone()
    }

    /// Identity (uid) of a path in this session.
    pub fn identity(&self, path: impl AsRef<Path>) -> String {
        file_identity(&self.inner.root, path.as_ref())
    }

    fn resolve_global<I, S>(&self, stages: I) -> Result<Vec<SharedStage>, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<StageRef>,
    {
        let refs: Vec<StageRef> = stages.into_iter().map(Into::into).collect();
        let root = self.root();
        self.stages().resolve_all(&refs, root, root)
    }

    /// Append global pre-stages. Names resolve against the working root.
    pub async fn add_pre<I, S>(&self, stages: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<StageRef>,
    {
        let resolved = self.resolve_global(stages)?;
        tracing::debug!("Adding {} global pre-stage(s)", resolved.len());
        self.inner.registry.write().await.add_pre(resolved);
        Ok(())
    }

    /// Append global post-stages. Names resolve against the working root.
    pub async fn add_post<I, S>(&self, stages: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<StageRef>,
    {
        let resolved = self.resolve_global(stages)?;
        tracing::debug!("Adding {} global post-stage(s)", resolved.len());
        self.inner.registry.write().await.add_post(resolved);
        Ok(())
    }

    pub async fn set_config(&self, patch: ConfigPatch) -> GlobalConfig {
        self.inner.registry.write().await.set_config(patch)
    }

    pub async fn config(&self) -> GlobalConfig {
        self.inner.registry.read().await.config().clone()
    }

    pub async fn reset(&self) {
        self.inner.registry.write().await.reset();
    }

    pub async fn enable_live(&self) {
        self.inner.registry.write().await.enable_live();
    }

    pub async fn is_live(&self) -> bool {
        self.inner.registry.read().await.is_live()
    }

    /// Snapshot of the current pre-stage list.
    pub async fn pre_stages(&self) -> Vec<SharedStage> {
        self.inner.registry.read().await.pre_stages().to_vec()
    }

    /// Snapshot of the current post-stage list.
    pub async fn post_stages(&self) -> Vec<SharedStage> {
        self.inner.registry.read().await.post_stages().to_vec()
    }
}
