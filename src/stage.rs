//! Stage contract shared by parsers, processors and global pre/post stages.
//!
//! Every stage, whether written as a plain function or as an async function,
//! is normalized to the same [`Stage`] trait object so the pipeline composes
//! them without caring about their original shape.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ProcessingContext;
use crate::error::StageError;

pub type StageResult = Result<ProcessingContext, StageError>;

/// Async transformation of a processing context.
///
/// # Example
///
/// ```ignore
/// use markmod::stage::{Stage, StageResult};
/// use markmod::ProcessingContext;
///
/// struct Banner;
///
/// #[async_trait::async_trait]
/// impl Stage for Banner {
///     fn name(&self) -> &str {
///         "banner"
///     }
///
///     async fn run(&self, ctx: ProcessingContext) -> StageResult {
///         let src = format!("<!-- {} -->\n{}", ctx.filename, ctx.src);
///         Ok(ctx.with_src(src))
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Transform the context. Returning it untouched is a no-op.
    async fn run(&self, ctx: ProcessingContext) -> StageResult;
}

pub type SharedStage = Arc<dyn Stage>;

/// Stage backed by a synchronous function.
pub struct FnStage<F> {
    name: String,
    func: F,
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(ProcessingContext) -> StageResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: ProcessingContext) -> StageResult {
        (self.func)(ctx)
    }
}

/// Stage backed by a function returning a future.
pub struct AsyncFnStage<F> {
    name: String,
    func: F,
}

#[async_trait]
impl<F, Fut> Stage for AsyncFnStage<F>
where
    F: Fn(ProcessingContext) -> Fut + Send + Sync,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: ProcessingContext) -> StageResult {
        (self.func)(ctx).await
    }
}

/// Wrap a synchronous function as a stage.
pub fn from_fn<F>(name: impl Into<String>, func: F) -> SharedStage
where
    F: Fn(ProcessingContext) -> StageResult + Send + Sync + 'static,
{
    Arc::new(FnStage {
        name: name.into(),
        func,
    })
}

/// Wrap an async function as a stage.
pub fn from_async_fn<F, Fut>(name: impl Into<String>, func: F) -> SharedStage
where
    F: Fn(ProcessingContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    Arc::new(AsyncFnStage {
        name: name.into(),
        func,
    })
}

/// A stage given in configuration: either a name looked up in the stage
/// table, or a stage value supplied directly.
#[derive(Clone)]
pub enum StageRef {
    Named(String),
    Direct(SharedStage),
}

impl fmt::Debug for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            StageRef::Direct(stage) => f.debug_tuple("Direct").field(&stage.name()).finish(),
        }
    }
}

impl From<&str> for StageRef {
    fn from(name: &str) -> Self {
        StageRef::Named(name.to_string())
    }
}

impl From<String> for StageRef {
    fn from(name: String) -> Self {
        StageRef::Named(name)
    }
}

impl From<SharedStage> for StageRef {
    fn from(stage: SharedStage) -> Self {
        StageRef::Direct(stage)
    }
}
