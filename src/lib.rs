//! # Markmod: markup to module build pipeline
//!
//! Markmod turns markup files (HTML, XHTML, SVG) into loadable modules. Each
//! file goes through a five-phase pipeline:
//!
//! 1. **parse**: the first parser that changes the source wins
//! 2. **pre**: global pre-stages, in registration order
//! 3. **local**: the file's own processors
//! 4. **post**: global post-stages
//! 5. **finalize**: optional minification
//!
//! The result is emitted as a module exporting a runtime object. In live mode
//! the module also subscribes to change events, and the live server
//! re-processes edited files and broadcasts the new source.
//!
//! ## Example: per-directory manifest
//!
//! ```yaml
//! # markmod.yaml
//! match: ["\\.html$", "i"]
//! basedir: .
//! parsers: ./stages/jade
//! processors:
//!   - trim
//!   - ./stages/inline-images
//! minify: true
//! ```
//!
//! ## Example: running a file through the pipeline
//!
//! ```no_run
//! use markmod::{create_handler, Session};
//!
//! # async fn run() -> Result<(), markmod::PipelineError> {
//! let session = Session::new("/srv/app");
//! if let Some(handler) = create_handler(&session, "views/page.html", None).await? {
//!     let result = handler.run("<div>  hello </div>").await?;
//!     println!("{}", result.src);
//! }
//! # Ok(())
//! # }
//! ```

// Core pipeline
pub mod error;
pub mod identity;
pub mod config;
pub mod context;
pub mod stage;
pub mod stage_table;
pub mod minify;
pub mod registry;
pub mod session;
pub mod pipeline;

// Module output and build-tool integration
pub mod emitter;
pub mod transform;
pub mod remedy;
pub mod plugin;

// Live reload over a push channel
pub mod live;

// Runtime objects exported by generated modules
pub mod runtime;

// Re-export key types
pub use error::{Phase, PipelineError, StageError};
pub use config::{ConfigPatch, FileConfig, GlobalConfig, Matcher, MinifyOptions, MinifySetting};
pub use context::ProcessingContext;
pub use stage::{from_async_fn, from_fn, SharedStage, Stage, StageRef, StageResult};
pub use stage_table::{SharedStageTable, StageTable};
pub use minify::{BasicMinifier, Minifier};
pub use registry::Registry;
pub use session::{Session, SessionBuilder};
pub use pipeline::{create_handler, Handler};

pub use emitter::{emit_module, EmitOptions};
pub use transform::{transform, TransformOutput};
pub use remedy::Remedy;
pub use plugin::apply_plugin;

pub use live::{InProcessChannel, LiveClient, LiveMessage, LiveServer, NatsChannel, PushChannel, WatchList};
pub use runtime::{RuntimeModule, Sink, TextSink};
