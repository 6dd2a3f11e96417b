//! Runtime side of generated modules.
//!
//! A generated module exports a [`RuntimeModule`] built from the processed
//! source. It renders into [`Sink`]s and pushes live updates to them.

pub mod module;
pub mod sink;

pub use module::{ChangeListener, InsertHandle, ListenerId, RuntimeModule, WeakRuntimeModule};
pub use sink::{Sink, TextSink};
