//! Live source reload.
//!
//! Build side: [`LiveServer`] re-processes changed files and broadcasts
//! [`LiveMessage`]s on a [`PushChannel`]. Runtime side: [`LiveClient`]
//! re-emits them as `change:<uid>` events bound to runtime modules.

pub mod channel;
pub mod client;
pub mod message;
pub mod nats;
pub mod server;
pub mod watch;

pub use channel::{InProcessChannel, MessageStream, PushChannel, DEFAULT_NAMESPACE};
pub use client::LiveClient;
pub use message::{change_key, ChangeEvent, LiveMessage};
pub use nats::{LiveConfig, NatsChannel};
pub use server::LiveServer;
pub use watch::{WatchList, WatchSet};
