//! Live update server.
//!
//! Re-processes files reported as changed and broadcasts the new source on the
//! push channel. Attaching also registers a global post-stage that adds every
//! processed file to the watch set, so the watched files follow what has been
//! built.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::FileConfig;
use crate::error::PipelineError;
use crate::identity::absolutize;
use crate::live::channel::PushChannel;
use crate::live::message::LiveMessage;
use crate::live::watch::WatchSet;
use crate::pipeline::create_handler;
use crate::session::Session;
use crate::stage;

pub struct LiveServer {
    session: Session,
    channel: Arc<dyn PushChannel>,
    config: Option<FileConfig>,
}

impl LiveServer {
    /// Enable live mode on the session and hook the watch set in.
    pub async fn attach(
        session: &Session,
        channel: Arc<dyn PushChannel>,
        watcher: Arc<dyn WatchSet>,
    ) -> Result<Self, PipelineError> {
        session.enable_live().await;

        let watch = stage::from_fn("live-watch", move |ctx| {
            watcher.add(&ctx.filename);
            Ok(ctx)
        });
        session.add_post([watch]).await?;

        tracing::info!("Live reload attached on namespace '{}'", channel.namespace());

        Ok(Self {
            session: session.clone(),
            channel,
            config: None,
        })
    }

    /// Re-process with this configuration instead of the discovered manifest.
    pub fn with_config(mut self, config: FileConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn channel(&self) -> &Arc<dyn PushChannel> {
        &self.channel
    }

    /// Re-process `filename` and broadcast the result.
    ///
    /// Returns the broadcast message, or `None` when the file is no longer
    /// handled. Failed runs broadcast nothing.
    pub async fn notify_change(&self, filename: impl AsRef<Path>) -> Result<Option<LiveMessage>, PipelineError> {
        let filename = filename.as_ref();
        let handler = match create_handler(&self.session, filename, self.config.clone()).await? {
            Some(handler) => handler,
            None => {
                tracing::debug!("Change ignored for {}", filename.display());
                return Ok(None);
            }
        };

        let source = tokio::fs::read_to_string(absolutize(self.session.root(), filename)).await?;
        let result = handler.run(source).await?;

        let message = LiveMessage::change(result.filename, result.src);
        self.channel.broadcast(&message).await?;
        tracing::info!("Broadcast {}", message.event_key());

        Ok(Some(message))
    }

    /// Handle change notifications until the sender side closes.
    pub async fn run(&self, mut changes: mpsc::Receiver<PathBuf>) {
        while let Some(path) = changes.recv().await {
            if let Err(e) = self.notify_change(&path).await {
                tracing::warn!("Failed to reprocess {}: {}", path.display(), e);
            }
        }
        tracing::info!("Change stream closed, live server stopping");
    }
}
