//! Push channel abstraction.
//!
//! A channel is scoped to one namespace. Broadcasts are fire-and-forget: no
//! acknowledgment, no retry, and a subscriber only sees messages sent after it
//! subscribed.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;

use crate::error::PipelineError;
use crate::live::message::LiveMessage;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "markmod";

pub type MessageStream = BoxStream<'static, LiveMessage>;

#[async_trait]
pub trait PushChannel: Send + Sync {
    fn namespace(&self) -> &str;

    /// Send to every subscriber connected right now.
    async fn broadcast(&self, message: &LiveMessage) -> Result<(), PipelineError>;

    async fn subscribe(&self) -> Result<MessageStream, PipelineError>;
}

/// In-process channel backed by a tokio broadcast channel.
pub struct InProcessChannel {
    namespace: String,
    tx: broadcast::Sender<LiveMessage>,
}

impl InProcessChannel {
    pub fn new(namespace: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            namespace: namespace.into(),
            tx,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for InProcessChannel {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

#[async_trait]
impl PushChannel for InProcessChannel {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn broadcast(&self, message: &LiveMessage) -> Result<(), PipelineError> {
        match self.tx.send(message.clone()) {
            Ok(receivers) => tracing::debug!("Broadcast {} to {} subscriber(s)", message.event_key(), receivers),
            Err(_) => tracing::debug!("Broadcast {} with no subscribers", message.event_key()),
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<MessageStream, PipelineError> {
        let rx = self.tx.subscribe();
        let messages = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Live subscriber lagged, {} message(s) dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(messages.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_broadcast() {
        let channel = InProcessChannel::default();
        let mut first = channel.subscribe().await.unwrap();
        let mut second = channel.subscribe().await.unwrap();
        assert_eq!(channel.subscriber_count(), 2);

        let message = LiveMessage::change("a.html", "<p></p>");
        channel.broadcast(&message).await.unwrap();

        assert_eq!(first.next().await, Some(message.clone()));
        assert_eq!(second.next().await, Some(message));
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let channel = InProcessChannel::new("ns");
        assert_eq!(channel.namespace(), "ns");
        channel
            .broadcast(&LiveMessage::change("a.html", ""))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_messages() {
        let channel = InProcessChannel::default();
        let _early = channel.subscribe().await.unwrap();
        channel.broadcast(&LiveMessage::change("a.html", "1")).await.unwrap();

        let mut late = channel.subscribe().await.unwrap();
        channel.broadcast(&LiveMessage::change("a.html", "2")).await.unwrap();

        assert_eq!(late.next().await, Some(LiveMessage::change("a.html", "2")));
    }
}
