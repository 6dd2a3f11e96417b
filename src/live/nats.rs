/// NATS transport for the live reload channel
///
/// Core NATS publish/subscribe on `<namespace>.change`. Core NATS is
/// at-most-once with no persistence, which is what live reload wants: a
/// browser that connects later fetches the current bundle anyway.

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::PipelineError;
use crate::live::channel::{MessageStream, PushChannel, DEFAULT_NAMESPACE};
use crate::live::message::LiveMessage;

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub url: String,
    pub namespace: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("NATS_URL")
                .unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            namespace: std::env::var("MARKMOD_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct NatsChannel {
    client: async_nats::Client,
    namespace: String,
    subject: String,
}

impl NatsChannel {
    /// Connect to NATS
    pub async fn connect(config: LiveConfig) -> Result<Self, PipelineError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| PipelineError::Channel(format!("Failed to connect to {}: {}", config.url, e)))?;
        tracing::info!("Connected to NATS at {}", config.url);

        Ok(Self::from_client(client, config.namespace))
    }

    pub fn from_client(client: async_nats::Client, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            client,
            subject: subject_for(&namespace),
            namespace,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Check if the NATS connection is active
    pub fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }
}

fn subject_for(namespace: &str) -> String {
    format!("{}.change", namespace)
}

#[async_trait]
impl PushChannel for NatsChannel {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn broadcast(&self, message: &LiveMessage) -> Result<(), PipelineError> {
        let payload = serde_json::to_vec(message)
            .map_err(|e| PipelineError::Channel(format!("Failed to encode message: {}", e)))?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| PipelineError::Channel(format!("Publish to {} failed: {}", self.subject, e)))?;

        tracing::debug!("Published {} to NATS subject {}", message.event_key(), self.subject);
        Ok(())
    }

    async fn subscribe(&self) -> Result<MessageStream, PipelineError> {
        let subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .map_err(|e| PipelineError::Channel(format!("Subscribe to {} failed: {}", self.subject, e)))?;

        let messages = subscriber.filter_map(|msg| async move {
            match serde_json::from_slice::<LiveMessage>(&msg.payload) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!("Ignoring malformed live message on {}: {}", msg.subject, e);
                    None
                }
            }
        });
        Ok(messages.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_is_namespaced() {
        assert_eq!(subject_for("markmod"), "markmod.change");
        assert_eq!(subject_for("site-a"), "site-a.change");
    }

    #[test]
    fn test_default_namespace() {
        if std::env::var("MARKMOD_NAMESPACE").is_err() {
            assert_eq!(LiveConfig::default().namespace, DEFAULT_NAMESPACE);
        }
    }
}
