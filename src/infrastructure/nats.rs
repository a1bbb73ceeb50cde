//! NATS event publisher.

use async_trait::async_trait;

use crate::domain::events::DomainEvent;
use crate::ports::{EventPublisher, PublishError};

#[derive(Clone, Debug)]
pub struct NatsEventPublisher {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsEventPublisher {
    pub fn new(client: async_nats::Client, subject_prefix: impl Into<String>) -> Self {
        Self { client, subject_prefix: subject_prefix.into() }
    }

    pub fn subject_for(&self, event: &DomainEvent) -> String {
        format!("{}.{}", self.subject_prefix, event.subject())
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(&event).map_err(|e| PublishError(e.to_string()))?;
        self.client
            .publish(self.subject_for(&event), payload.into())
            .await
            .map_err(|e| PublishError(e.to_string()))
    }
}
