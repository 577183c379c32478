//! Domain event publishing. Events go out after the unit of work commits;
//! a failed publish is logged and never fails the request.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Publishes each event as JSON on `storefront.<area>.<name>`.
#[derive(Clone, Debug)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client.publish(event.subject(), payload.into()).await?;
        Ok(())
    }
}

/// Used when no NATS server is configured.
#[derive(Clone, Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) -> anyhow::Result<()> {
        debug!(subject = %event.subject(), ?event, "domain event");
        Ok(())
    }
}

pub async fn publish_all(publisher: &dyn EventPublisher, events: Vec<DomainEvent>) {
    for event in events {
        if let Err(e) = publisher.publish(&event).await {
            warn!(subject = %event.subject(), error = %e, "failed to publish domain event");
        }
    }
}
