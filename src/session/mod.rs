use std::collections::HashSet;
use std::future::Future;

use crate::{config::Properties, TopicConfig, TopicName};

#[cfg(feature = "kafka")]
mod kafka;
mod nats;

#[cfg(feature = "kafka")]
pub use kafka::{KafkaSession, KafkaSessionFactory};
pub use nats::{NatsSession, NatsSessionFactory};

/// A ready to use connection to a broker's admin endpoint. These are the only broker operations
/// topic management needs.
pub trait AdminSession: Send + Sync {
    /// Ask the broker to create the topic. Resolves once the broker has acknowledged the request,
    /// which does not mean the topic is visible yet.
    fn submit_create(
        &self,
        topic: &TopicName,
        config: &TopicConfig,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Ask the broker to delete the topic. Resolves once the broker has acknowledged the request.
    fn submit_delete(&self, topic: &TopicName) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// The names of all topics currently visible in cluster metadata. Always a live query.
    fn list_topic_names(&self) -> impl Future<Output = anyhow::Result<HashSet<String>>> + Send;

    /// Release the connection.
    fn close(self) -> impl Future<Output = anyhow::Result<()>> + Send
    where
        Self: Sized;
}

/// Opens [`AdminSession`]s from admin connection properties
pub trait SessionFactory: Send + Sync {
    type Session: AdminSession;

    fn connect(
        &self,
        props: &Properties,
    ) -> impl Future<Output = anyhow::Result<Self::Session>> + Send;
}
