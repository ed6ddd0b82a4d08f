use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use rdkafka::{
    admin::{AdminClient, AdminOptions, NewTopic, TopicReplication},
    client::DefaultClientContext,
    config::ClientConfig,
};
use tracing::{debug, instrument};

use crate::{config::Properties, TopicConfig, TopicName};

use super::{AdminSession, SessionFactory};

const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
// Asks the broker to use its configured default
const BROKER_DEFAULT: i32 = -1;

/// Creates librdkafka admin clients. Every property is handed to the client unchanged, so the
/// usual `bootstrap.servers`, `security.protocol`, `sasl.*` and `ssl.*` keys all apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct KafkaSessionFactory;

impl SessionFactory for KafkaSessionFactory {
    type Session = KafkaSession;

    #[instrument(level = "debug", skip_all)]
    async fn connect(&self, props: &Properties) -> anyhow::Result<KafkaSession> {
        let mut client_config = ClientConfig::new();
        for (key, value) in props.iter() {
            client_config.set(key, value);
        }
        let admin: AdminClient<DefaultClientContext> = client_config
            .create()
            .context("Unable to create Kafka admin client")?;
        debug!("Created Kafka admin client");
        Ok(KafkaSession {
            admin: Arc::new(admin),
        })
    }
}

pub struct KafkaSession {
    admin: Arc<AdminClient<DefaultClientContext>>,
}

fn admin_options() -> AdminOptions {
    AdminOptions::new().operation_timeout(Some(OPERATION_TIMEOUT))
}

impl AdminSession for KafkaSession {
    #[instrument(level = "debug", skip_all, fields(topic = %topic))]
    async fn submit_create(&self, topic: &TopicName, config: &TopicConfig) -> anyhow::Result<()> {
        let mut config = config.clone();
        // Sizing is not a topic config entry, it goes on the request itself
        let partitions = match config.remove("num.partitions") {
            Some(v) => v.parse().context("Invalid num.partitions")?,
            None => BROKER_DEFAULT,
        };
        let replication = match config.remove("replication.factor") {
            Some(v) => v.parse().context("Invalid replication.factor")?,
            None => BROKER_DEFAULT,
        };

        let mut new_topic = NewTopic::new(
            topic.as_str(),
            partitions,
            TopicReplication::Fixed(replication),
        );
        for (key, value) in config.iter() {
            new_topic = new_topic.set(key, value);
        }

        let results = self
            .admin
            .create_topics([&new_topic], &admin_options())
            .await
            .context("Create topics request failed")?;
        for result in results {
            if let Err((name, code)) = result {
                bail!("Broker refused to create topic '{name}': {code}");
            }
        }
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(topic = %topic))]
    async fn submit_delete(&self, topic: &TopicName) -> anyhow::Result<()> {
        let results = self
            .admin
            .delete_topics(&[topic.as_str()], &admin_options())
            .await
            .context("Delete topics request failed")?;
        for result in results {
            if let Err((name, code)) = result {
                bail!("Broker refused to delete topic '{name}': {code}");
            }
        }
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn list_topic_names(&self) -> anyhow::Result<HashSet<String>> {
        let admin = self.admin.clone();
        // Metadata fetches block, so keep them off the runtime threads
        tokio::task::spawn_blocking(move || {
            // Never ask for a single topic here. Brokers with auto creation enabled would create
            // it as a side effect
            let metadata = admin
                .inner()
                .fetch_metadata(None, METADATA_TIMEOUT)
                .context("Unable to fetch cluster metadata")?;
            anyhow::Ok(metadata
                .topics()
                .iter()
                .map(|t| t.name().to_owned())
                .collect())
        })
        .await
        .context("Metadata task failed")?
    }

    async fn close(self) -> anyhow::Result<()> {
        drop(self.admin);
        Ok(())
    }
}
