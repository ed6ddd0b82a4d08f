use std::{collections::HashSet, path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use async_nats::{
    jetstream::{self, stream},
    Client, ConnectOptions,
};
use futures::TryStreamExt;
use tracing::{debug, instrument, trace};

use crate::{config::Properties, TopicConfig, TopicName};

use super::{AdminSession, SessionFactory};

const DEFAULT_SERVERS: &str = "127.0.0.1:4222";
// Stream names cannot contain '.', topic names cannot contain '~'
const TOPIC_SEPARATOR: char = '.';
const STREAM_SEPARATOR: char = '~';

/// Connects to NATS and manages topics as JetStream streams.
///
/// Recognized connection properties: `servers` (or `bootstrap.servers`), a comma delimited list of
/// server addresses; `user` and `password`; `creds.file`; `tls.ca.cert`; `js.domain`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NatsSessionFactory;

impl SessionFactory for NatsSessionFactory {
    type Session = NatsSession;

    #[instrument(level = "debug", skip_all)]
    async fn connect(&self, props: &Properties) -> anyhow::Result<NatsSession> {
        let servers = props
            .get("servers")
            .or_else(|| props.get("bootstrap.servers"))
            .unwrap_or(DEFAULT_SERVERS)
            .to_owned();

        let mut opts = ConnectOptions::new();
        if let Some(cert) = props.get("tls.ca.cert") {
            opts = opts.add_root_certificates(PathBuf::from(cert));
        }
        if let Some(creds_file) = props.get("creds.file") {
            opts = opts
                .credentials_file(PathBuf::from(creds_file))
                .await
                .context("Unable to open credentials file")?;
        } else if let (Some(user), Some(pass)) = (props.get("user"), props.get_secret("password")) {
            opts = opts.user_and_password(user.to_owned(), pass.expose().to_owned());
        }

        trace!(%servers, "Connecting to NATS");
        let client = opts
            .connect(servers)
            .await
            .context("Unable to connect to NATS")?;
        let js = match props.get("js.domain") {
            Some(domain) => jetstream::with_domain(client.clone(), domain),
            None => jetstream::new(client.clone()),
        };
        debug!("Successfully connected to NATS");
        Ok(NatsSession { client, js })
    }
}

/// An admin session backed by a JetStream context. Every topic is a stream named by
/// [`stream_name`], which only differs from the topic name where the topic contains a `.`
pub struct NatsSession {
    client: Client,
    js: jetstream::Context,
}

impl NatsSession {
    /// Wraps an already connected client
    pub fn new(client: Client) -> Self {
        let js = jetstream::new(client.clone());
        Self { client, js }
    }
}

impl AdminSession for NatsSession {
    #[instrument(level = "debug", skip_all, fields(topic = %topic))]
    async fn submit_create(&self, topic: &TopicName, config: &TopicConfig) -> anyhow::Result<()> {
        // Build the config first so we can bail before talking to the server
        let stream_config = stream_config(topic, config)?;
        self.js
            .create_stream(stream_config)
            .await
            .context("Unable to create stream")?;
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(topic = %topic))]
    async fn submit_delete(&self, topic: &TopicName) -> anyhow::Result<()> {
        let status = self
            .js
            .delete_stream(stream_name(topic.as_str()))
            .await
            .context("Unable to delete stream")?;
        if !status.success {
            bail!("Server did not confirm deletion of stream {topic}");
        }
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn list_topic_names(&self) -> anyhow::Result<HashSet<String>> {
        self.js
            .stream_names()
            .map_ok(|name| topic_name(&name))
            .try_collect::<HashSet<String>>()
            .await
            .context("Unable to list streams")
    }

    async fn close(self) -> anyhow::Result<()> {
        self.client
            .flush()
            .await
            .context("Unable to flush NATS connection")
    }
}

/// The stream backing a topic
pub fn stream_name(topic: &str) -> String {
    topic.replace(TOPIC_SEPARATOR, &STREAM_SEPARATOR.to_string())
}

/// The topic a stream backs. Reverses [`stream_name`]
pub fn topic_name(stream: &str) -> String {
    stream.replace(STREAM_SEPARATOR, &TOPIC_SEPARATOR.to_string())
}

// A topic name is usable as a subject unless it has empty tokens, like `a..b` or `.a`
fn default_subject(topic: &TopicName) -> String {
    if topic.as_str().split(TOPIC_SEPARATOR).all(|t| !t.is_empty()) {
        topic.to_string()
    } else {
        stream_name(topic.as_str())
    }
}

/// Maps topic configuration onto a stream config. Without a `subjects` key the stream listens on
/// the topic name. Keys follow the usual topic config names where
/// a JetStream equivalent exists; anything else is an error rather than being silently dropped.
pub(crate) fn stream_config(topic: &TopicName, config: &TopicConfig) -> anyhow::Result<stream::Config> {
    let mut cfg = stream::Config {
        name: stream_name(topic.as_str()),
        subjects: vec![default_subject(topic)],
        ..Default::default()
    };
    for (key, value) in config.iter() {
        match key {
            "retention.ms" => {
                let ms: i64 = parse_value(key, value)?;
                // Negative means unlimited, which JetStream spells as zero
                cfg.max_age = Duration::from_millis(ms.max(0) as u64);
            }
            "retention.bytes" => cfg.max_bytes = parse_value(key, value)?,
            "max.messages" => cfg.max_messages = parse_value(key, value)?,
            "max.message.bytes" => cfg.max_message_size = parse_value(key, value)?,
            "replication.factor" => cfg.num_replicas = parse_value(key, value)?,
            "storage" => {
                cfg.storage = match value {
                    "file" => stream::StorageType::File,
                    "memory" => stream::StorageType::Memory,
                    other => bail!("Unknown storage type '{other}', expected 'file' or 'memory'"),
                }
            }
            "subjects" => {
                cfg.subjects = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            }
            "description" => cfg.description = Some(value.to_owned()),
            other => bail!("Unsupported topic config key '{other}'"),
        }
    }
    Ok(cfg)
}

fn parse_value<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value '{value}' for topic config key '{key}'"))
}
