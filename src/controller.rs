use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::{
    config::{Properties, PropertiesLoader},
    error::Result,
    poll::{wait_until, PollResult, PollSettings},
    session::AdminSession,
    OperationOutcome, RejectReason, TopicConfig, TopicName, PACK_TOPIC_SOURCE,
};

/// Which state of the topic a wait is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Present,
    Absent,
}

/// Creates and deletes topics and waits until the change shows up in cluster metadata. Sessions
/// are borrowed for a single operation and never closed here.
pub struct TopicController<L> {
    loader: Arc<L>,
    poll: PollSettings,
    cancel: CancellationToken,
}

impl<L> Clone for TopicController<L> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            poll: self.poll,
            cancel: self.cancel.clone(),
        }
    }
}

impl<L: PropertiesLoader> TopicController<L> {
    /// Configures the controller with the loader used for pack topic defaults. Uses the default
    /// poll settings and a token that is never cancelled.
    pub fn new(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
            poll: PollSettings::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Uses the given token to interrupt waits. Cancelling it makes in-flight operations return
    /// [`AdminError::Interrupted`](crate::error::AdminError::Interrupted).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn poll_settings(&self) -> &PollSettings {
        &self.poll
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Create the given topic with the given config and wait for it to appear. An empty config
    /// leaves every setting at the broker default.
    #[instrument(level = "info", skip(self, config, session))]
    pub async fn create_topic<S: AdminSession>(
        &self,
        name: &str,
        config: &TopicConfig,
        session: &S,
    ) -> Result<OperationOutcome> {
        let topic = match TopicName::parse(name) {
            Ok(t) => t,
            Err(err) => {
                error!(%err, "Refusing to create topic with invalid name");
                return Ok(OperationOutcome::Rejected(err.into()));
            }
        };
        self.create_validated(topic, config, session).await
    }

    /// Create a topic in the pack namespace using the pack topic defaults
    pub async fn create_pack_topic<S: AdminSession>(
        &self,
        raw_name: &str,
        session: &S,
    ) -> Result<OperationOutcome> {
        self.create_pack_topic_with_overrides(raw_name, &Properties::default(), session)
            .await
    }

    /// Create a topic in the pack namespace. The pack topic defaults are loaded and `overrides`
    /// are applied on top of them.
    #[instrument(level = "info", skip(self, overrides, session))]
    pub async fn create_pack_topic_with_overrides<S: AdminSession>(
        &self,
        raw_name: &str,
        overrides: &TopicConfig,
        session: &S,
    ) -> Result<OperationOutcome> {
        let topic = match TopicName::pack(raw_name) {
            Ok(t) => t,
            Err(err) => {
                error!(%err, "Provided name does not follow the rules of pack topics");
                return Ok(OperationOutcome::Rejected(err.into()));
            }
        };
        let config = self.loader.load(PACK_TOPIC_SOURCE, overrides).await?;
        self.create_validated(topic, &config, session).await
    }

    /// Delete the given topic and wait for it to disappear. Deleting a topic that is not listed is
    /// rejected without sending a delete request.
    #[instrument(level = "info", skip(self, session))]
    pub async fn delete_topic<S: AdminSession>(
        &self,
        name: &str,
        session: &S,
    ) -> Result<OperationOutcome> {
        let topic = match TopicName::parse(name) {
            Ok(t) => t,
            Err(err) => {
                error!(%err, "Refusing to delete topic with invalid name");
                return Ok(OperationOutcome::Rejected(err.into()));
            }
        };
        self.delete_validated(topic, session).await
    }

    /// Delete a topic in the pack namespace
    #[instrument(level = "info", skip(self, session))]
    pub async fn delete_pack_topic<S: AdminSession>(
        &self,
        raw_name: &str,
        session: &S,
    ) -> Result<OperationOutcome> {
        let topic = match TopicName::pack(raw_name) {
            Ok(t) => t,
            Err(err) => {
                error!(%err, "Provided name does not follow the rules of pack topics");
                return Ok(OperationOutcome::Rejected(err.into()));
            }
        };
        self.delete_validated(topic, session).await
    }

    async fn create_validated<S: AdminSession>(
        &self,
        topic: TopicName,
        config: &TopicConfig,
        session: &S,
    ) -> Result<OperationOutcome> {
        if let Err(err) = session.submit_create(&topic, config).await {
            error!(err = %format!("{err:#}"), %topic, "Broker failed to create topic");
            return Ok(OperationOutcome::Rejected(RejectReason::Broker(format!(
                "{err:#}"
            ))));
        }

        match self.wait_for(&topic, Expect::Present, session).await? {
            PollResult::Reached => {
                info!(%topic, "Topic created successfully");
                Ok(OperationOutcome::Succeeded(topic))
            }
            PollResult::TimedOut => {
                warn!(%topic, timeout = ?self.poll.timeout, "Timed out waiting for topic to appear");
                Ok(OperationOutcome::TimedOut(topic, self.poll.timeout))
            }
        }
    }

    async fn delete_validated<S: AdminSession>(
        &self,
        topic: TopicName,
        session: &S,
    ) -> Result<OperationOutcome> {
        match session.list_topic_names().await {
            Ok(names) if names.contains(topic.as_str()) => {}
            Ok(_) => {
                error!(%topic, "Topic does not exist");
                return Ok(OperationOutcome::Rejected(RejectReason::DoesNotExist(
                    topic.into_inner(),
                )));
            }
            Err(err) => {
                error!(err = %format!("{err:#}"), %topic, "Unable to check whether topic exists");
                return Ok(OperationOutcome::Rejected(RejectReason::Broker(format!(
                    "{err:#}"
                ))));
            }
        }

        if let Err(err) = session.submit_delete(&topic).await {
            error!(err = %format!("{err:#}"), %topic, "Broker failed to delete topic");
            return Ok(OperationOutcome::Rejected(RejectReason::Broker(format!(
                "{err:#}"
            ))));
        }

        match self.wait_for(&topic, Expect::Absent, session).await? {
            PollResult::Reached => {
                info!(%topic, "Topic deleted successfully");
                Ok(OperationOutcome::Succeeded(topic))
            }
            PollResult::TimedOut => {
                warn!(%topic, timeout = ?self.poll.timeout, "Timed out waiting for topic to be deleted");
                Ok(OperationOutcome::TimedOut(topic, self.poll.timeout))
            }
        }
    }

    async fn wait_for<S: AdminSession>(
        &self,
        topic: &TopicName,
        expect: Expect,
        session: &S,
    ) -> Result<PollResult> {
        wait_until(&self.poll, &self.cancel, move || async move {
            let names = session.list_topic_names().await?;
            anyhow::Ok(names.contains(topic.as_str()) == (expect == Expect::Present))
        })
        .await
        .inspect_err(|_| warn!(%topic, "Operation interrupted while waiting on the broker"))
    }
}
