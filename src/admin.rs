use std::collections::BTreeSet;

use tracing::{debug, error, instrument, warn};

use crate::{
    config::{Properties, PropertiesLoader},
    controller::TopicController,
    error::Result,
    session::{AdminSession, SessionFactory},
    OperationOutcome, RejectReason, TopicConfig, TopicName, ADMIN_SOURCE,
};

/// Runs each topic operation on its own admin session. The session is opened from the admin
/// property source and closed again on every exit path, including interruption.
pub struct TopicAdmin<L, F> {
    controller: TopicController<L>,
    factory: F,
    admin_source: String,
    admin_overrides: Properties,
}

impl<L: PropertiesLoader, F: SessionFactory> TopicAdmin<L, F> {
    pub fn new(controller: TopicController<L>, factory: F) -> Self {
        Self {
            controller,
            factory,
            admin_source: ADMIN_SOURCE.to_owned(),
            admin_overrides: Properties::default(),
        }
    }

    /// Read connection settings from a different property source
    pub fn with_admin_source(mut self, source_id: impl Into<String>) -> Self {
        self.admin_source = source_id.into();
        self
    }

    /// Connection settings applied on top of the admin property source
    pub fn with_admin_overrides(mut self, overrides: Properties) -> Self {
        self.admin_overrides = overrides;
        self
    }

    pub fn controller(&self) -> &TopicController<L> {
        &self.controller
    }

    pub async fn create_topic(&self, name: &str, config: &TopicConfig) -> Result<OperationOutcome> {
        let topic = match TopicName::parse(name) {
            Ok(t) => t,
            Err(err) => return Ok(OperationOutcome::Rejected(err.into())),
        };
        let session = match self.open().await? {
            Ok(s) => s,
            Err(outcome) => return Ok(outcome),
        };
        let res = self
            .controller
            .create_topic(topic.as_str(), config, &session)
            .await;
        release(session).await;
        res
    }

    pub async fn create_pack_topic(
        &self,
        raw_name: &str,
        overrides: &TopicConfig,
    ) -> Result<OperationOutcome> {
        if let Err(err) = TopicName::pack(raw_name) {
            return Ok(OperationOutcome::Rejected(err.into()));
        }
        let session = match self.open().await? {
            Ok(s) => s,
            Err(outcome) => return Ok(outcome),
        };
        let res = self
            .controller
            .create_pack_topic_with_overrides(raw_name, overrides, &session)
            .await;
        release(session).await;
        res
    }

    pub async fn delete_topic(&self, name: &str) -> Result<OperationOutcome> {
        let topic = match TopicName::parse(name) {
            Ok(t) => t,
            Err(err) => return Ok(OperationOutcome::Rejected(err.into())),
        };
        let session = match self.open().await? {
            Ok(s) => s,
            Err(outcome) => return Ok(outcome),
        };
        let res = self.controller.delete_topic(topic.as_str(), &session).await;
        release(session).await;
        res
    }

    pub async fn delete_pack_topic(&self, raw_name: &str) -> Result<OperationOutcome> {
        if let Err(err) = TopicName::pack(raw_name) {
            return Ok(OperationOutcome::Rejected(err.into()));
        }
        let session = match self.open().await? {
            Ok(s) => s,
            Err(outcome) => return Ok(outcome),
        };
        let res = self.controller.delete_pack_topic(raw_name, &session).await;
        release(session).await;
        res
    }

    /// All topic names currently visible to the broker, sorted
    pub async fn list_topics(&self) -> Result<anyhow::Result<BTreeSet<String>>> {
        let props = self
            .controller
            .loader()
            .load(&self.admin_source, &self.admin_overrides)
            .await?;
        let session = match self.factory.connect(&props).await {
            Ok(s) => s,
            Err(err) => return Ok(Err(err)),
        };
        let res = session
            .list_topic_names()
            .await
            .map(|names| names.into_iter().collect());
        release(session).await;
        Ok(res)
    }

    /// Loads the admin properties and connects. A failed connection is turned into a rejection so
    /// callers get an outcome like any other broker failure.
    #[instrument(level = "debug", skip(self), fields(source = %self.admin_source))]
    async fn open(&self) -> Result<std::result::Result<F::Session, OperationOutcome>> {
        let props = self
            .controller
            .loader()
            .load(&self.admin_source, &self.admin_overrides)
            .await?;
        debug!(?props, "Opening admin session");
        match self.factory.connect(&props).await {
            Ok(session) => Ok(Ok(session)),
            Err(err) => {
                error!(err = %format!("{err:#}"), "Unable to open admin session");
                Ok(Err(OperationOutcome::Rejected(RejectReason::Connection(
                    format!("{err:#}"),
                ))))
            }
        }
    }
}

async fn release<S: AdminSession>(session: S) {
    if let Err(err) = session.close().await {
        // The operation already has its result, so this is only worth a warning
        warn!(err = %format!("{err:#}"), "Error closing admin session");
    }
}
