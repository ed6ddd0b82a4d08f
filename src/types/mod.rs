use std::time::Duration;

use serde::Serialize;

mod name;
mod secure;

pub use name::*;
pub use secure::*;

/// The single terminal result of a create or delete operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The change was applied and is visible in cluster metadata
    Succeeded(TopicName),
    /// The operation was refused before or by the broker. Nothing is retried
    Rejected(RejectReason),
    /// The broker accepted the request, but the change could not be observed within the given
    /// budget. The change may still become visible later
    TimedOut(TopicName, Duration),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Succeeded(_))
    }

    /// A serializable summary of the outcome, used for machine readable output
    pub fn report(&self) -> OutcomeReport {
        match self {
            OperationOutcome::Succeeded(topic) => OutcomeReport {
                outcome: "succeeded",
                topic: Some(topic.to_string()),
                reason: None,
                budget_ms: None,
            },
            OperationOutcome::Rejected(reason) => OutcomeReport {
                outcome: "rejected",
                topic: None,
                reason: Some(reason.to_string()),
                budget_ms: None,
            },
            OperationOutcome::TimedOut(topic, budget) => OutcomeReport {
                outcome: "timed_out",
                topic: Some(topic.to_string()),
                reason: None,
                budget_ms: Some(budget.as_millis() as u64),
            },
        }
    }
}

/// Why an operation was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The topic name breaks one of the naming rules. No broker call was made
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidTopicName),
    /// Delete was requested for a topic that is not currently listed
    #[error("topic '{0}' does not exist")]
    DoesNotExist(String),
    /// No admin session could be opened
    #[error("unable to connect to broker: {0}")]
    Connection(String),
    /// The broker failed the request or the query guarding it
    #[error("broker error: {0}")]
    Broker(String),
}

/// A flattened view of an [`OperationOutcome`]
#[derive(Serialize, Debug, Clone)]
pub struct OutcomeReport {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_ms: Option<u64>,
}
