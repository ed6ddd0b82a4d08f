pub type Result<T> = std::result::Result<T, AdminError>;

/// Conditions that abort an operation instead of producing an
/// [`OperationOutcome`](crate::OperationOutcome)
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// The named property source could not be found or read
    #[error("Unable to load properties from source '{source_id}'")]
    ConfigLoad {
        source_id: String,
        #[source]
        source: std::io::Error,
    },
    /// The operation was cancelled while waiting on the broker
    #[error("Operation interrupted")]
    Interrupted,
}
