use thiserror::Error;

/// Recoverable failure modes of the quiz core. Nothing here is fatal: the
/// worst outcome is a session stuck in `NotStarted` with a visible error
/// indicator while the watchdog or the operator resolves the cause.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The configured serial device could not be acquired. Retried by the
    /// reconnect watchdog; surfaced as a link status, never thrown across
    /// the reader/session boundary.
    #[error("serial port unavailable: {0}")]
    PortUnavailable(String),

    /// The data source could not supply a full question batch. Partial
    /// batches are never used.
    #[error("not enough questions in '{category}': needed {needed}, could build {built}")]
    InsufficientQuestions {
        category: String,
        needed: usize,
        built: usize,
    },

    /// The underlying store failed. Logged and surfaced as a non-fatal
    /// notice; in-memory session state is preserved.
    #[error("data source error: {0}")]
    DataSource(#[from] anyhow::Error),
}
