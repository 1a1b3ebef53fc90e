pub mod db;
pub mod errors;
pub mod models;
pub mod quiz;
pub mod runtime;
pub mod serial;
pub mod settings;

pub use db::Database;
pub use errors::QuizError;
pub use models::{AttemptRecord, BestEntry, Bird, PlayerContext, Question};
pub use quiz::{
    FinishReason, QuestionBank, QuizAction, QuizEvent, QuizHandle, QuizStatus, ResultRecorder,
    SessionOutcome, SessionView, SubmitOutcome,
};
pub use runtime::KioskRuntime;
pub use serial::{LinkState, SerialHandle, SerialSupervisor};
pub use settings::{KioskSettings, QuizSettings, SerialSettings, SettingsStore};

/// Initializes logging for embedding binaries (reads RUST_LOG env var).
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
