pub mod bank;
pub mod controller;
pub mod recorder;
pub mod state;

pub use bank::{build_question_batch, QuestionBank, SqliteQuestionBank};
pub use controller::{QuestionView, QuizController, QuizEvent, QuizHandle, SessionView};
pub use recorder::{is_new_record, ResultRecorder, SqliteResultRecorder};
pub use state::{FinishReason, QuizState, QuizStatus, SessionOutcome, SubmitOutcome};

/// Everything that can happen to a session, whatever the source: panel
/// tokens and on-screen controls feed the same queue, and the controller
/// task is the only consumer, so each action applies atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizAction {
    SelectOption(usize),
    Submit,
    /// Re-present the current question (render refresh).
    Advance,
    Restart,
    Abandon,
    RequestReconnect,
    /// One-second countdown pulse from the ticker task.
    Tick,
}
