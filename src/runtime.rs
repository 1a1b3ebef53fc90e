use std::sync::Arc;

use tokio::sync::mpsc;

use crate::db::Database;
use crate::models::PlayerContext;
use crate::quiz::{QuizController, QuizHandle, SqliteQuestionBank, SqliteResultRecorder};
use crate::serial::{dispatch::token_to_action, SerialHandle, SerialSupervisor};
use crate::settings::KioskSettings;

/// Wires the kiosk together for one quiz screen: serial supervisor →
/// dispatcher → controller. The embedding UI renders from
/// [`QuizHandle::view`], subscribes to events, and calls the handle's
/// action methods; the panel feeds the same queue through the dispatcher.
pub struct KioskRuntime {
    quiz: QuizHandle,
    serial: SerialHandle,
}

impl KioskRuntime {
    pub fn start(
        db: Database,
        settings: KioskSettings,
        category: String,
        player: PlayerContext,
    ) -> Self {
        let (token_tx, mut token_rx) = mpsc::unbounded_channel::<String>();
        let serial = SerialSupervisor::spawn(settings.serial, token_tx);

        let bank = Arc::new(SqliteQuestionBank::new(db.clone()));
        let recorder = Arc::new(SqliteResultRecorder::new(db));

        let quiz = QuizController::spawn(
            bank,
            recorder,
            Some(serial.clone()),
            settings.quiz,
            category,
            player,
        );

        // Dispatcher: panel tokens become actions on the controller queue,
        // in arrival order.
        let quiz_for_tokens = quiz.clone();
        tokio::spawn(async move {
            while let Some(token) = token_rx.recv().await {
                if let Some(action) = token_to_action(&token) {
                    quiz_for_tokens.send(action);
                }
            }
        });

        Self { quiz, serial }
    }

    pub fn quiz(&self) -> &QuizHandle {
        &self.quiz
    }

    pub fn serial(&self) -> &SerialHandle {
        &self.serial
    }

    /// Releases the serial device (close + drain) so another screen can
    /// bind it; only one handle may own the port at a time.
    pub fn shutdown(&self) {
        self.quiz.abandon();
        self.serial.shutdown();
    }
}
