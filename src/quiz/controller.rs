use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use log::{error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::models::{BestEntry, PlayerContext};
use crate::serial::SerialHandle;
use crate::settings::QuizSettings;

use super::bank::QuestionBank;
use super::recorder::{is_new_record, ResultRecorder};
use super::state::{FinishReason, QuizState, QuizStatus, SessionOutcome, SubmitOutcome};
use super::QuizAction;

/// What the presentation layer may see of the active question. The correct
/// answer never leaves the session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub image_ref: String,
    pub options: Vec<String>,
}

/// Render-ready session snapshot, published after every applied action.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: QuizStatus,
    pub category: String,
    pub current_index: usize,
    pub question_count: usize,
    pub score: u32,
    pub answered: u32,
    pub remaining_seconds: u32,
    pub selected: Option<usize>,
    pub question: Option<QuestionView>,
    pub to_beat: Option<BestEntry>,
}

/// One-shot feedback for the presentation layer, broadcast alongside the
/// view snapshots.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum QuizEvent {
    AnswerJudged {
        was_correct: bool,
        correct_answer: String,
    },
    NothingSelected,
    Finished {
        outcome: SessionOutcome,
        new_record: bool,
    },
    SessionError {
        message: String,
    },
}

/// Handle to a running controller. Cheap to clone; every clone feeds the
/// same action queue.
#[derive(Clone)]
pub struct QuizHandle {
    actions: mpsc::UnboundedSender<QuizAction>,
    view: watch::Receiver<SessionView>,
    events: broadcast::Sender<QuizEvent>,
}

impl QuizHandle {
    pub fn send(&self, action: QuizAction) {
        let _ = self.actions.send(action);
    }

    pub fn select_option(&self, index: usize) {
        self.send(QuizAction::SelectOption(index));
    }

    pub fn submit(&self) {
        self.send(QuizAction::Submit);
    }

    pub fn advance(&self) {
        self.send(QuizAction::Advance);
    }

    pub fn restart(&self) {
        self.send(QuizAction::Restart);
    }

    pub fn abandon(&self) {
        self.send(QuizAction::Abandon);
    }

    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<QuizEvent> {
        self.events.subscribe()
    }
}

/// Drives one category's quiz sessions. The spawned task is the only code
/// that touches [`QuizState`]; panel tokens and on-screen controls both
/// arrive as [`QuizAction`]s on its queue, so every transition is applied
/// atomically and in arrival order per source.
pub struct QuizController {
    state: QuizState,
    bank: Arc<dyn QuestionBank>,
    recorder: Arc<dyn ResultRecorder>,
    serial: Option<SerialHandle>,
    settings: QuizSettings,
    category: String,
    player: PlayerContext,
    to_beat: Option<BestEntry>,
    view_tx: watch::Sender<SessionView>,
    events_tx: broadcast::Sender<QuizEvent>,
    actions_tx: mpsc::UnboundedSender<QuizAction>,
    ticker: Option<JoinHandle<()>>,
}

impl QuizController {
    pub fn spawn(
        bank: Arc<dyn QuestionBank>,
        recorder: Arc<dyn ResultRecorder>,
        serial: Option<SerialHandle>,
        settings: QuizSettings,
        category: String,
        player: PlayerContext,
    ) -> QuizHandle {
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(64);

        let state = QuizState::idle(&settings);
        let initial_view = build_view(&state, &category, None);
        let (view_tx, view_rx) = watch::channel(initial_view);

        let controller = Self {
            state,
            bank,
            recorder,
            serial,
            settings,
            category,
            player,
            to_beat: None,
            view_tx,
            events_tx: events_tx.clone(),
            actions_tx: actions_tx.clone(),
            ticker: None,
        };

        tokio::spawn(controller.run(actions_rx));

        QuizHandle {
            actions: actions_tx,
            view: view_rx,
            events: events_tx,
        }
    }

    async fn run(mut self, mut actions: mpsc::UnboundedReceiver<QuizAction>) {
        while let Some(action) = actions.recv().await {
            self.apply(action).await;
        }
        self.cancel_ticker();
        info!("quiz controller for '{}' shutting down", self.category);
    }

    async fn apply(&mut self, action: QuizAction) {
        match action {
            QuizAction::SelectOption(index) => self.state.select_option(index),
            QuizAction::Submit => self.handle_submit().await,
            QuizAction::Advance => {
                // Render refresh: the view republish below re-presents the
                // current question.
            }
            QuizAction::Tick => self.handle_tick().await,
            QuizAction::Restart => self.handle_restart().await,
            QuizAction::Abandon => self.handle_abandon(),
            QuizAction::RequestReconnect => {
                if let Some(serial) = &self.serial {
                    serial.request_reconnect();
                }
            }
        }

        self.publish_view();
    }

    async fn handle_restart(&mut self) {
        self.cancel_ticker();
        self.state = QuizState::idle(&self.settings);

        match self.recorder.fetch_best(&self.category).await {
            Ok(best) => self.to_beat = best,
            // Stale or missing "to beat" is cosmetic; the session proceeds.
            Err(err) => warn!("could not fetch best attempt: {err}"),
        }

        let batch = match self
            .bank
            .fetch_batch(&self.category, self.settings.question_count)
            .await
        {
            Ok(batch) => batch,
            Err(err) => {
                self.emit_session_error(&err.to_string());
                return;
            }
        };

        match QuizState::start(batch, &self.settings, Instant::now()) {
            Ok(state) => {
                self.state = state;
                self.spawn_ticker();
                info!(
                    "quiz started: category '{}', {} questions, {}s limit",
                    self.category, self.settings.question_count, self.settings.time_limit_seconds
                );
            }
            Err(err) => self.emit_session_error(&err.to_string()),
        }
    }

    async fn handle_submit(&mut self) {
        match self.state.submit(Instant::now()) {
            SubmitOutcome::Accepted {
                was_correct,
                correct_answer,
            } => {
                self.send_device_feedback(if was_correct { "correct" } else { "wrong" });
                let _ = self.events_tx.send(QuizEvent::AnswerJudged {
                    was_correct,
                    correct_answer,
                });

                if self.state.status() == QuizStatus::Finished {
                    self.finish_session().await;
                }
            }
            SubmitOutcome::NothingSelected => {
                let _ = self.events_tx.send(QuizEvent::NothingSelected);
            }
            SubmitOutcome::Throttled | SubmitOutcome::Inactive => {}
        }
    }

    async fn handle_tick(&mut self) {
        if let Some(FinishReason::TimedOut) = self.state.tick() {
            self.finish_session().await;
        }
    }

    fn handle_abandon(&mut self) {
        self.cancel_ticker();
        self.state = QuizState::idle(&self.settings);
    }

    async fn finish_session(&mut self) {
        self.cancel_ticker();

        let Some(outcome) = self.state.outcome().cloned() else {
            return;
        };

        if outcome.is_perfect_score {
            self.send_device_feedback("ledSequence");
        }

        let new_record = is_new_record(&outcome, self.to_beat.as_ref());

        if let Err(err) = self
            .recorder
            .record_attempt(&self.player, &self.category, &outcome)
            .await
        {
            // The session result stays on screen even when persistence
            // fails; the kiosk keeps running.
            error!("failed to record attempt: {err}");
            self.emit_session_error("result could not be saved");
        }

        let _ = self.events_tx.send(QuizEvent::Finished {
            outcome,
            new_record,
        });
    }

    fn spawn_ticker(&mut self) {
        self.cancel_ticker();

        let actions = self.actions_tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if actions.send(QuizAction::Tick).is_err() {
                    break;
                }
            }
        });

        self.ticker = Some(handle);
    }

    fn cancel_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    fn send_device_feedback(&self, token: &str) {
        if let Some(serial) = &self.serial {
            serial.send_line(token);
        }
    }

    fn emit_session_error(&self, message: &str) {
        warn!("session error in '{}': {message}", self.category);
        let _ = self.events_tx.send(QuizEvent::SessionError {
            message: message.to_string(),
        });
    }

    fn publish_view(&self) {
        let view = build_view(&self.state, &self.category, self.to_beat);
        self.view_tx.send_replace(view);
    }
}

fn build_view(state: &QuizState, category: &str, to_beat: Option<BestEntry>) -> SessionView {
    SessionView {
        status: state.status(),
        category: category.to_string(),
        current_index: state.current_index(),
        question_count: state.question_count(),
        score: state.score(),
        answered: state.answered(),
        remaining_seconds: state.remaining_seconds(),
        selected: state.selected(),
        question: state.current_question().map(|q| QuestionView {
            image_ref: q.image_ref.clone(),
            options: q.options.clone(),
        }),
        to_beat,
    }
}
