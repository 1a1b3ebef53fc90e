use std::cmp;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::errors::QuizError;
use crate::models::Question;
use crate::settings::QuizSettings;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum QuizStatus {
    NotStarted,
    InProgress,
    Finished,
}

impl Default for QuizStatus {
    fn default() -> Self {
        QuizStatus::NotStarted
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    /// All questions answered.
    Completed,
    /// The countdown reached zero first.
    TimedOut,
}

/// What a `submit` call did. `NothingSelected` is user-input validation for
/// the presentation layer to warn about, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted {
        was_correct: bool,
        correct_answer: String,
    },
    NothingSelected,
    /// Dropped by the cooldown; duplicate device signal or double-press.
    Throttled,
    /// Session not in progress.
    Inactive,
}

/// Final snapshot of a finished session, handed to the recorder and the
/// results screen.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub score: u32,
    pub answered: u32,
    pub duration_seconds: u32,
    pub is_perfect_score: bool,
    pub reason: FinishReason,
}

/// The session state machine: `NotStarted → InProgress → Finished`, with
/// `Finished` terminal. A fresh state is constructed per run; I/O callbacks
/// never touch it directly, the controller task applies every transition.
#[derive(Debug, Clone)]
pub struct QuizState {
    questions: Vec<Question>,
    current_index: usize,
    score: u32,
    answered: u32,
    selected: Option<usize>,
    time_limit_seconds: u32,
    remaining_seconds: u32,
    status: QuizStatus,
    outcome: Option<SessionOutcome>,
    started_anchor: Option<Instant>,
    last_submit: Option<Instant>,
    submit_cooldown: Duration,
}

impl QuizState {
    /// An empty, not-yet-started session. This is also the state a failed
    /// restart leaves behind.
    pub fn idle(settings: &QuizSettings) -> Self {
        Self {
            questions: Vec::new(),
            current_index: 0,
            score: 0,
            answered: 0,
            selected: None,
            time_limit_seconds: settings.time_limit_seconds,
            remaining_seconds: settings.time_limit_seconds,
            status: QuizStatus::NotStarted,
            outcome: None,
            started_anchor: None,
            last_submit: None,
            submit_cooldown: Duration::from_millis(settings.submit_cooldown_ms),
        }
    }

    /// Starts a session over a full batch. Fails without side effects when
    /// the batch is short; partial batches are never played.
    pub fn start(
        questions: Vec<Question>,
        settings: &QuizSettings,
        now: Instant,
    ) -> Result<Self, QuizError> {
        if questions.len() < settings.question_count {
            return Err(QuizError::InsufficientQuestions {
                category: String::new(),
                needed: settings.question_count,
                built: questions.len(),
            });
        }

        let mut state = Self::idle(settings);
        state.questions = questions;
        state.status = QuizStatus::InProgress;
        state.started_anchor = Some(now);
        Ok(state)
    }

    /// Highlights an option for the active question. Out-of-range indices
    /// are ignored: devices occasionally send stale indices after the
    /// question has changed.
    pub fn select_option(&mut self, index: usize) {
        if self.status != QuizStatus::InProgress {
            return;
        }
        let Some(question) = self.questions.get(self.current_index) else {
            return;
        };
        if index < question.options.len() {
            self.selected = Some(index);
        }
    }

    pub fn submit(&mut self, now: Instant) -> SubmitOutcome {
        if self.status != QuizStatus::InProgress {
            return SubmitOutcome::Inactive;
        }

        if let Some(last) = self.last_submit {
            if now.duration_since(last) < self.submit_cooldown {
                return SubmitOutcome::Throttled;
            }
        }

        let Some(selected) = self.selected else {
            return SubmitOutcome::NothingSelected;
        };

        let Some(question) = self.questions.get(self.current_index) else {
            return SubmitOutcome::Inactive;
        };

        self.last_submit = Some(now);
        let correct_answer = question.correct_answer.clone();
        let was_correct = question.options[selected] == correct_answer;

        self.answered += 1;
        if was_correct {
            self.score += 1;
        }
        self.selected = None;

        if (self.answered as usize) < self.questions.len() {
            self.current_index += 1;
        } else {
            self.current_index = self.questions.len();
            let duration = self.capped_elapsed_seconds(now);
            self.finish(FinishReason::Completed, duration);
        }

        SubmitOutcome::Accepted {
            was_correct,
            correct_answer,
        }
    }

    /// One-second countdown pulse. Forces `Finished(TimedOut)` at zero;
    /// from then on no submit is accepted, whatever is still in the queue.
    pub fn tick(&mut self) -> Option<FinishReason> {
        if self.status != QuizStatus::InProgress {
            return None;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.finish(FinishReason::TimedOut, self.time_limit_seconds);
            return Some(FinishReason::TimedOut);
        }
        None
    }

    fn finish(&mut self, reason: FinishReason, duration_seconds: u32) {
        self.status = QuizStatus::Finished;
        self.outcome = Some(SessionOutcome {
            score: self.score,
            answered: self.answered,
            duration_seconds,
            is_perfect_score: self.score as usize == self.questions.len()
                && !self.questions.is_empty(),
            reason,
        });
    }

    fn capped_elapsed_seconds(&self, now: Instant) -> u32 {
        let elapsed = self
            .started_anchor
            .map(|anchor| now.duration_since(anchor).as_secs())
            .unwrap_or(0);
        cmp::min(u64::from(self.time_limit_seconds), elapsed) as u32
    }

    pub fn status(&self) -> QuizStatus {
        self.status
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn answered(&self) -> u32 {
        self.answered
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.status == QuizStatus::InProgress {
            self.questions.get(self.current_index)
        } else {
            None
        }
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(count: usize, limit: u32, cooldown_ms: u64) -> QuizSettings {
        QuizSettings {
            question_count: count,
            time_limit_seconds: limit,
            submit_cooldown_ms: cooldown_ms,
        }
    }

    fn question(correct: &str, others: [&str; 2]) -> Question {
        Question {
            correct_answer: correct.to_string(),
            image_ref: format!("{correct}.jpg"),
            options: vec![
                correct.to_string(),
                others[0].to_string(),
                others[1].to_string(),
            ],
        }
    }

    fn batch(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| question(&format!("bird-{i}"), ["wren", "heron"]))
            .collect()
    }

    fn select_correct(state: &mut QuizState) {
        let index = state
            .current_question()
            .and_then(|q| q.correct_option_index())
            .unwrap();
        state.select_option(index);
    }

    fn select_wrong(state: &mut QuizState) {
        let correct = state
            .current_question()
            .and_then(|q| q.correct_option_index())
            .unwrap();
        state.select_option((correct + 1) % 3);
    }

    #[test]
    fn start_requires_a_full_batch() {
        let err = QuizState::start(batch(3), &settings(5, 60, 0), Instant::now()).unwrap_err();
        assert!(matches!(
            err,
            QuizError::InsufficientQuestions { needed: 5, built: 3, .. }
        ));
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let mut state = QuizState::start(batch(5), &settings(5, 60, 0), Instant::now()).unwrap();
        state.select_option(3); // reserved white button
        assert_eq!(state.selected(), None);
        state.select_option(1);
        assert_eq!(state.selected(), Some(1));
    }

    #[test]
    fn selection_is_inert_before_start() {
        let mut state = QuizState::idle(&settings(5, 60, 0));
        state.select_option(0);
        assert_eq!(state.selected(), None);
        assert_eq!(state.status(), QuizStatus::NotStarted);
    }

    #[test]
    fn submit_without_selection_warns() {
        let t0 = Instant::now();
        let mut state = QuizState::start(batch(5), &settings(5, 60, 0), t0).unwrap();
        assert_eq!(state.submit(t0), SubmitOutcome::NothingSelected);
        assert_eq!(state.answered(), 0);
    }

    #[test]
    fn rapid_submits_inside_cooldown_are_dropped() {
        let t0 = Instant::now();
        let mut state = QuizState::start(batch(5), &settings(5, 60, 1_000), t0).unwrap();

        select_correct(&mut state);
        assert!(matches!(
            state.submit(t0 + Duration::from_millis(10)),
            SubmitOutcome::Accepted { .. }
        ));

        // Double-press, and then a third attempt just under the window.
        select_correct(&mut state);
        assert_eq!(
            state.submit(t0 + Duration::from_millis(120)),
            SubmitOutcome::Throttled
        );
        assert_eq!(
            state.submit(t0 + Duration::from_millis(1_000)),
            SubmitOutcome::Throttled
        );

        assert!(matches!(
            state.submit(t0 + Duration::from_millis(1_011)),
            SubmitOutcome::Accepted { .. }
        ));
        assert_eq!(state.answered(), 2);
    }

    #[test]
    fn score_never_exceeds_answered() {
        let t0 = Instant::now();
        let mut state = QuizState::start(batch(5), &settings(5, 60, 0), t0).unwrap();
        let mut now = t0;

        for round in 0..5 {
            now += Duration::from_secs(1);
            if round % 2 == 0 {
                select_correct(&mut state);
            } else {
                select_wrong(&mut state);
            }
            state.submit(now);
            assert!(state.score() <= state.answered());
            assert!(state.answered() as usize <= state.question_count());
        }
    }

    #[test]
    fn perfect_run_finishes_with_perfect_score() {
        let t0 = Instant::now();
        let mut state = QuizState::start(batch(5), &settings(5, 60, 0), t0).unwrap();

        for i in 0..5 {
            select_correct(&mut state);
            let outcome = state.submit(t0 + Duration::from_secs(i + 1));
            assert!(matches!(outcome, SubmitOutcome::Accepted { was_correct: true, .. }));
        }

        assert_eq!(state.status(), QuizStatus::Finished);
        let outcome = state.outcome().unwrap();
        assert!(outcome.is_perfect_score);
        assert_eq!(outcome.score, 5);
        assert_eq!(outcome.reason, FinishReason::Completed);
    }

    #[test]
    fn mixed_run_one_answer_per_second() {
        let t0 = Instant::now();
        let mut state = QuizState::start(batch(5), &settings(5, 60, 0), t0).unwrap();

        for i in 0..5u64 {
            if i < 3 {
                select_correct(&mut state);
            } else {
                select_wrong(&mut state);
            }
            state.submit(t0 + Duration::from_secs(i + 1));
        }

        let outcome = state.outcome().unwrap();
        assert_eq!(outcome.score, 3);
        assert_eq!(outcome.answered, 5);
        assert_eq!(outcome.duration_seconds, 5);
        assert!(!outcome.is_perfect_score);
    }

    #[test]
    fn countdown_expiry_times_the_session_out() {
        let t0 = Instant::now();
        let mut state = QuizState::start(batch(5), &settings(5, 60, 0), t0).unwrap();

        for _ in 0..59 {
            assert_eq!(state.tick(), None);
        }
        assert_eq!(state.tick(), Some(FinishReason::TimedOut));

        let outcome = state.outcome().unwrap();
        assert_eq!(outcome.reason, FinishReason::TimedOut);
        assert_eq!(outcome.duration_seconds, 60);
        assert_eq!(outcome.answered, 0);

        // Time priority: nothing submitted after expiry counts.
        state.select_option(0);
        assert_eq!(state.submit(t0 + Duration::from_secs(61)), SubmitOutcome::Inactive);
        assert_eq!(state.outcome().unwrap().answered, 0);
    }

    #[test]
    fn finished_session_rejects_everything() {
        let t0 = Instant::now();
        let mut state = QuizState::start(batch(5), &settings(5, 60, 0), t0).unwrap();

        for i in 0..5 {
            select_correct(&mut state);
            state.submit(t0 + Duration::from_secs(i + 1));
        }

        assert_eq!(state.status(), QuizStatus::Finished);
        state.select_option(0);
        assert_eq!(state.selected(), None);
        assert_eq!(state.submit(t0 + Duration::from_secs(10)), SubmitOutcome::Inactive);
        assert_eq!(state.tick(), None);
        assert_eq!(state.current_index(), 5);
    }

    #[test]
    fn completed_duration_is_capped_at_the_limit() {
        let t0 = Instant::now();
        let mut state = QuizState::start(batch(1), &settings(1, 60, 0), t0).unwrap();
        select_correct(&mut state);
        state.submit(t0 + Duration::from_secs(300));
        assert_eq!(state.outcome().unwrap().duration_seconds, 60);
    }
}
