use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::errors::QuizError;
use crate::models::{AttemptRecord, BestEntry, PlayerContext};

use super::state::SessionOutcome;

/// Persists finished sessions and reports the previous best for the
/// "to beat" comparison.
#[async_trait]
pub trait ResultRecorder: Send + Sync {
    async fn record_attempt(
        &self,
        player: &PlayerContext,
        category: &str,
        outcome: &SessionOutcome,
    ) -> Result<(), QuizError>;

    async fn fetch_best(&self, category: &str) -> Result<Option<BestEntry>, QuizError>;
}

/// New-record rule: higher score wins; equal score, the strictly faster run
/// wins. A first recorded attempt is always a record.
pub fn is_new_record(outcome: &SessionOutcome, best: Option<&BestEntry>) -> bool {
    match best {
        None => true,
        Some(best) => {
            outcome.score > best.score
                || (outcome.score == best.score
                    && outcome.duration_seconds < best.duration_seconds)
        }
    }
}

pub struct SqliteResultRecorder {
    db: Database,
}

impl SqliteResultRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResultRecorder for SqliteResultRecorder {
    async fn record_attempt(
        &self,
        player: &PlayerContext,
        category: &str,
        outcome: &SessionOutcome,
    ) -> Result<(), QuizError> {
        let record = AttemptRecord {
            id: Uuid::new_v4().to_string(),
            first_name: player.first_name.clone(),
            email: player.email.clone(),
            category: category.to_string(),
            score: outcome.score,
            total_questions: outcome.answered,
            duration_seconds: outcome.duration_seconds,
            created_at: Utc::now(),
        };

        self.db
            .insert_attempt(&record)
            .await
            .map_err(QuizError::DataSource)
    }

    async fn fetch_best(&self, category: &str) -> Result<Option<BestEntry>, QuizError> {
        self.db
            .best_attempt(category)
            .await
            .map_err(QuizError::DataSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::state::FinishReason;

    fn outcome(score: u32, duration_seconds: u32) -> SessionOutcome {
        SessionOutcome {
            score,
            answered: 5,
            duration_seconds,
            is_perfect_score: score == 5,
            reason: FinishReason::Completed,
        }
    }

    fn best(score: u32, duration_seconds: u32) -> BestEntry {
        BestEntry {
            score,
            total: 5,
            duration_seconds,
        }
    }

    #[test]
    fn higher_score_beats_the_record() {
        assert!(is_new_record(&outcome(5, 50), Some(&best(4, 30))));
    }

    #[test]
    fn equal_score_needs_a_strictly_faster_run() {
        assert!(is_new_record(&outcome(4, 25), Some(&best(4, 30))));
        assert!(!is_new_record(&outcome(4, 30), Some(&best(4, 30))));
        assert!(!is_new_record(&outcome(3, 10), Some(&best(4, 30))));
    }

    #[test]
    fn first_attempt_is_always_a_record() {
        assert!(is_new_record(&outcome(0, 60), None));
    }
}
