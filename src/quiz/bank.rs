use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::db::Database;
use crate::errors::QuizError;
use crate::models::{Bird, Question, OPTIONS_PER_QUESTION};

/// Supplies shuffled question batches for a category.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    async fn fetch_batch(&self, category: &str, count: usize)
        -> Result<Vec<Question>, QuizError>;
}

/// Builds a batch from candidate birds. Each shuffled candidate becomes the
/// correct answer of one question; distractors prefer same-category birds
/// and fall back to any unused bird. A candidate with fewer than two valid
/// distractors is skipped, and a short batch fails as a whole; partial
/// batches are never played.
pub fn build_question_batch<R: Rng + ?Sized>(
    mut birds: Vec<Bird>,
    category: &str,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Question>, QuizError> {
    birds.shuffle(rng);

    let mut questions = Vec::with_capacity(count);
    for bird in &birds {
        if questions.len() >= count {
            break;
        }

        let mut options = vec![bird.name.clone()];

        let mut same_category: Vec<&Bird> = birds
            .iter()
            .filter(|b| b.category == bird.category && b.name != bird.name)
            .collect();
        same_category.shuffle(rng);

        for candidate in same_category {
            if options.len() >= OPTIONS_PER_QUESTION {
                break;
            }
            if !options.contains(&candidate.name) {
                options.push(candidate.name.clone());
            }
        }

        for candidate in &birds {
            if options.len() >= OPTIONS_PER_QUESTION {
                break;
            }
            if candidate.name != bird.name && !options.contains(&candidate.name) {
                options.push(candidate.name.clone());
            }
        }

        if options.len() < OPTIONS_PER_QUESTION {
            continue;
        }

        options.shuffle(rng);
        questions.push(Question {
            correct_answer: bird.name.clone(),
            image_ref: bird.image_ref.clone(),
            options,
        });
    }

    if questions.len() < count {
        return Err(QuizError::InsufficientQuestions {
            category: category.to_string(),
            needed: count,
            built: questions.len(),
        });
    }

    Ok(questions)
}

/// The production bank: birds come from the kiosk database.
pub struct SqliteQuestionBank {
    db: Database,
}

impl SqliteQuestionBank {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl QuestionBank for SqliteQuestionBank {
    async fn fetch_batch(
        &self,
        category: &str,
        count: usize,
    ) -> Result<Vec<Question>, QuizError> {
        let birds = self
            .db
            .list_birds(category)
            .await
            .map_err(QuizError::DataSource)?;

        let mut rng = rand::thread_rng();
        build_question_batch(birds, category, count, &mut rng)
    }
}
