use thiserror::Error;

use crate::model::QuizId;

/// Errors raised while applying a progress patch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("quiz score must be between 0 and 100, got {score} for quiz {quiz}")]
    ScoreOutOfRange { quiz: QuizId, score: u8 },
}
