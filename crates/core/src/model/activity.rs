use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChapterId, QuizId, SubjectKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Chapter,
    Quiz,
}

/// A completion recorded in the activity feed.
///
/// `id` is the chapter or quiz slug depending on `kind`. Timestamps serialize
/// as RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub id: String,
    pub subject: SubjectKey,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    #[must_use]
    pub fn chapter(subject: &SubjectKey, chapter: &ChapterId, at: DateTime<Utc>) -> Self {
        Self {
            kind: ActivityKind::Chapter,
            id: chapter.as_str().to_owned(),
            subject: subject.clone(),
            timestamp: at,
        }
    }

    #[must_use]
    pub fn quiz(subject: &SubjectKey, quiz: &QuizId, at: DateTime<Utc>) -> Self {
        Self {
            kind: ActivityKind::Quiz,
            id: quiz.as_str().to_owned(),
            subject: subject.clone(),
            timestamp: at,
        }
    }
}
