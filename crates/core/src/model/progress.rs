use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ActivityEvent, ChapterId, QuizId, SubjectKey};
use crate::stats;

/// Time and completion for one chapter.
///
/// A missing record is equivalent to `ChapterProgress::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgress {
    /// Seconds accumulated across all visits.
    pub time_spent: u64,
    pub completed: bool,
}

/// Completion and best score (0-100) for one quiz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizProgress {
    pub completed: bool,
    pub score: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectProgress {
    pub chapters_progress: BTreeMap<ChapterId, ChapterProgress>,
    pub quizzes_progress: BTreeMap<QuizId, QuizProgress>,
    /// Cached percentage, see `stats::subject_overall_progress`.
    pub overall_progress: u8,
}

impl SubjectProgress {
    #[must_use]
    pub fn chapter(&self, id: &ChapterId) -> Option<&ChapterProgress> {
        self.chapters_progress.get(id)
    }

    #[must_use]
    pub fn quiz(&self, id: &QuizId) -> Option<&QuizProgress> {
        self.quizzes_progress.get(id)
    }

    /// Number of tracked chapters and quizzes.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.chapters_progress.len() + self.quizzes_progress.len()
    }

    #[must_use]
    pub fn time_spent(&self) -> u64 {
        self.chapters_progress
            .values()
            .fold(0_u64, |acc, c| acc.saturating_add(c.time_spent))
    }

    pub(crate) fn refresh_overall(&mut self) {
        self.overall_progress = stats::subject_overall_progress(self);
    }
}

/// The whole persisted progress record for one learner profile.
///
/// `last_activity` is kept in append order (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressState {
    pub subjects: BTreeMap<SubjectKey, SubjectProgress>,
    pub last_activity: Vec<ActivityEvent>,
    pub total_time_spent: u64,
}

impl ProgressState {
    #[must_use]
    pub fn subject(&self, key: &SubjectKey) -> Option<&SubjectProgress> {
        self.subjects.get(key)
    }

    #[must_use]
    pub fn chapter(&self, subject: &SubjectKey, chapter: &ChapterId) -> Option<&ChapterProgress> {
        self.subject(subject).and_then(|s| s.chapter(chapter))
    }

    #[must_use]
    pub fn quiz(&self, subject: &SubjectKey, quiz: &QuizId) -> Option<&QuizProgress> {
        self.subject(subject).and_then(|s| s.quiz(quiz))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty() && self.last_activity.is_empty()
    }

    pub(crate) fn refresh_total(&mut self) {
        self.total_time_spent = self
            .subjects
            .values()
            .fold(0_u64, |acc, s| acc.saturating_add(s.time_spent()));
    }
}
