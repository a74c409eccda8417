use chrono::{DateTime, Utc};

use super::{ActivityEvent, ChapterId, ProgressState, QuizId, SubjectKey};
use crate::error::ProgressError;

/// Partial update for a chapter record. `None` leaves the field untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChapterPatch {
    /// Absolute seconds. Values below the stored total are ignored.
    pub time_spent: Option<u64>,
    pub completed: Option<bool>,
}

impl ChapterPatch {
    #[must_use]
    pub fn time_spent(seconds: u64) -> Self {
        Self {
            time_spent: Some(seconds),
            completed: None,
        }
    }

    #[must_use]
    pub fn completed(completed: bool) -> Self {
        Self {
            time_spent: None,
            completed: Some(completed),
        }
    }
}

/// Partial update for a quiz record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuizPatch {
    pub completed: Option<bool>,
    /// Percentage of correct answers for the attempt. The best attempt is kept.
    pub score: Option<u8>,
}

impl QuizPatch {
    /// A finished attempt with the given score.
    #[must_use]
    pub fn attempt(score: u8) -> Self {
        Self {
            completed: Some(true),
            score: Some(score),
        }
    }
}

impl ProgressState {
    /// Returns a new snapshot with `patch` merged into the chapter record.
    ///
    /// The record is created with defaults if absent. A `completed` transition
    /// from false to true appends an activity event stamped `at`.
    #[must_use]
    pub fn apply_chapter_patch(
        &self,
        subject: &SubjectKey,
        chapter: &ChapterId,
        patch: ChapterPatch,
        at: DateTime<Utc>,
    ) -> ProgressState {
        let mut next = self.clone();
        let entry = next.subjects.entry(subject.clone()).or_default();
        let record = entry.chapters_progress.entry(chapter.clone()).or_default();

        let was_completed = record.completed;
        if let Some(seconds) = patch.time_spent {
            record.time_spent = record.time_spent.max(seconds);
        }
        if let Some(completed) = patch.completed {
            record.completed = completed;
        }
        let newly_completed = !was_completed && record.completed;

        entry.refresh_overall();
        if newly_completed {
            next.last_activity
                .push(ActivityEvent::chapter(subject, chapter, at));
        }
        next.refresh_total();
        next
    }

    /// Returns a new snapshot with `patch` merged into the quiz record.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ScoreOutOfRange` if the score exceeds 100.
    pub fn apply_quiz_patch(
        &self,
        subject: &SubjectKey,
        quiz: &QuizId,
        patch: QuizPatch,
        at: DateTime<Utc>,
    ) -> Result<ProgressState, ProgressError> {
        if let Some(score) = patch.score.filter(|score| *score > 100) {
            return Err(ProgressError::ScoreOutOfRange {
                quiz: quiz.clone(),
                score,
            });
        }

        let mut next = self.clone();
        let entry = next.subjects.entry(subject.clone()).or_default();
        let record = entry.quizzes_progress.entry(quiz.clone()).or_default();

        let was_completed = record.completed;
        if let Some(score) = patch.score {
            record.score = record.score.max(score);
        }
        if let Some(completed) = patch.completed {
            record.completed = completed;
        }
        let newly_completed = !was_completed && record.completed;

        entry.refresh_overall();
        if newly_completed {
            next.last_activity.push(ActivityEvent::quiz(subject, quiz, at));
        }
        Ok(next)
    }

    /// Returns a new snapshot with the chapter's time and completion cleared.
    ///
    /// This is the only transition that lowers `time_spent`.
    #[must_use]
    pub fn reset_chapter(&self, subject: &SubjectKey, chapter: &ChapterId) -> ProgressState {
        let mut next = self.clone();
        let Some(entry) = next.subjects.get_mut(subject) else {
            return next;
        };
        if entry.chapters_progress.remove(chapter).is_some() {
            entry.refresh_overall();
            next.refresh_total();
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityKind, ChapterProgress};
    use crate::time::fixed_now;

    fn chapter(raw: &str) -> ChapterId {
        ChapterId::new(raw).unwrap()
    }

    #[test]
    fn patch_creates_record_with_defaults() {
        let eco = SubjectKey::economie();
        let id = chapter("marche");
        let next = ProgressState::default().apply_chapter_patch(
            &eco,
            &id,
            ChapterPatch::default(),
            fixed_now(),
        );
        assert_eq!(next.chapter(&eco, &id), Some(&ChapterProgress::default()));
        assert!(next.last_activity.is_empty());
    }

    #[test]
    fn patch_does_not_mutate_source_snapshot() {
        let eco = SubjectKey::economie();
        let id = chapter("marche");
        let before = ProgressState::default();
        let after = before.apply_chapter_patch(&eco, &id, ChapterPatch::time_spent(30), fixed_now());
        assert!(before.is_empty());
        assert_eq!(after.total_time_spent, 30);
    }

    #[test]
    fn time_spent_never_decreases_through_patch() {
        let eco = SubjectKey::economie();
        let id = chapter("marche");
        let state = ProgressState::default()
            .apply_chapter_patch(&eco, &id, ChapterPatch::time_spent(120), fixed_now())
            .apply_chapter_patch(&eco, &id, ChapterPatch::time_spent(40), fixed_now());
        assert_eq!(state.chapter(&eco, &id).unwrap().time_spent, 120);
    }

    #[test]
    fn completion_transition_records_activity_once() {
        let eco = SubjectKey::economie();
        let id = chapter("croissance-economique");
        let state = ProgressState::default()
            .apply_chapter_patch(&eco, &id, ChapterPatch::completed(true), fixed_now())
            .apply_chapter_patch(&eco, &id, ChapterPatch::completed(true), fixed_now());
        assert_eq!(state.last_activity.len(), 1);
        assert_eq!(state.last_activity[0].kind, ActivityKind::Chapter);
        assert_eq!(state.last_activity[0].id, "croissance-economique");
        assert_eq!(state.subject(&eco).unwrap().overall_progress, 100);
    }

    #[test]
    fn total_time_spans_subjects() {
        let state = ProgressState::default()
            .apply_chapter_patch(
                &SubjectKey::economie(),
                &chapter("marche"),
                ChapterPatch::time_spent(100),
                fixed_now(),
            )
            .apply_chapter_patch(
                &SubjectKey::sociologie(),
                &chapter("socialisation"),
                ChapterPatch::time_spent(50),
                fixed_now(),
            );
        assert_eq!(state.total_time_spent, 150);
    }

    #[test]
    fn quiz_score_above_hundred_is_rejected() {
        let quiz = QuizId::new("quiz-marche").unwrap();
        let err = ProgressState::default()
            .apply_quiz_patch(&SubjectKey::economie(), &quiz, QuizPatch::attempt(101), fixed_now())
            .unwrap_err();
        assert!(matches!(err, ProgressError::ScoreOutOfRange { score: 101, .. }));
    }

    #[test]
    fn quiz_keeps_best_score() {
        let eco = SubjectKey::economie();
        let quiz = QuizId::new("quiz-marche").unwrap();
        let state = ProgressState::default()
            .apply_quiz_patch(&eco, &quiz, QuizPatch::attempt(80), fixed_now())
            .unwrap()
            .apply_quiz_patch(&eco, &quiz, QuizPatch::attempt(60), fixed_now())
            .unwrap();
        let record = state.quiz(&eco, &quiz).unwrap();
        assert!(record.completed);
        assert_eq!(record.score, 80);
        assert_eq!(state.last_activity.len(), 1);
        assert_eq!(state.last_activity[0].kind, ActivityKind::Quiz);
    }

    #[test]
    fn reset_chapter_clears_time() {
        let eco = SubjectKey::economie();
        let id = chapter("marche");
        let state = ProgressState::default()
            .apply_chapter_patch(&eco, &id, ChapterPatch::time_spent(300), fixed_now())
            .reset_chapter(&eco, &id);
        assert!(state.chapter(&eco, &id).is_none());
        assert_eq!(state.total_time_spent, 0);
    }
}
