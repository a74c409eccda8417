use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use course_core::model::{
    ActivityEvent, ChapterId, ChapterPatch, ChapterProgress, ProgressState, QuizId, QuizPatch,
    QuizProgress, SubjectKey, SubjectProgress,
};
use course_core::{format_time, stats};
use storage::ProgressStore;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Progress facade used by chapter and quiz pages.
///
/// Holds the in-memory snapshot, answers derived queries from it and writes
/// the full snapshot back through `ProgressStore` after every mutation.
///
/// Every in-memory transition bumps a generation counter. Saves go through a
/// single writer lock and always write the latest snapshot, so storage never
/// moves back to an older generation. Other processes writing the same
/// storage are still last-write-wins.
pub struct ProgressService {
    clock: Clock,
    store: ProgressStore,
    state: Mutex<ProgressState>,
    generation: AtomicU64,
    /// Generation last written to storage. Held across hydration and saves.
    writer: AsyncMutex<u64>,
    loading: AtomicBool,
}

impl ProgressService {
    /// Create a service with an empty snapshot. `is_loading()` stays true
    /// until `hydrate` has run; mutators hydrate first if needed.
    #[must_use]
    pub fn new(store: ProgressStore, clock: Clock) -> Self {
        Self {
            clock,
            store,
            state: Mutex::new(ProgressState::default()),
            generation: AtomicU64::new(0),
            writer: AsyncMutex::new(0),
            loading: AtomicBool::new(true),
        }
    }

    /// Create a service and load the stored snapshot.
    pub async fn open(store: ProgressStore, clock: Clock) -> Self {
        let service = Self::new(store, clock);
        service.hydrate().await;
        service
    }

    /// Load the stored snapshot into memory. Only the first call loads.
    pub async fn hydrate(&self) {
        let _writer = self.writer.lock().await;
        if !self.is_loading() {
            return;
        }
        let loaded = self.store.load().await;
        info!(
            subjects = loaded.subjects.len(),
            activities = loaded.last_activity.len(),
            "progress hydrated"
        );
        *self.lock() = loaded;
        self.loading.store(false, Ordering::Release);
    }

    async fn ensure_hydrated(&self) {
        if self.is_loading() {
            self.hydrate().await;
        }
    }

    /// True until the first load from storage completes. Derived values are
    /// not meaningful while this is set.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProgressState {
        self.lock().clone()
    }

    // ─── Queries ───────────────────────────────────────────────────────────────

    /// Stored record for a chapter, `None` if it was never touched.
    #[must_use]
    pub fn chapter_progress(
        &self,
        subject: &SubjectKey,
        chapter: &ChapterId,
    ) -> Option<ChapterProgress> {
        self.lock().chapter(subject, chapter).copied()
    }

    #[must_use]
    pub fn chapter_progress_or_default(
        &self,
        subject: &SubjectKey,
        chapter: &ChapterId,
    ) -> ChapterProgress {
        self.chapter_progress(subject, chapter).unwrap_or_default()
    }

    #[must_use]
    pub fn quiz_progress(&self, subject: &SubjectKey, quiz: &QuizId) -> Option<QuizProgress> {
        self.lock().quiz(subject, quiz).copied()
    }

    #[must_use]
    pub fn subject_progress(&self, subject: &SubjectKey) -> Option<SubjectProgress> {
        self.lock().subject(subject).cloned()
    }

    /// Mean completion across subjects, 0 when nothing is tracked.
    #[must_use]
    pub fn overall_progress(&self) -> u8 {
        stats::overall_progress(&self.lock())
    }

    /// Up to `limit` activity events, most recent first.
    #[must_use]
    pub fn recent_activities(&self, limit: usize) -> Vec<ActivityEvent> {
        stats::recent_activities(&self.lock(), limit)
    }

    #[must_use]
    pub fn streak_days(&self) -> u32 {
        stats::streak_days(&self.lock(), self.clock.today())
    }

    #[must_use]
    pub fn total_time_spent(&self) -> u64 {
        self.lock().total_time_spent
    }

    #[must_use]
    pub fn format_time(seconds: u64) -> String {
        format_time(seconds)
    }

    // ─── Mutations ─────────────────────────────────────────────────────────────

    /// Apply a transition to the in-memory snapshot under one lock and bump
    /// the generation.
    fn try_transition<T, E>(
        &self,
        step: impl FnOnce(&ProgressState) -> Result<(ProgressState, T), E>,
    ) -> Result<T, E> {
        let mut guard = self.lock();
        let (next, out) = step(&guard)?;
        *guard = next;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(out)
    }

    fn transition<T>(&self, step: impl FnOnce(&ProgressState) -> (ProgressState, T)) -> T {
        let mut guard = self.lock();
        let (next, out) = step(&guard);
        *guard = next;
        self.generation.fetch_add(1, Ordering::AcqRel);
        out
    }

    /// Write the current snapshot unless storage already holds this generation.
    ///
    /// Failures are logged by the store and retried by the next call.
    pub(crate) async fn persist_latest(&self) -> bool {
        let mut written = self.writer.lock().await;
        let (snapshot, generation) = {
            let guard = self.lock();
            (guard.clone(), self.generation.load(Ordering::Acquire))
        };
        if generation <= *written {
            return true;
        }
        let saved = self.store.save(&snapshot).await;
        if saved {
            *written = generation;
        }
        saved
    }

    /// Merge `patch` into the chapter record and persist.
    pub async fn update_chapter_progress(
        &self,
        subject: &SubjectKey,
        chapter: &ChapterId,
        patch: ChapterPatch,
    ) -> ChapterProgress {
        self.ensure_hydrated().await;
        let record = self.apply_chapter(subject, chapter, patch);
        self.persist_latest().await;
        record
    }

    /// Add `seconds` to the chapter's accumulated time and persist.
    pub async fn add_time_spent(
        &self,
        subject: &SubjectKey,
        chapter: &ChapterId,
        seconds: u64,
    ) -> ChapterProgress {
        self.ensure_hydrated().await;
        let record = self.add_time_in_memory(subject, chapter, seconds);
        self.persist_latest().await;
        record
    }

    pub async fn set_chapter_completed(
        &self,
        subject: &SubjectKey,
        chapter: &ChapterId,
        completed: bool,
    ) -> ChapterProgress {
        self.update_chapter_progress(subject, chapter, ChapterPatch::completed(completed))
            .await
    }

    /// Record a quiz attempt or completion toggle and persist.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Progress` if the score exceeds 100.
    pub async fn update_quiz_progress(
        &self,
        subject: &SubjectKey,
        quiz: &QuizId,
        patch: QuizPatch,
    ) -> Result<QuizProgress, ProgressServiceError> {
        self.ensure_hydrated().await;
        let at = self.clock.now();
        let record = self.try_transition(|state| {
            let next = state.apply_quiz_patch(subject, quiz, patch, at)?;
            let record = next.quiz(subject, quiz).copied().unwrap_or_default();
            Ok::<_, ProgressServiceError>((next, record))
        })?;
        debug!(%subject, %quiz, score = record.score, completed = record.completed, "quiz progress updated");
        self.persist_latest().await;
        Ok(record)
    }

    /// Drop a chapter's record, the only way its time goes down.
    pub async fn reset_chapter(&self, subject: &SubjectKey, chapter: &ChapterId) {
        self.ensure_hydrated().await;
        self.transition(|state| (state.reset_chapter(subject, chapter), ()));
        info!(%subject, %chapter, "chapter progress reset");
        self.persist_latest().await;
    }

    /// Forget all progress, in memory and in storage.
    pub async fn reset_all(&self) {
        self.ensure_hydrated().await;
        let mut written = self.writer.lock().await;
        self.transition(|_| (ProgressState::default(), ()));
        info!("all progress reset");
        if self.store.clear().await {
            *written = self.generation.load(Ordering::Acquire);
        }
    }

    pub(crate) fn apply_chapter(
        &self,
        subject: &SubjectKey,
        chapter: &ChapterId,
        patch: ChapterPatch,
    ) -> ChapterProgress {
        let at = self.clock.now();
        let record = self.transition(|state| {
            let next = state.apply_chapter_patch(subject, chapter, patch, at);
            let record = next.chapter(subject, chapter).copied().unwrap_or_default();
            (next, record)
        });
        debug!(
            %subject,
            %chapter,
            time_spent = record.time_spent,
            completed = record.completed,
            "chapter progress updated"
        );
        record
    }

    /// Add study time to the in-memory snapshot without saving. Callers must
    /// follow up with `persist_latest`.
    pub(crate) fn add_time_in_memory(
        &self,
        subject: &SubjectKey,
        chapter: &ChapterId,
        seconds: u64,
    ) -> ChapterProgress {
        let at = self.clock.now();
        let record = self.transition(|state| {
            let current = state.chapter(subject, chapter).map_or(0, |c| c.time_spent);
            let patch = ChapterPatch::time_spent(current.saturating_add(seconds));
            let next = state.apply_chapter_patch(subject, chapter, patch, at);
            let record = next.chapter(subject, chapter).copied().unwrap_or_default();
            (next, record)
        });
        debug!(%subject, %chapter, added = seconds, total = record.time_spent, "study time recorded");
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use async_trait::async_trait;
    use course_core::time::fixed_clock;
    use storage::{InMemoryRepository, ProgressRepository, StorageError};

    fn chapter(raw: &str) -> ChapterId {
        ChapterId::new(raw).unwrap()
    }

    async fn service_with(repo: InMemoryRepository) -> ProgressService {
        ProgressService::open(ProgressStore::new(Arc::new(repo)), fixed_clock()).await
    }

    struct QuotaExceeded;

    #[async_trait]
    impl ProgressRepository for QuotaExceeded {
        async fn load_snapshot(&self) -> Result<Option<ProgressState>, StorageError> {
            Ok(None)
        }

        async fn save_snapshot(&self, _state: &ProgressState) -> Result<(), StorageError> {
            Err(StorageError::Connection("quota exceeded".into()))
        }

        async fn clear(&self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn loading_flag_clears_after_hydrate() {
        let service = ProgressService::new(
            ProgressStore::new(Arc::new(InMemoryRepository::new())),
            fixed_clock(),
        );
        assert!(service.is_loading());
        service.hydrate().await;
        assert!(!service.is_loading());
    }

    #[tokio::test]
    async fn mutation_before_hydrate_keeps_stored_progress() {
        let repo = InMemoryRepository::new();
        let eco = SubjectKey::economie();
        let seeded = ProgressState::default().apply_chapter_patch(
            &eco,
            &chapter("marche"),
            ChapterPatch::time_spent(3600),
            fixed_clock().now(),
        );
        repo.save_snapshot(&seeded).await.unwrap();

        let service = ProgressService::new(ProgressStore::new(Arc::new(repo.clone())), fixed_clock());
        service.add_time_spent(&eco, &chapter("monnaie"), 5).await;
        assert!(!service.is_loading());
        service.hydrate().await;

        let marche = service.chapter_progress(&eco, &chapter("marche")).unwrap();
        assert_eq!(marche.time_spent, 3600);
        assert_eq!(
            service.chapter_progress(&eco, &chapter("monnaie")).map(|c| c.time_spent),
            Some(5)
        );
        let stored = repo.load_snapshot().await.unwrap().unwrap();
        assert_eq!(stored, service.snapshot());
    }

    #[tokio::test]
    async fn second_hydrate_does_not_reload() {
        let repo = InMemoryRepository::new();
        let service = service_with(repo.clone()).await;
        let eco = SubjectKey::economie();
        service.add_time_spent(&eco, &chapter("marche"), 10).await;
        repo.clear().await.unwrap();

        service.hydrate().await;
        assert_eq!(service.total_time_spent(), 10);
    }

    #[tokio::test]
    async fn unknown_chapter_has_no_record() {
        let service = service_with(InMemoryRepository::new()).await;
        let eco = SubjectKey::economie();
        assert!(service.chapter_progress(&eco, &chapter("monnaie")).is_none());
        assert_eq!(
            service.chapter_progress_or_default(&eco, &chapter("monnaie")),
            ChapterProgress::default()
        );
    }

    #[tokio::test]
    async fn time_spent_is_monotonic_across_updates() {
        let service = service_with(InMemoryRepository::new()).await;
        let eco = SubjectKey::economie();
        let id = chapter("marche");

        let mut last = 0;
        for delta in [5, 0, 12, 1, 30] {
            let record = service.add_time_spent(&eco, &id, delta).await;
            assert!(record.time_spent >= last);
            last = record.time_spent;
        }
        assert_eq!(last, 48);
        assert_eq!(service.total_time_spent(), 48);
    }

    #[tokio::test]
    async fn mutations_are_persisted_and_reload() {
        let repo = InMemoryRepository::new();
        let service = service_with(repo.clone()).await;
        let eco = SubjectKey::economie();
        service.add_time_spent(&eco, &chapter("marche"), 90).await;
        service.set_chapter_completed(&eco, &chapter("marche"), true).await;

        let reloaded = service_with(repo).await;
        assert_eq!(reloaded.snapshot(), service.snapshot());
        assert_eq!(reloaded.overall_progress(), 100);
    }

    #[tokio::test]
    async fn failed_save_keeps_in_memory_state() {
        let service =
            ProgressService::open(ProgressStore::new(Arc::new(QuotaExceeded)), fixed_clock()).await;
        let eco = SubjectKey::economie();
        let record = service.add_time_spent(&eco, &chapter("marche"), 10).await;
        assert_eq!(record.time_spent, 10);
        assert_eq!(service.chapter_progress(&eco, &chapter("marche")), Some(record));
    }

    #[tokio::test]
    async fn quiz_updates_feed_overall_progress() {
        let service = service_with(InMemoryRepository::new()).await;
        let socio = SubjectKey::sociologie();
        let quiz = QuizId::new("quiz-socialisation").unwrap();

        let record = service
            .update_quiz_progress(&socio, &quiz, QuizPatch::attempt(100))
            .await
            .unwrap();
        assert!(record.completed);
        assert_eq!(service.overall_progress(), 100);

        let err = service
            .update_quiz_progress(&socio, &quiz, QuizPatch::attempt(120))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::Progress(_)));
    }

    #[tokio::test]
    async fn completions_build_streak_and_feed() {
        let service = service_with(InMemoryRepository::new()).await;
        let eco = SubjectKey::economie();
        service.set_chapter_completed(&eco, &chapter("marche"), true).await;
        service.set_chapter_completed(&eco, &chapter("monnaie"), true).await;

        assert_eq!(service.streak_days(), 1);
        let recent = service.recent_activities(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "monnaie");
    }

    #[tokio::test]
    async fn reset_all_clears_storage() {
        let repo = InMemoryRepository::new();
        let service = service_with(repo.clone()).await;
        service
            .add_time_spent(&SubjectKey::economie(), &chapter("marche"), 10)
            .await;
        service.reset_all().await;
        assert!(service.snapshot().is_empty());
        assert!(repo.raw_payload().is_none());
    }

    #[tokio::test]
    async fn reset_chapter_lowers_time() {
        let service = service_with(InMemoryRepository::new()).await;
        let eco = SubjectKey::economie();
        service.add_time_spent(&eco, &chapter("marche"), 100).await;
        service.reset_chapter(&eco, &chapter("marche")).await;
        assert!(service.chapter_progress(&eco, &chapter("marche")).is_none());
        assert_eq!(service.total_time_spent(), 0);
    }

    #[test]
    fn format_time_delegates() {
        assert_eq!(ProgressService::format_time(3661), "1h 01min");
    }
}
