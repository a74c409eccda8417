use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use course_core::model::{ChapterId, ChapterProgress, SubjectKey};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::ProgressServiceError;
use crate::progress_service::ProgressService;

/// Time accumulator for one open chapter page.
///
/// Study time is counted in memory, by a ticker task or by explicit `tick`
/// calls, and written to the `ProgressService` on `flush`. Nothing is
/// counted while the chapter is marked completed.
///
/// Dropping a session stops its ticker and hands any pending whole seconds
/// to the service, so time is never lost on an early exit.
pub struct StudySession {
    service: Arc<ProgressService>,
    subject: SubjectKey,
    chapter: ChapterId,
    pending_ms: Arc<AtomicU64>,
    paused: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
}

impl StudySession {
    pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

    /// Open a session for a chapter. Starts paused if the chapter is already completed.
    #[must_use]
    pub fn open(service: Arc<ProgressService>, subject: SubjectKey, chapter: ChapterId) -> Self {
        let completed = service
            .chapter_progress_or_default(&subject, &chapter)
            .completed;
        Self {
            service,
            subject,
            chapter,
            pending_ms: Arc::new(AtomicU64::new(0)),
            paused: Arc::new(AtomicBool::new(completed)),
            ticker: None,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &SubjectKey {
        &self.subject
    }

    #[must_use]
    pub fn chapter(&self) -> &ChapterId {
        &self.chapter
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// True while the chapter is completed and time is not counted.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Whole seconds counted but not yet flushed.
    #[must_use]
    pub fn pending_seconds(&self) -> u64 {
        self.pending_ms.load(Ordering::Acquire) / 1000
    }

    /// Start the ticker with the default one second period.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NoRuntime` outside a Tokio runtime.
    pub fn start(&mut self) -> Result<(), ProgressServiceError> {
        self.start_with_period(Self::DEFAULT_TICK)
    }

    /// Start a ticker that adds `period` on every tick. No-op if already running.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NoRuntime` outside a Tokio runtime.
    pub fn start_with_period(&mut self, period: Duration) -> Result<(), ProgressServiceError> {
        if self.ticker.is_some() {
            return Ok(());
        }
        let handle = Handle::try_current().map_err(|_| ProgressServiceError::NoRuntime)?;

        let pending = Arc::clone(&self.pending_ms);
        let paused = Arc::clone(&self.paused);
        let step = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self.ticker = Some(handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if !paused.load(Ordering::Acquire) {
                    add_saturating(&pending, step);
                }
            }
        }));
        debug!(subject = %self.subject, chapter = %self.chapter, ?period, "study ticker started");
        Ok(())
    }

    /// Stop the ticker. Pending time stays pending until flushed.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            debug!(subject = %self.subject, chapter = %self.chapter, "study ticker stopped");
        }
    }

    /// Count `elapsed` study time by hand, e.g. from a host-driven timer.
    pub fn tick(&self, elapsed: Duration) {
        if self.is_paused() {
            return;
        }
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        add_saturating(&self.pending_ms, millis);
    }

    /// Removes whole pending seconds, leaving the sub-second remainder.
    fn take_pending_seconds(&self) -> u64 {
        let previous = self
            .pending_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |ms| Some(ms % 1000))
            .unwrap_or(0);
        previous / 1000
    }

    /// Write pending seconds to the service. Each second is written once.
    pub async fn flush(&self) -> ChapterProgress {
        let seconds = self.take_pending_seconds();
        if seconds == 0 {
            return self
                .service
                .chapter_progress_or_default(&self.subject, &self.chapter);
        }
        self.service
            .add_time_spent(&self.subject, &self.chapter, seconds)
            .await
    }

    /// Flush, then toggle completion. Completing pauses the count; reopening resumes it.
    ///
    /// The count is paused before the flush so no tick lands on a completed
    /// chapter, and only resumes once the reopened state is written.
    pub async fn set_completed(&self, completed: bool) -> ChapterProgress {
        if completed {
            self.paused.store(true, Ordering::Release);
        }
        self.flush().await;
        let record = self
            .service
            .set_chapter_completed(&self.subject, &self.chapter, completed)
            .await;
        if record.completed {
            // Leftover sub-second time and ticks that raced the pause.
            self.pending_ms.store(0, Ordering::Release);
        }
        self.paused.store(record.completed, Ordering::Release);
        record
    }

    /// Stop the ticker and flush what was counted.
    pub async fn close(mut self) -> ChapterProgress {
        self.stop();
        self.flush().await
    }
}

fn add_saturating(counter: &AtomicU64, millis: u64) {
    // The closure always returns Some, so the update cannot fail.
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |ms| {
        Some(ms.saturating_add(millis))
    });
}

impl Drop for StudySession {
    fn drop(&mut self) {
        self.stop();
        let seconds = self.take_pending_seconds();
        if seconds == 0 {
            return;
        }

        let handle = Handle::try_current();
        if self.service.is_loading() {
            // Time must land on the loaded snapshot, not the empty one.
            match handle {
                Ok(handle) => {
                    let service = Arc::clone(&self.service);
                    let subject = self.subject.clone();
                    let chapter = self.chapter.clone();
                    handle.spawn(async move {
                        service.add_time_spent(&subject, &chapter, seconds).await;
                    });
                }
                Err(_) => warn!(
                    subject = %self.subject,
                    chapter = %self.chapter,
                    seconds,
                    "study session dropped outside a runtime before progress loaded; time discarded"
                ),
            }
            return;
        }

        self.service
            .add_time_in_memory(&self.subject, &self.chapter, seconds);
        match handle {
            Ok(handle) => {
                let service = Arc::clone(&self.service);
                handle.spawn(async move {
                    service.persist_latest().await;
                });
            }
            Err(_) => warn!(
                subject = %self.subject,
                chapter = %self.chapter,
                seconds,
                "study session dropped outside a runtime; time kept in memory until the next save"
            ),
        }
    }
}
