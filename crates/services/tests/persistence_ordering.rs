mod common;

use std::sync::Arc;
use std::time::Duration;

use common::YieldingRepository;
use course_core::model::{ChapterId, ChapterPatch, ProgressState, SubjectKey};
use course_core::time::fixed_clock;
use services::{ProgressService, StudySession};
use storage::{ProgressRepository, ProgressStore};

fn chapter(raw: &str) -> ChapterId {
    ChapterId::new(raw).unwrap()
}

async fn open(repo: &YieldingRepository) -> Arc<ProgressService> {
    Arc::new(ProgressService::open(ProgressStore::new(Arc::new(repo.clone())), fixed_clock()).await)
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn dropped_session_then_mutation_keeps_storage_current() {
    let repo = YieldingRepository::new();
    let service = open(&repo).await;
    let eco = SubjectKey::economie();

    {
        let session = StudySession::open(Arc::clone(&service), eco.clone(), chapter("marche"));
        session.tick(Duration::from_secs(30));
    }
    service
        .set_chapter_completed(&eco, &chapter("monnaie"), true)
        .await;
    settle().await;

    let stored = repo.stored().await;
    assert_eq!(stored, service.snapshot());
    assert_eq!(stored.chapter(&eco, &chapter("marche")).unwrap().time_spent, 30);
    assert!(stored.chapter(&eco, &chapter("monnaie")).unwrap().completed);
}

#[tokio::test]
async fn close_racing_a_mutation_keeps_storage_current() {
    let repo = YieldingRepository::new();
    let service = open(&repo).await;
    let eco = SubjectKey::economie();

    let session = StudySession::open(Arc::clone(&service), eco.clone(), chapter("marche"));
    session.tick(Duration::from_secs(12));
    let monnaie = chapter("monnaie");
    let (closed, completed) = tokio::join!(
        session.close(),
        service.set_chapter_completed(&eco, &monnaie, true),
    );
    assert_eq!(closed.time_spent, 12);
    assert!(completed.completed);
    settle().await;

    assert_eq!(repo.stored().await, service.snapshot());
}

#[tokio::test]
async fn mutation_while_loading_keeps_stored_progress() {
    let repo = YieldingRepository::new();
    let eco = SubjectKey::economie();
    let seeded = ProgressState::default().apply_chapter_patch(
        &eco,
        &chapter("marche"),
        ChapterPatch::time_spent(3600),
        fixed_clock().now(),
    );
    repo.save_snapshot(&seeded).await.unwrap();

    let service = ProgressService::new(ProgressStore::new(Arc::new(repo.clone())), fixed_clock());
    assert!(service.is_loading());
    let monnaie = chapter("monnaie");
    tokio::join!(
        service.hydrate(),
        service.add_time_spent(&eco, &monnaie, 5),
    );

    assert!(!service.is_loading());
    let marche = service.chapter_progress(&eco, &chapter("marche")).unwrap();
    assert_eq!(marche.time_spent, 3600);
    assert_eq!(
        service
            .chapter_progress(&eco, &chapter("monnaie"))
            .map(|c| c.time_spent),
        Some(5)
    );
    assert_eq!(repo.stored().await, service.snapshot());
}

#[tokio::test(start_paused = true)]
async fn completing_during_a_slow_save_stops_the_count() {
    let repo = YieldingRepository::with_save_delay(Duration::from_secs(2));
    let service = open(&repo).await;
    let eco = SubjectKey::economie();
    let id = chapter("croissance-economique");

    let mut session = StudySession::open(Arc::clone(&service), eco.clone(), id.clone());
    session.start().unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let record = session.set_completed(true).await;
    assert!(record.completed);
    assert_eq!(record.time_spent, 3);
    assert_eq!(session.pending_seconds(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(session.pending_seconds(), 0);
    assert_eq!(repo.stored().await, service.snapshot());

    // Counting resumes only once the reopened chapter is written.
    let reopened = session.set_completed(false).await;
    assert!(!reopened.completed);
    tokio::time::sleep(Duration::from_secs(5)).await;
    let record = session.close().await;
    assert_eq!(record.time_spent, 8);
    assert_eq!(repo.stored().await, service.snapshot());
}
