//! Derived values computed from a `ProgressState` snapshot.
//!
//! Subject progress: every chapter counts 100 when completed, every quiz counts
//! its score when completed, anything else counts 0. The subject percentage is
//! the rounded mean over all tracked items. Overall progress is the rounded
//! mean over subjects that track at least one item.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};

use crate::model::{ActivityEvent, ProgressState, SubjectProgress};

fn rounded_mean(sum: u64, count: u64) -> u8 {
    if count == 0 {
        return 0;
    }
    let mean = (sum + count / 2) / count;
    u8::try_from(mean.min(100)).unwrap_or(100)
}

#[must_use]
pub fn subject_overall_progress(subject: &SubjectProgress) -> u8 {
    let chapters = subject
        .chapters_progress
        .values()
        .map(|c| if c.completed { 100_u64 } else { 0 });
    let quizzes = subject.quizzes_progress.values().map(|q| {
        if q.completed {
            u64::from(q.score.min(100))
        } else {
            0
        }
    });
    let sum: u64 = chapters.chain(quizzes).sum();
    rounded_mean(sum, subject.item_count() as u64)
}

/// Mean progress across subjects. Returns 0 when nothing is tracked.
#[must_use]
pub fn overall_progress(state: &ProgressState) -> u8 {
    let (sum, count) = state
        .subjects
        .values()
        .filter(|s| s.item_count() > 0)
        .fold((0_u64, 0_u64), |(sum, count), s| {
            (sum + u64::from(subject_overall_progress(s)), count + 1)
        });
    rounded_mean(sum, count)
}

/// Up to `limit` events, most recent first.
#[must_use]
pub fn recent_activities(state: &ProgressState, limit: usize) -> Vec<ActivityEvent> {
    let mut events: Vec<ActivityEvent> = state.last_activity.clone();
    // Stable sort keeps append order for equal timestamps; reversing puts the latest append first.
    events.sort_by_key(|e| e.timestamp);
    events.into_iter().rev().take(limit).collect()
}

/// Consecutive calendar days (UTC) with at least one activity, ending today.
///
/// A streak whose last active day is yesterday still counts, since today
/// is not over yet.
#[must_use]
pub fn streak_days(state: &ProgressState, today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = state
        .last_activity
        .iter()
        .map(|e| e.timestamp.date_naive())
        .collect();

    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.checked_sub_days(Days::new(1)) {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0_u32;
    while days.contains(&cursor) {
        streak += 1;
        match cursor.checked_sub_days(Days::new(1)) {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    streak
}
