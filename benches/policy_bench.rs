//! Benchmark suite for danci-review
//!
//! Run with: cargo bench

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use danci_review::{
    EaseFactor, ManualClock, ReviewAttempt, ReviewFeedback, ReviewInterval, ReviewSchedule, ReviewState,
    Sm2Policy, SpacedRepetitionPolicy,
};

fn sample_state() -> ReviewState {
    let reviewed_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    ReviewState::restore(
        ReviewInterval::new(12),
        EaseFactor::new(2.3),
        7,
        Some(reviewed_at),
        reviewed_at + Duration::days(12),
    )
}

fn bench_calculate_next_interval(c: &mut Criterion) {
    let policy = Sm2Policy::default();
    let state = sample_state();
    c.bench_function("Sm2Policy::calculate_next_interval", |b| {
        b.iter(|| {
            for feedback in ReviewFeedback::ALL {
                black_box(policy.calculate_next_interval(black_box(&state), feedback));
            }
        })
    });
}

fn bench_adjust_for_late_review(c: &mut Criterion) {
    let policy = Sm2Policy::default();
    let state = sample_state();
    let now = state.next_review_at() + Duration::days(5);
    c.bench_function("Sm2Policy::adjust_for_late_review", |b| {
        b.iter(|| policy.adjust_for_late_review(black_box(&state), black_box(now)))
    });
}

fn bench_process_review_feedback(c: &mut Criterion) {
    let policy = Sm2Policy::default();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let base = ReviewSchedule::create("student-1", "problem-1", &policy, &clock).unwrap();
    clock.advance(Duration::days(1));

    c.bench_function("ReviewSchedule::process_review_feedback", |b| {
        b.iter(|| {
            let mut schedule = base.clone();
            let outcome = schedule
                .process_review_feedback(ReviewAttempt::new(ReviewFeedback::Good), &policy, &clock)
                .unwrap();
            black_box((outcome, schedule.drain_events()))
        })
    });
}

criterion_group!(
    benches,
    bench_calculate_next_interval,
    bench_adjust_for_late_review,
    bench_process_review_feedback
);
criterion_main!(benches);
