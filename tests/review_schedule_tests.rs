mod common;

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use danci_review::review::{ReviewNotificationPayload, ReviewState};
use danci_review::services::ScheduleRepository;
use danci_review::{
    Clock, EaseFactor, EventBus, ManualClock, NotificationKind, NotificationPriority, OverdueScanConfig,
    OverdueScanner, RepositoryError, ReviewAttempt, ReviewEvent, ReviewFeedback, ReviewInterval,
    ReviewSchedule, ReviewService, ScheduleError, SchedulingConfig, ServiceError, Sm2Policy,
    SpacedRepetitionPolicy,
};

use common::{day0, Harness};

fn fresh(policy: &Sm2Policy, clock: &ManualClock) -> ReviewSchedule {
    let mut schedule = ReviewSchedule::create("student-1", "problem-1", policy, clock).unwrap();
    schedule.drain_events();
    schedule
}

fn review_when_due(
    schedule: &mut ReviewSchedule,
    feedback: ReviewFeedback,
    policy: &Sm2Policy,
    clock: &ManualClock,
) -> danci_review::ReviewOutcome {
    clock.set(schedule.review_state().next_review_at());
    schedule
        .process_review_feedback(ReviewAttempt::new(feedback), policy, clock)
        .unwrap()
}

fn notifications(events: &[ReviewEvent]) -> Vec<&ReviewNotificationPayload> {
    events.iter().filter_map(ReviewEvent::as_notification).collect()
}

// ============================================================================
// Aggregate scenarios
// ============================================================================

#[test]
fn good_from_initial_state_grows_interval_and_keeps_ease() {
    let clock = ManualClock::new(day0());
    let policy = Sm2Policy::default();
    let mut schedule = fresh(&policy, &clock);

    let outcome = review_when_due(&mut schedule, ReviewFeedback::Good, &policy, &clock);

    let interval = outcome.new_state.interval().days();
    assert!(interval > 1 && interval <= 30);
    assert_eq!(outcome.new_state.ease_factor().value(), 2.5);
    assert_eq!(outcome.consecutive_failures, 0);
    assert!(!outcome.interval_reset);
}

#[test]
fn three_agains_reset_to_minimum_ease() {
    let clock = ManualClock::new(day0());
    let policy = Sm2Policy::default();
    let mut schedule = fresh(&policy, &clock);

    let first = review_when_due(&mut schedule, ReviewFeedback::Again, &policy, &clock);
    assert_eq!(first.consecutive_failures, 1);
    assert!(!first.interval_reset);

    let second = review_when_due(&mut schedule, ReviewFeedback::Again, &policy, &clock);
    assert_eq!(second.consecutive_failures, 2);
    assert!(!second.interval_reset);

    let third = review_when_due(&mut schedule, ReviewFeedback::Again, &policy, &clock);
    assert_eq!(third.consecutive_failures, 3);
    assert!(third.interval_reset);
    assert_eq!(schedule.consecutive_failures(), 3);
    assert_eq!(schedule.review_state().ease_factor().value(), 1.3);
    assert_eq!(schedule.review_state().interval().days(), 1);

    let recovered = review_when_due(&mut schedule, ReviewFeedback::Good, &policy, &clock);
    assert_eq!(recovered.previous_failures, 3);
    assert_eq!(recovered.consecutive_failures, 0);
}

#[test]
fn reset_keeps_a_longer_prior_interval() {
    let clock = ManualClock::new(day0());
    let policy = Sm2Policy::default();
    let state = ReviewState::restore(
        ReviewInterval::new(6),
        EaseFactor::new(1.6),
        9,
        Some(day0() - Duration::days(6)),
        day0(),
    );
    let mut schedule = ReviewSchedule::restore(
        Uuid::new_v4(),
        "student-1".to_string(),
        "problem-1".to_string(),
        state,
        2,
        day0() - Duration::days(40),
        day0() - Duration::days(6),
        12,
    );

    let outcome = schedule
        .process_review_feedback(ReviewAttempt::new(ReviewFeedback::Again), &policy, &clock)
        .unwrap();

    assert!(outcome.interval_reset);
    assert_eq!(outcome.new_state.interval().days(), 6);
    assert_eq!(outcome.new_state.ease_factor().value(), 1.3);
    assert_eq!(schedule.version(), 13);
}

#[test]
fn easy_beats_good_from_the_same_state() {
    let clock = ManualClock::new(day0());
    let policy = Sm2Policy::default();
    let mut good = fresh(&policy, &clock);
    let mut easy = good.clone();

    let good_outcome = review_when_due(&mut good, ReviewFeedback::Good, &policy, &clock);
    let easy_outcome = review_when_due(&mut easy, ReviewFeedback::Easy, &policy, &clock);

    assert!((easy_outcome.new_state.ease_factor().value() - 2.65).abs() < 1e-9);
    assert!(easy_outcome.new_state.interval() > good_outcome.new_state.interval());
}

#[test]
fn overdue_trigger_emits_every_time() {
    let clock = ManualClock::new(day0());
    let policy = Sm2Policy::default();
    let state = ReviewState::restore(
        ReviewInterval::new(3),
        EaseFactor::default(),
        2,
        Some(day0() - Duration::hours(50) - Duration::days(3)),
        day0() - Duration::hours(50),
    );
    let mut schedule = ReviewSchedule::restore(
        Uuid::new_v4(),
        "student-1".to_string(),
        "problem-1".to_string(),
        state.clone(),
        0,
        day0() - Duration::days(10),
        day0() - Duration::days(5),
        4,
    );

    assert!(schedule.trigger_overdue_notification(&clock, policy.config()));
    let first = schedule.drain_events();
    assert_eq!(first.len(), 1);
    let alert = first[0].as_notification().unwrap();
    assert_eq!(alert.kind, NotificationKind::Overdue);
    assert_eq!(alert.priority, NotificationPriority::Urgent);
    assert!((alert.overdue_hours.unwrap() - 50.0).abs() < 1e-6);

    assert!(schedule.trigger_overdue_notification(&clock, policy.config()));
    assert_eq!(schedule.drain_events().len(), 1);

    assert_eq!(schedule.review_state(), &state);
    assert_eq!(schedule.version(), 4);
}

#[test]
fn reminders_that_would_fire_in_the_past_are_skipped() {
    let mut config = SchedulingConfig::default();
    config.feedback.again_relearn_minutes = Some(20);
    let policy = Sm2Policy::new(config);
    let clock = ManualClock::new(day0());
    let mut schedule = fresh(&policy, &clock);

    let outcome = review_when_due(&mut schedule, ReviewFeedback::Again, &policy, &clock);

    assert_eq!(outcome.reminders_scheduled, 0);
    assert!(notifications(&schedule.drain_events()).is_empty());
    assert_eq!(
        schedule.review_state().next_review_at(),
        clock.now() + Duration::minutes(20)
    );
}

#[test]
fn routine_reminder_survives_when_early_one_is_past() {
    let mut config = SchedulingConfig::default();
    config.feedback.again_relearn_minutes = Some(45);
    let policy = Sm2Policy::new(config);
    let clock = ManualClock::new(day0());
    let mut schedule = fresh(&policy, &clock);

    review_when_due(&mut schedule, ReviewFeedback::Again, &policy, &clock);

    let events = schedule.drain_events();
    let planned = notifications(&events);
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].kind, NotificationKind::UpcomingReview);
    assert_eq!(planned[0].send_at, clock.now() + Duration::minutes(15));
}

#[test]
fn struggling_items_get_both_reminders() {
    let clock = ManualClock::new(day0());
    let policy = Sm2Policy::default();
    let mut schedule = fresh(&policy, &clock);

    review_when_due(&mut schedule, ReviewFeedback::Again, &policy, &clock);
    let events = schedule.drain_events();

    assert_eq!(events[0].event_type(), "REVIEW_COMPLETED");
    let kinds: Vec<_> = notifications(&events).iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NotificationKind::UpcomingReview, NotificationKind::EarlyReminder]);
}

#[test]
fn late_review_never_beats_on_time() {
    let policy = Sm2Policy::default();
    let clock = ManualClock::new(day0());
    let mut base = fresh(&policy, &clock);
    review_when_due(&mut base, ReviewFeedback::Good, &policy, &clock);
    review_when_due(&mut base, ReviewFeedback::Good, &policy, &clock);
    base.drain_events();

    let due = base.review_state().next_review_at();
    for feedback in ReviewFeedback::ALL {
        let mut on_time = base.clone();
        let mut late = base.clone();

        clock.set(due);
        let on_time = on_time
            .process_review_feedback(ReviewAttempt::new(feedback), &policy, &clock)
            .unwrap();
        clock.set(due + Duration::days(9));
        let late = late
            .process_review_feedback(ReviewAttempt::new(feedback), &policy, &clock)
            .unwrap();

        assert!(late.new_state.interval() <= on_time.new_state.interval(), "{feedback}");
        assert!(late.new_state.ease_factor() <= on_time.new_state.ease_factor(), "{feedback}");
    }
}

#[test]
fn excessive_response_time_is_rejected() {
    let clock = ManualClock::new(day0());
    let policy = Sm2Policy::default();
    let mut schedule = fresh(&policy, &clock);

    let attempt = ReviewAttempt::new(ReviewFeedback::Good).with_response_time(25 * 60 * 60 * 1000);
    let err = schedule
        .process_review_feedback(attempt, &policy, &clock)
        .unwrap_err();

    assert!(matches!(err, ScheduleError::InvalidArgument { name: "response_time_ms", .. }));
    assert_eq!(schedule.review_state().review_count(), 0);
    assert!(schedule.pending_events().is_empty());
}

#[test]
fn drained_events_are_handed_out_once() {
    let clock = ManualClock::new(day0());
    let policy = Sm2Policy::default();
    let mut schedule = ReviewSchedule::create("student-1", "problem-1", &policy, &clock).unwrap();
    review_when_due(&mut schedule, ReviewFeedback::Hard, &policy, &clock);

    let pending = schedule.pending_events().len();
    let drained = schedule.drain_events();
    assert_eq!(drained.len(), pending);
    assert_eq!(drained[0].event_type(), "REVIEW_SCHEDULED");
    assert_eq!(drained[1].event_type(), "REVIEW_COMPLETED");
    assert!(schedule.drain_events().is_empty());
}

// ============================================================================
// Service and scanner
// ============================================================================

#[test]
fn service_creates_once_per_pair() {
    let harness = Harness::new();

    let first = harness.service.schedule_item("student-1", "problem-1").unwrap();
    let again = harness.service.schedule_item("student-1", "problem-1").unwrap();

    assert_eq!(first.id(), again.id());
    assert_eq!(harness.schedules.len(), 1);
    assert_eq!(harness.sink.event_types(), vec!["REVIEW_SCHEDULED"]);
}

#[test]
fn feedback_is_saved_recorded_then_dispatched() {
    let harness = Harness::new();
    let schedule = harness.service.schedule_item("student-1", "problem-1").unwrap();
    harness.sink.clear();

    harness.clock.advance(Duration::days(1));
    let attempt = ReviewAttempt::from_answer(true, Some(2_000)).with_answer(serde_json::json!({"choice": "B"}));
    let receipt = harness.service.submit_feedback(schedule.id(), attempt).unwrap();

    assert_eq!(receipt.record.feedback(), ReviewFeedback::Easy);
    assert!(receipt.record.is_instant_response());
    assert_eq!(receipt.record.created_at(), harness.clock.now());
    assert_eq!(receipt.record.answer_content(), Some(&serde_json::json!({"choice": "B"})));
    assert!(receipt.record.is_correct());
    assert_eq!(receipt.record.response_time_ms(), Some(2_000));

    let stored = harness.schedules.find_by_id(schedule.id()).unwrap().unwrap();
    assert_eq!(stored.version(), 2);
    assert_eq!(stored.review_state(), &receipt.outcome.new_state);
    assert_eq!(harness.records.len(), 1);

    let types = harness.sink.event_types();
    assert_eq!(types[0], "REVIEW_COMPLETED");
    assert!(types[1..].iter().all(|t| *t == "REVIEW_NOTIFICATION_SCHEDULED"));
}

#[test]
fn refused_feedback_events_are_handed_back_for_redelivery() {
    let harness = Harness::new();
    let schedule = harness.service.schedule_item("student-1", "problem-1").unwrap();
    harness.sink.clear();
    harness.clock.advance(Duration::days(1));
    harness.sink.set_failing(true);

    let err = harness
        .service
        .submit_feedback(schedule.id(), ReviewAttempt::new(ReviewFeedback::Good).with_response_time(8_000))
        .unwrap_err();

    let events = match err {
        ServiceError::Undelivered { events, .. } => events,
        other => panic!("expected undelivered events, got {other:?}"),
    };
    assert_eq!(events[0].event_type(), "REVIEW_COMPLETED");
    assert!(events[1..].iter().all(|e| e.event_type() == "REVIEW_NOTIFICATION_SCHEDULED"));
    assert!(events.iter().all(|e| e.schedule_id() == schedule.id()));

    // The state change itself is committed.
    let stored = harness.schedules.find_by_id(schedule.id()).unwrap().unwrap();
    assert_eq!(stored.version(), 2);
    assert!(stored.pending_events().is_empty());
    assert_eq!(harness.records.len(), 1);
    assert!(harness.sink.events().is_empty());

    let refused = harness.service.redeliver(events.clone()).unwrap_err().into_undelivered().unwrap();
    assert_eq!(refused, events);

    harness.sink.set_failing(false);
    harness.service.redeliver(events.clone()).unwrap();
    assert_eq!(harness.sink.events(), events);
}

#[test]
fn refused_schedule_announcement_is_handed_back() {
    let harness = Harness::new();
    harness.sink.set_failing(true);

    let err = harness.service.schedule_item("student-1", "problem-1").unwrap_err();
    let events = err.into_undelivered().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type(), "REVIEW_SCHEDULED");

    let stored = harness.service.schedule_item("student-1", "problem-1");
    assert!(stored.is_ok());
    assert_eq!(harness.schedules.len(), 1);

    harness.sink.set_failing(false);
    harness.service.redeliver(events).unwrap();
    assert_eq!(harness.sink.event_types(), vec!["REVIEW_SCHEDULED"]);
    assert!(harness.service.redeliver(Vec::new()).is_ok());
}

#[test]
fn rejected_feedback_leaves_storage_untouched() {
    let harness = Harness::new();
    let schedule = harness.service.schedule_item("student-1", "problem-1").unwrap();
    harness.clock.advance(Duration::days(1));
    harness
        .service
        .submit_feedback(schedule.id(), ReviewAttempt::new(ReviewFeedback::Good))
        .unwrap();
    harness.sink.clear();

    harness.clock.set(day0());
    let err = harness
        .service
        .submit_feedback(schedule.id(), ReviewAttempt::new(ReviewFeedback::Good))
        .unwrap_err();

    assert!(matches!(err, ServiceError::Schedule(ScheduleError::ReviewBeforeLastReview { .. })));
    assert_eq!(harness.schedules.find_by_id(schedule.id()).unwrap().unwrap().version(), 2);
    assert_eq!(harness.records.len(), 1);
    assert!(harness.sink.events().is_empty());
}

#[test]
fn unknown_schedule_is_not_found() {
    let harness = Harness::new();
    let err = harness
        .service
        .submit_feedback(Uuid::new_v4(), ReviewAttempt::new(ReviewFeedback::Good))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Repository(RepositoryError::NotFound(_))));
}

#[test]
fn due_reviews_are_sorted_by_due_date() {
    let harness = Harness::new();
    let a = harness.service.schedule_item("student-1", "problem-a").unwrap();
    harness.clock.advance(Duration::hours(2));
    let b = harness.service.schedule_item("student-1", "problem-b").unwrap();
    harness.service.schedule_item("student-2", "problem-a").unwrap();

    assert!(harness.service.due_reviews("student-1").unwrap().is_empty());

    harness.clock.advance(Duration::days(1));
    let due: Vec<_> = harness
        .service
        .due_reviews("student-1")
        .unwrap()
        .iter()
        .map(ReviewSchedule::id)
        .collect();
    assert_eq!(due, vec![a.id(), b.id()]);

    let preview = harness.service.preview_intervals(a.id()).unwrap();
    assert_eq!(preview.map(ReviewInterval::days), [1, 1, 3, 4]);
}

#[test]
fn scanner_alerts_once_per_window() {
    let harness = Harness::new();
    let schedule = harness.service.schedule_item("student-1", "problem-1").unwrap();
    harness.service.schedule_item("student-1", "problem-2").unwrap();
    harness.sink.clear();

    let scanner = OverdueScanner::new(
        harness.schedules.clone(),
        harness.sink.clone(),
        harness.clock.clone(),
        harness.config.clone(),
        OverdueScanConfig::default(),
    );

    let quiet = scanner.scan().unwrap();
    assert_eq!(quiet.schedules_scanned, 2);
    assert_eq!(quiet.overdue_found, 0);

    harness.clock.set(schedule.review_state().next_review_at() + Duration::hours(30));
    let first = scanner.scan().unwrap();
    assert_eq!(first.overdue_found, 2);
    assert_eq!(first.alerts_sent, 2);

    harness.clock.advance(Duration::hours(2));
    let repeat = scanner.scan().unwrap();
    assert_eq!(repeat.alerts_sent, 0);
    assert_eq!(repeat.alerts_suppressed, 2);

    harness.clock.advance(Duration::hours(23));
    let renotified = scanner.scan().unwrap();
    assert_eq!(renotified.alerts_sent, 2);

    harness
        .service
        .submit_feedback(schedule.id(), ReviewAttempt::new(ReviewFeedback::Good))
        .unwrap();
    let after_review = scanner.scan().unwrap();
    assert_eq!(after_review.overdue_found, 1);
    assert_eq!(scanner.tracked_alerts(), 1);

    let overdue_alerts = harness
        .sink
        .events()
        .iter()
        .filter(|event| matches!(event.as_notification(), Some(n) if n.kind == NotificationKind::Overdue))
        .count();
    assert_eq!(overdue_alerts, 4);
}

#[test]
fn scanner_counts_dispatch_failures() {
    let harness = Harness::new();
    let schedule = harness.service.schedule_item("student-1", "problem-1").unwrap();
    harness.sink.set_failing(true);

    let scanner = OverdueScanner::new(
        harness.schedules.clone(),
        harness.sink.clone(),
        harness.clock.clone(),
        harness.config.clone(),
        OverdueScanConfig::default(),
    );
    harness.clock.set(schedule.review_state().next_review_at() + Duration::days(3));

    let stats = scanner.scan().unwrap();
    assert_eq!(stats.dispatch_failures, 1);
    assert_eq!(scanner.tracked_alerts(), 0);

    harness.sink.set_failing(false);
    assert_eq!(scanner.scan().unwrap().alerts_sent, 1);
}

// ============================================================================
// Event bus wiring
// ============================================================================

#[tokio::test]
async fn bus_delivers_service_events_to_student_subscribers() {
    let bus = Arc::new(EventBus::new());
    let clock = Arc::new(ManualClock::new(day0()));
    let service = ReviewService::new(
        Arc::new(danci_review::InMemoryScheduleRepository::new()),
        Arc::new(danci_review::InMemoryStudyRecordRepository::new()),
        bus.clone(),
        Arc::new(Sm2Policy::default()),
        clock.clone(),
    );

    let (_, mut mine) = bus.subscribe_student("student-1");
    let mut everything = bus.subscribe_global();

    service.schedule_item("student-2", "problem-1").unwrap();
    let schedule = service.schedule_item("student-1", "problem-1").unwrap();
    clock.advance(Duration::days(1));
    service
        .submit_feedback(schedule.id(), ReviewAttempt::new(ReviewFeedback::Good))
        .unwrap();

    let first = mine.recv().await.unwrap();
    assert_eq!(first.event.event_type(), "REVIEW_SCHEDULED");
    assert_eq!(first.event.schedule_id(), schedule.id());
    let second = mine.recv().await.unwrap();
    assert_eq!(second.event.event_type(), "REVIEW_COMPLETED");

    let other = everything.recv().await.unwrap();
    assert_eq!(other.event.student_id(), "student-2");
    assert!(bus.stats().total_events >= 3);
}
