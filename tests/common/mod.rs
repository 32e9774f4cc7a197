#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use danci_review::{
    EventSink, InMemoryScheduleRepository, InMemoryStudyRecordRepository, ManualClock, ReviewEvent,
    ReviewService, SchedulingConfig, SinkError, Sm2Policy,
};

pub fn day0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 7, 9, 0, 0).unwrap()
}

/// Sink that keeps everything it is handed, optionally refusing deliveries.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ReviewEvent>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ReviewEvent> {
        self.events.lock().clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(ReviewEvent::event_type).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, events: Vec<ReviewEvent>) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("sink offline".to_string()));
        }
        self.events.lock().extend(events);
        Ok(())
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub schedules: Arc<InMemoryScheduleRepository>,
    pub records: Arc<InMemoryStudyRecordRepository>,
    pub sink: Arc<RecordingSink>,
    pub config: SchedulingConfig,
    pub service: ReviewService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SchedulingConfig::default())
    }

    pub fn with_config(config: SchedulingConfig) -> Self {
        let clock = Arc::new(ManualClock::new(day0()));
        let schedules = Arc::new(InMemoryScheduleRepository::new());
        let records = Arc::new(InMemoryStudyRecordRepository::new());
        let sink = Arc::new(RecordingSink::default());
        let service = ReviewService::new(
            schedules.clone(),
            records.clone(),
            sink.clone(),
            Arc::new(Sm2Policy::new(config.clone())),
            clock.clone(),
        );
        Self {
            clock,
            schedules,
            records,
            sink,
            config,
            service,
        }
    }
}
