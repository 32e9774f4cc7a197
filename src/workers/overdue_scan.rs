use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::SchedulingConfig;
use crate::core::{Clock, EventSink};
use crate::review::ReviewEvent;
use crate::services::ServiceError;
use crate::services::ScheduleRepository;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverdueScanConfig {
    /// Minimum gap between two alerts for the same schedule.
    pub renotify_after_hours: i64,
}

impl Default for OverdueScanConfig {
    fn default() -> Self {
        Self {
            renotify_after_hours: 24,
        }
    }
}

impl OverdueScanConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(hours) = std::env::var("REVIEW_RENOTIFY_AFTER_HOURS")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|hours| *hours >= 0)
        {
            config.renotify_after_hours = hours;
        }
        config
    }

    fn window(&self) -> Duration {
        Duration::try_hours(self.renotify_after_hours.max(0)).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub schedules_scanned: usize,
    pub overdue_found: usize,
    pub alerts_sent: usize,
    pub alerts_suppressed: usize,
    pub dispatch_failures: usize,
    pub duration_secs: f64,
}

/// Periodic pass raising overdue alerts.
///
/// The aggregate emits an alert on every trigger; this scanner remembers the
/// last alert per schedule and stays quiet until the renotify window passes.
pub struct OverdueScanner {
    schedules: Arc<dyn ScheduleRepository>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
    scan_config: OverdueScanConfig,
    last_alerted: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl OverdueScanner {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
        scan_config: OverdueScanConfig,
    ) -> Self {
        Self {
            schedules,
            sink,
            clock,
            config,
            scan_config,
            last_alerted: Mutex::new(HashMap::new()),
        }
    }

    pub fn scan(&self) -> Result<ScanStats, ServiceError> {
        let start = Instant::now();
        info!("Starting overdue review scan");

        let clock = &*self.clock;
        let now = clock.now();
        let window = self.scan_config.window();
        let mut stats = ScanStats::default();

        let schedules = self.schedules.find_all()?;
        stats.schedules_scanned = schedules.len();

        let mut ledger = self.last_alerted.lock();
        for mut schedule in schedules {
            let id = schedule.id();
            if !schedule.is_overdue(clock, &self.config) {
                ledger.remove(&id);
                continue;
            }
            stats.overdue_found += 1;

            if let Some(last) = ledger.get(&id) {
                if now - *last < window {
                    stats.alerts_suppressed += 1;
                    continue;
                }
            }

            if !schedule.trigger_overdue_notification(clock, &self.config) {
                continue;
            }

            let events = schedule.drain_events();
            let (kind, priority) = events
                .iter()
                .find_map(ReviewEvent::as_notification)
                .map_or(("", ""), |alert| (alert.kind.as_str(), alert.priority.as_str()));

            match self.sink.publish(events) {
                Ok(()) => {
                    ledger.insert(id, now);
                    stats.alerts_sent += 1;
                    debug!(
                        schedule_id = %id,
                        student_id = schedule.student_id(),
                        overdue_hours = format!("{:.1}", schedule.overdue_hours(clock)),
                        kind,
                        priority,
                        "Overdue alert sent"
                    );
                }
                Err(e) => {
                    stats.dispatch_failures += 1;
                    error!(schedule_id = %id, kind, error = %e, "Failed to dispatch overdue alert");
                }
            }
        }
        drop(ledger);

        stats.duration_secs = start.elapsed().as_secs_f64();

        info!(
            schedules_scanned = stats.schedules_scanned,
            overdue_found = stats.overdue_found,
            alerts_sent = stats.alerts_sent,
            alerts_suppressed = stats.alerts_suppressed,
            dispatch_failures = stats.dispatch_failures,
            duration_secs = format!("{:.2}", stats.duration_secs),
            "Overdue review scan completed"
        );

        Ok(stats)
    }

    /// Schedules currently inside their renotify window.
    pub fn tracked_alerts(&self) -> usize {
        self.last_alerted.lock().len()
    }
}
