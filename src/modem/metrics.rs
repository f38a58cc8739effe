use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::Instant;

/// Communication counters and timings, since boot or the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Metrics {
    pub attach_count: u32,
    pub attach_fail_count: u32,
    /// Total time spent attaching.
    pub attach_duration_ms: u32,
    pub attach_last_ts: Option<Instant>,
    pub attach_last_duration_ms: u32,

    pub uplink_count: u32,
    pub uplink_bytes: u32,
    pub uplink_errors: u32,
    pub uplink_last_ts: Option<Instant>,

    pub downlink_count: u32,
    pub downlink_bytes: u32,
    pub downlink_errors: u32,
    pub downlink_last_ts: Option<Instant>,

    /// Total time the radio spent in RRC connected mode.
    pub cscon_1_duration_ms: u32,
    pub cscon_1_last_duration_ms: u32,
}

impl Metrics {
    pub const EMPTY: Metrics = Metrics {
        attach_count: 0,
        attach_fail_count: 0,
        attach_duration_ms: 0,
        attach_last_ts: None,
        attach_last_duration_ms: 0,
        uplink_count: 0,
        uplink_bytes: 0,
        uplink_errors: 0,
        uplink_last_ts: None,
        downlink_count: 0,
        downlink_bytes: 0,
        downlink_errors: 0,
        downlink_last_ts: None,
        cscon_1_duration_ms: 0,
        cscon_1_last_duration_ms: 0,
    };
}

struct Tracker {
    metrics: Metrics,
    attach_start: Option<Instant>,
    cscon_1_start: Option<Instant>,
}

fn elapsed_ms(start: Option<Instant>, now: Instant) -> u32 {
    start
        .and_then(|start| now.checked_duration_since(start))
        .map(|d| d.as_millis().min(u64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}

pub struct MetricsStore {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Tracker>>,
}

impl MetricsStore {
    pub const fn new() -> Self {
        MetricsStore {
            inner: Mutex::new(RefCell::new(Tracker {
                metrics: Metrics::EMPTY,
                attach_start: None,
                cscon_1_start: None,
            })),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Tracker)) {
        self.inner.lock(|t| f(&mut t.borrow_mut()))
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner.lock(|t| t.borrow().metrics)
    }

    pub fn reset(&self) {
        self.update(|t| t.metrics = Metrics::EMPTY);
    }

    pub fn attach_started(&self, now: Instant) {
        self.update(|t| {
            t.attach_start = Some(now);
            t.metrics.attach_count = t.metrics.attach_count.saturating_add(1);
            t.metrics.attach_last_ts = Some(now);
        });
    }

    /// Close the running attach, counting it as failed unless `success`.
    pub fn attach_finished(&self, success: bool, now: Instant) {
        self.update(|t| {
            let duration = elapsed_ms(t.attach_start.take(), now);
            if !success {
                t.metrics.attach_fail_count = t.metrics.attach_fail_count.saturating_add(1);
            }
            t.metrics.attach_last_duration_ms = duration;
            t.metrics.attach_duration_ms = t.metrics.attach_duration_ms.saturating_add(duration);
        });
    }

    pub fn uplink(&self, bytes: usize, now: Instant) {
        self.update(|t| {
            t.metrics.uplink_count = t.metrics.uplink_count.saturating_add(1);
            t.metrics.uplink_bytes = t.metrics.uplink_bytes.saturating_add(bytes as u32);
            t.metrics.uplink_last_ts = Some(now);
        });
    }

    pub fn uplink_error(&self) {
        self.update(|t| t.metrics.uplink_errors = t.metrics.uplink_errors.saturating_add(1));
    }

    pub fn downlink(&self, now: Instant) {
        self.update(|t| {
            t.metrics.downlink_count = t.metrics.downlink_count.saturating_add(1);
            t.metrics.downlink_last_ts = Some(now);
        });
    }

    pub fn downlink_bytes(&self, bytes: usize) {
        self.update(|t| {
            t.metrics.downlink_bytes = t.metrics.downlink_bytes.saturating_add(bytes as u32)
        });
    }

    pub fn downlink_error(&self) {
        self.update(|t| t.metrics.downlink_errors = t.metrics.downlink_errors.saturating_add(1));
    }

    pub fn cscon(&self, connected: bool, now: Instant) {
        self.update(|t| {
            if connected {
                t.cscon_1_start = Some(now);
            } else if let Some(start) = t.cscon_1_start.take() {
                let duration = elapsed_ms(Some(start), now);
                t.metrics.cscon_1_last_duration_ms = duration;
                t.metrics.cscon_1_duration_ms =
                    t.metrics.cscon_1_duration_ms.saturating_add(duration);
            }
        });
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}
