//! Attach retry policies and the error state backoff.

use core::{fmt, str::FromStr};

use embassy_time::Duration;

use crate::config::ConfigError;

/// How long to wait before an attach attempt, and how long the attempt may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttachTimeout {
    pub retry_delay: Duration,
    pub attach_timeout: Duration,
}

impl AttachTimeout {
    pub const fn new(attach_timeout: Duration, retry_delay: Duration) -> Self {
        AttachTimeout {
            retry_delay,
            attach_timeout,
        }
    }
}

/// Maps an attach attempt number (starting at 0) to its timeouts.
///
/// Implementations must be pure functions of `attempt`.
pub trait AttachStrategy: Sync {
    fn timeout(&self, attempt: u32) -> AttachTimeout;
}

const fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

const fn hours(h: u64) -> Duration {
    Duration::from_secs(h * 3600)
}

const ZERO: Duration = Duration::from_ticks(0);

const PROGRESSIVE: [AttachTimeout; 9] = [
    AttachTimeout::new(minutes(5), ZERO),
    AttachTimeout::new(minutes(5), ZERO),
    AttachTimeout::new(minutes(50), hours(1)),
    AttachTimeout::new(minutes(5), minutes(5)),
    AttachTimeout::new(minutes(45), hours(6)),
    AttachTimeout::new(minutes(5), minutes(5)),
    AttachTimeout::new(minutes(45), hours(24)),
    AttachTimeout::new(minutes(5), minutes(5)),
    AttachTimeout::new(minutes(45), hours(168)),
];

#[derive(Clone, Copy, Default)]
pub enum AttachPolicy {
    /// Retry immediately, forever.
    Aggressive,
    /// Two short attempts, one long attempt, then pause.
    Periodic { pause: Duration },
    /// Increasingly long pauses, up to a week.
    #[default]
    Progressive,
    Custom(&'static dyn AttachStrategy),
}

impl AttachPolicy {
    pub const PERIODIC_2H: AttachPolicy = AttachPolicy::Periodic { pause: hours(1) };
    pub const PERIODIC_6H: AttachPolicy = AttachPolicy::Periodic { pause: hours(5) };
    pub const PERIODIC_12H: AttachPolicy = AttachPolicy::Periodic { pause: hours(11) };
    pub const PERIODIC_1D: AttachPolicy = AttachPolicy::Periodic { pause: hours(23) };

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachPolicy::Aggressive => "aggressive",
            AttachPolicy::Periodic { pause } if *pause == hours(1) => "periodic-2h",
            AttachPolicy::Periodic { pause } if *pause == hours(5) => "periodic-6h",
            AttachPolicy::Periodic { pause } if *pause == hours(11) => "periodic-12h",
            AttachPolicy::Periodic { pause } if *pause == hours(23) => "periodic-1d",
            AttachPolicy::Periodic { .. } => "periodic",
            AttachPolicy::Progressive => "progressive",
            AttachPolicy::Custom(_) => "custom",
        }
    }
}

impl AttachStrategy for AttachPolicy {
    fn timeout(&self, attempt: u32) -> AttachTimeout {
        match self {
            AttachPolicy::Aggressive => AttachTimeout::new(minutes(5), ZERO),
            AttachPolicy::Periodic { pause } => match attempt % 3 {
                0 | 1 => AttachTimeout::new(minutes(5), ZERO),
                _ => AttachTimeout::new(minutes(50), *pause),
            },
            AttachPolicy::Progressive => match PROGRESSIVE.get(attempt as usize) {
                Some(timeout) => *timeout,
                // odd attempts are short and followed by a short pause, even attempts are
                // long and followed by a week
                None if attempt % 2 == 1 => AttachTimeout::new(minutes(5), minutes(5)),
                None => AttachTimeout::new(minutes(45), hours(168)),
            },
            AttachPolicy::Custom(strategy) => strategy.timeout(attempt),
        }
    }
}

impl fmt::Debug for AttachPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AttachPolicy {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}

impl FromStr for AttachPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "aggressive" => AttachPolicy::Aggressive,
            "periodic-2h" => AttachPolicy::PERIODIC_2H,
            "periodic-6h" => AttachPolicy::PERIODIC_6H,
            "periodic-12h" => AttachPolicy::PERIODIC_12H,
            "periodic-1d" => AttachPolicy::PERIODIC_1D,
            "progressive" => AttachPolicy::Progressive,
            _ => return Err(ConfigError::InvalidAttachPolicy),
        })
    }
}

/// Wait in the error state after `failures` consecutive failures: 10 s per failure, at most
/// 10 minutes.
pub fn error_backoff(failures: u32) -> Duration {
    Duration::from_secs(u64::from(failures).saturating_mul(10).min(600))
}
