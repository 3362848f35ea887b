//! Publish schedule

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("publish interval must be greater than zero")]
pub struct ZeroInterval;

/// Interval between publish attempts; never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    interval: Duration,
}

impl Schedule {
    pub fn new(interval: Duration) -> Result<Self, ZeroInterval> {
        if interval.is_zero() {
            return Err(ZeroInterval);
        }
        Ok(Self { interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_rejected() {
        assert_eq!(Schedule::new(Duration::ZERO), Err(ZeroInterval));
    }

    #[test]
    fn test_interval_kept() {
        let schedule = Schedule::new(Duration::from_millis(1)).unwrap();
        assert_eq!(schedule.interval(), Duration::from_millis(1));
        assert_eq!(Schedule::default().interval(), Duration::from_secs(30));
    }
}
