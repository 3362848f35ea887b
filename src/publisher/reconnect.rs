//! Reconnect attempt budget and backoff schedule
//!
//! The default policy makes exactly one immediate attempt. Longer schedules
//! are expressed as an explicit delay pattern, e.g. `[500, 1000, 2000, 4000]`
//! for doubling backoff, followed by a sustained delay.

use std::time::Duration;

/// Reconnection policy
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts per lost connection (at least 1)
    pub max_attempts: u32,
    /// Delay in milliseconds before each attempt, indexed by attempt number
    pub backoff_pattern: Vec<u64>,
    /// Delay to use after pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_pattern: Vec::new(),
            sustained_delay: 0,
        }
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay: Duration },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
    /// Abort reconnection - max attempts exceeded
    AbortMaxAttemptsExceeded,
}

impl ReconnectPolicy {
    /// Single immediate attempt
    pub fn single_attempt() -> Self {
        Self::default()
    }

    /// Backoff delay before the given attempt (1-based)
    pub fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        let index = attempt.saturating_sub(1) as usize;
        self.backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay)
    }

    /// Sum of all backoff delays across the attempt budget
    pub fn calculate_max_total_time(&self) -> u64 {
        (1..=self.max_attempts)
            .map(|attempt| self.calculate_backoff_delay(attempt))
            .sum()
    }

    /// Determine if another attempt should be made (pure function)
    pub fn decide(&self, attempts_made: u32, shutdown_requested: bool) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        if attempts_made >= self.max_attempts {
            return ReconnectionDecision::AbortMaxAttemptsExceeded;
        }

        let attempt = attempts_made + 1;
        ReconnectionDecision::Proceed {
            attempt,
            delay: Duration::from_millis(self.calculate_backoff_delay(attempt)),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        Ok(())
    }
}
