use std::time::Duration;

use crate::domain::errors::{DomainError, Result};

/// Fixed-interval retry budget for connecting to a stream source
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRetryPolicy {
    interval: Duration,
    budget: Duration,
}

impl ConnectRetryPolicy {
    pub fn new(interval: Duration, budget: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(DomainError::InvalidRetryPolicy(
                "retry interval cannot be zero".to_string(),
            ));
        }
        if budget.is_zero() {
            return Err(DomainError::InvalidRetryPolicy(
                "connect budget cannot be zero".to_string(),
            ));
        }
        if interval > budget {
            return Err(DomainError::InvalidRetryPolicy(format!(
                "retry interval ({:?}) exceeds connect budget ({:?})",
                interval, budget
            )));
        }

        Ok(Self { interval, budget })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Whether another attempt may start once `elapsed` has passed since the first one
    pub fn allows_attempt(&self, elapsed: Duration) -> bool {
        elapsed < self.budget
    }
}

impl Default for ConnectRetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            budget: Duration::from_secs(10),
        }
    }
}
