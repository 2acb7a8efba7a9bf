use std::time::{Duration, Instant};

/// Port for time, so retry budgets can be driven deterministically
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}
