use std::time::{Duration, Instant};

use log::{debug, warn};

/// Logs how long a scope took when it goes out of scope.
pub struct FunctionTimer {
    name: &'static str,
    start: Instant,
    budget: Option<Duration>,
}

impl FunctionTimer {
    pub fn new(name: &'static str) -> Self {
        FunctionTimer {
            name,
            start: Instant::now(),
            budget: None,
        }
    }

    /// Same, but warns when the scope overruns `budget`
    pub fn with_budget(name: &'static str, budget: Duration) -> Self {
        FunctionTimer {
            name,
            start: Instant::now(),
            budget: Some(budget),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

// This `Drop` implementation is called automatically when the `FunctionTimer` struct goes out of scope.
impl Drop for FunctionTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        match self.budget {
            Some(budget) if duration > budget => {
                warn!("'{}' took {:?}, over its {:?} budget", self.name, duration, budget)
            }
            _ => debug!("'{}' took: {:?}", self.name, duration),
        }
    }
}
