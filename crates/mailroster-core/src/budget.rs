//! Cooperative wall-clock budgets.
//!
//! Nothing is preempted. The scanner asks [`Budget::exhausted`] before every
//! page fetch, after every group and after every page, and returns cleanly
//! when the answer is yes.

use std::time::{Duration, Instant};

pub trait Budget {
    fn exhausted(&self) -> bool;
}

/// A deadline measured from the moment it was started.
///
/// The safety margin is subtracted from the limit so a run stops early
/// enough to save its checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
    margin: Duration,
}

impl Deadline {
    pub fn start(limit: Duration, margin: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
            margin,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the deadline (margin included).
    pub fn remaining(&self) -> Duration {
        self.limit
            .saturating_sub(self.margin)
            .saturating_sub(self.elapsed())
    }
}

impl Budget for Deadline {
    fn exhausted(&self) -> bool {
        self.elapsed() + self.margin >= self.limit
    }
}

/// A budget that never runs out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl Budget for Unlimited {
    fn exhausted(&self) -> bool {
        false
    }
}
