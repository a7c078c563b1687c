//! Processing-time statistics for the hook callback.

use std::fmt;
use std::time::Duration;

/// Samples collected before a summary is produced.
pub const TIMING_BUFFER_SIZE: usize = 1000;

/// Aggregate over one full buffer of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSummary {
    pub average: Duration,
    pub max: Duration,
    pub samples: usize,
}

impl fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Average hook processing time: {:.4} ms, max: {:.4} ms over {} samples.",
            self.average.as_secs_f64() * 1000.0,
            self.max.as_secs_f64() * 1000.0,
            self.samples
        )
    }
}

/// Fixed-capacity sample buffer; allocation happens once, up front.
#[derive(Debug)]
pub struct HookTimings {
    samples: Vec<Duration>,
    capacity: usize,
}

impl Default for HookTimings {
    fn default() -> Self {
        Self::with_capacity(TIMING_BUFFER_SIZE)
    }
}

impl HookTimings {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds a sample; returns a summary and clears the buffer once it is full.
    #[inline]
    pub fn record(&mut self, elapsed: Duration) -> Option<TimingSummary> {
        self.samples.push(elapsed);
        if self.samples.len() < self.capacity {
            return None;
        }

        let total: Duration = self.samples.iter().sum();
        let max = self.samples.iter().copied().max().unwrap_or_default();
        let summary = TimingSummary {
            average: total / self.samples.len() as u32,
            max,
            samples: self.samples.len(),
        };
        self.samples.clear();
        Some(summary)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
