//! Progress reporting for batch evaluation

use std::time::Instant;

/// Snapshot of batch progress after one pair finishes
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Pairs finished so far, successful or failed
    pub items_completed: usize,
    /// Pairs scheduled in this batch
    pub items_total: usize,
    /// Pairs that failed so far
    pub items_failed: usize,
    /// File name of the pair that just finished
    pub current_item_name: String,
    /// When the batch started
    pub started_at: Instant,
}

impl BatchProgress {
    /// Completion percentage (0-100)
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.items_total == 0 {
            return 100;
        }
        ((self.items_completed * 100) / self.items_total).min(100) as u8
    }

    /// Pairs per second since the batch started
    #[must_use]
    pub fn rate(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.items_completed as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Trait for reporting progress during batch evaluation
pub trait ProgressReporter: Send + Sync {
    /// Called once before the first pair with the number of scheduled pairs
    fn report_start(&self, total: usize);

    /// Called after every pair, in completion order
    fn report_progress(&self, update: &BatchProgress);

    /// Called when a pair fails
    fn report_error(&self, item: &str, error: &str);

    /// Called once after the last pair
    fn report_completion(&self, _update: &BatchProgress) {}
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_start(&self, _total: usize) {}

    fn report_progress(&self, _update: &BatchProgress) {}

    fn report_error(&self, _item: &str, _error: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let mut progress = BatchProgress {
            items_completed: 1,
            items_total: 4,
            items_failed: 0,
            current_item_name: "site_01_v1.png".to_string(),
            started_at: Instant::now(),
        };
        assert_eq!(progress.percentage(), 25);

        progress.items_total = 0;
        assert_eq!(progress.percentage(), 100);
        assert!(progress.rate() >= 0.0);
    }
}
