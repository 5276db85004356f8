//! Coarse progress notifications for long sampling runs.

/// Calls `callback(fraction)` each time another `step` of the target has been
/// accepted. Purely observational: it never sees rejected draws and has no way
/// to influence sampling.
pub struct ProgressTracker<F: FnMut(f64)> {
    target: u64,
    every: u64,
    next: u64,
    callback: F,
}

impl<F: FnMut(f64)> ProgressTracker<F> {
    /// `step` is a fraction of the target in `(0, 1]` (0.1 = every 10%).
    pub fn new(target: u64, step: f64, callback: F) -> Self {
        let every = ((target as f64 * step).round() as u64).max(1);
        Self {
            target,
            every,
            next: every,
            callback,
        }
    }

    /// Report the current accepted count.
    pub fn update(&mut self, accepted: u64) {
        while self.next <= accepted && self.next <= self.target {
            (self.callback)(self.next as f64 / self.target as f64);
            self.next += self.every;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_every_ten_percent() {
        let mut seen = Vec::new();
        {
            let mut tracker = ProgressTracker::new(1000, 0.1, |f| seen.push(f));
            for n in 1..=1000 {
                tracker.update(n);
            }
        }
        assert_eq!(seen.len(), 10);
        assert!((seen[0] - 0.1).abs() < 1e-12);
        assert!((seen[9] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn small_targets_still_progress() {
        let mut count = 0;
        {
            let mut tracker = ProgressTracker::new(5, 0.01, |_| count += 1);
            for n in 1..=5 {
                tracker.update(n);
            }
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn skipped_updates_catch_up() {
        let mut seen = Vec::new();
        {
            let mut tracker = ProgressTracker::new(100, 0.25, |f| seen.push(f));
            tracker.update(60);
            tracker.update(100);
        }
        assert_eq!(seen, vec![0.25, 0.5, 0.75, 1.0]);
    }
}
