use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Receives periodic progress from an optimisation run.
///
/// t-SNE reports its KL divergence, UMAP the fuzzy cross-entropy of its
/// edge list.
pub trait ProgressReporter {
    fn report(&mut self, iteration: usize, cost: f64);
}

/// Discards every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _iteration: usize, _cost: f64) {}
}

/// Forwards reports to `tracing` at info level.
#[derive(Clone, Copy, Debug)]
pub struct LogProgress {
    pub algorithm: &'static str,
}

impl LogProgress {
    pub fn new(algorithm: &'static str) -> Self {
        Self { algorithm }
    }
}

impl ProgressReporter for LogProgress {
    fn report(&mut self, iteration: usize, cost: f64) {
        info!(algorithm = self.algorithm, iteration, cost, "optimisation progress");
    }
}

impl<F> ProgressReporter for F
where
    F: FnMut(usize, f64),
{
    fn report(&mut self, iteration: usize, cost: f64) {
        self(iteration, cost)
    }
}

/// Shared flag for stopping a run from another thread. Checked once per
/// iteration or epoch.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_receives_reports() {
        let mut seen = Vec::new();
        {
            let mut reporter = |iteration: usize, cost: f64| seen.push((iteration, cost));
            reporter.report(50, 1.5);
            reporter.report(100, 0.5);
        }
        assert_eq!(seen, vec![(50, 1.5), (100, 0.5)]);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());
    }
}
