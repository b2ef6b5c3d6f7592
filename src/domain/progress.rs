//! Progress reporting and cancellation.
//!
//! The pipeline is single-threaded by design; progress is a one-way
//! synchronous notification with no backpressure, so a host UI can stay
//! responsive during long stages. Cancellation is checked *between* stages
//! only; aborting mid-stage is not supported.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receiver for incremental progress notifications.
///
/// Invoked synchronously from the pipeline thread; implementations must not
/// block for long.
pub trait ProgressSink {
    fn report(&self, percent: f64, message: &str);
}

/// Discards all progress notifications.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _percent: f64, _message: &str) {}
}

/// Maps a stage's local 0..100 progress into a slice of the whole run.
pub struct StageProgress<'a> {
    inner: &'a dyn ProgressSink,
    lo: f64,
    hi: f64,
}

impl<'a> StageProgress<'a> {
    pub fn new(inner: &'a dyn ProgressSink, lo: f64, hi: f64) -> Self {
        Self { inner, lo, hi }
    }
}

impl ProgressSink for StageProgress<'_> {
    fn report(&self, percent: f64, message: &str) {
        let scaled = self.lo + (self.hi - self.lo) * (percent / 100.0).clamp(0.0, 1.0);
        self.inner.report(scaled, message);
    }
}

/// Cooperative cancellation flag, checked between pipeline stages.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    struct Capture(Mutex<Vec<f64>>);

    impl ProgressSink for Capture {
        fn report(&self, percent: f64, _message: &str) {
            self.0.lock().unwrap().push(percent);
        }
    }

    #[test]
    fn stage_progress_scales_into_its_slice() {
        let capture = Capture(Mutex::new(Vec::new()));
        let stage = StageProgress::new(&capture, 30.0, 70.0);
        stage.report(0.0, "start");
        stage.report(50.0, "half");
        stage.report(100.0, "done");
        assert_eq!(*capture.0.lock().unwrap(), vec![30.0, 50.0, 70.0]);
    }

    #[test]
    fn cancel_flag_round_trip() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
