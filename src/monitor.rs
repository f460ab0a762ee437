//! Request metrics behind an injectable [`Monitor`].
//!
//! The pipeline counts requests and errors and times every request twice:
//! once overall and once per URL. Timers are [`Timer`] guards, so a timer
//! is stopped exactly once whichever way the request ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Counter: every request entering the pipeline.
pub const REQUEST: &str = "ssr.request";
/// Counter prefix: requests per normalized URL (`ssr.request:/users`).
pub const URL_REQUEST: &str = "ssr.request:";
/// Timer: overall request duration.
pub const TIME: &str = "ssr.time";
/// Timer prefix: request duration per normalized URL.
pub const URL_TIME: &str = "ssr.time:";
/// Counter: render failures offered to the error handler.
pub const ERROR_HANDLED: &str = "ssr.error.handled";
/// Counter: failures that reached the outer error boundary.
pub const ERROR: &str = "ssr.error";

/// Sink for request counters and timers.
///
/// Shared by every in-flight request, so implementations must tolerate
/// concurrent calls.
pub trait Monitor: Send + Sync + 'static {
    fn increment(&self, name: &str);

    /// Start timer `name`. The measurement ends when the returned
    /// [`Timer`] is stopped or dropped.
    fn started(&self, name: &str) -> Timer;
}

impl<M: Monitor> Monitor for Arc<M> {
    fn increment(&self, name: &str) {
        (**self).increment(name);
    }

    fn started(&self, name: &str) -> Timer {
        (**self).started(name)
    }
}

type StopFn = Box<dyn FnOnce(Duration) + Send + 'static>;

/// A running timer. Stops on [`Timer::stop`] or on drop, never twice.
#[must_use = "dropping a Timer stops it immediately"]
pub struct Timer {
    started: Instant,
    on_stop: Option<StopFn>,
}

impl Timer {
    pub fn new(on_stop: impl FnOnce(Duration) + Send + 'static) -> Self {
        Self { started: Instant::now(), on_stop: Some(Box::new(on_stop)) }
    }

    /// A timer that records nothing.
    pub fn disabled() -> Self {
        Self { started: Instant::now(), on_stop: None }
    }

    pub fn stop(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(on_stop) = self.on_stop.take() {
            on_stop(self.started.elapsed());
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Forwards to the global [`metrics`] recorder: counters via `counter!`,
/// timers as `histogram!` samples in seconds. With no recorder installed
/// every call is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsMonitor;

impl Monitor for MetricsMonitor {
    fn increment(&self, name: &str) {
        counter!(name.to_owned()).increment(1);
    }

    fn started(&self, name: &str) -> Timer {
        let histogram = histogram!(name.to_owned());
        Timer::new(move |elapsed| histogram.record(elapsed.as_secs_f64()))
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {
    fn increment(&self, _name: &str) {}

    fn started(&self, _name: &str) -> Timer {
        Timer::disabled()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    use super::*;

    #[test]
    fn timer_stops_once_on_explicit_stop() {
        let stops = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&stops);
        let timer = Timer::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        timer.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timer_stops_on_drop() {
        let stops = Arc::new(AtomicUsize::new(0));
        {
            let counted = Arc::clone(&stops);
            let _timer = Timer::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn metrics_monitor_feeds_the_recorder() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let monitor = MetricsMonitor;
            monitor.increment(REQUEST);
            monitor.increment(REQUEST);
            monitor.started(TIME).stop();
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let requests = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == REQUEST)
            .map(|(_, _, _, value)| value);
        assert!(matches!(requests, Some(DebugValue::Counter(2))));

        let timings = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == TIME)
            .map(|(_, _, _, value)| value);
        assert!(matches!(timings, Some(DebugValue::Histogram(samples)) if samples.len() == 1));
    }
}
