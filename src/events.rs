use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Events emitted while acquiring a worker from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionEvent {
    /// No worker became available before the acquire timeout elapsed.
    Timeout { timeout: Duration },
    /// A worker was acquired, but only after the configured threshold.
    ThresholdExceeded {
        elapsed: Duration,
        threshold: Duration,
    },
}

/// Observer of worker acquisition latency.
///
/// Listeners are notified before the acquire returns to its caller. Panics
/// inside a listener are isolated and logged, never surfaced.
pub trait AcquisitionListener: Send + Sync {
    fn on_acquisition_event(&self, event: &AcquisitionEvent);
}

/// Default listener that reports events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl AcquisitionListener for LoggingListener {
    fn on_acquisition_event(&self, event: &AcquisitionEvent) {
        match event {
            AcquisitionEvent::Timeout { timeout } => {
                tracing::error!(?timeout, "timed out waiting for a database worker");
            }
            AcquisitionEvent::ThresholdExceeded { elapsed, threshold } => {
                tracing::warn!(
                    ?elapsed,
                    ?threshold,
                    "database worker acquisition exceeded the configured threshold"
                );
            }
        }
    }
}

pub(crate) fn notify_all(listeners: &[Arc<dyn AcquisitionListener>], event: &AcquisitionEvent) {
    for listener in listeners {
        let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_acquisition_event(event)));
        if outcome.is_err() {
            tracing::warn!(?event, "acquisition listener panicked; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickyListener;

    impl AcquisitionListener for PanickyListener {
        fn on_acquisition_event(&self, _event: &AcquisitionEvent) {
            panic!("listener bug");
        }
    }

    struct Recording(std::sync::Mutex<Vec<AcquisitionEvent>>);

    impl AcquisitionListener for Recording {
        fn on_acquisition_event(&self, event: &AcquisitionEvent) {
            self.0.lock().unwrap().push(*event);
        }
    }

    #[test]
    fn a_panicking_listener_does_not_stop_the_others() {
        let recording = Arc::new(Recording(std::sync::Mutex::new(Vec::new())));
        let listeners: Vec<Arc<dyn AcquisitionListener>> = vec![
            Arc::new(PanickyListener),
            Arc::clone(&recording) as Arc<dyn AcquisitionListener>,
        ];
        let event = AcquisitionEvent::Timeout {
            timeout: Duration::from_millis(5),
        };
        notify_all(&listeners, &event);
        assert_eq!(recording.0.lock().unwrap().as_slice(), &[event]);
    }
}
