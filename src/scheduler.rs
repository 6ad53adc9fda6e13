//! Per-widget background refresh scheduling.
//!
//! Each widget owns a [`Refresher`]. The frame loop calls
//! [`Refresher::maybe_start_refresh`] every tick; it never blocks. A refresh
//! runs on its own thread and publishes a complete pixel buffer when it
//! succeeds, so the frame loop only ever sees whole frames.

use crate::error::WidgetError;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Refresh bookkeeping for one widget.
#[derive(Debug, Default)]
struct RefreshState {
    last_successful_refresh: Option<Instant>,
    in_flight: bool,
    has_rendered_once: bool,
    pixel_buffer: Option<Arc<[u8]>>,
}

/// Decides when a widget refreshes and holds its published pixel buffer.
pub struct Refresher {
    label: String,
    interval: Duration,
    state: Arc<Mutex<RefreshState>>,
}

impl Refresher {
    pub fn new(label: impl Into<String>, interval: Duration) -> Self {
        Self {
            label: label.into(),
            interval,
            state: Arc::new(Mutex::new(RefreshState::default())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start `job` on a new thread if the widget is due and nothing is in flight.
    ///
    /// Returns whether a refresh was started. The check and the in-flight mark
    /// happen under one lock, so two refreshes never overlap for one widget.
    pub fn maybe_start_refresh<F>(&self, now: Instant, job: F) -> bool
    where
        F: FnOnce() -> Result<Vec<u8>, WidgetError> + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if !Self::is_due(&state, self.interval, now) {
                return false;
            }
            state.in_flight = true;
        }

        let state = Arc::clone(&self.state);
        let label = self.label.clone();
        let spawned = thread::Builder::new()
            .name(format!("refresh-{}", self.label))
            .spawn(move || {
                let started = Instant::now();
                tracing::debug!(widget = %label, "refresh started");
                let result = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or(Err(WidgetError::Panicked));
                finish(&state, &label, started, result);
            });

        if let Err(e) = spawned {
            tracing::warn!(widget = %self.label, "failed to spawn refresh thread: {}", e);
            self.state.lock().in_flight = false;
            return false;
        }
        true
    }

    /// Whether the widget has completed at least one refresh and may be composited.
    pub fn should_render(&self) -> bool {
        self.state.lock().has_rendered_once
    }

    pub fn in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    #[cfg(test)]
    pub fn last_successful_refresh(&self) -> Option<Instant> {
        self.state.lock().last_successful_refresh
    }

    /// The most recently published buffer, if any.
    pub fn current_buffer(&self) -> Option<Arc<[u8]>> {
        self.state.lock().pixel_buffer.clone()
    }

    fn is_due(state: &RefreshState, interval: Duration, now: Instant) -> bool {
        if state.in_flight {
            return false;
        }
        match state.last_successful_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) > interval,
        }
    }
}

fn finish(state: &Mutex<RefreshState>, label: &str, started: Instant, result: Result<Vec<u8>, WidgetError>) {
    match result {
        Ok(bytes) => {
            let buffer: Arc<[u8]> = bytes.into();
            let mut state = state.lock();
            state.pixel_buffer = Some(buffer);
            state.last_successful_refresh = Some(Instant::now());
            state.has_rendered_once = true;
            state.in_flight = false;
            tracing::debug!(widget = %label, elapsed_ms = started.elapsed().as_millis() as u64, "refresh finished");
        }
        Err(e) => {
            state.lock().in_flight = false;
            tracing::warn!(widget = %label, "refresh failed: {}", e);
        }
    }
}
