//! Request Gate: the process-wide throttle in front of the remote API.
//!
//! At most one ticket exists at a time, and a new ticket is only handed out
//! once `min_interval` has passed since the previous one was released.

use serde::Serialize;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use adsync_types::models::GateConfig;

use crate::metrics::record_gate_wait;
use crate::remote::AdServerApi;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Request gate not acquired within {waited_ms}ms")]
    Timeout { waited_ms: u64 },
}

/// Snapshot for the queue-status endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GateStatus {
    pub can_make_request: bool,
    /// Milliseconds since the last release; `None` before the first request.
    pub time_since_last_request: Option<u64>,
    pub next_request_in: u64,
    pub queue_depth: usize,
    pub in_flight: bool,
}

pub struct RequestGate {
    api: Arc<dyn AdServerApi>,
    slot: Mutex<()>,
    last_release: parking_lot::Mutex<Option<Instant>>,
    waiting: AtomicUsize,
    in_flight: AtomicBool,
    min_interval: Duration,
    max_wait: Duration,
}

/// Exclusive right to issue one remote call. Dropping it is the release.
pub struct GateTicket<'a> {
    gate: &'a RequestGate,
    _slot: MutexGuard<'a, ()>,
}

struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl RequestGate {
    pub fn new(api: Arc<dyn AdServerApi>, config: &GateConfig) -> Self {
        Self::with_timing(api, config.min_interval(), config.max_wait())
    }

    pub fn with_timing(api: Arc<dyn AdServerApi>, min_interval: Duration, max_wait: Duration) -> Self {
        Self {
            api,
            slot: Mutex::new(()),
            last_release: parking_lot::Mutex::new(None),
            waiting: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
            min_interval,
            max_wait,
        }
    }

    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the slot and the spacing interval, bounded by `max_wait`.
    pub async fn acquire(&self) -> Result<GateTicket<'_>, GateError> {
        let started = Instant::now();
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let waiting = WaitingGuard(&self.waiting);

        let acquired = tokio::time::timeout(self.max_wait, async {
            let slot = self.slot.lock().await;
            let ready_at = (*self.last_release.lock()).map(|t| t + self.min_interval);
            if let Some(ready_at) = ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
            slot
        })
        .await;
        drop(waiting);

        let waited = started.elapsed();
        record_gate_wait(waited);
        match acquired {
            Ok(slot) => {
                self.in_flight.store(true, Ordering::SeqCst);
                tracing::trace!(waited_ms = millis(waited), "Request gate acquired");
                Ok(GateTicket { gate: self, _slot: slot })
            },
            Err(_) => {
                tracing::warn!(
                    waited_ms = millis(waited),
                    queue_depth = self.queue_depth(),
                    "Request gate wait exceeded bound"
                );
                Err(GateError::Timeout { waited_ms: millis(waited) })
            },
        }
    }

    fn release(&self) {
        *self.last_release.lock() = Some(Instant::now());
        self.in_flight.store(false, Ordering::SeqCst);
    }

    pub fn queue_depth(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> GateStatus {
        let now = Instant::now();
        let last = *self.last_release.lock();
        let time_since = last.map(|t| now.saturating_duration_since(t));
        let next_request_in =
            time_since.map_or(Duration::ZERO, |since| self.min_interval.saturating_sub(since));
        let in_flight = self.in_flight.load(Ordering::SeqCst);
        let queue_depth = self.queue_depth();

        GateStatus {
            can_make_request: !in_flight && queue_depth == 0 && next_request_in.is_zero(),
            time_since_last_request: time_since.map(millis),
            next_request_in: millis(next_request_in),
            queue_depth,
            in_flight,
        }
    }
}

impl Deref for GateTicket<'_> {
    type Target = dyn AdServerApi;

    fn deref(&self) -> &Self::Target {
        self.gate.api.as_ref()
    }
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::FakeAdServer;

    fn gate(min_ms: u64, max_wait_secs: u64) -> Arc<RequestGate> {
        Arc::new(RequestGate::with_timing(
            Arc::new(FakeAdServer::new()),
            Duration::from_millis(min_ms),
            Duration::from_secs(max_wait_secs),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_acquisitions_take_four_intervals() {
        let gate = gate(5_000, 300);
        let started = Instant::now();
        for _ in 0..5 {
            let ticket = gate.acquire().await.unwrap();
            drop(ticket);
        }
        assert!(started.elapsed() >= Duration::from_millis(4 * 5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_spaced() {
        let gate = gate(5_000, 300);
        let starts = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            let starts = Arc::clone(&starts);
            handles.push(tokio::spawn(async move {
                let _ticket = gate.acquire().await.unwrap();
                starts.lock().push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut starts = starts.lock().clone();
        starts.sort();
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(5_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_error() {
        let gate = gate(5_000, 1);
        let _held = gate.acquire().await.unwrap();

        let err = gate.acquire().await.err().unwrap();
        let GateError::Timeout { waited_ms } = err;
        assert!(waited_ms >= 1_000);
        assert_eq!(gate.queue_depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_spacing() {
        let gate = gate(5_000, 300);
        let status = gate.status();
        assert!(status.can_make_request);
        assert_eq!(status.time_since_last_request, None);

        {
            let _ticket = gate.acquire().await.unwrap();
            assert!(gate.status().in_flight);
            assert!(!gate.status().can_make_request);
        }

        tokio::time::advance(Duration::from_millis(2_000)).await;
        let status = gate.status();
        assert!(!status.can_make_request);
        assert_eq!(status.time_since_last_request, Some(2_000));
        assert_eq!(status.next_request_in, 3_000);

        tokio::time::advance(Duration::from_millis(3_000)).await;
        assert!(gate.status().can_make_request);
    }
}
