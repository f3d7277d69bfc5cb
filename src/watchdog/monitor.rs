//! # HeartbeatWatchdog: hang detection with a two-strike probation policy.
//!
//! Registered components proactively report liveness on their own cadence; a
//! shared timer tick counts every slot down and applies the probation policy.
//! This is the complement of the supervisor's liveness polling — it catches a
//! worker that is alive but stuck.
//!
//! ## State machine (per component)
//! ```text
//! NORMAL ── deadline missed ──► PROBATION ── deadline missed ──► FAILED (slot
//!    ▲                              │                            removed,
//!    └───── reportStatus(Normal) ───┘                            response
//!                                                                invoked)
//!
//! reportStatus(Failed): NORMAL/PROBATION ──► FAILED immediately, no probation
//! ```
//!
//! ## Rules
//! - One missed deadline buys exactly one grace period: a silent component
//!   triggers its response after ≈ 2 × period (± one tick resolution).
//! - A single `Normal` report fully rehabilitates — counter refilled,
//!   probation cleared.
//! - Responses run on detached tasks, after the slot lock is released, and
//!   are panic-isolated so one failing response cannot damage the tick loop.
//! - Slot capacity is explicit: registration past it is logged and rejected,
//!   never silently grown. Cleared slots are reused before the table grows.

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::core::worker::Worker;
use crate::error::{panic_message, WatchdogError};
use crate::watchdog::response::ResponseRef;

/// Handle to one monitor slot, returned by registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorKey(usize);

impl MonitorKey {
    /// Returns the underlying slot index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Liveness state a component reports about itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatStatus {
    /// On schedule; refills the countdown and clears probation.
    Normal,
    /// Self-diagnosed failure; the response fires immediately.
    Failed,
}

/// One occupied monitor slot.
struct MonitorSlot {
    name: String,
    period_ms: i64,
    remaining_ms: i64,
    probation: bool,
    response: ResponseRef,
}

/// Timer-driven hang detector over a fixed-capacity slot table.
pub struct HeartbeatWatchdog {
    resolution: Duration,
    capacity: usize,
    slots: Arc<Mutex<Vec<Option<MonitorSlot>>>>,
    worker: Worker,
}

impl HeartbeatWatchdog {
    /// Creates a watchdog with the configured tick resolution and capacity.
    ///
    /// Ticking begins once [`start`](Self::start) is called; an explicit
    /// instance owned by the caller.
    pub fn new(config: Config) -> Self {
        Self {
            resolution: config.resolution,
            capacity: config.capacity,
            slots: Arc::new(Mutex::new(Vec::new())),
            worker: Worker::new("heartbeat-watchdog"),
        }
    }

    /// Starts the tick loop; bounded by `timeout`, idempotent while running.
    pub async fn start(&self, timeout: Duration) -> bool {
        if self.worker.is_alive().await {
            return true;
        }
        let slots = Arc::clone(&self.slots);
        let resolution = self.resolution;

        self.worker
            .launch(timeout, move |cancel, ready| async move {
                ready.notify_one();
                Self::tick_loop(slots, resolution, cancel).await;
            })
            .await
    }

    /// Stops the tick loop; slots stay registered but are no longer evaluated.
    pub async fn stop(&self, timeout: Duration) -> bool {
        self.worker.halt(timeout).await
    }

    /// Registers a component that promises a report at least every `period`.
    ///
    /// Reuses a cleared slot when one exists, grows the table up to the
    /// configured capacity otherwise. Past capacity the registration is
    /// logged as an error and rejected.
    pub fn register_component(
        &self,
        name: impl Into<String>,
        period: Duration,
        response: ResponseRef,
    ) -> Result<MonitorKey, WatchdogError> {
        let name = name.into();
        let period_ms = (period.as_millis() as i64).max(1);
        let slot = MonitorSlot {
            name: name.clone(),
            period_ms,
            remaining_ms: period_ms,
            probation: false,
            response,
        };

        let mut slots = self.slots.lock().unwrap();
        if let Some(index) = slots.iter().position(Option::is_none) {
            slots[index] = Some(slot);
            debug!(component = %name, index, "component registered in reused slot");
            Ok(MonitorKey(index))
        } else if slots.len() < self.capacity {
            slots.push(Some(slot));
            let index = slots.len() - 1;
            debug!(component = %name, index, "component registered");
            Ok(MonitorKey(index))
        } else {
            error!(
                component = %name,
                capacity = self.capacity,
                "monitor capacity exhausted; component not registered"
            );
            Err(WatchdogError::CapacityExhausted {
                capacity: self.capacity,
            })
        }
    }

    /// Records a liveness report for the keyed component.
    ///
    /// `Normal` refills the countdown and clears probation. `Failed` removes
    /// the slot and fires the response immediately, bypassing the timing
    /// policy entirely. Reports against a cleared slot are logged and
    /// ignored.
    pub fn report_status(&self, key: MonitorKey, status: HeartbeatStatus) {
        match status {
            HeartbeatStatus::Normal => {
                let mut slots = self.slots.lock().unwrap();
                match slots.get_mut(key.0).and_then(Option::as_mut) {
                    Some(slot) => {
                        if slot.probation {
                            debug!(component = %slot.name, "back in contact; probation cleared");
                        }
                        slot.remaining_ms = slot.period_ms;
                        slot.probation = false;
                    }
                    None => warn!(key = key.0, "status report for unregistered monitor key"),
                }
            }
            HeartbeatStatus::Failed => {
                let taken = {
                    let mut slots = self.slots.lock().unwrap();
                    slots.get_mut(key.0).and_then(Option::take)
                };
                match taken {
                    Some(slot) => {
                        warn!(component = %slot.name, "explicit failure reported; invoking response");
                        Self::dispatch(slot.name, slot.response);
                    }
                    None => warn!(key = key.0, "failure report for unregistered monitor key"),
                }
            }
        }
    }

    /// Clears the keyed slot; subsequent ticks ignore it.
    pub fn deregister_component(&self, key: MonitorKey) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(entry) = slots.get_mut(key.0) {
            if let Some(slot) = entry.take() {
                debug!(component = %slot.name, "component deregistered");
            }
        }
    }

    /// Returns the number of currently occupied slots.
    pub fn monitored_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.is_some())
            .count()
    }

    async fn tick_loop(
        slots: Arc<Mutex<Vec<Option<MonitorSlot>>>>,
        resolution: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = time::interval(resolution);
        // interval's first tick completes immediately; consume it so every
        // countdown decrement corresponds to one elapsed resolution.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            Self::tick(&slots, resolution);
        }
    }

    /// One countdown pass over every occupied slot.
    fn tick(slots: &Mutex<Vec<Option<MonitorSlot>>>, resolution: Duration) {
        let elapsed_ms = resolution.as_millis() as i64;
        let mut due = Vec::new();

        {
            let mut slots = slots.lock().unwrap();
            for entry in slots.iter_mut() {
                let confirmed = match entry.as_mut() {
                    None => false,
                    Some(slot) => {
                        slot.remaining_ms -= elapsed_ms;
                        if slot.remaining_ms > 0 {
                            false
                        } else if !slot.probation {
                            slot.probation = true;
                            slot.remaining_ms = slot.period_ms;
                            warn!(
                                component = %slot.name,
                                "missed heartbeat deadline; on probation for one period"
                            );
                            false
                        } else {
                            true
                        }
                    }
                };
                if confirmed {
                    if let Some(slot) = entry.take() {
                        error!(component = %slot.name, "heartbeat failure confirmed; invoking response");
                        due.push(slot);
                    }
                }
            }
        }

        // Responses run with the slot lock released.
        for slot in due {
            Self::dispatch(slot.name, slot.response);
        }
    }

    /// Fires a response on a detached task, panic-isolated.
    fn dispatch(name: String, response: ResponseRef) {
        tokio::spawn(async move {
            let fut = response.invoke();
            if let Err(payload) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                error!(
                    component = %name,
                    panic = %panic_message(payload.as_ref()),
                    "failure response panicked"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchdog::response::ResponseFn;
    use std::time::Instant;
    use tokio::sync::mpsc;

    const BOUND: Duration = Duration::from_secs(2);

    fn quick_config(capacity: usize) -> Config {
        Config {
            resolution: Duration::from_millis(25),
            capacity,
            ..Config::default()
        }
    }

    fn counting_response() -> (ResponseRef, mpsc::UnboundedReceiver<Instant>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let resp: ResponseRef = ResponseFn::arc(move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send(Instant::now());
            }
        });
        (resp, rx)
    }

    #[tokio::test]
    async fn test_silent_component_fires_after_two_periods() {
        let watchdog = HeartbeatWatchdog::new(quick_config(8));
        assert!(watchdog.start(BOUND).await);

        let (resp, mut rx) = counting_response();
        let registered = Instant::now();
        watchdog
            .register_component("svc", Duration::from_millis(150), resp)
            .unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("response should fire for a silent component")
            .unwrap();

        let elapsed = fired.duration_since(registered);
        assert!(
            elapsed >= Duration::from_millis(200) && elapsed <= Duration::from_millis(700),
            "fired at {elapsed:?}, expected around two periods"
        );
        assert_eq!(watchdog.monitored_count(), 0, "confirmed failure clears the slot");

        watchdog.stop(BOUND).await;
    }

    #[tokio::test]
    async fn test_on_schedule_reports_prevent_firing() {
        let watchdog = HeartbeatWatchdog::new(quick_config(8));
        assert!(watchdog.start(BOUND).await);

        let (resp, mut rx) = counting_response();
        let key = watchdog
            .register_component("punctual", Duration::from_millis(200), resp)
            .unwrap();

        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            watchdog.report_status(key, HeartbeatStatus::Normal);
        }

        assert!(rx.try_recv().is_err(), "on-schedule component must not fire");
        assert_eq!(watchdog.monitored_count(), 1);

        watchdog.stop(BOUND).await;
    }

    #[tokio::test]
    async fn test_probation_is_cleared_by_one_report() {
        let watchdog = HeartbeatWatchdog::new(quick_config(8));
        assert!(watchdog.start(BOUND).await);

        let (resp, mut rx) = counting_response();
        let key = watchdog
            .register_component("flaky", Duration::from_millis(300), resp)
            .unwrap();

        // Miss one deadline, recover, miss one again, recover: a single miss
        // never escalates past probation.
        for _ in 0..2 {
            tokio::time::sleep(Duration::from_millis(400)).await;
            watchdog.report_status(key, HeartbeatStatus::Normal);
        }

        assert!(rx.try_recv().is_err());
        assert_eq!(watchdog.monitored_count(), 1);

        watchdog.stop(BOUND).await;
    }

    #[tokio::test]
    async fn test_explicit_failure_fires_immediately() {
        let watchdog = HeartbeatWatchdog::new(quick_config(8));
        assert!(watchdog.start(BOUND).await);

        let (resp, mut rx) = counting_response();
        let key = watchdog
            .register_component("self-aware", Duration::from_secs(60), resp)
            .unwrap();

        let reported = Instant::now();
        watchdog.report_status(key, HeartbeatStatus::Failed);

        let fired = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("explicit failure should fire without probation")
            .unwrap();
        assert!(fired.duration_since(reported) < Duration::from_millis(500));
        assert_eq!(watchdog.monitored_count(), 0);

        // The cleared slot is reusable.
        let (resp2, _rx2) = counting_response();
        let key2 = watchdog
            .register_component("replacement", Duration::from_secs(60), resp2)
            .unwrap();
        assert_eq!(key2.index(), key.index());

        watchdog.stop(BOUND).await;
    }

    #[tokio::test]
    async fn test_capacity_is_explicit() {
        let watchdog = HeartbeatWatchdog::new(quick_config(1));

        let (resp, _rx) = counting_response();
        watchdog
            .register_component("first", Duration::from_secs(1), resp)
            .unwrap();

        let (resp, _rx) = counting_response();
        let err = watchdog
            .register_component("second", Duration::from_secs(1), resp)
            .unwrap_err();
        assert!(matches!(err, WatchdogError::CapacityExhausted { capacity: 1 }));
    }

    #[tokio::test]
    async fn test_deregistered_component_is_ignored() {
        let watchdog = HeartbeatWatchdog::new(quick_config(8));
        assert!(watchdog.start(BOUND).await);

        let (resp, mut rx) = counting_response();
        let key = watchdog
            .register_component("leaver", Duration::from_millis(100), resp)
            .unwrap();
        watchdog.deregister_component(key);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(watchdog.monitored_count(), 0);

        // Stale reports against the cleared key are ignored, not fired.
        watchdog.report_status(key, HeartbeatStatus::Failed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        watchdog.stop(BOUND).await;
    }
}
