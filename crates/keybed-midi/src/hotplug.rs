use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{after, select, Receiver, Sender};

/// Interval between hotplug polling iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Quiet period after the last change notification before rescanning.
pub const DEFAULT_RESCAN_DELAY: Duration = Duration::from_millis(500);

/// Pending-notification counter behind rescan debouncing.
///
/// Every notification increments the counter and schedules one delayed
/// check. Each check decrements it; only the check that brings it back to
/// zero reports that a rescan is due.
#[derive(Debug, Default)]
pub struct DebounceCounter {
    pending: AtomicUsize,
}

impl DebounceCounter {
    pub fn notify(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Runs one scheduled check. Returns `true` when no later notification is
    /// still waiting.
    pub fn settle(&self) -> bool {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                Some(pending.saturating_sub(1))
            })
            .unwrap_or(0);
        previous == 1
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Coalesces bursts of device-change notifications into a single rescan.
pub struct RescanDebouncer {
    counter: Arc<DebounceCounter>,
    delay: Duration,
    deadlines: Option<Sender<Instant>>,
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RescanDebouncer {
    /// Spawn the worker thread that runs `rescan` once a burst settles.
    pub fn spawn<F>(delay: Duration, mut rescan: F) -> anyhow::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let counter = Arc::new(DebounceCounter::default());
        let (deadline_tx, deadline_rx) = crossbeam_channel::unbounded::<Instant>();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let worker_counter = Arc::clone(&counter);
        let handle = thread::Builder::new()
            .name("keybed-midi-rescan".into())
            .spawn(move || {
                while let Some(deadline) = next_deadline(&deadline_rx, &stop_rx) {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(after(wait)) -> _ => {}
                    }
                    if worker_counter.settle() {
                        tracing::debug!("device changes settled; rescanning");
                        rescan();
                    }
                }
            })?;
        Ok(Self {
            counter,
            delay,
            deadlines: Some(deadline_tx),
            stop_tx: Some(stop_tx),
            thread: Some(handle),
        })
    }

    /// Record one change notification.
    pub fn notify(&self) {
        self.counter.notify();
        if let Some(tx) = &self.deadlines {
            let _ = tx.send(Instant::now() + self.delay);
        }
    }

    pub fn pending(&self) -> usize {
        self.counter.pending()
    }
}

fn next_deadline(deadlines: &Receiver<Instant>, stop: &Receiver<()>) -> Option<Instant> {
    select! {
        recv(stop) -> _ => None,
        recv(deadlines) -> deadline => deadline.ok(),
    }
}

impl Drop for RescanDebouncer {
    fn drop(&mut self) {
        self.deadlines.take();
        self.stop_tx.take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Watcher that periodically queries the port list and reports changes.
pub struct HotplugWatcher {
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl HotplugWatcher {
    /// Spawn a new watcher. `on_change` runs on the watcher thread with the
    /// new snapshot whenever it differs from the previous one.
    pub fn spawn<E, C>(interval: Duration, mut enumerate: E, mut on_change: C) -> anyhow::Result<Self>
    where
        E: FnMut() -> anyhow::Result<Vec<String>> + Send + 'static,
        C: FnMut(&[String]) + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("keybed-midi-hotplug".into())
            .spawn(move || {
                let mut last: Option<Vec<String>> = None;
                loop {
                    match enumerate() {
                        Ok(mut snapshot) => {
                            snapshot.sort();
                            if last.as_ref().is_some_and(|last| *last != snapshot) {
                                tracing::info!(ports = snapshot.len(), "MIDI port list changed");
                                on_change(&snapshot);
                            }
                            last = Some(snapshot);
                        }
                        Err(err) => {
                            tracing::debug!(?err, "midi hotplug enumerate failed");
                        }
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
            })?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(handle),
        })
    }
}

impl Drop for HotplugWatcher {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
