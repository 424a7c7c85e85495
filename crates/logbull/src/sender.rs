// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Queueing, batching and concurrent delivery of log entries.
//!
//! ```text
//!   producers ──try_send──> bounded queue ──drain──> batches ──> delivery tasks
//!                              ^                                  (worker gate,
//!                              │                                   best-effort
//!                   ticker / flush / shutdown                      overflow)
//! ```
//!
//! Producers never wait: a full queue drops the entry and a stopped sender
//! discards it. Batches are drained on a fixed interval by a background
//! ticker, on [`Sender::flush`], and one last time on [`Sender::shutdown`].
//!
//! Each batch is delivered on its own task. A semaphore sized to
//! `max_workers` admits deliveries; when no permit is free the batch is
//! delivered anyway on an unbounded task so draining never stalls behind a
//! slow intake. Every task is tracked so shutdown can wait for all of them.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, OnceCell, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace, warn};

use crate::config::SenderConfig;
use crate::entry::{LogBatch, LogEntry};
use crate::errors::ConfigError;
use crate::transport::Deliver;

const ACTIVE: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle of a sender. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Active,
    ShuttingDown,
    Stopped,
}

/// Counters since the sender was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Entries accepted into the queue
    pub queued: u64,
    /// Entries dropped because the queue was full
    pub dropped: u64,
    /// Batches handed to the transport
    pub batches: u64,
    /// Batches dispatched without a worker permit
    pub unbounded_dispatches: u64,
}

struct Inner {
    config: SenderConfig,
    tx: mpsc::Sender<LogEntry>,
    // Only ever held for non-blocking `try_recv` calls.
    rx: Mutex<mpsc::Receiver<LogEntry>>,
    transport: Arc<dyn Deliver>,
    // Delivery tasks run here even when flush/shutdown are polled elsewhere.
    runtime: Handle,
    workers: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel_token: CancellationToken,
    state: AtomicU8,
    shutdown: OnceCell<()>,
    queued: AtomicU64,
    dropped: AtomicU64,
    batches: AtomicU64,
    unbounded_dispatches: AtomicU64,
}

impl Inner {
    fn state(&self) -> SenderState {
        match self.state.load(Ordering::Acquire) {
            ACTIVE => SenderState::Active,
            SHUTTING_DOWN => SenderState::ShuttingDown,
            _ => SenderState::Stopped,
        }
    }

    /// Entries currently waiting in the queue.
    fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Pulls up to one batch without waiting. May return fewer entries, or none.
    fn drain(&self) -> Vec<LogEntry> {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let mut logs = Vec::with_capacity(self.config.batch_size.min(self.pending()));
        while logs.len() < self.config.batch_size {
            match rx.try_recv() {
                Ok(entry) => logs.push(entry),
                Err(_) => break,
            }
        }
        logs
    }

    fn dispatch(&self, logs: Vec<LogEntry>) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let batch = LogBatch::new(logs);
        self.batches.fetch_add(1, Ordering::Relaxed);

        match Arc::clone(&self.workers).try_acquire_owned() {
            Ok(permit) => self.tracker.spawn_on(
                async move {
                    let _permit = permit;
                    transport.deliver(batch).await;
                },
                &self.runtime,
            ),
            Err(_) => {
                // Liveness over strict bounding: the drain loop must not wait on a slot.
                self.unbounded_dispatches.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "LOGBULL | All {} delivery workers busy, dispatching batch of {} outside the gate",
                    self.config.max_workers,
                    batch.len()
                );
                self.tracker.spawn_on(
                    async move {
                        transport.deliver(batch).await;
                    },
                    &self.runtime,
                )
            }
        }
    }

    /// Dispatches everything queued when called, one batch at a time.
    fn dispatch_pending(&self) -> Vec<JoinHandle<()>> {
        let mut remaining = self.pending();
        let mut handles = Vec::new();
        while remaining > 0 {
            let logs = self.drain();
            if logs.is_empty() {
                break;
            }
            remaining = remaining.saturating_sub(logs.len());
            handles.push(self.dispatch(logs));
        }
        handles
    }

    /// Closes the queue and dispatches whatever is left in it.
    fn dispatch_remaining(&self) -> usize {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close();

        let mut dispatched = 0;
        loop {
            let logs = self.drain();
            if logs.is_empty() {
                return dispatched;
            }
            dispatched += logs.len();
            self.dispatch(logs);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Handle to a running sender. Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct Sender {
    inner: Arc<Inner>,
}

impl Sender {
    /// Starts a sender and its background ticker on the current tokio runtime.
    pub fn new(config: SenderConfig, transport: Arc<dyn Deliver>) -> Result<Self, ConfigError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let workers = Arc::new(Semaphore::new(config.max_workers));
        let flush_interval = config.flush_interval;

        let inner = Arc::new(Inner {
            config,
            tx,
            rx: Mutex::new(rx),
            transport,
            runtime: runtime.clone(),
            workers,
            tracker: TaskTracker::new(),
            cancel_token: CancellationToken::new(),
            state: AtomicU8::new(ACTIVE),
            shutdown: OnceCell::new(),
            queued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            unbounded_dispatches: AtomicU64::new(0),
        });

        inner.tracker.spawn_on(
            run_ticker(
                Arc::downgrade(&inner),
                inner.cancel_token.clone(),
                flush_interval,
            ),
            &runtime,
        );

        Ok(Self { inner })
    }

    /// Enqueues an entry without waiting.
    ///
    /// A full queue drops the entry; after shutdown has started the entry is
    /// discarded silently.
    pub fn submit(&self, entry: LogEntry) {
        if self.inner.state() != SenderState::Active {
            trace!("LOGBULL | Sender is not active, discarding log entry");
            return;
        }

        match self.inner.tx.try_send(entry) {
            Ok(()) => {
                self.inner.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 1_000 == 0 {
                    warn!("LOGBULL | Log queue full, dropping log entry ({dropped} dropped so far)");
                }
            }
            Err(TrySendError::Closed(_)) => {
                trace!("LOGBULL | Log queue closed, discarding log entry");
            }
        }
    }

    /// Dispatches everything queued at call time and waits for those deliveries.
    pub async fn flush(&self) {
        for handle in self.inner.dispatch_pending() {
            if let Err(e) = handle.await {
                error!("LOGBULL | Delivery task failed: {e}");
            }
        }
    }

    /// Stops accepting entries, delivers what is queued and waits for every
    /// in-flight delivery. Runs once; concurrent and later callers wait for
    /// that single run to finish.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner
            .shutdown
            .get_or_init(|| async {
                debug!("LOGBULL | Sender shutting down");
                inner.state.store(SHUTTING_DOWN, Ordering::Release);
                inner.cancel_token.cancel();

                let drained = inner.dispatch_remaining();
                debug!("LOGBULL | Final drain dispatched {drained} log entries");

                inner.tracker.close();
                inner.tracker.wait().await;

                inner.state.store(STOPPED, Ordering::Release);
                debug!("LOGBULL | Sender stopped");
            })
            .await;
    }

    #[must_use]
    pub fn state(&self) -> SenderState {
        self.inner.state()
    }

    #[must_use]
    pub fn stats(&self) -> SenderStats {
        SenderStats {
            queued: self.inner.queued.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            batches: self.inner.batches.load(Ordering::Relaxed),
            unbounded_dispatches: self.inner.unbounded_dispatches.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

async fn run_ticker(inner: Weak<Inner>, cancel_token: CancellationToken, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.dispatch_pending();
            }
        }
    }
    trace!("LOGBULL | Flush ticker stopped");
}
