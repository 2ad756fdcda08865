// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-destination upload dispatcher.
//!
//! Each dispatcher owns one bounded task queue and one worker thread, so
//! deliveries to a destination are strictly sequential while different
//! destinations run independently of each other and of ingestion.
//!
//! ```text
//!  ingestion ──schedule_upload──► [ bounded queue ] ──► worker thread
//!   (never blocks; drops on full)                        │
//!                                                        ├─ routing lookup
//!                                                        ├─ build_body
//!                                                        └─ deliver (HTTP)
//! ```
//!
//! Every task runs behind a panic guard: a fault in one task is logged and
//! the worker moves on to the next one.
//!
//! [`stop`](UploadDispatcher::stop) drains the queue until the shutdown
//! deadline passes. Whatever is still queued after that is abandoned and
//! counted, so an unreachable destination cannot hold up process exit.

use crate::adapter::{DeliveryOutcome, DestinationAdapter, Prepared};
use crate::reading::Reading;
use crate::routing::DeviceRoutingTable;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default queue capacity per destination.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default time `stop()` keeps draining before abandoning queued tasks.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatcher lifecycle errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher '{0}' already started")]
    AlreadyStarted(String),

    #[error("dispatcher '{0}' has been stopped")]
    Stopped(String),

    #[error("failed to spawn worker for '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to a scheduled task. Never a delivery result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Queued,
    /// Queue full; task dropped.
    Dropped,
    /// Dispatcher not running; task refused.
    Rejected,
}

/// A queued upload. Owns its copy of the reading.
#[derive(Debug, Clone)]
struct UploadTask {
    device_id: String,
    reading: Reading,
}

/// Result of running one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Delivered,
    Rejected,
    TransportFailed,
    Skipped,
}

enum Lifecycle {
    Idle,
    Running {
        tx: Sender<UploadTask>,
        worker: JoinHandle<()>,
    },
    Stopped,
}

/// Upload dispatcher for one destination.
pub struct UploadDispatcher {
    adapter: Arc<dyn DestinationAdapter>,
    routing: Option<Arc<DeviceRoutingTable>>,
    capacity: usize,
    shutdown_timeout: Duration,
    deadline: Arc<Mutex<Option<Instant>>>,
    lifecycle: Mutex<Lifecycle>,
    stats: Arc<DispatchStats>,
}

impl UploadDispatcher {
    /// Create a dispatcher. Nothing runs until [`start`](Self::start).
    pub fn new(
        adapter: Arc<dyn DestinationAdapter>,
        routing: Option<Arc<DeviceRoutingTable>>,
        capacity: usize,
    ) -> Self {
        let stats = Arc::new(DispatchStats::new(adapter.name()));
        Self {
            adapter,
            routing,
            capacity: capacity.max(1),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            deadline: Arc::new(Mutex::new(None)),
            lifecycle: Mutex::new(Lifecycle::Idle),
            stats,
        }
    }

    /// Bound the drain performed by [`stop`](Self::stop).
    ///
    /// A task already in flight when the deadline passes still runs to
    /// completion (at most one HTTP timeout).
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn adapter(&self) -> &Arc<dyn DestinationAdapter> {
        &self.adapter
    }

    /// Routing table, if this destination is routed.
    pub fn routing_table(&self) -> Option<&Arc<DeviceRoutingTable>> {
        self.routing.as_ref()
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running { .. })
    }

    /// Spawn the worker thread.
    pub fn start(&self) -> Result<(), DispatchError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Running { .. } => {
                return Err(DispatchError::AlreadyStarted(self.name().to_string()))
            }
            Lifecycle::Stopped => return Err(DispatchError::Stopped(self.name().to_string())),
            Lifecycle::Idle => {}
        }

        let (tx, rx) = channel::bounded::<UploadTask>(self.capacity);
        let adapter = Arc::clone(&self.adapter);
        let routing = self.routing.clone();
        let stats = Arc::clone(&self.stats);
        let deadline = Arc::clone(&self.deadline);

        let worker = thread::Builder::new()
            .name(format!("forwarder-{}", self.name()))
            .spawn(move || worker_loop(adapter, routing, rx, stats, deadline))
            .map_err(|source| DispatchError::Spawn {
                name: self.name().to_string(),
                source,
            })?;

        *lifecycle = Lifecycle::Running { tx, worker };
        tracing::info!("Started dispatcher for {}", self.name());
        Ok(())
    }

    /// Stop accepting tasks, drain the queue until the shutdown deadline,
    /// join the worker.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        if let Lifecycle::Running { tx, worker } = previous {
            tracing::info!(
                "Stopping dispatcher for {} ({} queued, deadline {:?})",
                self.name(),
                tx.len(),
                self.shutdown_timeout
            );
            // No deadline if the timeout does not fit in an Instant.
            *self.deadline.lock() = Instant::now().checked_add(self.shutdown_timeout);
            // Worker exits once the queue is drained and the sender is gone.
            drop(tx);
            if worker.join().is_err() {
                tracing::error!("Worker for {} terminated abnormally", self.name());
            }
            tracing::info!("Stopped dispatcher for {}", self.name());
        }
    }

    /// Enqueue an upload. Never blocks on the destination.
    pub fn schedule_upload(&self, device_id: &str, reading: &Reading) -> ScheduleOutcome {
        let lifecycle = self.lifecycle.lock();
        let Lifecycle::Running { tx, .. } = &*lifecycle else {
            self.stats.rejected_tasks.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                "Dispatcher for {} not running, dropping reading of {}",
                self.name(),
                device_id
            );
            return ScheduleOutcome::Rejected;
        };

        let task = UploadTask {
            device_id: device_id.to_string(),
            reading: reading.clone(),
        };
        match tx.try_send(task) {
            Ok(()) => {
                self.stats.scheduled.fetch_add(1, Ordering::Relaxed);
                ScheduleOutcome::Queued
            }
            Err(TrySendError::Full(task)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Queue for {} full ({} tasks), dropping reading of {}",
                    self.name(),
                    self.capacity,
                    task.device_id
                );
                ScheduleOutcome::Dropped
            }
            Err(TrySendError::Disconnected(task)) => {
                self.stats.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    "Worker for {} is gone, dropping reading of {}",
                    self.name(),
                    task.device_id
                );
                ScheduleOutcome::Rejected
            }
        }
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for UploadDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    adapter: Arc<dyn DestinationAdapter>,
    routing: Option<Arc<DeviceRoutingTable>>,
    rx: Receiver<UploadTask>,
    stats: Arc<DispatchStats>,
    deadline: Arc<Mutex<Option<Instant>>>,
) {
    for task in rx.iter() {
        if deadline.lock().is_some_and(|d| Instant::now() >= d) {
            let abandoned = 1 + rx.try_iter().count() as u64;
            stats.abandoned.fetch_add(abandoned, Ordering::Relaxed);
            tracing::warn!(
                "Shutdown deadline for {} passed, abandoning {} queued upload(s)",
                adapter.name(),
                abandoned
            );
            break;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            run_task(adapter.as_ref(), routing.as_deref(), &task)
        }));
        match result {
            Ok(outcome) => stats.record(outcome),
            Err(payload) => {
                stats.faults.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    "Upload for {} to {} failed with unexpected fault: {}",
                    task.device_id,
                    adapter.name(),
                    panic_message(payload.as_ref())
                );
            }
        }
    }
    tracing::debug!("Worker for {} exiting", adapter.name());
}

fn run_task(
    adapter: &dyn DestinationAdapter,
    routing: Option<&DeviceRoutingTable>,
    task: &UploadTask,
) -> TaskOutcome {
    let attribute = match (adapter.routing_attribute(), routing) {
        (Some(_), Some(table)) => table.lookup(&task.device_id),
        _ => None,
    };

    let (key, body) = match adapter.build_body(&task.reading, attribute.as_deref()) {
        Prepared::Upload { key, body } => (key, body),
        Prepared::Skip => {
            tracing::debug!(
                "Skipping {} for {}: no {} attribute",
                adapter.name(),
                task.device_id,
                adapter.routing_attribute().unwrap_or("routing")
            );
            return TaskOutcome::Skipped;
        }
    };

    tracing::info!("Upload for {} to {} ({}): {}", task.device_id, adapter.name(), key, body);
    match adapter.deliver(&key, &body) {
        DeliveryOutcome::Success { status, detail } => {
            tracing::info!(
                "Upload for {} to {} success ({}): {}",
                task.device_id,
                adapter.name(),
                status,
                detail
            );
            TaskOutcome::Delivered
        }
        DeliveryOutcome::RejectedByServer { status, detail } => {
            tracing::warn!(
                "Upload for {} to {} rejected ({}): {}",
                task.device_id,
                adapter.name(),
                status,
                detail
            );
            TaskOutcome::Rejected
        }
        DeliveryOutcome::TransportError(cause) => {
            tracing::warn!(
                "Upload for {} to {} failed: {}",
                task.device_id,
                adapter.name(),
                cause
            );
            TaskOutcome::TransportFailed
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Statistics for a dispatcher.
#[derive(Debug)]
pub struct DispatchStats {
    /// Destination name.
    pub destination: String,

    /// Tasks accepted into the queue.
    pub scheduled: AtomicU64,

    /// Deliveries answered with a 2xx.
    pub delivered: AtomicU64,

    /// Deliveries answered with a non-success status.
    pub rejected: AtomicU64,

    /// Deliveries that failed in transport.
    pub transport_errors: AtomicU64,

    /// Tasks skipped for lack of a routing attribute.
    pub skipped: AtomicU64,

    /// Tasks dropped on a full queue.
    pub dropped: AtomicU64,

    /// Tasks refused because the dispatcher was not running.
    pub rejected_tasks: AtomicU64,

    /// Tasks that panicked.
    pub faults: AtomicU64,

    /// Tasks left in the queue when the shutdown deadline passed.
    pub abandoned: AtomicU64,

    /// Creation time.
    pub created: Instant,
}

impl DispatchStats {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            scheduled: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            rejected_tasks: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    fn record(&self, outcome: TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Delivered => &self.delivered,
            TaskOutcome::Rejected => &self.rejected,
            TaskOutcome::TransportFailed => &self.transport_errors,
            TaskOutcome::Skipped => &self.skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            destination: self.destination.clone(),
            scheduled: self.scheduled.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected_tasks: self.rejected_tasks.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Snapshot of dispatcher statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub destination: String,
    pub scheduled: u64,
    pub delivered: u64,
    pub rejected: u64,
    pub transport_errors: u64,
    pub skipped: u64,
    pub dropped: u64,
    pub rejected_tasks: u64,
    pub faults: u64,
    pub abandoned: u64,
    pub uptime_secs: u64,
}

impl DispatchStatsSnapshot {
    /// Tasks the worker has finished or abandoned, whatever the outcome.
    pub fn completed(&self) -> u64 {
        self.delivered
            + self.rejected
            + self.transport_errors
            + self.skipped
            + self.faults
            + self.abandoned
    }

    /// Tasks queued but not yet finished.
    pub fn pending(&self) -> u64 {
        self.scheduled.saturating_sub(self.completed())
    }
}
