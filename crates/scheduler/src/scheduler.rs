//! Render scheduler
//!
//! A FIFO queue of tile requests consumed by one background worker. The
//! queue is an unbounded channel, so submitting never blocks; purging drains
//! it without touching the task currently executing.

use crate::executor::{RenderSink, TileExecutor};
use crate::worker::{Counters, Shared, Worker};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tileview_render::TileRequest;

/// Name given to the worker thread.
pub const WORKER_THREAD_NAME: &str = "tileview-render-worker";

/// Errors raised while setting up the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to spawn the render worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Configuration for the render scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum time the worker waits for a task before checking shutdown.
    /// Default: 100ms.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(100) }
    }
}

impl SchedulerConfig {
    /// Set the poll interval for the worker.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Render scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks accepted by `submit`
    pub submitted: u64,
    /// Tasks taken off the queue by the worker
    pub executed: u64,
    /// Tiles handed to the sink
    pub delivered: u64,
    /// Tiles released because the scheduler was stopped
    pub discarded: u64,
    /// Tasks dropped from the queue before execution
    pub purged: u64,
    /// Tasks that produced nothing without failing
    pub skipped: u64,
    /// Tasks that returned an error or panicked
    pub failed: u64,
    /// Tasks currently queued
    pub pending: usize,
}

/// Single-worker render scheduler.
///
/// A new scheduler is stopped: tasks still execute, but their tiles are
/// released instead of delivered until [`RenderScheduler::start`] is called.
///
/// # Example
///
/// ```
/// use pdf_engine::{EngineHandle, LopdfEngine, PageSize};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tileview_render::{BufferPool, RenderError, RenderQuality, RenderedTile, TileRenderer, TileRequest};
/// use tileview_scheduler::{RenderScheduler, RenderSink, SchedulerConfig};
///
/// struct Discard;
///
/// impl RenderSink for Discard {
///     fn tile_ready(&self, tile: RenderedTile) {
///         tile.release();
///     }
///     fn page_error(&self, _page: u32, _error: RenderError) {}
/// }
///
/// let engine = LopdfEngine::from_page_sizes(vec![PageSize::new(600, 800)]);
/// let renderer = TileRenderer::new(EngineHandle::new(engine), BufferPool::new());
/// let mut scheduler =
///     RenderScheduler::new(Arc::new(renderer), Arc::new(Discard), SchedulerConfig::default()).unwrap();
///
/// scheduler.start();
/// scheduler.submit(TileRequest::thumbnail(0, 60.0, 80.0, RenderQuality::default()));
/// assert!(scheduler.wait_idle(Duration::from_secs(5)));
/// assert_eq!(scheduler.stats().delivered, 1);
///
/// scheduler.shutdown();
/// ```
pub struct RenderScheduler {
    sender: Sender<TileRequest>,
    receiver: Receiver<TileRequest>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl RenderScheduler {
    /// Create the queue and spawn the worker thread.
    ///
    /// # Arguments
    ///
    /// * `executor` - Runs each task
    /// * `sink` - Receives results while running
    /// * `config` - Scheduler configuration
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Spawn`] if the worker thread cannot be created.
    pub fn new(
        executor: Arc<dyn TileExecutor>,
        sink: Arc<dyn RenderSink>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared::default());
        let worker = Worker {
            receiver: receiver.clone(),
            executor,
            sink,
            shared: shared.clone(),
            poll_interval: config.poll_interval,
        };
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_owned())
            .spawn(move || worker.run())?;

        Ok(Self { sender, receiver, shared, worker: Some(handle) })
    }

    /// Enqueue a task. Never blocks.
    pub fn submit(&self, request: TileRequest) {
        if self.shared.shutdown.load(Ordering::Acquire) {
            tracing::debug!(page = request.page, "submit after shutdown ignored");
            return;
        }
        self.shared.add_outstanding(1);
        if self.sender.send(request).is_err() {
            self.shared.finish_outstanding(1);
            return;
        }
        Counters::bump(&self.shared.counters.submitted, 1);
    }

    /// Drop every task that has not started yet.
    ///
    /// Returns the number of dropped tasks.
    pub fn purge_all(&self) -> usize {
        let purged = self.receiver.try_iter().count();
        if purged > 0 {
            Counters::bump(&self.shared.counters.purged, purged as u64);
            self.shared.finish_outstanding(purged);
            tracing::debug!(purged, "render queue purged");
        }
        purged
    }

    /// Deliver completed tiles and errors to the sink.
    pub fn start(&self) {
        self.shared.running.store(true, Ordering::Release);
    }

    /// Release completed tiles instead of delivering them.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Blocks until the queue is empty and no task is executing.
    ///
    /// Returns `false` if `timeout` passed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.wait_idle(timeout)
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Pending tasks are dropped; the task in flight finishes first.
    /// Calling it again does nothing.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.stop();
        self.shared.shutdown.store(true, Ordering::Release);
        self.purge_all();
        if handle.join().is_err() {
            tracing::error!("render worker exited with a panic");
        }
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        let counters = &self.shared.counters;
        SchedulerStats {
            submitted: Counters::get(&counters.submitted),
            executed: Counters::get(&counters.executed),
            delivered: Counters::get(&counters.delivered),
            discarded: Counters::get(&counters.discarded),
            purged: Counters::get(&counters.purged),
            skipped: Counters::get(&counters.skipped),
            failed: Counters::get(&counters.failed),
            pending: self.receiver.len(),
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
