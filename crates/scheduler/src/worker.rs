//! The render worker thread.
//!
//! One worker drains the FIFO queue. It checks for shutdown between tasks and
//! waits at most one poll interval for new work.

use crate::executor::{RenderSink, TileExecutor};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tileview_render::{RenderError, TileRequest};

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) submitted: AtomicU64,
    pub(crate) executed: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) purged: AtomicU64,
    pub(crate) skipped: AtomicU64,
    pub(crate) failed: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// State shared by the scheduler handle and its worker.
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) running: AtomicBool,
    pub(crate) shutdown: AtomicBool,
    pub(crate) counters: Counters,
    /// Tasks submitted but neither finished nor purged
    outstanding: Mutex<usize>,
    idle: Condvar,
}

impl Shared {
    pub(crate) fn add_outstanding(&self, count: usize) {
        *self.outstanding.lock() += count;
    }

    pub(crate) fn finish_outstanding(&self, count: usize) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(count);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }

    /// Blocks until no task is queued or executing, or `timeout` passes.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut outstanding = self.outstanding.lock();
        while *outstanding > 0 {
            if self.idle.wait_until(&mut outstanding, deadline).timed_out() {
                break;
            }
        }
        *outstanding == 0
    }
}

pub(crate) struct Worker {
    pub(crate) receiver: Receiver<TileRequest>,
    pub(crate) executor: Arc<dyn TileExecutor>,
    pub(crate) sink: Arc<dyn RenderSink>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) poll_interval: Duration,
}

impl Worker {
    /// Main worker loop.
    pub(crate) fn run(self) {
        tracing::info!("render worker started");
        loop {
            if self.shared.shutdown.load(Ordering::Acquire) {
                break;
            }
            match self.receiver.recv_timeout(self.poll_interval) {
                Ok(request) => {
                    self.process(&request);
                    self.shared.finish_outstanding(1);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::info!("render worker stopped");
    }

    fn process(&self, request: &TileRequest) {
        let counters = &self.shared.counters;
        Counters::bump(&counters.executed, 1);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.executor.execute(request)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::error!(page = request.page, %message, "render task panicked");
                Err(RenderError::Panicked { page: request.page, message })
            });

        let running = self.shared.running.load(Ordering::Acquire);
        match result {
            Ok(Some(tile)) if running => {
                Counters::bump(&counters.delivered, 1);
                self.deliver(request.page, || self.sink.tile_ready(tile));
            }
            Ok(Some(tile)) => {
                Counters::bump(&counters.discarded, 1);
                tile.release();
            }
            Ok(None) => Counters::bump(&counters.skipped, 1),
            Err(error) => {
                Counters::bump(&counters.failed, 1);
                let page = error.page().unwrap_or(request.page);
                if running {
                    self.deliver(page, || self.sink.page_error(page, error));
                } else {
                    tracing::warn!(page, %error, "render error while stopped");
                }
            }
        }
    }

    fn deliver(&self, page: u32, f: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            let message = panic_message(payload.as_ref());
            tracing::error!(page, %message, "render sink panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
