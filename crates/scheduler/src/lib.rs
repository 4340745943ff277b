//! Tileview Scheduler Library
//!
//! Serialised render scheduling for tile requests.
//!
//! Requests are executed strictly in submission order by one background
//! worker. Results flow to a [`RenderSink`] while the scheduler is running;
//! while it is stopped, finished tiles are released on the spot. Failures,
//! including a panic inside the executor, are converted into
//! [`tileview_render::RenderError`] values and never stop the worker.

mod executor;
mod scheduler;
mod worker;

// Re-export public API
pub use executor::{RenderSink, TileExecutor};
pub use scheduler::{RenderScheduler, SchedulerConfig, SchedulerError, SchedulerStats, WORKER_THREAD_NAME};
