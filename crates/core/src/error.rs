use crate::config::ConfigError;
use pdf_engine::EngineError;
use tileview_scheduler::SchedulerError;

/// Errors raised while opening or driving a viewer session.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("document engine error: {0}")]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot start rendering: {0}")]
    Scheduler(#[from] SchedulerError),
}

pub type ViewerResult<T> = Result<T, ViewerError>;
