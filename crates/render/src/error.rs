use pdf_engine::{EngineError, PixelFormat};

/// Errors produced while executing a render task.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The engine failed to open or paint the page.
    #[error("page {page} failed to render: {source}")]
    PageRender {
        page: u32,
        #[source]
        source: EngineError,
    },

    /// No pixel buffer could be created for the requested size.
    #[error("cannot allocate a {width}x{height} {format:?} buffer")]
    Allocation { width: u32, height: u32, format: PixelFormat },

    /// The task aborted unexpectedly inside the executor.
    #[error("render task for page {page} panicked: {message}")]
    Panicked { page: u32, message: String },
}

impl RenderError {
    /// Page the failure belongs to, when it is page scoped.
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::PageRender { page, .. } | Self::Panicked { page, .. } => Some(*page),
            Self::Allocation { .. } => None,
        }
    }
}
