use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while building or driving the synthesis engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be constructed
    #[error("Failed to initialize synthesis engine: {0}")]
    Construction(String),

    /// The engine executable could not be located
    #[error("Synthesis program not found: {0}")]
    ProgramNotFound(String),

    /// A synthesis call failed
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Blocking task running the engine was cancelled or panicked
    #[error("Synthesis task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
