use crate::buffer::BufferError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue is shutting down; submission rejected")]
    ShutdownInProgress,

    #[error("Invalid operator '{0}'. Valid operators: + - * / !")]
    InvalidOperator(char),

    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Worker thread panicked")]
    WorkerPanicked,
}
