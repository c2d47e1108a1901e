use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Invalid channel capacity: {capacity} (must be a power of two, at least 2)")]
    InvalidCapacity { capacity: usize },

    #[error("Channel is full")]
    ChannelFull,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated frame: got {len} bytes, expected {expected}")]
    Truncated { len: usize, expected: usize },

    #[error("Unknown message type: {0}")]
    UnknownMessageType(i32),

    #[error("Unknown operator byte: {0:#04x}")]
    UnknownOperator(u8),
}
