pub mod channel;
pub mod codec;
pub mod error;

pub use channel::{ChannelConsumer, ChannelProducer, MIN_CAPACITY, bounded};
pub use codec::{COMMAND_ENCODED_LEN, COMMAND_MSG_TYPE, Frame, SLOT_PAYLOAD_LEN};
pub use error::{BufferError, CodecError};
