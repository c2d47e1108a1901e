//! Fixed-size slot encoding for commands.
//!
//! Layout (little endian):
//!
//! ```text
//! 0        8        16   17       25
//! ├────────┼────────┼────┼────────┤
//! │ op_a   │ op_b   │ op │ ts     │
//! │ f64    │ f64    │ u8 │ u64    │
//! ```
//!
//! The operator travels as its ASCII symbol so a frame can be eyeballed in a
//! hex dump.

use super::error::CodecError;
use crate::domain::{Command, Operator};
use bytes::{Buf, BufMut};

/// Message type tag for an encoded [`Command`].
pub const COMMAND_MSG_TYPE: i32 = 1;

/// Bytes of payload a single channel slot can hold.
pub const SLOT_PAYLOAD_LEN: usize = 32;

/// Encoded size of a [`Command`].
pub const COMMAND_ENCODED_LEN: usize = 8 + 8 + 1 + 8;

const _: () = assert!(
    COMMAND_ENCODED_LEN <= SLOT_PAYLOAD_LEN,
    "Command frame must fit in a channel slot"
);

/// One slot's worth of message: tag, length and payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub msg_type_id: i32,
    pub length: u32,
    pub payload: [u8; SLOT_PAYLOAD_LEN],
}

impl Frame {
    pub const fn empty() -> Self {
        Self {
            msg_type_id: 0,
            length: 0,
            payload: [0u8; SLOT_PAYLOAD_LEN],
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload[..(self.length as usize).min(SLOT_PAYLOAD_LEN)]
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

/// Writes `command` into `frame` in place.
#[inline]
pub fn encode_into(command: &Command, frame: &mut Frame) {
    let mut buf = &mut frame.payload[..];
    buf.put_f64_le(command.operand_a);
    buf.put_f64_le(command.operand_b);
    buf.put_u8(command.operator.symbol() as u8);
    buf.put_u64_le(command.submitted_at_nanos);

    frame.msg_type_id = COMMAND_MSG_TYPE;
    frame.length = COMMAND_ENCODED_LEN as u32;
}

pub fn encode(command: &Command) -> Frame {
    let mut frame = Frame::empty();
    encode_into(command, &mut frame);
    frame
}

pub fn decode(frame: &Frame) -> Result<Command, CodecError> {
    if frame.msg_type_id != COMMAND_MSG_TYPE {
        return Err(CodecError::UnknownMessageType(frame.msg_type_id));
    }

    let mut buf = frame.bytes();
    if buf.len() < COMMAND_ENCODED_LEN {
        return Err(CodecError::Truncated {
            len: buf.len(),
            expected: COMMAND_ENCODED_LEN,
        });
    }

    let operand_a = buf.get_f64_le();
    let operand_b = buf.get_f64_le();
    let op_byte = buf.get_u8();
    let submitted_at_nanos = buf.get_u64_le();

    let operator =
        Operator::from_symbol(op_byte as char).ok_or(CodecError::UnknownOperator(op_byte))?;

    Ok(Command {
        operand_a,
        operand_b,
        operator,
        submitted_at_nanos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let cmd = Command::with_timestamp(1.5, -2.0, Operator::Div, 0x0102_0304_0506_0708);
        let frame = encode(&cmd);

        assert_eq!(frame.msg_type_id, COMMAND_MSG_TYPE);
        assert_eq!(frame.length as usize, COMMAND_ENCODED_LEN);
        assert_eq!(&frame.payload[0..8], &1.5f64.to_le_bytes());
        assert_eq!(&frame.payload[8..16], &(-2.0f64).to_le_bytes());
        assert_eq!(frame.payload[16], b'/');
        assert_eq!(&frame.payload[17..25], &0x0102_0304_0506_0708u64.to_le_bytes());
        assert!(frame.payload[25..].iter().all(|&b| b == 0));

        assert_eq!(decode(&frame), Ok(cmd));
    }

    #[test]
    fn test_decode_rejects_unknown_message_type() {
        let mut frame = encode(&Command::with_timestamp(1.0, 1.0, Operator::Add, 1));
        frame.msg_type_id = 7;
        assert_eq!(decode(&frame), Err(CodecError::UnknownMessageType(7)));
    }

    #[test]
    fn test_decode_rejects_truncated_frame() {
        let mut frame = encode(&Command::with_timestamp(1.0, 1.0, Operator::Add, 1));
        frame.length = 10;
        assert_eq!(
            decode(&frame),
            Err(CodecError::Truncated {
                len: 10,
                expected: COMMAND_ENCODED_LEN
            })
        );
    }

    #[test]
    fn test_decode_rejects_unknown_operator() {
        let mut frame = encode(&Command::with_timestamp(1.0, 1.0, Operator::Add, 1));
        frame.payload[16] = b'%';
        assert_eq!(decode(&frame), Err(CodecError::UnknownOperator(b'%')));
    }
}
