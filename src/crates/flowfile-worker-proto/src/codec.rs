//! Length-delimited framing over the worker socket, matching spec §6's
//! "framing is length-prefixed with a tag byte": a `u32` big-endian length
//! prefix followed by a JSON-encoded [`Frame`] (the tag lives inside the
//! encoded enum itself, per `serde`'s externally-tagged representation,
//! rather than as a separate leading byte). JSON rather than `bincode`
//! because `PlanOp` carries `serde_json::Value` settings fields, and
//! `Value`'s `Deserialize` impl needs a self-describing format — `bincode`
//! can encode it but cannot decode it back. Grounded on the
//! `tokio_util::codec::{Encoder, Decoder}` pair pulled in by the teacher's
//! `tokio-util` dependency for its own framed transports.

use crate::frame::Frame;
use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Frames larger than this are rejected rather than buffered without bound;
/// a single task's plan or artifact schema should never approach this.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;
const LENGTH_PREFIX_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),
    #[error("malformed frame: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Stateless; one instance is shared by the read and write halves of a
/// worker connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&frame)?;
        if payload.len() > MAX_FRAME_LEN {
            return Err(CodecError::TooLarge(payload.len()));
        }
        dst.reserve(LENGTH_PREFIX_LEN + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }
        let len = u32::from_be_bytes(src[..LENGTH_PREFIX_LEN].try_into().unwrap()) as usize;
        if len > MAX_FRAME_LEN {
            return Err(CodecError::TooLarge(len));
        }
        if src.len() < LENGTH_PREFIX_LEN + len {
            src.reserve(LENGTH_PREFIX_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let payload = src.split_to(len);
        let frame = serde_json::from_slice(&payload)?;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_types::TaskId;

    #[test]
    fn round_trips_a_frame_through_the_buffer() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        let frame = Frame::Ping { nonce: 42 };
        codec.encode(frame, &mut buf).unwrap();

        // A partial read must not yield a frame yet.
        let mut partial = buf.split_to(buf.len() - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let mut full = BytesMut::new();
        let mut codec = FrameCodec;
        codec.encode(Frame::Ping { nonce: 42 }, &mut full).unwrap();
        let decoded = codec.decode(&mut full).unwrap().unwrap();
        assert!(matches!(decoded, Frame::Ping { nonce: 42 }));
        assert!(full.is_empty());
    }

    #[test]
    fn decodes_two_frames_written_back_to_back() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        codec.encode(Frame::Cancel { task_id: TaskId("t1".into()) }, &mut buf).unwrap();
        codec.encode(Frame::Cancel { task_id: TaskId("t2".into()) }, &mut buf).unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(first, Frame::Cancel { task_id } if task_id.0 == "t1"));
        assert!(matches!(second, Frame::Cancel { task_id } if task_id.0 == "t2"));
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_an_oversized_length_prefix() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_FRAME_LEN + 1) as u32);
        assert!(matches!(codec.decode(&mut buf), Err(CodecError::TooLarge(_))));
    }
}
