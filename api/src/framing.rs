//! Length-delimited framing for `prost::Message`s sent over a plain HTTP/1.1 body.
//!
//! The sync protocol's `Push` (client-streaming) and `PullStream` (server-streaming) RPCs need
//! to carry a sequence of messages over a single request or response body. Lacking a gRPC
//! transport (the teacher's own service is unary-only, hand-rolled atop `hyper`), each message is
//! prefixed with its encoded length as a 4-byte big-endian `u32`, mirroring the framing gRPC
//! itself uses on the wire minus the compression flag byte, which this protocol never sets.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;

/// Encodes `message` as a length-delimited frame: a 4-byte big-endian length prefix followed by
/// its protobuf encoding.
pub fn encode_frame<M: Message>(message: &M) -> Bytes {
	let mut buf = BytesMut::with_capacity(4 + message.encoded_len());
	buf.put_u32(message.encoded_len() as u32);
	message.encode(&mut buf).expect("BytesMut grows to fit");
	buf.freeze()
}

/// Incrementally decodes length-delimited frames out of a byte stream, buffering partial frames
/// across calls to [`FrameDecoder::push`].
#[derive(Default)]
pub struct FrameDecoder {
	buf: BytesMut,
}

impl FrameDecoder {
	/// Creates an empty decoder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `chunk` to the internal buffer.
	pub fn push(&mut self, chunk: &[u8]) {
		self.buf.extend_from_slice(chunk);
	}

	/// Pops and decodes the next complete frame buffered so far, if any.
	///
	/// Returns `Ok(None)` when the buffer holds an incomplete frame (more input is needed);
	/// `Err` when a complete frame fails to decode as `M`.
	pub fn try_next<M: Message + Default>(&mut self) -> Result<Option<M>, prost::DecodeError> {
		if self.buf.len() < 4 {
			return Ok(None);
		}
		let len = u32::from_be_bytes(self.buf[..4].try_into().unwrap()) as usize;
		if self.buf.len() < 4 + len {
			return Ok(None);
		}
		self.buf.advance(4);
		let frame = self.buf.split_to(len);
		Ok(Some(M::decode(frame.freeze())?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{Chunk, ChunkType};

	#[test]
	fn round_trips_a_single_frame() {
		let chunk = Chunk { id: "abc".into(), chunk_type: ChunkType::FilePart as i32, buffer: Bytes::from_static(b"hello") };
		let framed = encode_frame(&chunk);

		let mut decoder = FrameDecoder::new();
		decoder.push(&framed);
		let decoded: Chunk = decoder.try_next().unwrap().expect("frame complete");
		assert_eq!(decoded, chunk);
	}

	#[test]
	fn handles_split_writes() {
		let chunk = Chunk { id: "abc".into(), chunk_type: ChunkType::FilePart as i32, buffer: Bytes::from_static(b"hello") };
		let framed = encode_frame(&chunk);

		let mut decoder = FrameDecoder::new();
		decoder.push(&framed[..3]);
		assert!(decoder.try_next::<Chunk>().unwrap().is_none());
		decoder.push(&framed[3..]);
		let decoded: Chunk = decoder.try_next().unwrap().expect("frame complete");
		assert_eq!(decoded, chunk);
	}

	#[test]
	fn decodes_multiple_queued_frames() {
		let a = Chunk { id: "a".into(), chunk_type: ChunkType::FilePart as i32, buffer: Bytes::from_static(b"1") };
		let b = Chunk { id: "b".into(), chunk_type: ChunkType::EndData as i32, buffer: Bytes::new() };

		let mut decoder = FrameDecoder::new();
		decoder.push(&encode_frame(&a));
		decoder.push(&encode_frame(&b));

		let first: Chunk = decoder.try_next().unwrap().unwrap();
		let second: Chunk = decoder.try_next().unwrap().unwrap();
		assert_eq!(first, a);
		assert_eq!(second, b);
		assert!(decoder.try_next::<Chunk>().unwrap().is_none());
	}
}
