//! Wire protocol: shared receive buffer and frame decoding.

mod stream_buffer;

pub mod framing;

pub use framing::{read_block, read_line, read_text_line, BLOCK_MARKER};
pub use stream_buffer::StreamBuffer;
