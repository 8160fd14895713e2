//! Frame decoding for the two wire shapes the instrument speaks.
//!
//! A response is either a newline-terminated text line or a TMC-style
//! definite-length binary block:
//!
//! ```text
//! #  d  <d decimal digits>  <length payload bytes>
//! │  │  │                   └ payload, returned verbatim
//! │  │  └ payload length in bytes
//! │  └ ASCII digit 1-9: number of length digits
//! └ marker byte 0x23
//! ```
//!
//! Both shapes are decoded out of the same [`StreamBuffer`]; the decoders
//! hold no state of their own, so a failed read leaves recovery policy
//! entirely to the caller.

use std::time::Duration;

use bytes::Bytes;

use crate::error::{Result, ScopeError};
use crate::protocol::StreamBuffer;

/// Marker byte opening a definite-length block.
pub const BLOCK_MARKER: u8 = b'#';

/// Read one raw line, excluding the `\n` delimiter.
pub async fn read_line(buffer: &StreamBuffer, timeout: Duration) -> Result<Bytes> {
    buffer.consume_line(timeout).await
}

/// Read one line and decode it as UTF-8 text.
pub async fn read_text_line(buffer: &StreamBuffer, timeout: Duration) -> Result<String> {
    let line = buffer.consume_line(timeout).await?;
    Ok(std::str::from_utf8(&line)?.to_owned())
}

/// Read one definite-length binary block and return its payload verbatim.
///
/// The declared length must be satisfied within `timeout` or the read
/// fails with `Timeout`. A malformed marker, digit-count or length field
/// fails with `Framing`; the stream position is unreliable afterwards.
pub async fn read_block(buffer: &StreamBuffer, timeout: Duration) -> Result<Bytes> {
    let header = buffer.consume(2, timeout).await?;
    if header[0] != BLOCK_MARKER {
        return Err(ScopeError::Framing(format!(
            "expected block marker '#', got {:#04x}",
            header[0]
        )));
    }

    let digit_count = match header[1] {
        b'1'..=b'9' => (header[1] - b'0') as usize,
        other => {
            return Err(ScopeError::Framing(format!(
                "block digit count must be 1-9, got {:#04x}",
                other
            )))
        }
    };

    let length_field = buffer.consume(digit_count, timeout).await?;
    let mut length = 0usize;
    for &byte in &length_field {
        if !byte.is_ascii_digit() {
            return Err(ScopeError::Framing(format!(
                "non-numeric block length field {:?}",
                length_field
            )));
        }
        length = length * 10 + (byte - b'0') as usize;
    }

    buffer.consume(length, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_read_block_single_digit_length() {
        let buffer = StreamBuffer::new();
        buffer.append(b"#14Wxyz");

        let payload = read_block(&buffer, SHORT).await.unwrap();
        assert_eq!(&payload[..], b"Wxyz");
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_read_block_leaves_trailing_bytes() {
        let buffer = StreamBuffer::new();
        buffer.append(b"#3008datadata*IDN");

        let payload = read_block(&buffer, SHORT).await.unwrap();
        assert_eq!(&payload[..], b"datadata");
        assert_eq!(buffer.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_block_truncated_payload_times_out() {
        let buffer = StreamBuffer::new();
        // Declares 123 payload bytes but only 3 ever arrive.
        buffer.append(b"#3123abc");

        let err = read_block(&buffer, SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_read_block_rejects_wrong_marker() {
        let buffer = StreamBuffer::new();
        buffer.append(b"X14Wxyz");

        let err = read_block(&buffer, SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::Framing(_)));
    }

    #[tokio::test]
    async fn test_read_block_rejects_zero_digit_count() {
        let buffer = StreamBuffer::new();
        buffer.append(b"#0");

        let err = read_block(&buffer, SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::Framing(_)));
    }

    #[tokio::test]
    async fn test_read_block_rejects_non_digit_count() {
        let buffer = StreamBuffer::new();
        buffer.append(b"#A1234");

        let err = read_block(&buffer, SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::Framing(_)));
    }

    #[tokio::test]
    async fn test_read_block_rejects_non_numeric_length() {
        let buffer = StreamBuffer::new();
        buffer.append(b"#212xx");

        let err = read_block(&buffer, SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::Framing(_)));
    }

    #[tokio::test]
    async fn test_read_block_payload_arriving_in_chunks() {
        let buffer = std::sync::Arc::new(StreamBuffer::new());

        let reader = {
            let buffer = buffer.clone();
            tokio::spawn(async move { read_block(&buffer, Duration::from_secs(5)).await })
        };

        buffer.append(b"#2");
        tokio::task::yield_now().await;
        buffer.append(b"10");
        tokio::task::yield_now().await;
        buffer.append(b"0123456789");

        let payload = reader.await.unwrap().unwrap();
        assert_eq!(&payload[..], b"0123456789");
    }

    #[tokio::test]
    async fn test_read_text_line_strips_newline() {
        let buffer = StreamBuffer::new();
        buffer.append(b"VENDOR,MODEL,SN123,1.00\n");

        let line = read_text_line(&buffer, SHORT).await.unwrap();
        assert_eq!(line, "VENDOR,MODEL,SN123,1.00");
    }

    #[tokio::test]
    async fn test_read_text_line_rejects_invalid_utf8() {
        let buffer = StreamBuffer::new();
        buffer.append(b"\xff\xfe\n");

        let err = read_text_line(&buffer, SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::Decode(_)));
    }

    #[tokio::test]
    async fn test_read_line_returns_raw_bytes() {
        let buffer = StreamBuffer::new();
        buffer.append(b"\xff\xfe\n");

        let line = read_line(&buffer, SHORT).await.unwrap();
        assert_eq!(&line[..], b"\xff\xfe");
    }
}
