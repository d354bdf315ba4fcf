use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, TunnelError};

/// The TLS stream carries a sequence of length-prefixed IP packets: a
/// 16-bit unsigned big-endian length (1..65535) followed by exactly that
/// many bytes (spec §4.3 "Session framing", §6 "Wire protocol"). A length
/// of zero is reserved and rejected.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Read one length-prefixed frame. `max_len` is the receiver's enforced
/// upper bound (adapter MTU plus tolerance, per spec §4.3); frames above it
/// are rejected as a protocol error even though the wire format could in
/// principle carry up to 65535 bytes.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    reader.read_exact(&mut len_buf).await.map_err(TunnelError::AdapterIo)?;
    let len = u16::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(TunnelError::Protocol("received zero-length frame".into()));
    }
    if len > max_len.min(MAX_FRAME_LEN) {
        return Err(TunnelError::Protocol(format!(
            "frame length {len} exceeds maximum {max_len}"
        )));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(TunnelError::AdapterIo)?;
    Ok(payload)
}

/// Write one length-prefixed frame. `payload` must be 1..=65535 bytes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() {
        return Err(TunnelError::Protocol("refusing to send zero-length frame".into()));
    }
    if payload.len() > MAX_FRAME_LEN {
        return Err(TunnelError::Protocol(format!(
            "payload of {} bytes exceeds maximum frame length",
            payload.len()
        )));
    }
    let len = payload.len() as u16;
    writer.write_all(&len.to_be_bytes()).await.map_err(TunnelError::AdapterIo)?;
    writer.write_all(payload).await.map_err(TunnelError::AdapterIo)?;
    writer.flush().await.map_err(TunnelError::AdapterIo)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trip_preserves_bytes() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello world").await.unwrap();
        let mut cursor = Cursor::new(buf);
        let got = read_frame(&mut cursor, 1500).await.unwrap();
        assert_eq!(got, b"hello world");
    }

    #[tokio::test]
    async fn zero_length_is_rejected() {
        let mut cursor = Cursor::new(vec![0u8, 0u8]);
        let err = read_frame(&mut cursor, 1500).await.unwrap_err();
        assert!(matches!(err, TunnelError::Protocol(_)));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut cursor = Cursor::new(vec![0xFFu8, 0xFFu8]);
        let err = read_frame(&mut cursor, 1500).await.unwrap_err();
        assert!(matches!(err, TunnelError::Protocol(_)));
    }

    #[tokio::test]
    async fn writer_refuses_empty_payload() {
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, &[]).await.unwrap_err();
        assert!(matches!(err, TunnelError::Protocol(_)));
    }
}
