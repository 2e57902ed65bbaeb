//! Length-prefixed framing over a byte stream

use bytes::{Buf, BufMut, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::error::WireError;

/// Default frame size limit (64 MiB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

const HEADER_LEN: usize = 4;

/// A duplex channel carrying `u32`-LE length-prefixed frames
///
/// Reads go through an internal buffer filled with `read_buf`, which is
/// cancel safe: [`Connection::poll`] can give up on a timeout without losing
/// partially received bytes.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    read_buf: BytesMut,
    max_frame_size: usize,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(8 * 1024),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(mut self, limit: usize) -> Self {
        self.max_frame_size = limit;
        self
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<(), WireError> {
        if payload.len() > self.max_frame_size {
            return Err(WireError::FrameTooLarge {
                size: payload.len(),
                limit: self.max_frame_size,
            });
        }
        trace!(len = payload.len(), "sending frame");
        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
        frame.put_u32_le(payload.len() as u32);
        frame.put_slice(payload);
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Wait for the next complete frame
    pub async fn recv_frame(&mut self) -> Result<BytesMut, WireError> {
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(frame);
            }
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(WireError::ConnectionClosed);
            }
        }
    }

    /// Wait up to `timeout` for a complete frame to be buffered.
    ///
    /// Returns `Ok(true)` when [`Connection::recv_frame`] will return without
    /// waiting, `Ok(false)` on timeout and `ConnectionClosed` on EOF.
    pub async fn poll(&mut self, timeout: Duration) -> Result<bool, WireError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.frame_ready()? {
                return Ok(true);
            }
            match tokio::time::timeout_at(deadline, self.stream.read_buf(&mut self.read_buf)).await
            {
                Err(_) => return Ok(false),
                Ok(Ok(0)) => return Err(WireError::ConnectionClosed),
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    pub async fn shutdown(&mut self) -> Result<(), WireError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn frame_len(&self) -> Result<Option<usize>, WireError> {
        if self.read_buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let mut header = &self.read_buf[..HEADER_LEN];
        let len = header.get_u32_le() as usize;
        if len > self.max_frame_size {
            warn!(len, limit = self.max_frame_size, "peer announced an oversized frame");
            return Err(WireError::FrameTooLarge {
                size: len,
                limit: self.max_frame_size,
            });
        }
        Ok(Some(len))
    }

    fn frame_ready(&self) -> Result<bool, WireError> {
        Ok(self
            .frame_len()?
            .is_some_and(|len| self.read_buf.len() >= HEADER_LEN + len))
    }

    fn take_frame(&mut self) -> Result<Option<BytesMut>, WireError> {
        let Some(len) = self.frame_len()? else {
            return Ok(None);
        };
        if self.read_buf.len() < HEADER_LEN + len {
            self.read_buf.reserve(HEADER_LEN + len - self.read_buf.len());
            return Ok(None);
        }
        self.read_buf.advance(HEADER_LEN);
        Ok(Some(self.read_buf.split_to(len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frames_round_trip() {
        let (a, b) = duplex(64);
        let mut left = Connection::new(a);
        let mut right = Connection::new(b);

        let big = vec![7u8; 1000];
        let writer = tokio::spawn(async move {
            left.send_frame(b"hello").await.unwrap();
            left.send_frame(&[]).await.unwrap();
            left.send_frame(&big).await.unwrap();
            left
        });
        assert_eq!(&right.recv_frame().await.unwrap()[..], b"hello");
        assert!(right.recv_frame().await.unwrap().is_empty());
        assert_eq!(right.recv_frame().await.unwrap().len(), 1000);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_poll_times_out_then_sees_frame() {
        let (a, b) = duplex(1024);
        let mut left = Connection::new(a);
        let mut right = Connection::new(b);

        assert!(!right.poll(Duration::from_millis(20)).await.unwrap());
        left.send_frame(b"ping").await.unwrap();
        assert!(right.poll(Duration::from_secs(1)).await.unwrap());
        assert_eq!(&right.recv_frame().await.unwrap()[..], b"ping");
    }

    #[tokio::test]
    async fn test_poll_keeps_partial_frames() {
        let (mut raw, b) = duplex(1024);
        let mut conn = Connection::new(b);

        raw.write_all(&5u32.to_le_bytes()).await.unwrap();
        raw.write_all(b"ab").await.unwrap();
        assert!(!conn.poll(Duration::from_millis(20)).await.unwrap());
        raw.write_all(b"cde").await.unwrap();
        assert!(conn.poll(Duration::from_secs(1)).await.unwrap());
        assert_eq!(&conn.recv_frame().await.unwrap()[..], b"abcde");
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let (a, b) = duplex(64);
        let mut conn = Connection::new(b);
        drop(a);
        assert!(matches!(
            conn.poll(Duration::from_secs(1)).await,
            Err(WireError::ConnectionClosed)
        ));
        assert!(matches!(
            conn.recv_frame().await,
            Err(WireError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (a, b) = duplex(64);
        let mut left = Connection::new(a).with_max_frame_size(4);
        let mut right = Connection::new(b).with_max_frame_size(4);
        assert!(matches!(
            left.send_frame(b"too long").await,
            Err(WireError::FrameTooLarge { .. })
        ));

        let mut raw = left.into_inner();
        raw.write_all(&100u32.to_le_bytes()).await.unwrap();
        assert!(matches!(
            right.recv_frame().await,
            Err(WireError::FrameTooLarge { .. })
        ));
    }
}
