//! Reading and writing whole frames on an async byte stream.
//!
//! A single `read()` on a TCP socket may return fewer than [`FRAME_SIZE`]
//! bytes, so [`read_frame`] keeps reading until one complete frame has
//! arrived.  It distinguishes a clean close (the peer hung up *between*
//! frames) from a truncated frame (the peer hung up *inside* one).
//!
//! [`FrameReader`] does the same job for callers that wait on a socket and
//! something else at once in `tokio::select!`: it owns its buffer, so losing
//! the race never loses bytes.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::frame::{Frame, FRAME_SIZE};

/// Incremental frame reader that keeps partial progress between calls.
///
/// [`FrameReader::next_frame`] is cancel-safe: if its future is dropped
/// part-way through a frame (for example because another `select!` branch
/// won), the bytes already received stay buffered and the next call carries
/// on where the previous one stopped.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: [u8; FRAME_SIZE],
    filled: usize,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: [0u8; FRAME_SIZE],
            filled: 0,
        }
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream on a frame boundary
    /// (a zero-length read).
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if the stream ends part-way
    /// through a frame, or any I/O error from the underlying reader.
    pub async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        while self.filled < FRAME_SIZE {
            let n = self.inner.read(&mut self.buf[self.filled..]).await?;
            if n == 0 {
                if self.filled == 0 {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "stream closed after {} of {FRAME_SIZE} frame bytes",
                        self.filled
                    ),
                ));
            }
            self.filled += n;
        }
        self.filled = 0;
        Ok(Some(Frame::from(self.buf)))
    }
}

/// Reads one frame.
///
/// Unlike [`FrameReader`], partial progress is lost if the returned future
/// is dropped, so only use this where the stream is abandoned on
/// cancellation.
///
/// Returns `Ok(None)` when the peer closed the stream on a frame boundary.
///
/// # Errors
///
/// Returns [`io::ErrorKind::UnexpectedEof`] if the stream ends part-way
/// through a frame, or any I/O error from the underlying reader.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    FrameReader::new(reader).next_frame().await
}

/// Writes one frame in full.
///
/// # Errors
///
/// Returns any I/O error from the underlying writer.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_frame_reassembles_split_reads() {
        // Arrange: one frame delivered in three uneven chunks
        let frame = Frame::from_text("hello");
        let bytes = frame.as_bytes();
        let mut reader = Builder::new()
            .read(&bytes[..5])
            .read(&bytes[5..100])
            .read(&bytes[100..])
            .build();

        // Act
        let received = read_frame(&mut reader).await.unwrap();

        // Assert
        assert_eq!(received, Some(frame));
    }

    #[tokio::test]
    async fn test_read_frame_returns_none_on_clean_close() {
        let mut reader = Builder::new().build();
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_frame_reports_truncated_frame() {
        // Arrange: the peer vanishes after 10 bytes
        let mut reader = Builder::new().read(&[b'x'; 10]).build();

        // Act
        let err = read_frame(&mut reader).await.unwrap_err();

        // Assert
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_read_frame_propagates_io_error() {
        let mut reader = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let err = read_frame(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_frame_reader_keeps_partial_frame_across_cancellation() {
        // Arrange: half a frame, a pause, then the rest
        let frame = Frame::from_text("patience");
        let bytes = frame.as_bytes();
        let mock = Builder::new()
            .read(&bytes[..60])
            .wait(std::time::Duration::from_millis(100))
            .read(&bytes[60..])
            .build();
        let mut reader = FrameReader::new(mock);

        // Act: give up while the second half is still in flight
        let first =
            tokio::time::timeout(std::time::Duration::from_millis(20), reader.next_frame()).await;
        let second = reader.next_frame().await.unwrap();

        // Assert: nothing was lost
        assert!(first.is_err(), "first attempt should have timed out");
        assert_eq!(second, Some(frame));
    }

    #[tokio::test]
    async fn test_frame_reader_yields_consecutive_frames() {
        let a = Frame::from_text("one");
        let b = Frame::from_text("two");
        let mut joined = a.as_bytes().to_vec();
        joined.extend_from_slice(b.as_bytes());
        let mock = Builder::new().read(&joined).build();
        let mut reader = FrameReader::new(mock);

        assert_eq!(reader.next_frame().await.unwrap(), Some(a));
        assert_eq!(reader.next_frame().await.unwrap(), Some(b));
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_frame_writes_exactly_one_frame() {
        // Arrange
        let frame = Frame::from_text("LOGOUT");
        let mut writer = Builder::new().write(frame.as_bytes()).build();

        // Act / Assert: the mock panics on any unexpected byte
        write_frame(&mut writer, &frame).await.unwrap();
    }
}
