//! Line framing over async byte streams.
//!
//! Every request and reply is a single line terminated by `\n`, which keeps
//! the protocol usable from netcat-style tools and makes partial or
//! coalesced TCP reads harmless.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame, terminator excluded.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Reads the next frame with its line terminator stripped.
///
/// Returns `Ok(None)` on a clean end of stream. A final line without a
/// terminator is still returned as a frame.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let read = reader
        .take(MAX_FRAME_LEN as u64 + 1)
        .read_until(b'\n', &mut frame)
        .await?;
    if read == 0 {
        return Ok(None);
    }

    if frame.last() == Some(&b'\n') {
        frame.pop();
        if frame.last() == Some(&b'\r') {
            frame.pop();
        }
    } else if frame.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame exceeds {MAX_FRAME_LEN} bytes"),
        ));
    }

    Ok(Some(frame))
}

/// Like [`read_frame`], bounded by an optional deadline.
pub async fn read_frame_timeout<R>(
    reader: &mut R,
    deadline: Option<Duration>,
) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, read_frame(reader))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read deadline exceeded"))?,
        None => read_frame(reader).await,
    }
}

/// Writes an already terminated frame and flushes it.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8], deadline: Option<Duration>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let write = async {
        writer.write_all(frame).await?;
        writer.flush().await
    };
    match deadline {
        Some(limit) => tokio::time::timeout(limit, write)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write deadline exceeded"))?,
        None => write.await,
    }
}
