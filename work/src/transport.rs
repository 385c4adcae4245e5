//! Newline-delimited framing over a byte stream.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Longest line accepted from a peer, excluding the newline.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

/// A buffered, bidirectional byte stream a challenge runs over.
pub trait Transport: AsyncBufRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncBufRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Write `line` followed by `'\n'` and flush.
pub async fn write_line<W>(writer: &mut W, line: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut framed = Vec::with_capacity(line.len() + 1);
    framed.extend_from_slice(line);
    framed.push(b'\n');
    writer.write_all(&framed).await?;
    writer.flush().await
}

/// Read up to the next `'\n'` and return the line without it.
///
/// Fails with `UnexpectedEof` if the stream ends first and with
/// `InvalidData` if more than `max_len` bytes arrive without a newline.
pub async fn read_line<R>(reader: &mut R, max_len: usize) -> io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut line = Vec::new();
    let limit = u64::try_from(max_len).unwrap_or(u64::MAX).saturating_add(1);
    (&mut *reader).take(limit).read_until(b'\n', &mut line).await?;

    if line.last() == Some(&b'\n') {
        line.pop();
        return Ok(line);
    }
    if line.len() > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds {max_len} bytes"),
        ));
    }
    Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "stream closed before end of line",
    ))
}
