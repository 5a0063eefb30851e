use std::io;

use bytes::{Bytes, BytesMut};
use itertools::Itertools;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest status line accepted, CRLF included. Matches the server's own
/// line buffer, so a well-behaved server never sends anything longer.
pub const MAX_LINE_LEN: usize = 224;

/// Most spare capacity reserved in one go while reading a body. The declared
/// length comes off the wire, so the buffer grows as bytes actually arrive.
const READ_CHUNK: usize = 64 * 1024;

/// Reads CRLF-terminated status lines and fixed-length job bodies from one
/// stream, sharing a single read buffer between the two.
pub struct LineReader<T: AsyncRead + Unpin> {
    /// Stores data that's been read in but not yet returned.
    buf: BytesMut,
    /// Index in buf from which a valid CRLF pair may appear (and before which
    /// a CRLF sequence hasn't been seen).
    maybe_crlf_from: usize,
    /// Data source
    reader: T,
}

impl<T: AsyncRead + Unpin> LineReader<T> {
    /// Reads a line from the internal buffer and/or reader, without its
    /// trailing CRLF. On an end-of-stream condition, returns a None result,
    /// discarding any partly-read line in the internal buffer.
    ///
    /// A line longer than [`MAX_LINE_LEN`] fails with `InvalidData`.
    pub async fn read_line(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            // Scan from one position earlier than the start of the newest
            // bytes in case we received a \r then \n on the next read, keeping
            // O(bytes_read) behaviour.
            if let Some(eol) = self
                .buf
                .iter()
                .skip(self.maybe_crlf_from)
                .tuple_windows::<(_, _)>()
                .position(|x| x == (&b'\r', &b'\n'))
            {
                let line_len = self.maybe_crlf_from + eol + 2;
                if line_len > MAX_LINE_LEN {
                    return Err(line_too_long(line_len));
                }

                let line = self.buf.split_to(line_len).freeze();

                // Drop trailing b"\r\n".
                let line = line.slice(0..line.len() - 2);

                self.maybe_crlf_from = 0;

                return Ok(Some(line));
            }

            if self.buf.len() >= MAX_LINE_LEN {
                return Err(line_too_long(self.buf.len()));
            }

            let n_bytes_read = self.reader.read_buf(&mut self.buf).await?;

            // If we didn't read any bytes, the server closed the stream.
            if n_bytes_read == 0 {
                return Ok(None);
            }

            // Resume scanning from the byte before the first byte returned by
            // read_buf (and 0 if buf is empty).
            self.maybe_crlf_from =
                self.buf.len().saturating_sub(n_bytes_read + 1);
        }
    }

    /// Reads exactly `n` bytes, taking from the internal buffer first. Fails
    /// with `UnexpectedEof` if the stream ends early.
    pub async fn read_exact(&mut self, n: usize) -> io::Result<Bytes> {
        while self.buf.len() < n {
            self.buf.reserve((n - self.buf.len()).min(READ_CHUNK));

            if self.reader.read_buf(&mut self.buf).await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "stream closed {} bytes into a {n} byte read",
                        self.buf.len()
                    ),
                ));
            }
        }

        // Bytes taken here were never part of a line, so any CRLF scan
        // restarts from the front of what remains.
        self.maybe_crlf_from = 0;

        Ok(self.buf.split_to(n).freeze())
    }
}

fn line_too_long(len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("line of at least {len} bytes, limit is {MAX_LINE_LEN}"),
    )
}

impl<T: AsyncRead + Unpin> From<T> for LineReader<T> {
    fn from(value: T) -> Self {
        Self {
            buf: BytesMut::new(),
            maybe_crlf_from: 0,
            reader: value,
        }
    }
}
