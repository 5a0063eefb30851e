//! Owns the TCP stream of one connection.
use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, instrument, trace};

use crate::error::{Error, Result};
use crate::line_reader::LineReader;
use crate::util::bytes_to_human_str;

/// Payloads at least this long are written through a write buffer and
/// flushed; shorter ones go straight to the socket.
pub const BUFFERED_WRITE_THRESHOLD: usize = 1500;

/// Errors that are retried in place by the write loop rather than surfaced.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// Writes all of `data` to `writer`, returning once it has been handed over.
///
/// Payloads shorter than [`BUFFERED_WRITE_THRESHOLD`] go straight to the
/// writer. Longer ones go through a [`BufWriter`] that lives for one write and
/// is flushed before returning. Transient errors are retried in place; any
/// other error is returned along with the number of bytes known to have been
/// written before it.
pub async fn write_payload<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<()> {
    let mut sent = 0;

    while sent < data.len() {
        let rest = &data[sent..];

        let res = if rest.len() >= BUFFERED_WRITE_THRESHOLD {
            write_buffered(writer, rest).await
        } else {
            writer.write(rest).await
        };

        match res {
            Ok(0) => {
                return Err(Error::Write {
                    sent,
                    source: io::ErrorKind::WriteZero.into(),
                })
            },
            Ok(n) => sent += n,
            Err(e) if is_transient(&e) => continue,
            Err(source) => return Err(Error::Write { sent, source }),
        }
    }

    Ok(())
}

/// Writes as much of `data` as the buffer takes, then flushes it all out.
///
/// Bytes a failed flush leaves in the buffer are dropped with it, so they can
/// never reach the writer after a later, unrelated write.
async fn write_buffered<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> io::Result<usize> {
    let mut buffered = BufWriter::new(writer);
    let n = buffered.write(data).await?;

    loop {
        match buffered.flush().await {
            Ok(()) => return Ok(n),
            Err(e) if is_transient(&e) => continue,
            Err(e) => return Err(e),
        }
    }
}

pub struct Transport {
    reader: LineReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer_addr: SocketAddr,
}

impl Transport {
    #[instrument(name = "connect", err, skip_all)]
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let peer_addr = stream.peer_addr()?;
        debug!(%peer_addr, "connected");

        let (r, w) = stream.into_split();

        Ok(Self {
            reader: r.into(),
            writer: w,
            peer_addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Writes all of `data` to the socket; see [`write_payload`].
    pub async fn send_all(&mut self, data: &[u8]) -> Result<()> {
        write_payload(&mut self.writer, data).await
    }

    /// Reads one status line, without its CRLF. The stream closing first is an
    /// `UnexpectedEof` error, and an overlong line is [`Error::Malformed`].
    pub async fn read_line(&mut self) -> Result<Bytes> {
        match self.reader.read_line().await {
            Ok(Some(line)) => {
                trace!(line = bytes_to_human_str(&line), "received");
                Ok(line)
            },
            Ok(None) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )
            .into()),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                Err(Error::Malformed(e.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Reads a job or YAML body of `n_bytes` declared bytes, plus the CRLF
    /// that must follow it.
    pub async fn read_body(&mut self, n_bytes: u64) -> Result<Bytes> {
        let declared = usize::try_from(n_bytes)
            .ok()
            .filter(|n| n.checked_add(2).is_some())
            .ok_or_else(|| {
                Error::Malformed(format!("body length {n_bytes} too large"))
            })?;

        let mut body = self.reader.read_exact(declared + 2).await?;

        if !body.ends_with(b"\r\n") {
            return Err(Error::BodyFraming { declared });
        }

        body.truncate(declared);

        Ok(body)
    }

    /// Shuts down the write half; the read half closes when dropped.
    pub async fn close(mut self) {
        if let Err(error) = self.writer.shutdown().await {
            debug!(%error, "error during shutdown");
        }
        debug!(peer_addr = %self.peer_addr, "closed connection");
    }
}
