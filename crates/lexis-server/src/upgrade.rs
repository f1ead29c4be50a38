// crates/lexis-server/src/upgrade.rs
// ============================================================================
// Module: Upgrade Sniffing
// Description: Request-head classification for newly accepted connections.
// Purpose: Decide between the REST pipeline and the upgrade path per socket.
// Dependencies: bytes, thiserror, tokio
// ============================================================================

//! ## Overview
//! A new connection's first request head is buffered (bounded in size and
//! time) before anything is dispatched. [`classify`] marks the connection as
//! [`ConnectionClass::Upgrade`] when the head carries a non-empty `Upgrade`
//! header. The buffered bytes are replayed ahead of the socket by
//! [`PrefixedStream`], so neither path observes the sniff.
//!
//! ## Invariants
//! - Only the first request head of a connection is inspected.
//! - A head that exceeds the buffer limit is normal traffic unless its
//!   complete lines already declare an upgrade.
//! - No byte is written to the socket while sniffing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::ReadBuf;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Longest head terminator (`\r\n\r\n`); bare `\n\n` also ends a head.
const MAX_TERMINATOR_BYTES: usize = 4;
/// Read chunk size while sniffing.
const SNIFF_CHUNK_BYTES: usize = 4096;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Classification of a connection's first request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionClass {
    /// Ordinary request/response traffic.
    Normal,
    /// Request asks for a protocol upgrade.
    Upgrade {
        /// Request target from the request line.
        path: String,
    },
    /// Head hit the size limit after declaring an upgrade; never served.
    OversizedUpgrade {
        /// Request target from the request line.
        path: String,
    },
}

/// Result of sniffing a connection.
#[derive(Debug)]
pub struct SniffedHead {
    /// Connection classification.
    pub class: ConnectionClass,
    /// Every byte read from the socket so far.
    pub buffered: Bytes,
}

/// Sniffing failures; all of them end the connection without a response.
#[derive(Debug, Error)]
pub enum SniffError {
    /// Peer closed before the request head completed.
    #[error("connection closed before request head completed")]
    Closed,
    /// Request head did not arrive in time.
    #[error("request head not received within {0:?}")]
    Timeout(Duration),
    /// Socket read failed.
    #[error("connection io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Sniffing
// ============================================================================

/// Buffers the first request head and classifies the connection.
///
/// # Errors
///
/// Returns [`SniffError`] when the peer closes, errors, or stalls before a
/// complete head (or `max_head_bytes` bytes) has been read.
pub async fn sniff<S>(
    stream: &mut S,
    max_head_bytes: usize,
    timeout: Duration,
) -> Result<SniffedHead, SniffError>
where
    S: AsyncRead + Unpin,
{
    tokio::time::timeout(timeout, read_head(stream, max_head_bytes))
        .await
        .map_err(|_| SniffError::Timeout(timeout))?
}

/// Reads until the head terminator or the size limit.
async fn read_head<S>(stream: &mut S, max_head_bytes: usize) -> Result<SniffedHead, SniffError>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(SNIFF_CHUNK_BYTES.min(max_head_bytes));
    let mut chunk = [0_u8; SNIFF_CHUNK_BYTES];
    loop {
        let want = SNIFF_CHUNK_BYTES.min(max_head_bytes.saturating_sub(buffer.len()));
        if want == 0 {
            return Ok(SniffedHead {
                class: classify_truncated(&buffer),
                buffered: buffer.freeze(),
            });
        }
        let read = stream
            .read(&mut chunk[.. want])
            .await
            .map_err(|err| SniffError::Io(err.to_string()))?;
        if read == 0 {
            return Err(SniffError::Closed);
        }
        let search_from = buffer.len().saturating_sub(MAX_TERMINATOR_BYTES - 1);
        buffer.extend_from_slice(&chunk[.. read]);
        if let Some(end) = find_head_end(&buffer[search_from ..]) {
            let class = classify(&buffer[.. search_from + end]);
            return Ok(SniffedHead {
                class,
                buffered: buffer.freeze(),
            });
        }
    }
}

/// Returns the offset just past the first empty line (`\n\n` or `\n\r\n`).
fn find_head_end(bytes: &[u8]) -> Option<usize> {
    bytes.iter().enumerate().find_map(|(index, byte)| {
        if *byte != b'\n' {
            return None;
        }
        match bytes.get(index + 1 .. (index + 3).min(bytes.len())) {
            Some([b'\n', ..]) => Some(index + 2),
            Some([b'\r', b'\n']) => Some(index + 3),
            _ => None,
        }
    })
}

/// Classifies a head cut off at the size limit, using only complete lines.
fn classify_truncated(buffer: &[u8]) -> ConnectionClass {
    let complete = buffer.iter().rposition(|byte| *byte == b'\n').map_or(0, |end| end + 1);
    match classify(&buffer[.. complete]) {
        ConnectionClass::Upgrade {
            path,
        } => ConnectionClass::OversizedUpgrade {
            path,
        },
        _ => ConnectionClass::Normal,
    }
}

/// Classifies a complete request head.
#[must_use]
pub fn classify(head: &[u8]) -> ConnectionClass {
    let mut lines = head.split(|byte| *byte == b'\n').map(trim_cr);
    let path = lines
        .next()
        .and_then(|line| line.split(|byte| *byte == b' ').nth(1))
        .map(|target| String::from_utf8_lossy(target).into_owned())
        .unwrap_or_default();
    for line in lines {
        let Some(colon) = line.iter().position(|byte| *byte == b':') else {
            continue;
        };
        let (name, value) = line.split_at(colon);
        if name.trim_ascii().eq_ignore_ascii_case(b"upgrade") && !value[1 ..].trim_ascii().is_empty()
        {
            return ConnectionClass::Upgrade {
                path,
            };
        }
    }
    ConnectionClass::Normal
}

/// Strips a trailing carriage return.
fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

// ============================================================================
// SECTION: Prefixed Stream
// ============================================================================

/// Socket wrapper that replays already-read bytes before reading further.
#[derive(Debug)]
pub struct PrefixedStream<S> {
    /// Bytes consumed during sniffing and not yet replayed.
    prefix: Bytes,
    /// Underlying socket.
    inner: S,
}

impl<S> PrefixedStream<S> {
    /// Wraps a stream with a replay prefix.
    #[must_use]
    pub const fn new(prefix: Bytes, inner: S) -> Self {
        Self {
            prefix,
            inner,
        }
    }

    /// Returns the underlying stream.
    pub const fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PrefixedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.prefix.has_remaining() {
            let count = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[.. count]);
            self.prefix.advance(count);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PrefixedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use tokio::io::AsyncWriteExt;

    use super::*;

    const WS_HEAD: &[u8] = b"GET /chat HTTP/1.1\r\nHost: x\r\nupgrade: websocket\r\n\
        Connection: Upgrade\r\n\r\n";

    #[test]
    fn upgrade_header_name_is_case_insensitive() {
        assert_eq!(
            classify(WS_HEAD),
            ConnectionClass::Upgrade {
                path: "/chat".to_string(),
            }
        );
        let spaced = b"GET / HTTP/1.1\r\nUPGRADE :  h2c\r\n\r\n";
        assert!(matches!(classify(spaced), ConnectionClass::Upgrade { .. }));
    }

    #[test]
    fn empty_or_absent_upgrade_is_normal() {
        assert_eq!(classify(b"GET / HTTP/1.1\r\nUpgrade:   \r\n\r\n"), ConnectionClass::Normal);
        assert_eq!(
            classify(b"GET / HTTP/1.1\r\nConnection: Upgrade\r\nX-Upgrade-Hint: no\r\n\r\n"),
            ConnectionClass::Normal
        );
    }

    #[tokio::test]
    async fn sniff_finds_head_split_across_reads() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            client.write_all(&WS_HEAD[.. 10]).await.unwrap();
            client.write_all(&WS_HEAD[10 ..]).await.unwrap();
            client
        });
        let sniffed = sniff(&mut server, 16 * 1024, Duration::from_secs(5)).await.unwrap();
        assert!(matches!(sniffed.class, ConnectionClass::Upgrade { .. }));
        assert_eq!(&sniffed.buffered[..], WS_HEAD);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn oversized_head_is_normal() {
        let (mut client, mut server) = tokio::io::duplex(8 * 1024);
        client.write_all(&[b'a'; 2048]).await.unwrap();
        let sniffed = sniff(&mut server, 1024, Duration::from_secs(5)).await.unwrap();
        assert_eq!(sniffed.class, ConnectionClass::Normal);
        assert_eq!(sniffed.buffered.len(), 1024);
    }

    #[tokio::test]
    async fn oversized_head_declaring_upgrade_is_never_normal() {
        let (mut client, mut server) = tokio::io::duplex(8 * 1024);
        client
            .write_all(b"GET /chat HTTP/1.1\r\nUpgrade: websocket\r\nCookie: ")
            .await
            .unwrap();
        client.write_all(&[b'c'; 2048]).await.unwrap();
        let sniffed = sniff(&mut server, 1024, Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            sniffed.class,
            ConnectionClass::OversizedUpgrade {
                path: "/chat".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn bare_lf_head_completes_without_waiting() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let head = b"GET /ws HTTP/1.1\nHost: x\nUpgrade: websocket\n\n";
        client.write_all(head).await.unwrap();
        let sniffed = sniff(&mut server, 16 * 1024, Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            sniffed.class,
            ConnectionClass::Upgrade {
                path: "/ws".to_string(),
            }
        );
        assert_eq!(&sniffed.buffered[..], head);
    }

    #[test]
    fn head_end_accepts_crlf_and_bare_lf() {
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(18));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\n\nbody"), Some(16));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
    }

    #[tokio::test]
    async fn partial_head_then_close_is_error() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(b"GET / HTTP/1.1\r\nUpgrade: websocket\r\n").await.unwrap();
        drop(client);
        let result = sniff(&mut server, 16 * 1024, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(SniffError::Closed)));
    }

    #[tokio::test]
    async fn stalled_head_times_out() {
        let (_client, mut server) = tokio::io::duplex(1024);
        let result = sniff(&mut server, 16 * 1024, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(SniffError::Timeout(_))));
    }

    #[tokio::test]
    async fn prefixed_stream_replays_then_reads_inner() {
        let (mut client, server) = tokio::io::duplex(1024);
        client.write_all(b" world").await.unwrap();
        drop(client);
        let mut stream = PrefixedStream::new(Bytes::from_static(b"hello"), server);
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hello world");
    }
}
