//! Coordinator channel protocol
//!
//! This module defines the protocol spoken between workers and the coordinator
//! over the local Unix socket. It is deliberately tiny: two verbs, one request
//! per connection, and the reply is terminated by the coordinator closing the
//! connection.
//!
//! # Message Flow
//!
//! ```text
//! Worker                          Coordinator
//!   |                                  |
//!   |-------- PING\n ----------------->|
//!   |<------- ok (close) --------------|
//!   |                                  |
//!   |-------- POP <rank>\n ----------->|
//!   |<------- <item> (close) ----------|
//!   |                                  |
//!   |-------- POP <rank>\n ----------->|   (queue exhausted, listener gone)
//!   |<------- connect refused / EOF ---|
//! ```
//!
//! # Message Framing
//!
//! Requests are single newline-terminated lines. Replies carry no length
//! prefix: the reader consumes bytes until the peer closes. Both directions are
//! bounded by [`MAX_MESSAGE_BYTES`].

use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Health check verb
pub const PING: &str = "PING";

/// Work pop verb
pub const POP: &str = "POP";

/// Fixed acknowledgement sent in reply to `PING`
pub const PING_REPLY: &str = "ok";

/// Upper bound for a single request line or reply payload (64 KiB)
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Request sent by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Readiness check; never consumes an item
    Ping,

    /// Pop one work item on behalf of the worker with this rank
    Pop { rank: usize },
}

/// Errors produced while decoding a request line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty request")]
    Empty,

    #[error("unknown verb: {0}")]
    UnknownVerb(String),

    #[error("invalid worker rank: {0:?}")]
    InvalidRank(String),

    #[error("message exceeds the 64 KiB limit")]
    TooLarge,

    #[error("connection closed before a full request was received")]
    ConnectionClosed,
}

impl Request {
    /// Create a pop request for the given worker rank.
    pub fn pop(rank: usize) -> Self {
        Self::Pop { rank }
    }

    /// Encode as a wire line (with trailing newline).
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }

    /// Decode a single request line.
    ///
    /// Trailing whitespace (including `\r\n`) is ignored. The verb and its
    /// argument are separated by a single space.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end();
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb, Some(arg)),
            None => (line, None),
        };

        match verb {
            PING => Ok(Self::Ping),
            POP => {
                let raw = arg.unwrap_or_default();
                let rank = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| ProtocolError::InvalidRank(raw.to_string()))?;
                Ok(Self::Pop { rank })
            }
            other => Err(ProtocolError::UnknownVerb(other.to_string())),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ping => f.write_str(PING),
            Self::Pop { rank } => write!(f, "{} {}", POP, rank),
        }
    }
}

/// Read one request line from a freshly accepted connection.
///
/// I/O failures are returned as the outer error; a line that arrived but could
/// not be decoded is returned as the inner `ProtocolError`.
pub async fn read_request<R>(stream: &mut R) -> std::io::Result<Result<Request, ProtocolError>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream.take(MAX_MESSAGE_BYTES as u64 + 1));
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;

    if n == 0 {
        return Ok(Err(ProtocolError::ConnectionClosed));
    }
    if n > MAX_MESSAGE_BYTES {
        return Ok(Err(ProtocolError::TooLarge));
    }
    if !line.ends_with('\n') {
        return Ok(Err(ProtocolError::ConnectionClosed));
    }

    Ok(Request::parse(&line))
}

/// Send a request line and flush.
pub async fn write_request<W>(stream: &mut W, request: Request) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(request.to_line().as_bytes()).await?;
    stream.flush().await
}

/// Write a raw reply payload and flush. The caller closes the connection.
pub async fn write_reply<W>(stream: &mut W, payload: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(payload.as_bytes()).await?;
    stream.flush().await
}

/// Read a reply until the coordinator closes the connection.
///
/// Anything beyond [`MAX_MESSAGE_BYTES`] is treated as a protocol violation.
pub async fn read_reply<R>(stream: &mut R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    read_reply_unless_reset(stream)
        .await?
        .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::ConnectionReset))
}

/// Like [`read_reply`], but a reset that arrives before the first reply byte
/// yields `None`.
///
/// Connections still waiting in the listener backlog when the coordinator
/// shuts down are reset by the kernel without ever being accepted.
pub async fn read_reply_unless_reset<R>(stream: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > MAX_MESSAGE_BYTES {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        ProtocolError::TooLarge,
                    ));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if buf.is_empty() && is_peer_reset(&e) => return Ok(None),
            Err(e) => return Err(e),
        }
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Errors raised when the peer tore the connection down
pub fn is_peer_reset(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_lines() {
        assert_eq!(Request::Ping.to_line(), "PING\n");
        assert_eq!(Request::pop(3).to_line(), "POP 3\n");
    }

    #[test]
    fn test_parse_ping() {
        assert_eq!(Request::parse("PING\n"), Ok(Request::Ping));
        assert_eq!(Request::parse("PING\r\n"), Ok(Request::Ping));
    }

    #[test]
    fn test_parse_pop() {
        assert_eq!(Request::parse("POP 0\n"), Ok(Request::Pop { rank: 0 }));
        assert_eq!(Request::parse("POP 12"), Ok(Request::Pop { rank: 12 }));
    }

    #[test]
    fn test_parse_pop_without_rank() {
        assert_eq!(
            Request::parse("POP\n"),
            Err(ProtocolError::InvalidRank(String::new()))
        );
        assert_eq!(
            Request::parse("POP abc\n"),
            Err(ProtocolError::InvalidRank("abc".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_empty() {
        assert_eq!(Request::parse("\n"), Err(ProtocolError::Empty));
        assert_eq!(
            Request::parse("PUSH 1\n"),
            Err(ProtocolError::UnknownVerb("PUSH".to_string()))
        );
        // Verbs are case sensitive
        assert_eq!(
            Request::parse("ping\n"),
            Err(ProtocolError::UnknownVerb("ping".to_string()))
        );
    }

    #[tokio::test]
    async fn test_read_request_from_stream() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_request(&mut client, Request::pop(7)).await.unwrap();

        let request = read_request(&mut server).await.unwrap();
        assert_eq!(request, Ok(Request::Pop { rank: 7 }));
    }

    #[tokio::test]
    async fn test_read_request_without_newline() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(b"PING").await.unwrap();
        drop(client);

        let request = read_request(&mut server).await.unwrap();
        assert_eq!(request, Err(ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_read_reply_until_close() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_reply(&mut server, "spec/models/user_spec.rb").await.unwrap();
        drop(server);

        let reply = read_reply(&mut client).await.unwrap();
        assert_eq!(reply, "spec/models/user_spec.rb");
    }

    #[tokio::test]
    async fn test_read_reply_empty_on_immediate_close() {
        let (mut client, server) = tokio::io::duplex(64);
        drop(server);

        let reply = read_reply(&mut client).await.unwrap();
        assert!(reply.is_empty());
    }

    struct ResetAfter {
        data: Vec<u8>,
    }

    impl AsyncRead for ResetAfter {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.data.is_empty() {
                return std::task::Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()));
            }
            let data = std::mem::take(&mut self.data);
            buf.put_slice(&data);
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_reset_before_reply_is_none() {
        let mut stream = ResetAfter { data: Vec::new() };
        assert_eq!(read_reply_unless_reset(&mut stream).await.unwrap(), None);

        let mut stream = ResetAfter { data: Vec::new() };
        let err = read_reply(&mut stream).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_reset_mid_reply_is_an_error() {
        let mut stream = ResetAfter {
            data: b"spec/half".to_vec(),
        };
        let err = read_reply_unless_reset(&mut stream).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_read_reply_rejects_oversized_payload() {
        let (mut client, mut server) = tokio::io::duplex(MAX_MESSAGE_BYTES * 2);
        let payload = "x".repeat(MAX_MESSAGE_BYTES + 1);
        let writer = tokio::spawn(async move {
            write_reply(&mut server, &payload).await.unwrap();
        });

        let err = read_reply(&mut client).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        writer.await.unwrap();
    }

    #[test]
    fn test_peer_reset_kinds() {
        assert!(is_peer_reset(&std::io::ErrorKind::ConnectionReset.into()));
        assert!(is_peer_reset(&std::io::ErrorKind::BrokenPipe.into()));
        assert!(!is_peer_reset(&std::io::ErrorKind::InvalidData.into()));
    }
}
