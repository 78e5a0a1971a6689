//! Connection builder used by workers to reach the coordinator
//!
//! The coordinator's socket may not exist yet (workers racing the bind) or may
//! already be gone (queue exhausted). Both cases are reported as `Ok(None)`
//! rather than as errors so callers can decide whether to retry or stop.

use super::protocol::{self, Request};
use std::io;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;

/// Outcome of a `POP` exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopOutcome {
    /// The coordinator handed out an item
    Item(String),

    /// No item: the coordinator is gone or replied with nothing
    Exhausted,
}

/// Builds connections to a coordinator bound at a fixed socket path
#[derive(Debug, Clone)]
pub struct SocketBuilder {
    path: PathBuf,
}

impl SocketBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection to the coordinator.
    ///
    /// Returns `Ok(None)` when the socket file is missing or nobody is
    /// listening on it.
    pub async fn connect(&self) -> io::Result<Option<UnixStream>> {
        match UnixStream::connect(&self.path).await {
            Ok(stream) => Ok(Some(stream)),
            Err(e) if is_unavailable(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Perform a `PING` exchange, returning the reply if the coordinator was reachable.
    pub async fn ping(&self) -> io::Result<Option<String>> {
        let Some(mut stream) = self.connect().await? else {
            return Ok(None);
        };

        protocol::write_request(&mut stream, Request::Ping).await?;
        let reply = protocol::read_reply(&mut stream).await?;
        Ok(Some(reply))
    }

    /// Perform a `POP` exchange on behalf of the worker with `rank`.
    ///
    /// A missing socket, a refused or reset connection and an empty reply
    /// all come back as [`PopOutcome::Exhausted`].
    pub async fn pop(&self, rank: usize) -> io::Result<PopOutcome> {
        let Some(mut stream) = self.connect().await? else {
            return Ok(PopOutcome::Exhausted);
        };

        // A reset before any reply byte means the coordinator shut down with
        // this connection still in its backlog
        match protocol::write_request(&mut stream, Request::pop(rank)).await {
            Ok(()) => {}
            Err(e) if protocol::is_peer_reset(&e) => return Ok(PopOutcome::Exhausted),
            Err(e) => return Err(e),
        }

        match protocol::read_reply_unless_reset(&mut stream).await? {
            Some(reply) if !reply.is_empty() => Ok(PopOutcome::Item(reply)),
            _ => Ok(PopOutcome::Exhausted),
        }
    }
}

/// Errors that mean "no coordinator here right now"
fn is_unavailable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}
