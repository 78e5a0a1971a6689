//! Work coordinator
//!
//! The coordinator owns the work queue and hands items to workers over a Unix
//! socket. It serves exactly one connection at a time on a single task, so a
//! pop and its reply can never interleave with another request; no locking is
//! needed around the queue.
//!
//! # Lifecycle
//!
//! 1. `bind()` creates the socket and builds the queue (before any worker exists)
//! 2. `run()` (or `serve()`, which keeps the coordinator around) accepts
//!    connections until every item has been dispatched
//! 3. the listener is closed and the socket file removed as soon as the last
//!    item goes out, not when the workers finish

use super::client::SocketBuilder;
use super::protocol::{self, ProtocolError, Request, PING_REPLY};
use super::queue::{DispatchCounter, WorkQueue};
use crate::Result;
use anyhow::Context;
use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

/// Coordinator serving the `PING` / `POP` protocol
pub struct Coordinator {
    /// Socket path (the channel address)
    path: PathBuf,

    /// Listening socket; `None` once closed
    listener: Option<StdUnixListener>,

    /// Remaining items
    queue: WorkQueue,

    /// Dispatch progress
    counter: DispatchCounter,
}

impl Coordinator {
    /// Bind the channel at `path` and queue `items`.
    ///
    /// Binding is synchronous so the socket exists before any worker process
    /// is spawned. The standard library opens the socket close-on-exec, so
    /// spawned workers never inherit the listener.
    pub fn bind<I, S>(path: impl Into<PathBuf>, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = path.into();
        let listener = StdUnixListener::bind(&path)
            .with_context(|| format!("Failed to bind coordinator socket: {}", path.display()))?;
        listener
            .set_nonblocking(true)
            .context("Failed to make coordinator socket non-blocking")?;

        let queue = WorkQueue::new(items);
        let counter = DispatchCounter::new(queue.len());

        debug!(
            "Coordinator bound at {} with {} items",
            path.display(),
            queue.len()
        );

        Ok(Self {
            path,
            listener: Some(listener),
            queue,
            counter,
        })
    }

    /// Socket path workers connect to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of items still queued
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Create a connection builder pointed at this coordinator.
    pub fn socket_builder(&self) -> SocketBuilder {
        SocketBuilder::new(&self.path)
    }

    /// Dispatch progress so far
    pub fn counter(&self) -> DispatchCounter {
        self.counter
    }

    /// Dispatch every queued item, then shut the channel down.
    ///
    /// Returns the final dispatch counter. With an empty queue this returns
    /// immediately without accepting any connection.
    pub async fn run(mut self) -> Result<DispatchCounter> {
        self.serve().await
    }

    /// Like [`run`](Self::run), but keeps the coordinator so the counter is
    /// still readable when dispatch stops early.
    pub async fn serve(&mut self) -> Result<DispatchCounter> {
        let result = self.serve_until_exhausted().await;
        self.close();
        result.map(|_| self.counter)
    }

    async fn serve_until_exhausted(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }

        let std_listener = self
            .listener
            .as_ref()
            .context("Coordinator socket already closed")?
            .try_clone()
            .context("Failed to clone coordinator socket")?;
        let listener =
            UnixListener::from_std(std_listener).context("Failed to register coordinator socket")?;

        while !self.queue.is_empty() {
            let (stream, _) = listener
                .accept()
                .await
                .context("Failed to accept worker connection")?;

            self.handle_connection(stream).await;
        }

        info!(
            "All {} items dispatched, closing coordinator",
            self.counter.total()
        );
        Ok(())
    }

    /// Serve a single request and close the connection.
    async fn handle_connection(&mut self, mut stream: UnixStream) {
        match protocol::read_request(&mut stream).await {
            Ok(Ok(request)) => {
                if let Err(e) = self.handle_request(request, &mut stream).await {
                    warn!("Failed to reply to {}: {}", request, e);
                }
            }
            Ok(Err(ProtocolError::ConnectionClosed)) => {
                debug!("Worker disconnected before sending a request");
            }
            Ok(Err(e)) => {
                debug!("Ignoring malformed request: {}", e);
            }
            Err(e) => {
                warn!("Failed to read request: {}", e);
            }
        }

        let _ = stream.shutdown().await;
    }

    async fn handle_request(&mut self, request: Request, stream: &mut UnixStream) -> std::io::Result<()> {
        match request {
            Request::Ping => protocol::write_reply(stream, PING_REPLY).await,
            Request::Pop { rank } => {
                let Some(item) = self.queue.pop() else {
                    debug!("worker[{}] popped from an empty queue", rank);
                    return Ok(());
                };
                self.counter.record();
                info!("{} Deliver {} to worker[{}]", self.counter, item, rank);
                protocol::write_reply(stream, &item).await
            }
        }
    }

    /// Close the listener and remove the socket file. Idempotent.
    pub fn close(&mut self) {
        if self.listener.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove socket {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::client::PopOutcome;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn socket_in(dir: &TempDir) -> PathBuf {
        dir.path().join("coordinator.sock")
    }

    #[test]
    fn test_bind_creates_and_drop_removes_socket() {
        let dir = TempDir::new().unwrap();
        let path = socket_in(&dir);

        let coordinator = Coordinator::bind(&path, ["a"]).unwrap();
        assert!(path.exists());
        assert_eq!(coordinator.remaining(), 1);

        drop(coordinator);
        assert!(!path.exists());
    }

    #[test]
    fn test_bind_fails_on_existing_socket() {
        let dir = TempDir::new().unwrap();
        let path = socket_in(&dir);

        let _first = Coordinator::bind(&path, ["a"]).unwrap();
        assert!(Coordinator::bind(&path, ["b"]).is_err());
    }

    #[tokio::test]
    async fn test_empty_queue_returns_immediately() {
        let dir = TempDir::new().unwrap();
        let path = socket_in(&dir);

        let coordinator = Coordinator::bind(&path, Vec::<String>::new()).unwrap();
        let builder = coordinator.socket_builder();
        let counter = coordinator.run().await.unwrap();

        assert_eq!(counter.dispatched(), 0);
        assert_eq!(counter.total(), 0);
        assert!(!path.exists());
        assert_eq!(builder.pop(0).await.unwrap(), PopOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_ping_then_lifo_pops() {
        let dir = TempDir::new().unwrap();
        let coordinator =
            Coordinator::bind(socket_in(&dir), ["a_spec", "b_spec", "c_spec"]).unwrap();
        let builder = coordinator.socket_builder();
        let server = tokio::spawn(coordinator.run());

        assert_eq!(builder.ping().await.unwrap().as_deref(), Some("ok"));
        assert_eq!(builder.pop(0).await.unwrap(), PopOutcome::Item("c_spec".into()));
        assert_eq!(builder.pop(0).await.unwrap(), PopOutcome::Item("b_spec".into()));
        assert_eq!(builder.pop(0).await.unwrap(), PopOutcome::Item("a_spec".into()));

        let counter = server.await.unwrap().unwrap();
        assert_eq!(counter.dispatched(), 3);
        assert!(counter.is_complete());

        // Channel is gone: the next pop observes exhaustion without retrying
        assert_eq!(builder.pop(0).await.unwrap(), PopOutcome::Exhausted);
        assert!(!builder.path().exists());
    }

    #[tokio::test]
    async fn test_ping_never_consumes_items() {
        let dir = TempDir::new().unwrap();
        let coordinator = Coordinator::bind(socket_in(&dir), ["only"]).unwrap();
        let builder = coordinator.socket_builder();
        let server = tokio::spawn(coordinator.run());

        for _ in 0..5 {
            assert_eq!(builder.ping().await.unwrap().as_deref(), Some("ok"));
        }
        assert_eq!(builder.pop(1).await.unwrap(), PopOutcome::Item("only".into()));

        let counter = server.await.unwrap().unwrap();
        assert_eq!(counter.dispatched(), 1);
    }

    #[tokio::test]
    async fn test_malformed_requests_are_ignored() {
        let dir = TempDir::new().unwrap();
        let coordinator = Coordinator::bind(socket_in(&dir), ["x", "y"]).unwrap();
        let builder = coordinator.socket_builder();
        let server = tokio::spawn(coordinator.run());

        for garbage in ["HELLO\n", "POP nope\n", "\n"] {
            let mut stream = builder.connect().await.unwrap().unwrap();
            stream.write_all(garbage.as_bytes()).await.unwrap();
            let reply = protocol::read_reply(&mut stream).await.unwrap();
            assert!(reply.is_empty(), "unexpected reply to {:?}", garbage);
        }

        assert_eq!(builder.pop(0).await.unwrap(), PopOutcome::Item("y".into()));
        assert_eq!(builder.pop(0).await.unwrap(), PopOutcome::Item("x".into()));
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_rapid_pops_never_repeat() {
        let dir = TempDir::new().unwrap();
        let items: Vec<String> = (0..50).map(|i| format!("spec/file_{i}_spec.rb")).collect();
        let coordinator = Coordinator::bind(socket_in(&dir), items.clone()).unwrap();
        let builder = coordinator.socket_builder();
        let server = tokio::spawn(coordinator.run());

        let mut clients = Vec::new();
        for rank in 0..4 {
            let builder = builder.clone();
            clients.push(tokio::spawn(async move {
                let mut received = Vec::new();
                while let PopOutcome::Item(item) = builder.pop(rank).await.unwrap_or(PopOutcome::Exhausted) {
                    received.push(item);
                }
                received
            }));
        }

        let mut all = Vec::new();
        for client in clients {
            all.extend(client.await.unwrap());
        }
        server.await.unwrap().unwrap();

        assert_eq!(all.len(), items.len());
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), items.len());
        assert_eq!(unique, items.iter().collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn test_backlogged_pops_see_exhaustion() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = Coordinator::bind(socket_in(&dir), ["last_spec"]).unwrap();
        let builder = coordinator.socket_builder();

        // Every client connects and sends POP before anything is accepted
        let mut clients = Vec::new();
        for rank in 0..6 {
            let builder = builder.clone();
            clients.push(tokio::spawn(async move { builder.pop(rank).await }));
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let counter = coordinator.serve().await.unwrap();
        assert_eq!(counter.dispatched(), 1);

        let mut items = Vec::new();
        for client in clients {
            match client.await.unwrap() {
                Ok(PopOutcome::Item(item)) => items.push(item),
                Ok(PopOutcome::Exhausted) => {}
                Err(e) => panic!("exhaustion surfaced as an error: {}", e),
            }
        }
        assert_eq!(items, vec!["last_spec"]);
    }

    #[tokio::test]
    async fn test_counter_survives_interrupted_dispatch() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = Coordinator::bind(socket_in(&dir), ["a", "b", "c"]).unwrap();
        let builder = coordinator.socket_builder();

        let client = tokio::spawn(async move { builder.pop(0).await.unwrap() });
        let interrupted = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            coordinator.serve(),
        )
        .await;

        assert!(interrupted.is_err());
        assert_eq!(client.await.unwrap(), PopOutcome::Item("c".into()));
        assert_eq!(coordinator.counter().dispatched(), 1);
        assert_eq!(coordinator.counter().total(), 3);
        assert_eq!(coordinator.remaining(), 2);
    }
}
