//! Work distribution over a local Unix socket
//!
//! One coordinator owns the list of test files; any number of worker processes
//! pull from it until it runs dry.
//!
//! # Architecture
//!
//! - **Coordinator**: binds the socket, serves one request per connection,
//!   closes itself once the last item is dispatched
//! - **SocketBuilder**: worker-side connection factory; a missing or dead
//!   socket is reported as absence, not as an error
//! - **Workers**: separate processes, see [`crate::worker`]
//!
//! # Message Flow
//!
//! ```text
//! Worker                    Coordinator
//!   |------ PING ------------>|
//!   |<----- ok ---------------|   (connection closed)
//!   |------ POP <rank> ------>|
//!   |<----- <item> -----------|   (connection closed)
//!   |         ...             |
//!   |------ POP <rank> ------>X   socket gone: exhausted
//! ```
//!
//! # Modules
//!
//! - `protocol`: request parsing and framing
//! - `queue`: LIFO work queue and dispatch counter
//! - `client`: worker-side connection builder
//! - `coordinator`: socket server

pub mod client;
pub mod coordinator;
pub mod protocol;
pub mod queue;

pub use client::{PopOutcome, SocketBuilder};
pub use coordinator::Coordinator;
pub use protocol::{ProtocolError, Request};
pub use queue::{DispatchCounter, WorkQueue};
