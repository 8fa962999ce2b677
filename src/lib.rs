//! SMTP client protocol library.
//!
//! A client-side implementation of RFC 5321 plus the SIZE, DSN, SMTPUTF8,
//! 8BITMIME/BINARYMIME and STARTTLS command surface: a byte-exact wire
//! codec and an asynchronous connection driver that matches replies to
//! in-flight commands in strict FIFO order.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐ write(Outbound) ┌────────────┐ encoded bytes ┌───────────┐
//! │  Caller  │────────────────▶│   Driver   │──────────────▶│ TCP / TLS │
//! │          │◀────────────────│ FIFO queue │◀──────────────│  stream   │
//! └──────────┘  future<Reply>  └────────────┘ framed replies└───────────┘
//! ```
//!
//! The caller submits [`proto::Outbound`] values and receives one reply
//! future per submission; pipelining is simply several submissions in
//! flight at once. DATA payload transfer, AUTH exchanges and the TLS
//! handshake that follows a STARTTLS command are out of scope, though the
//! codec round-trips the commands that begin those phases.

pub mod config;
pub mod connection;
pub mod proto;
mod transport;

pub use config::{ConnectConfig, Security, ServerParams, TlsParams};
pub use connection::Connection;
pub use proto::{Address, ClientId, Command, Outbound, ProtoError, Reply};

use std::sync::Arc;
use thiserror::Error;

/// Connection-tier error.
///
/// Cloneable so that one terminal failure can be fanned out to every
/// pending reply future.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A codec error; the connection is torn down when one occurs.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// A transport error.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// The transport went away with no more specific cause.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server sent a reply the protocol does not allow at this point.
    #[error("unexpected reply: {0}")]
    InvalidReply(Reply),

    /// Shutdown finished but the farewell and/or the channel close failed.
    #[error("connection shutdown failed (server: {server:?}, channel: {channel:?})")]
    Close {
        /// The QUIT exchange failure, if any.
        server: Option<Box<Error>>,
        /// The transport close failure, if any.
        channel: Option<Box<Error>>,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Result alias for connection-tier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
