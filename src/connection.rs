//! The duplex connection driver.
//!
//! One spawned task owns the framed transport and a FIFO of pending
//! reply promises. Callers talk to it through a request channel: each
//! write enqueues `(promise, outbound)`, each framed reply resolves the
//! queue head, and any transport or codec failure cascades to every
//! outstanding promise before the transport is released.

use crate::config::ConnectConfig;
use crate::proto::{ClientCodec, Code, Command, Outbound, Reply};
use crate::transport::{self, MaybeTlsStream};
use crate::{Error, Result};
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

/// Connection lifecycle; the progression is strictly monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum LinkState {
    Open = 0,
    ShuttingDown = 1,
    Closed = 2,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::ShuttingDown,
            _ => Self::Closed,
        }
    }
}

type Promise = oneshot::Sender<Result<Reply>>;

enum Request {
    Write {
        outbound: Outbound,
        promise: Promise,
    },
    Shutdown {
        done: oneshot::Sender<Result<()>>,
    },
}

/// How the driver loop ended.
enum Exit {
    /// A transport or codec failure; carries the cause for the cascade.
    Failed(Error),
    /// The peer closed the stream.
    Eof,
    /// An orderly shutdown request; the channel is already closed.
    Shutdown,
}

/// Handle to one SMTP connection.
///
/// `write` futures resolve in submission order, so pipelining is simply
/// keeping several of them in flight. All methods take `&self`; the
/// handle can be shared across tasks.
#[derive(Debug)]
pub struct Connection {
    req_tx: mpsc::UnboundedSender<Request>,
    state: Arc<AtomicU8>,
    // None while live; the terminal cause once the driver has torn down
    closed_rx: watch::Receiver<Option<Error>>,
}

impl Connection {
    /// Connects the transport, awaits the 220 greeting, and spawns the
    /// driver.
    ///
    /// The configured timeout covers the TCP connect, the TLS handshake
    /// when one is requested, and the greeting itself. A greeting with
    /// any other code fails with [`Error::InvalidReply`].
    pub async fn connect(config: ConnectConfig) -> Result<Self> {
        let setup = async {
            let stream = transport::open(&config).await?;
            let mut framed = Framed::new(stream, ClientCodec::new());
            let greeting = match framed.next().await {
                Some(Ok(reply)) => reply,
                Some(Err(err)) => return Err(err),
                None => return Err(Error::ConnectionClosed),
            };
            if greeting.code != Code::SERVICE_READY {
                return Err(Error::InvalidReply(greeting));
            }
            debug!(code = %greeting.code, "greeting accepted");
            Ok(framed)
        };
        let framed = time::timeout(config.server.timeout, setup)
            .await
            .map_err(|_| {
                Error::from(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
            })??;

        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(LinkState::Open as u8));
        let (closed_tx, closed_rx) = watch::channel(None);
        tokio::spawn(drive(framed, req_rx, state.clone(), closed_tx));

        Ok(Self {
            req_tx,
            state,
            closed_rx,
        })
    }

    /// Submits one outbound item; the returned future resolves with the
    /// matching reply.
    ///
    /// In any non-open state this fails immediately with the terminal
    /// error the connection went down with.
    pub async fn write(&self, outbound: Outbound) -> Result<Reply> {
        if self.link_state() != LinkState::Open {
            return Err(self.terminal_error());
        }
        self.submit(outbound).await
    }

    /// Orderly shutdown: QUIT, await the 221 farewell, then close the
    /// transport regardless of the farewell's outcome.
    ///
    /// Only the first caller runs the sequence; later calls wait for the
    /// teardown and return `Ok`. The result is `Ok` only when both the
    /// farewell and the channel close succeeded; otherwise
    /// [`Error::Close`] carries whichever part failed. A transport that
    /// is already gone by shutdown time counts as success.
    pub async fn close(&self) -> Result<()> {
        let first = self
            .state
            .compare_exchange(
                LinkState::Open as u8,
                LinkState::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !first {
            self.closed().await;
            return Ok(());
        }

        let server = match self.submit(Outbound::Command(Command::Quit)).await {
            Ok(reply) if reply.code == Code::CLOSING => None,
            Ok(reply) => Some(Error::InvalidReply(reply)),
            Err(err) => Some(err),
        };

        let channel = {
            let (done, closed) = oneshot::channel();
            if self.req_tx.send(Request::Shutdown { done }).is_err() {
                // driver already torn down: the channel is closed
                None
            } else {
                match closed.await {
                    Ok(Ok(())) | Err(_) => None,
                    Ok(Err(err)) => Some(err),
                }
            }
        };

        self.closed().await;

        match (server, channel) {
            (None, None) => Ok(()),
            (server, channel) => Err(Error::Close {
                server: server.map(Box::new),
                channel: channel.map(Box::new),
            }),
        }
    }

    /// True until the first close call or a transport failure.
    ///
    /// Safe to query from any thread.
    pub fn is_connected(&self) -> bool {
        self.link_state() == LinkState::Open
    }

    /// Resolves once the driver has released the transport.
    pub async fn closed(&self) {
        let mut closed_rx = self.closed_rx.clone();
        let _ = closed_rx.wait_for(|cause| cause.is_some()).await;
    }

    fn link_state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The cause the driver went down with, once it has.
    fn terminal_error(&self) -> Error {
        self.closed_rx
            .borrow()
            .clone()
            .unwrap_or(Error::ConnectionClosed)
    }

    async fn submit(&self, outbound: Outbound) -> Result<Reply> {
        let (promise, reply) = oneshot::channel();
        if self
            .req_tx
            .send(Request::Write { outbound, promise })
            .is_err()
        {
            return Err(self.terminal_error());
        }
        match reply.await {
            Ok(result) => result,
            Err(_) => Err(self.terminal_error()),
        }
    }
}

async fn drive(
    mut framed: Framed<MaybeTlsStream, ClientCodec>,
    mut req_rx: mpsc::UnboundedReceiver<Request>,
    state: Arc<AtomicU8>,
    closed_tx: watch::Sender<Option<Error>>,
) {
    let mut pending: VecDeque<Promise> = VecDeque::new();

    let exit = loop {
        tokio::select! {
            request = req_rx.recv() => match request {
                Some(Request::Write { outbound, promise }) => {
                    // the promise joins the queue at acceptance; a failed
                    // write removes and fails it, so it terminates once
                    pending.push_back(promise);
                    if let Err(err) = framed.send(outbound).await {
                        warn!(error = %err, "write failed");
                        if let Some(promise) = pending.pop_back() {
                            let _ = promise.send(Err(err.clone()));
                        }
                        break Exit::Failed(err);
                    }
                }
                Some(Request::Shutdown { done }) => {
                    let result = close_channel(&mut framed).await;
                    let _ = done.send(result);
                    break Exit::Shutdown;
                }
                None => break Exit::Eof, // handle dropped without close()
            },
            frame = framed.next() => match frame {
                Some(Ok(reply)) => {
                    trace!(code = %reply.code, "reply received");
                    match pending.pop_front() {
                        Some(promise) => {
                            let _ = promise.send(Ok(reply));
                        }
                        None => {
                            warn!(code = %reply.code, "reply with no outstanding command");
                            break Exit::Failed(Error::InvalidReply(reply));
                        }
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "inbound failure");
                    break Exit::Failed(err);
                }
                None => {
                    debug!("transport closed by peer");
                    break Exit::Eof;
                }
            },
        }
    };

    // failure cascade: every outstanding promise terminates exactly once,
    // then the transport is released
    let cause = match &exit {
        Exit::Failed(err) => err.clone(),
        Exit::Eof | Exit::Shutdown => Error::ConnectionClosed,
    };
    for promise in pending.drain(..) {
        let _ = promise.send(Err(cause.clone()));
    }

    req_rx.close();
    while let Ok(request) = req_rx.try_recv() {
        match request {
            Request::Write { promise, .. } => {
                let _ = promise.send(Err(cause.clone()));
            }
            Request::Shutdown { done } => {
                let _ = done.send(Ok(()));
            }
        }
    }

    if !matches!(exit, Exit::Shutdown) {
        let _ = close_channel(&mut framed).await;
    }

    state.store(LinkState::Closed as u8, Ordering::Release);
    let _ = closed_tx.send(Some(cause));
}

/// Closes the underlying channel; a transport that is already gone
/// counts as success.
async fn close_channel(framed: &mut Framed<MaybeTlsStream, ClientCodec>) -> Result<()> {
    match framed.close().await {
        Ok(()) => Ok(()),
        Err(Error::Io(err)) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
        Err(err) => Err(err),
    }
}
