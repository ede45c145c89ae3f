//! Client side of the viewpoint-advisory protocol.
//!
//! Each iteration the client sends one [`MetricRecord`] to the peer, blocks
//! for a [`ReplyRecord`] and folds it into the [`ViewState`]. The blocking read
//! stalls the whole iteration loop for one network round trip; a read timeout
//! can be configured on [`TcpConnector`] but is off by default.
//!
//! # Connection lifecycle
//!
//! ```text
//!            first connect fails
//!  Enabled ───────────────────────▶ Disabled   (terminal, no more attempts)
//!     │
//!     └─ exchange: write 20 B → read ≤ 2000 B → apply → close → reconnect
//! ```
//!
//! Only the very first connection attempt can disable feedback. After one
//! successful connect, failures are scoped to the iteration they happen in:
//! the pose is left untouched and the next iteration starts on a fresh
//! connection.
//!
//! With [`ReconnectPolicy::PerExchange`] (the default) every exchange runs on
//! its own connection, which costs a TCP handshake per frame. The peer expects
//! exactly that. [`ReconnectPolicy::Persistent`] keeps a healthy connection
//! open and is only safe against peers that read more than one record per
//! connection.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ExchangeFailure, Result};
use crate::view::ViewState;
use crate::wire::{MAX_REPLY_LEN, MetricRecord, REPLY_RECORD_LEN, ReplyRecord};

/// Default advisory peer host.
pub const DEFAULT_PEER_HOST: &str = "127.0.0.1";
/// Default advisory peer port.
pub const DEFAULT_PEER_PORT: u16 = 8888;

/// Opens byte streams to the advisory peer.
pub trait Connector {
    type Stream: Read + Write;

    /// Open a fresh connection.
    fn connect(&mut self) -> io::Result<Self::Stream>;

    /// Human-readable peer address for logs and errors.
    fn peer(&self) -> String;
}

/// TCP connector with optional connect and read timeouts.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            connect_timeout: None,
            read_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `None` blocks until the peer replies or closes.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_PEER_HOST, DEFAULT_PEER_PORT)
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&mut self) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout {
            None => TcpStream::connect(&self.addr)?,
            Some(timeout) => {
                let mut last_err =
                    io::Error::new(io::ErrorKind::AddrNotAvailable, "address did not resolve");
                let mut connected = None;
                for addr in self.addr.to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(s) => {
                            connected = Some(s);
                            break;
                        }
                        Err(e) => last_err = e,
                    }
                }
                connected.ok_or(last_err)?
            }
        };
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn peer(&self) -> String {
        self.addr.clone()
    }
}

/// What happens to the connection after an exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Close after every exchange and reconnect straight away.
    #[default]
    PerExchange,
    /// Keep the connection while exchanges succeed.
    Persistent,
}

/// Whether the client still talks to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackState {
    Enabled,
    /// Entered when the first connection attempt fails. Terminal.
    Disabled,
}

/// Counters over the life of a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackStats {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub exchanges: u64,
    pub failed_exchanges: u64,
}

/// Feedback client over any [`Connector`].
pub struct FeedbackClient<C: Connector = TcpConnector> {
    connector: C,
    policy: ReconnectPolicy,
    state: FeedbackState,
    connection: Option<C::Stream>,
    ever_attempted: bool,
    stats: FeedbackStats,
}

impl<C: Connector> FeedbackClient<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            policy: ReconnectPolicy::default(),
            state: FeedbackState::Enabled,
            connection: None,
            ever_attempted: false,
            stats: FeedbackStats::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> FeedbackState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == FeedbackState::Enabled
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn stats(&self) -> FeedbackStats {
        self.stats
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Make sure a connection is open.
    ///
    /// The first attempt ever decides the mode: if it fails the client moves
    /// to [`FeedbackState::Disabled`] and returns
    /// [`Error::ConnectionUnavailable`]. Later failures are reported as
    /// [`ExchangeFailure::Connect`] and leave the client enabled.
    pub fn connect(&mut self) -> Result<()> {
        if self.state == FeedbackState::Disabled {
            return Err(Error::FeedbackDisabled);
        }
        if self.connection.is_some() {
            return Ok(());
        }

        let first = !self.ever_attempted;
        self.ever_attempted = true;
        self.stats.connect_attempts += 1;

        match self.connector.connect() {
            Ok(stream) => {
                if first {
                    log::info!("connected to advisory peer {}", self.connector.peer());
                } else {
                    log::trace!("reconnected to {}", self.connector.peer());
                }
                self.connection = Some(stream);
                Ok(())
            }
            Err(e) => {
                self.stats.connect_failures += 1;
                let addr = self.connector.peer();
                if first {
                    log::warn!("connect to {addr} failed: {e}; feedback disabled for this run");
                    self.state = FeedbackState::Disabled;
                    Err(Error::ConnectionUnavailable { addr, source: e })
                } else {
                    log::warn!("reconnect to {addr} failed: {e}");
                    Err(Error::ExchangeFailed(ExchangeFailure::Connect(e.to_string())))
                }
            }
        }
    }

    /// Send `record`, wait for the reply and return it.
    ///
    /// Never touches a [`ViewState`]; see [`Self::step`] for that.
    pub fn exchange(&mut self, record: &MetricRecord) -> Result<ReplyRecord> {
        if self.state == FeedbackState::Disabled {
            return Err(Error::FeedbackDisabled);
        }
        self.connect()?;
        let Some(mut stream) = self.connection.take() else {
            return Err(Error::ExchangeFailed(ExchangeFailure::Closed));
        };

        let result = send_and_receive(&mut stream, record);
        self.stats.exchanges += 1;

        match (&result, self.policy) {
            (Ok(_), ReconnectPolicy::Persistent) => {
                self.connection = Some(stream);
            }
            _ => {
                drop(stream);
                if let Err(e) = &result {
                    self.stats.failed_exchanges += 1;
                    log::warn!("exchange with {} abandoned: {e}", self.connector.peer());
                }
                if self.policy == ReconnectPolicy::PerExchange {
                    if let Err(e) = self.connect() {
                        log::trace!("reconnect failed, next iteration retries: {e}");
                    }
                }
            }
        }
        result
    }

    /// One feedback iteration: send the pose and `mutual_information`, then
    /// overwrite `view` with the reply. On any error `view` is unchanged.
    pub fn step(&mut self, view: &mut ViewState, mutual_information: f32) -> Result<ReplyRecord> {
        let reply = self.exchange(&view.metric_record(mutual_information))?;
        log::debug!(
            "peer reply: {}, {}, {}",
            reply.rotation_x,
            reply.rotation_y,
            reply.translation_z
        );
        view.apply_reply(&reply);
        Ok(reply)
    }
}

fn send_and_receive<S: Read + Write>(stream: &mut S, record: &MetricRecord) -> Result<ReplyRecord> {
    stream
        .write_all(&record.encode())
        .and_then(|()| stream.flush())
        .map_err(|e| Error::ExchangeFailed(ExchangeFailure::Write(e.to_string())))?;

    let reply = read_reply(stream)?;
    ReplyRecord::decode(&reply)
}

/// Read until a full reply record is buffered, the peer closes, or
/// [`MAX_REPLY_LEN`] bytes have arrived.
fn read_reply<S: Read>(stream: &mut S) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; MAX_REPLY_LEN];
    let mut filled = 0;
    while filled < REPLY_RECORD_LEN {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::ExchangeFailed(ExchangeFailure::Read(e.to_string()))),
        }
    }
    if filled == 0 {
        return Err(Error::ExchangeFailed(ExchangeFailure::Closed));
    }
    buf.truncate(filled);
    Ok(buf)
}
