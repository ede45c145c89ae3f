//! Reference viewpoint-advisory peer.
//!
//! Listens for the renderer's fixed-width metric records, scores them and
//! answers with the next pose. Connections are served one at a time: the
//! renderer opens a fresh connection per exchange and there is a single pose
//! to steer.
//!
//! ```text
//! accept → read 20 B → observe (reward) → policy picks action → reply 12 B → close
//! ```

pub mod environment;
pub mod policy;
pub mod results;

use std::future::Future;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mivr_core::wire::METRIC_RECORD_LEN;
use mivr_core::{MetricRecord, ReplyRecord};

pub use environment::{Action, Environment, Observation};
pub use policy::Policy;
pub use results::{DEFAULT_RESULTS_PATH, ResultsLog};

/// Where and how long the peer runs.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub host: String,
    pub port: u16,
    /// `None` disables the results file.
    pub results_path: Option<PathBuf>,
    /// Stop after this many exchanges.
    pub max_exchanges: Option<u64>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            host: mivr_core::feedback::DEFAULT_PEER_HOST.to_string(),
            port: mivr_core::feedback::DEFAULT_PEER_PORT,
            results_path: Some(PathBuf::from(DEFAULT_RESULTS_PATH)),
            max_exchanges: None,
        }
    }
}

/// One completed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Exchange {
    pub observation: Observation,
    pub action: Action,
    pub reply: [f32; 3],
}

/// Totals when the peer stops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerSummary {
    pub exchanges: u64,
    pub dropped_connections: u64,
    pub total_reward: f32,
    pub final_reply: Option<[f32; 3]>,
}

/// Environment, policy and optional results file behind one listener.
pub struct AdvisoryPeer {
    env: Environment,
    policy: Policy,
    results: Option<ResultsLog>,
}

impl AdvisoryPeer {
    pub fn new(policy: Policy) -> Self {
        Self {
            env: Environment::new(),
            policy,
            results: None,
        }
    }

    pub fn with_results(mut self, results: ResultsLog) -> Self {
        self.results = Some(results);
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Score `record`, pick and apply an action, return the reply.
    pub fn handle(&mut self, record: &MetricRecord) -> io::Result<Exchange> {
        if let Some(results) = self.results.as_mut() {
            results.append(record)?;
        }
        let observation = self.env.observe(record);
        let action = self.policy.choose(&observation);
        self.env.apply(action);
        let reply = self.env.reply();
        Ok(Exchange {
            observation,
            action,
            reply: [reply.rotation_x, reply.rotation_y, reply.translation_z],
        })
    }

    /// Serve one connection. `Ok(None)` means the renderer closed it before
    /// sending a full record.
    pub async fn serve(&mut self, stream: &mut TcpStream) -> io::Result<Option<Exchange>> {
        let mut buf = [0u8; METRIC_RECORD_LEN];
        match stream.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        let record = MetricRecord::decode(&buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        let exchange = self.handle(&record)?;
        let [x, y, z] = exchange.reply;
        stream.write_all(&ReplyRecord::new(x, y, z).encode()).await?;
        stream.flush().await?;
        Ok(Some(exchange))
    }
}

/// Bind the peer's listening socket.
pub async fn bind(host: &str, port: u16) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    log::info!("advisory peer listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept and serve connections until `shutdown` resolves or the exchange
/// limit is reached.
///
/// A connection that fails mid-exchange is dropped and counted; the peer keeps
/// listening. Failing to write the results file stops the peer.
pub async fn serve(
    listener: TcpListener,
    mut peer: AdvisoryPeer,
    max_exchanges: Option<u64>,
    shutdown: impl Future<Output = ()>,
) -> io::Result<PeerSummary> {
    let mut summary = PeerSummary {
        exchanges: 0,
        dropped_connections: 0,
        total_reward: 0.0,
        final_reply: None,
    };
    tokio::pin!(shutdown);

    loop {
        if max_exchanges.is_some_and(|max| summary.exchanges >= max) {
            log::info!("exchange limit reached");
            break;
        }

        let served = tokio::select! {
            () = &mut shutdown => {
                log::info!("advisory peer shutting down");
                break;
            }
            served = accept_one(&listener, &mut peer) => served,
        };

        match served {
            Ok(Some(exchange)) => {
                summary.exchanges += 1;
                summary.final_reply = Some(exchange.reply);
                log::debug!(
                    "step {}: mi={} reward={:.3} action={}",
                    exchange.observation.step,
                    exchange.observation.mutual_information,
                    exchange.observation.reward,
                    exchange.action
                );
            }
            Ok(None) => summary.dropped_connections += 1,
            Err(e) if e.kind() == io::ErrorKind::InvalidData || is_connection_error(&e) => {
                log::warn!("connection dropped: {e}");
                summary.dropped_connections += 1;
            }
            Err(e) => return Err(e),
        }
    }

    summary.total_reward = peer.env.total_reward();
    Ok(summary)
}

/// Bind, then serve until Ctrl+C or the exchange limit.
pub async fn run_peer(config: PeerConfig, policy: Policy) -> io::Result<PeerSummary> {
    let mut peer = AdvisoryPeer::new(policy);
    if let Some(path) = &config.results_path {
        peer = peer.with_results(ResultsLog::open(path)?);
        log::info!("appending received records to {}", path.display());
    }
    let listener = bind(&config.host, config.port).await?;
    serve(listener, peer, config.max_exchanges, async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler: run until the exchange limit.
            std::future::pending::<()>().await;
        }
    })
    .await
}

async fn accept_one(listener: &TcpListener, peer: &mut AdvisoryPeer) -> io::Result<Option<Exchange>> {
    let (mut stream, addr) = listener.accept().await?;
    log::trace!("renderer connected from {addr}");
    stream.set_nodelay(true)?;
    peer.serve(&mut stream).await
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
