//! Server network layer: TCP accept loop, per-connection ingestion tasks and
//! the channel messages tying them to the session and the outbound sender.

use crate::config::ServerConfig;
use crate::outbound::OutboundSender;
use crate::session::Session;
use log::{debug, error, info, warn};
use shared::PlayerId;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, oneshot};

/// Write half of a connection, owned by the outbound sender once registered.
pub type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Messages sent from connection tasks (and the outbound sender) to the session
pub enum NetworkEvent {
    /// A new connection asks for a seat; `reply` carries the assigned id,
    /// or `None` when the session is full.
    Join {
        addr: SocketAddr,
        writer: Writer,
        reply: oneshot::Sender<Option<PlayerId>>,
    },
    /// Raw bytes from one read, stamped with the time they arrived.
    Input {
        id: PlayerId,
        bytes: Vec<u8>,
        received_at: Instant,
    },
    Leave {
        id: PlayerId,
    },
}

/// Messages sent from the session to the outbound sender
pub enum OutboundMessage {
    Register {
        id: PlayerId,
        writer: Writer,
    },
    Unregister {
        id: PlayerId,
    },
    /// Deliver `frame` to `to` once `release_at` has passed.
    Schedule {
        to: PlayerId,
        release_at: Instant,
        frame: std::sync::Arc<str>,
    },
    /// Deliver `frame` to every registered connection right away.
    Broadcast {
        frame: std::sync::Arc<str>,
    },
    /// Drop every record still in flight.
    Clear,
}

/// Bound listener plus the configuration of the session it will serve.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    /// Binds the listening socket; failure here is fatal for the process.
    pub async fn bind(
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let addr = lookup_host((config.host.as_str(), config.port))
            .await?
            .next()
            .ok_or("host did not resolve to any address")?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(config.required_players.max(1) as u32)?;

        info!("Lobby server listening on {}", listener.local_addr()?);
        info!("Waiting for {} players to start...", config.required_players);

        Ok(Server { listener, config })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Spawns the session and outbound tasks, then accepts connections forever.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let session = Session::new(self.config.clone(), outbound_tx);
        tokio::spawn(session.run(events_rx));

        let sender = OutboundSender::new(events_tx.clone());
        tokio::spawn(sender.run(outbound_rx));

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection: {}", addr);
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not disable Nagle for {}: {}", addr, e);
                    }
                    tokio::spawn(handle_connection(stream, addr, events_tx.clone()));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events_tx: mpsc::UnboundedSender<NetworkEvent>,
) {
    let (reader, writer) = stream.into_split();
    ingest(reader, Box::new(writer), addr, events_tx).await;
}

/// Joins the session and forwards every read until the peer goes away.
pub async fn ingest<R: AsyncRead + Unpin>(
    mut reader: R,
    writer: Writer,
    addr: SocketAddr,
    events_tx: mpsc::UnboundedSender<NetworkEvent>,
) {
    let (reply_tx, reply_rx) = oneshot::channel();
    let join = NetworkEvent::Join {
        addr,
        writer,
        reply: reply_tx,
    };
    if events_tx.send(join).is_err() {
        error!("Session is gone, dropping connection from {}", addr);
        return;
    }

    let id = match reply_rx.await {
        Ok(Some(id)) => id,
        Ok(None) => {
            warn!("Closing connection from {}: server full", addr);
            return;
        }
        Err(_) => {
            error!("Session dropped join request from {}", addr);
            return;
        }
    };

    let mut buffer = [0u8; 1024];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(len) => {
                let input = NetworkEvent::Input {
                    id,
                    bytes: buffer[..len].to_vec(),
                    received_at: Instant::now(),
                };
                if events_tx.send(input).is_err() {
                    error!("Session is gone, closing {}", id);
                    break;
                }
            }
            Err(e) => {
                debug!("Read from {} failed: {}", id, e);
                break;
            }
        }
    }

    info!("Client {} ({}) disconnected", id, addr);
    let _ = events_tx.send(NetworkEvent::Leave { id });
}
