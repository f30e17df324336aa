//! Client network layer.
//!
//! Two tasks run on the tokio runtime next to the render loop: a receive
//! task that reassembles newline-delimited records and forwards decoded
//! messages, and an input sender that holds each command back by the
//! simulated latency before writing it.

use crate::config::ClientConfig;
use log::{debug, error, info, warn};
use shared::{Command, DelayQueue, LineBuffer, ServerMessage};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle held by the render loop.
pub struct NetworkClient {
    commands_tx: mpsc::UnboundedSender<(Command, Instant)>,
    messages_rx: mpsc::UnboundedReceiver<ServerMessage>,
    receive_task: JoinHandle<()>,
    send_task: JoinHandle<()>,
}

impl NetworkClient {
    /// Connects and spawns both tasks on the current runtime.
    pub async fn connect(config: &ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", config.server);
        let stream = TcpStream::connect(&config.server).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", stream.peer_addr()?);

        let (reader, writer) = stream.into_split();
        Ok(Self::spawn(reader, writer, config.latency))
    }

    /// Wires the tasks around an arbitrary byte stream.
    pub fn spawn<R, W>(reader: R, writer: W, latency: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let receive_task = tokio::spawn(receive_loop(reader, messages_tx));
        let send_task = tokio::spawn(InputSender::new(writer, latency).run(commands_rx));

        Self {
            commands_tx,
            messages_rx,
            receive_task,
            send_task,
        }
    }

    /// Queues a command captured now; it reaches the socket after the latency.
    pub fn send_input(&self, command: Command) {
        if self.commands_tx.send((command, Instant::now())).is_err() {
            debug!("Input sender stopped, dropping {:?}", command);
        }
    }

    /// Every message decoded since the last call, in arrival order.
    pub fn receive_updates(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.messages_rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    pub fn is_connected(&self) -> bool {
        !self.receive_task.is_finished() && !self.send_task.is_finished()
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        self.receive_task.abort();
        self.send_task.abort();
    }
}

/// Reads until the server closes the stream, forwarding decoded messages.
pub async fn receive_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    messages_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let mut lines = LineBuffer::new();
    let mut buffer = [0u8; 4096];

    loop {
        let len = match reader.read(&mut buffer).await {
            Ok(0) => {
                warn!("Server closed the connection");
                return;
            }
            Ok(len) => len,
            Err(e) => {
                warn!("Network error: {}", e);
                return;
            }
        };

        for line in lines.push(&buffer[..len]) {
            match ServerMessage::decode(&line) {
                Ok(message) => {
                    if messages_tx.send(message).is_err() {
                        error!("Render loop is gone, receiver stopping");
                        return;
                    }
                }
                Err(e) => debug!("Dropping record: {}", e),
            }
        }
    }
}

/// Owns the write half and the outgoing delay queue.
pub struct InputSender<W> {
    writer: W,
    queue: DelayQueue<Command>,
    latency: Duration,
}

impl<W: AsyncWrite + Unpin> InputSender<W> {
    pub fn new(writer: W, latency: Duration) -> Self {
        Self {
            writer,
            queue: DelayQueue::new(),
            latency,
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Schedules a command at `captured_at + latency`.
    pub fn enqueue(&mut self, command: Command, captured_at: Instant) {
        self.queue.schedule_at(command, captured_at + self.latency);
    }

    pub async fn run(mut self, mut commands_rx: mpsc::UnboundedReceiver<(Command, Instant)>) {
        loop {
            let deadline = self.queue.next_release();

            tokio::select! {
                command = commands_rx.recv() => match command {
                    Some((command, captured_at)) => self.enqueue(command, captured_at),
                    None => {
                        debug!("Input channel closed, sender stopping");
                        return;
                    }
                },
                _ = wait_until(deadline) => {
                    if let Err(e) = self.flush_due(Instant::now()).await {
                        error!("Failed to send input: {}", e);
                        return;
                    }
                }
            }
        }
    }

    /// Writes every command whose release time has passed as one chunk.
    pub async fn flush_due(&mut self, now: Instant) -> std::io::Result<usize> {
        let bytes: Vec<u8> = self
            .queue
            .drain(now)
            .into_iter()
            .map(Command::as_byte)
            .collect();
        if !bytes.is_empty() {
            self.writer.write_all(&bytes).await?;
        }
        Ok(bytes.len())
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PlayerId;
    use tokio::io::duplex;

    const UPDATE: &str = "{\"type\":\"UPDATE\",\"timestamp\":1.5,\"players\":{\"3\":{\"x\":10.0,\"y\":20.0,\"score\":1,\"color\":[0,0,255]}},\"coin\":{\"x\":400.0,\"y\":300.0}}\n";

    #[tokio::test]
    async fn test_receive_loop_reassembles_split_records() {
        let (reader, mut remote) = duplex(1024);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(receive_loop(reader, tx));

        let (head, tail) = UPDATE.split_at(40);
        remote.write_all(head.as_bytes()).await.unwrap();
        remote.write_all(tail.as_bytes()).await.unwrap();
        remote
            .write_all(b"{\"type\":\"SYSTEM\",\"msg\":\"START\"}\n")
            .await
            .unwrap();

        match rx.recv().await {
            Some(ServerMessage::Update(snapshot)) => {
                assert_eq!(snapshot.players[&PlayerId(3)].score, 1);
            }
            other => panic!("Expected update, got {:?}", other),
        }
        assert_eq!(rx.recv().await, Some(ServerMessage::SystemStart));

        drop(remote);
        task.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_receive_loop_skips_garbage() {
        let reader = tokio_test::io::Builder::new()
            .read(b"not json at all\n")
            .read(UPDATE.as_bytes())
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();

        receive_loop(reader, tx).await;

        assert!(matches!(rx.recv().await, Some(ServerMessage::Update(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_input_sender_batches_due_commands() {
        let writer = tokio_test::io::Builder::new().write(b"LLR").build();
        let mut sender = InputSender::new(writer, Duration::ZERO);
        let now = Instant::now();

        sender.enqueue(Command::Left, now);
        sender.enqueue(Command::Left, now);
        sender.enqueue(Command::Right, now);

        assert_eq!(sender.flush_due(now).await.unwrap(), 3);
        assert_eq!(sender.pending(), 0);
    }

    #[tokio::test]
    async fn test_input_sender_holds_commands_until_due() {
        let (writer, mut remote) = duplex(64);
        let mut sender = InputSender::new(writer, Duration::from_millis(200));
        let captured = Instant::now();

        sender.enqueue(Command::Left, captured);
        sender.enqueue(Command::Up, captured + Duration::from_millis(10));

        assert_eq!(sender.flush_due(captured).await.unwrap(), 0);
        assert_eq!(sender.pending(), 2);

        let sent = sender
            .flush_due(captured + Duration::from_millis(205))
            .await
            .unwrap();
        assert_eq!(sent, 1);

        let sent = sender
            .flush_due(captured + Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(sent, 1);

        let mut received = [0u8; 2];
        remote.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"LU");
    }

    #[tokio::test]
    async fn test_network_client_delivers_input_after_latency() {
        let (client_side, mut server_side) = duplex(1024);
        let (reader, writer) = tokio::io::split(client_side);
        let mut client = NetworkClient::spawn(reader, writer, Duration::from_millis(20));

        let started = Instant::now();
        client.send_input(Command::Right);
        client.send_input(Command::Down);

        let mut received = [0u8; 2];
        server_side.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"RD");
        assert!(started.elapsed() >= Duration::from_millis(20));

        server_side
            .write_all(b"{\"type\":\"SYSTEM\",\"msg\":\"RESET\"}\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.receive_updates(), vec![ServerMessage::SystemReset]);
        assert!(client.is_connected());

        drop(server_side);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!client.is_connected());
    }
}
