//! Delayed delivery of server records to connected players.
//!
//! The sender task is the only owner of the outbound delay queue. Each
//! connection's write half lives in its own writer task fed by a bounded
//! channel, so a peer that stops reading only ever stalls itself. The
//! session hands records over a channel; the sender sleeps until the next
//! record is due instead of polling.

use crate::network::{NetworkEvent, OutboundMessage, Writer};
use log::{debug, error, info, warn};
use shared::{DelayQueue, PlayerId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Records a writer may fall behind before its peer is dropped as stalled.
pub const WRITER_BACKLOG: usize = 64;

struct PeerWriter {
    frames: mpsc::Sender<Arc<str>>,
    task: JoinHandle<()>,
}

pub struct OutboundSender {
    queue: DelayQueue<(PlayerId, Arc<str>)>,
    writers: HashMap<PlayerId, PeerWriter>,
    events_tx: mpsc::UnboundedSender<NetworkEvent>,
}

impl OutboundSender {
    /// `events_tx` reports failed or stalled peers back to the session as leaves.
    pub fn new(events_tx: mpsc::UnboundedSender<NetworkEvent>) -> Self {
        Self {
            queue: DelayQueue::new(),
            writers: HashMap::new(),
            events_tx,
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn connected(&self) -> usize {
        self.writers.len()
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<OutboundMessage>) {
        loop {
            let deadline = self.queue.next_release();

            tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => {
                        info!("Outbound channel closed, sender stopping");
                        break;
                    }
                },
                _ = wait_until(deadline) => {
                    self.flush_due(Instant::now());
                }
            }
        }
    }

    /// Must be called from within a tokio runtime; `Register` spawns a writer task.
    pub fn handle_message(&mut self, message: OutboundMessage) {
        match message {
            OutboundMessage::Register { id, writer } => {
                let (frames, frames_rx) = mpsc::channel(WRITER_BACKLOG);
                let task = tokio::spawn(write_loop(id, writer, frames_rx, self.events_tx.clone()));
                if let Some(old) = self.writers.insert(id, PeerWriter { frames, task }) {
                    old.task.abort();
                }
            }
            OutboundMessage::Unregister { id } => {
                self.forget(id);
            }
            OutboundMessage::Schedule {
                to,
                release_at,
                frame,
            } => {
                self.queue.schedule_at((to, frame), release_at);
            }
            OutboundMessage::Broadcast { frame } => {
                let ids: Vec<PlayerId> = self.writers.keys().copied().collect();
                for id in ids {
                    self.deliver(id, frame.clone());
                }
            }
            OutboundMessage::Clear => {
                debug!("Discarding {} in-flight records", self.queue.len());
                self.queue.clear();
            }
        }
    }

    /// Hands every record whose release time has passed to its writer.
    pub fn flush_due(&mut self, now: Instant) {
        for (to, frame) in self.queue.drain(now) {
            self.deliver(to, frame);
        }
    }

    /// Never waits. A full backlog drops the peer and reports it as a leave.
    fn deliver(&mut self, id: PlayerId, frame: Arc<str>) {
        let Some(peer) = self.writers.get(&id) else {
            return;
        };
        match peer.frames.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("{} stopped reading, dropping connection", id);
                self.forget(id);
                if self.events_tx.send(NetworkEvent::Leave { id }).is_err() {
                    error!("Session is gone, cannot report leave of {}", id);
                }
            }
            // The writer task already reported the failure.
            Err(TrySendError::Closed(_)) => self.forget(id),
        }
    }

    fn forget(&mut self, id: PlayerId) {
        if let Some(peer) = self.writers.remove(&id) {
            peer.task.abort();
        }
        self.queue.retain(|(to, _)| *to != id);
    }
}

/// Writes frames in order until the channel closes or a write fails.
async fn write_loop(
    id: PlayerId,
    mut writer: Writer,
    mut frames: mpsc::Receiver<Arc<str>>,
    events_tx: mpsc::UnboundedSender<NetworkEvent>,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(frame.as_bytes()).await {
            info!("Write to {} failed: {}", id, e);
            if events_tx.send(NetworkEvent::Leave { id }).is_err() {
                error!("Session is gone, cannot report leave of {}", id);
            }
            return;
        }
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
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    fn sender() -> (OutboundSender, mpsc::UnboundedReceiver<NetworkEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (OutboundSender::new(events_tx), events_rx)
    }

    fn register_with_buffer(sender: &mut OutboundSender, id: u32, buffer: usize) -> DuplexStream {
        let (ours, theirs) = duplex(buffer);
        sender.handle_message(OutboundMessage::Register {
            id: PlayerId(id),
            writer: Box::new(ours),
        });
        theirs
    }

    fn register(sender: &mut OutboundSender, id: u32) -> DuplexStream {
        register_with_buffer(sender, id, 4096)
    }

    fn schedule(sender: &mut OutboundSender, to: u32, release_at: Instant, frame: &str) {
        sender.handle_message(OutboundMessage::Schedule {
            to: PlayerId(to),
            release_at,
            frame: Arc::from(frame),
        });
    }

    async fn read_available(stream: &mut DuplexStream) -> String {
        let mut buf = vec![0u8; 4096];
        let n = tokio::time::timeout(Duration::from_millis(50), stream.read(&mut buf))
            .await
            .unwrap_or(Ok(0))
            .unwrap();
        String::from_utf8_lossy(&buf[..n]).to_string()
    }

    async fn next_leave(events: &mut mpsc::UnboundedReceiver<NetworkEvent>) -> PlayerId {
        match tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
            Ok(Some(NetworkEvent::Leave { id })) => id,
            _ => panic!("Expected a leave event"),
        }
    }

    #[tokio::test]
    async fn test_scheduled_frame_waits_for_release() {
        let (mut sender, _events) = sender();
        let mut peer = register(&mut sender, 1);
        let base = Instant::now();

        schedule(&mut sender, 1, base + Duration::from_millis(200), "late\n");

        sender.flush_due(base);
        assert_eq!(sender.pending(), 1);

        sender.flush_due(base + Duration::from_millis(200));
        assert_eq!(sender.pending(), 0);
        assert_eq!(read_available(&mut peer).await, "late\n");
    }

    #[tokio::test]
    async fn test_broadcast_is_immediate() {
        let (mut sender, _events) = sender();
        let mut a = register(&mut sender, 1);
        let mut b = register(&mut sender, 2);

        sender.handle_message(OutboundMessage::Broadcast {
            frame: Arc::from("hello\n"),
        });

        assert_eq!(read_available(&mut a).await, "hello\n");
        assert_eq!(read_available(&mut b).await, "hello\n");
    }

    #[tokio::test]
    async fn test_frames_keep_their_order() {
        let (mut sender, _events) = sender();
        let mut peer = register(&mut sender, 1);
        let base = Instant::now();

        schedule(&mut sender, 1, base, "a\n");
        sender.handle_message(OutboundMessage::Broadcast {
            frame: Arc::from("b\n"),
        });
        schedule(&mut sender, 1, base, "c\n");
        sender.flush_due(base);

        let mut received = [0u8; 6];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"b\na\nc\n");
    }

    #[tokio::test]
    async fn test_clear_discards_in_flight() {
        let (mut sender, _events) = sender();
        let _peer = register(&mut sender, 1);
        let base = Instant::now();

        for _ in 0..3 {
            schedule(&mut sender, 1, base, "x\n");
        }
        sender.handle_message(OutboundMessage::Clear);

        assert_eq!(sender.pending(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_reports_leave() {
        let (mut sender, mut events) = sender();
        let peer = register(&mut sender, 4);
        drop(peer);

        let base = Instant::now();
        schedule(&mut sender, 4, base, "gone\n");
        sender.flush_due(base);

        assert_eq!(next_leave(&mut events).await, PlayerId(4));

        // The next delivery notices the closed writer without a second report.
        sender.handle_message(OutboundMessage::Broadcast {
            frame: Arc::from("again\n"),
        });
        assert_eq!(sender.connected(), 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stalled_peer_does_not_block_others() {
        let (mut sender, mut events) = sender();
        let mut healthy = register(&mut sender, 1);
        // Never read, and too small to hold a single frame.
        let _stalled = register_with_buffer(&mut sender, 2, 4);
        let frame = "snapshot\n";

        for _ in 0..WRITER_BACKLOG + 4 {
            sender.handle_message(OutboundMessage::Broadcast {
                frame: Arc::from(frame),
            });
            tokio::task::yield_now().await;
        }

        assert_eq!(next_leave(&mut events).await, PlayerId(2));
        assert_eq!(sender.connected(), 1);

        let mut received = vec![0u8; frame.len() * (WRITER_BACKLOG + 4)];
        tokio::time::timeout(Duration::from_secs(1), healthy.read_exact(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert!(String::from_utf8_lossy(&received).starts_with(frame));
    }

    #[tokio::test]
    async fn test_unregister_drops_pending_frames() {
        let (mut sender, _events) = sender();
        let _a = register(&mut sender, 1);
        let _b = register(&mut sender, 2);
        let base = Instant::now();

        for to in [1, 2, 1] {
            schedule(&mut sender, to, base, "x\n");
        }
        sender.handle_message(OutboundMessage::Unregister { id: PlayerId(1) });

        assert_eq!(sender.pending(), 1);
        assert_eq!(sender.connected(), 1);
    }
}
