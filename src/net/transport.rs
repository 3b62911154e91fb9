use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{Operation, PeerId, PeerState, TransportError};
use crate::net::discovery::Advertisement;
use crate::session::Session;
use crate::store::OperationStore;

/// Fired after a remote operation was newly applied to the store, so the
/// external renderer can schedule a redraw. Must not block: it runs on the
/// read loop of the connection that delivered the operation.
pub type RemoteOpCallback = Arc<dyn Fn(&Operation) + Send + Sync>;

struct PeerHandle {
    addr: String,
    state: PeerState,
    tx: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
}

/// The peer mesh: listener, dialer, per-connection read loops, and
/// broadcast fan-out over newline-delimited JSON frames.
///
/// Every accepted or dialed socket becomes a registered peer with an
/// opaque id, a dedicated read task, and a dedicated write task fed by an
/// unbounded channel. There is no reconnection: a peer that errors is
/// pruned, and discovery may re-offer its address later.
pub struct Transport {
    store: Arc<OperationStore>,
    session: Arc<Session>,
    peers: Arc<Mutex<HashMap<PeerId, PeerHandle>>>,
    on_remote: RwLock<Option<RemoteOpCallback>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    advertisement: Mutex<Option<Advertisement>>,
}

impl Transport {
    pub fn new(store: Arc<OperationStore>, session: Arc<Session>) -> Arc<Self> {
        Arc::new(Transport {
            store,
            session,
            peers: Arc::new(Mutex::new(HashMap::new())),
            on_remote: RwLock::new(None),
            accept_task: Mutex::new(None),
            advertisement: Mutex::new(None),
        })
    }

    /// Register the redraw hook fired for newly applied remote operations.
    pub fn set_on_remote(&self, callback: RemoteOpCallback) {
        *self.on_remote.write().expect("callback lock poisoned") = Some(callback);
    }

    /// Keep the DNS-SD advertisement alive for the lifetime of the mesh;
    /// `close` withdraws it.
    pub fn attach_advertisement(&self, advertisement: Advertisement) {
        *self.advertisement.lock().expect("advertisement lock poisoned") = Some(advertisement);
    }

    /// Bind the mesh listener and start the accept loop. A bind failure is
    /// fatal for a host and is surfaced immediately. Returns the bound
    /// address, so callers may listen on an ephemeral port.
    pub async fn listen(self: &Arc<Self>, addr: &str) -> Result<SocketAddr, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(TransportError::Bind)?;
        let local_addr = listener.local_addr().map_err(TransportError::Bind)?;
        info!("mesh listening on {}", local_addr);

        let transport = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote)) => {
                        info!("accepted peer connection from {}", remote);
                        transport.register_peer(stream, remote.to_string());
                    }
                    Err(e) => {
                        debug!("accept loop ending: {}", e);
                        return;
                    }
                }
            }
        });
        *self.accept_task.lock().expect("accept lock poisoned") = Some(task);
        Ok(local_addr)
    }

    /// Dial a peer. A no-op when a live entry for that address already
    /// exists, so discovery re-offering a known address is harmless.
    pub async fn connect(self: &Arc<Self>, addr: &str) -> Result<(), TransportError> {
        {
            let peers = self.peers.lock().expect("peer lock poisoned");
            if peers.values().any(|p| p.addr == addr) {
                debug!("already connected to {}, ignoring", addr);
                return Ok(());
            }
        }
        let stream = TcpStream::connect(addr).await.map_err(TransportError::Dial)?;
        info!("connected to peer at {}", addr);
        self.register_peer(stream, addr.to_string());
        Ok(())
    }

    /// Serialize the operation once and write it to every registered peer.
    /// Zero peers is not an error. Dead peers are pruned after the
    /// registry lock is released, never while iterating under it.
    pub fn broadcast(&self, op: &Operation) {
        let line = match serde_json::to_string(op) {
            Ok(mut s) => {
                s.push('\n');
                s
            }
            Err(e) => {
                warn!("failed to serialize operation, dropping: {}", e);
                return;
            }
        };

        let mut dead = Vec::new();
        {
            let peers = self.peers.lock().expect("peer lock poisoned");
            for (id, peer) in peers.iter() {
                if peer.tx.send(line.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            self.remove_peer(id, "writer gone");
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().expect("peer lock poisoned").len()
    }

    pub fn peer_addrs(&self) -> Vec<String> {
        self.peers
            .lock()
            .expect("peer lock poisoned")
            .values()
            .map(|p| p.addr.clone())
            .collect()
    }

    /// Lifecycle view of the registry, for diagnostics.
    pub fn peer_states(&self) -> Vec<(String, PeerState)> {
        self.peers
            .lock()
            .expect("peer lock poisoned")
            .values()
            .map(|p| (p.addr.clone(), p.state))
            .collect()
    }

    /// Stop the accept loop, withdraw the advertised service, and close
    /// every peer socket. Blocked reads observe the error and run their
    /// own cleanup.
    pub fn close(&self) {
        if let Some(task) = self.accept_task.lock().expect("accept lock poisoned").take() {
            task.abort();
        }
        if let Some(ad) = self.advertisement.lock().expect("advertisement lock poisoned").take() {
            ad.shutdown();
        }
        let mut peers = self.peers.lock().expect("peer lock poisoned");
        for (id, peer) in peers.drain() {
            peer.reader.abort();
            info!("closed peer {} ({})", id, peer.addr);
        }
    }

    fn register_peer(self: &Arc<Self>, stream: TcpStream, addr: String) {
        let id = PeerId::new();
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel::<String>();

        let writer_transport = Arc::clone(self);
        tokio::spawn(async move {
            writer_transport.write_loop(id, rx, write_half).await;
        });

        let reader_transport = Arc::clone(self);
        let reader = tokio::spawn(async move {
            reader_transport.read_loop(id, read_half).await;
        });

        // The link stays Connecting until the snapshot replay is queued.
        let handle = PeerHandle {
            addr,
            state: PeerState::Connecting,
            tx: tx.clone(),
            reader,
        };
        self.peers.lock().expect("peer lock poisoned").insert(id, handle);

        // Replay the current picture to the newcomer as insert operations;
        // idempotent apply makes the replay safe even mid-broadcast.
        self.send_snapshot(&tx);

        if let Some(peer) = self.peers.lock().expect("peer lock poisoned").get_mut(&id) {
            peer.state = PeerState::Connected;
        }
    }

    fn send_snapshot(&self, tx: &mpsc::UnboundedSender<String>) {
        for stroke in self.store.snapshot() {
            let op = Operation::Insert {
                stroke,
                lamport: self.session.next_lamport(),
                site: self.session.site().to_string(),
            };
            match serde_json::to_string(&op) {
                Ok(mut line) => {
                    line.push('\n');
                    if tx.send(line).is_err() {
                        return;
                    }
                }
                Err(e) => warn!("failed to serialize snapshot stroke: {}", e),
            }
        }
    }

    async fn write_loop(
        &self,
        id: PeerId,
        mut rx: mpsc::UnboundedReceiver<String>,
        mut write_half: OwnedWriteHalf,
    ) {
        while let Some(line) = rx.recv().await {
            if let Err(e) = write_half.write_all(line.as_bytes()).await {
                debug!("write to peer {} failed: {}", id, e);
                // Removal happens here, on the writer task, outside any
                // broadcast iteration.
                self.remove_peer(id, "write error");
                return;
            }
        }
    }

    async fn read_loop(&self, id: PeerId, read_half: OwnedReadHalf) {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let op: Operation = match serde_json::from_str(&line) {
                        Ok(op) => op,
                        Err(e) => {
                            // Malformed payloads are dropped; the
                            // connection stays open.
                            warn!("dropping malformed payload from peer {}: {}", id, e);
                            continue;
                        }
                    };
                    if self.store.apply(&op) {
                        let callback = self
                            .on_remote
                            .read()
                            .expect("callback lock poisoned")
                            .clone();
                        if let Some(callback) = callback {
                            callback(&op);
                        }
                    } else {
                        debug!("ignored duplicate or stale operation from peer {}", id);
                    }
                }
                Ok(None) => {
                    self.remove_peer(id, "connection closed");
                    return;
                }
                Err(e) => {
                    self.remove_peer(id, &format!("read error: {}", e));
                    return;
                }
            }
        }
    }

    fn remove_peer(&self, id: PeerId, reason: &str) {
        let removed = self.peers.lock().expect("peer lock poisoned").remove(&id);
        if let Some(peer) = removed {
            // A peer the registry no longer lists must not keep applying
            // inbound operations: stop its read loop along with the entry.
            peer.reader.abort();
            info!(
                "peer {} ({}) is {:?}: {}",
                id,
                peer.addr,
                PeerState::Disconnected,
                reason
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Color, Point, Stroke};
    use chrono::Utc;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::sleep;

    fn mesh_node(site: &str) -> (Arc<OperationStore>, Arc<Transport>) {
        let store = Arc::new(OperationStore::new());
        let session = Arc::new(Session::with_site(site.to_string()));
        let transport = Transport::new(Arc::clone(&store), session);
        (store, transport)
    }

    fn insert_line(id: &str) -> String {
        let op = Operation::Insert {
            stroke: Stroke {
                id: id.to_string(),
                points: vec![Point { x: 1.0, y: 1.0 }],
                color: Color::BLACK,
                width: 2.0,
                site: "raw-site".to_string(),
                time: Utc::now(),
            },
            lamport: 1,
            site: "raw-site".to_string(),
        };
        let mut line = serde_json::to_string(&op).unwrap();
        line.push('\n');
        line
    }

    #[tokio::test]
    async fn removed_peer_stops_applying_inbound_operations() {
        let (store, transport) = mesh_node("host-site");
        let addr = transport.listen("127.0.0.1:0").await.unwrap();

        let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
        for _ in 0..200 {
            if transport.peer_count() == 1 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(transport.peer_count(), 1);

        let id = *transport
            .peers
            .lock()
            .unwrap()
            .keys()
            .next()
            .unwrap();
        transport.remove_peer(id, "pruned");
        assert_eq!(transport.peer_count(), 0);

        // The socket may already be torn down; only the store matters here.
        let _ = raw.write_all(insert_line("after-removal").as_bytes()).await;
        sleep(Duration::from_millis(100)).await;
        assert!(store.is_empty());

        transport.close();
    }
}
