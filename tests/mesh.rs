//! End-to-end peer mesh scenarios over real sockets on ephemeral ports:
//! host/client convergence, snapshot replay for late joiners, loopback
//! dedup, and registry pruning after a disconnect.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use localboard::models::{Color, Operation, PeerState, Point, Stroke};
use localboard::net::Transport;
use localboard::session::Session;
use localboard::store::OperationStore;

fn node(site: &str) -> (Arc<OperationStore>, Arc<Transport>) {
    let store = Arc::new(OperationStore::new());
    let session = Arc::new(Session::with_site(site.to_string()));
    let transport = Transport::new(Arc::clone(&store), session);
    (store, transport)
}

fn insert_op(id: &str, site: &str) -> Operation {
    Operation::Insert {
        stroke: Stroke {
            id: id.to_string(),
            points: vec![Point { x: 10.0, y: 20.0 }, Point { x: 30.0, y: 40.0 }],
            color: Color::BLACK,
            width: 2.0,
            site: site.to_string(),
            time: Utc::now(),
        },
        lamport: 1,
        site: site.to_string(),
    }
}

/// Poll until `cond` holds or two seconds pass.
async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn host_broadcast_reaches_connected_client() {
    let (host_store, host) = node("host-site");
    let (client_store, client) = node("client-site");

    let addr = host.listen("127.0.0.1:0").await.unwrap();
    client.connect(&addr.to_string()).await.unwrap();
    assert!(wait_for(|| host.peer_count() == 1).await);

    let op = insert_op("s1", "host-site");
    assert!(host_store.apply(&op));
    host.broadcast(&op);

    assert!(wait_for(|| client_store.len() == 1).await);
    let snapshot = client_store.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "s1");

    client.close();
    // Host prunes the peer once the socket goes away.
    assert!(wait_for(|| host.peer_count() == 0).await);

    // Broadcasting into an empty mesh is not an error.
    host.broadcast(&insert_op("s2", "host-site"));
    host.close();
}

#[tokio::test]
async fn late_joiner_receives_snapshot_replay() {
    let (host_store, host) = node("host-site");
    host_store.apply(&insert_op("early-1", "host-site"));
    host_store.apply(&insert_op("early-2", "host-site"));

    let addr = host.listen("127.0.0.1:0").await.unwrap();

    let (client_store, client) = node("client-site");
    client.connect(&addr.to_string()).await.unwrap();

    assert!(wait_for(|| client_store.len() == 2).await);
    let mut ids: Vec<String> = client_store.snapshot().into_iter().map(|s| s.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["early-1".to_string(), "early-2".to_string()]);

    client.close();
    host.close();
}

#[tokio::test]
async fn echoed_operation_does_not_duplicate_at_origin() {
    let (host_store, host) = node("host-site");
    let (client_store, client) = node("client-site");

    let addr = host.listen("127.0.0.1:0").await.unwrap();
    client.connect(&addr.to_string()).await.unwrap();
    assert!(wait_for(|| host.peer_count() == 1).await);

    let op = insert_op("s1", "host-site");
    assert!(host_store.apply(&op));
    host.broadcast(&op);
    assert!(wait_for(|| client_store.len() == 1).await);

    // The client echoes the operation straight back to its origin.
    client.broadcast(&op);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(host_store.len(), 1);

    client.close();
    host.close();
}

#[tokio::test]
async fn connect_is_a_noop_for_known_addresses() {
    let (_, host) = node("host-site");
    let (_, client) = node("client-site");

    let addr = host.listen("127.0.0.1:0").await.unwrap();
    client.connect(&addr.to_string()).await.unwrap();
    client.connect(&addr.to_string()).await.unwrap();

    assert_eq!(client.peer_count(), 1);
    assert!(wait_for(|| host.peer_count() == 1).await);
    // Still exactly one host-side link after the duplicate dial.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(host.peer_count(), 1);

    client.close();
    host.close();
}

#[tokio::test]
async fn registry_reports_connected_links() {
    let (_, host) = node("host-site");
    let (_, client) = node("client-site");

    let addr = host.listen("127.0.0.1:0").await.unwrap();
    client.connect(&addr.to_string()).await.unwrap();

    // Dial-side registration settles to Connected before connect returns.
    let states = client.peer_states();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].0, addr.to_string());
    assert_eq!(states[0].1, PeerState::Connected);

    assert!(wait_for(|| {
        let states = host.peer_states();
        states.len() == 1 && states[0].1 == PeerState::Connected
    })
    .await);

    client.close();
    // Disconnected links are pruned rather than listed.
    assert!(wait_for(|| host.peer_states().is_empty()).await);
    host.close();
}

#[tokio::test]
async fn malformed_payload_leaves_connection_open() {
    use tokio::io::AsyncWriteExt;

    let (host_store, host) = node("host-site");
    let addr = host.listen("127.0.0.1:0").await.unwrap();

    let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
    assert!(wait_for(|| host.peer_count() == 1).await);

    raw.write_all(b"this is not json\n").await.unwrap();
    let op_line = serde_json::to_string(&insert_op("s1", "raw-site")).unwrap();
    raw.write_all(op_line.as_bytes()).await.unwrap();
    raw.write_all(b"\n").await.unwrap();

    // The bad line was dropped, the good one applied on the same socket.
    assert!(wait_for(|| host_store.len() == 1).await);
    assert_eq!(host.peer_count(), 1);

    host.close();
}
