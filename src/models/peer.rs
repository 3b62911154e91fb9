use std::fmt;

use uuid::Uuid;

/// Opaque peer identity assigned when a connection is registered.
/// Deliberately independent of the transport address, so identity can
/// outlive address reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new() -> Self {
        PeerId(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        PeerId::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a mesh link. No automatic reconnection: a Disconnected
/// peer is pruned, and Discovery may re-offer the same address later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    Connected,
    Disconnected,
}
