use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::models::{Operation, Stroke};

/// Per-process replication context: the site identifier stamped on every
/// operation this process originates, and its Lamport clock.
///
/// Constructed once at startup and shared by reference with everything
/// that emits operations. Lamport values are recorded on the wire but are
/// not compared during apply; arrival order wins.
#[derive(Debug)]
pub struct Session {
    site: String,
    lamport: AtomicU64,
}

impl Session {
    pub fn new() -> Self {
        Session::with_site(Uuid::new_v4().to_string())
    }

    /// Fixed site id and a zeroed clock, for deterministic tests.
    pub fn with_site(site: String) -> Self {
        Session {
            site,
            lamport: AtomicU64::new(0),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn next_lamport(&self) -> u64 {
        self.lamport.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Stamp an insert operation for a locally drawn stroke.
    pub fn insert_op(&self, stroke: Stroke) -> Operation {
        Operation::Insert {
            stroke,
            lamport: self.next_lamport(),
            site: self.site.clone(),
        }
    }

    /// Stamp a delete operation for the given stroke id.
    pub fn delete_op(&self, target: String) -> Operation {
        Operation::Delete {
            target,
            lamport: self.next_lamport(),
            site: self.site.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Color, Point};

    #[test]
    fn lamport_is_monotonic_per_site() {
        let session = Session::with_site("site-a".to_string());
        let a = session.insert_op(Stroke::new(
            vec![Point { x: 0.0, y: 0.0 }],
            Color::BLACK,
            2.0,
            session.site(),
        ));
        let b = session.delete_op("missing".to_string());
        assert_eq!(a.lamport(), 1);
        assert_eq!(b.lamport(), 2);
        assert_eq!(a.site(), "site-a");
    }
}
