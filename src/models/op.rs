use serde::{Deserialize, Serialize};

use crate::models::Stroke;

/// A single atomic drawing mutation, broadcast to every peer as one
/// newline-terminated JSON value. Constructed, applied, optionally
/// broadcast, then discarded.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum Operation {
    #[serde(rename = "insert_stroke")]
    Insert {
        stroke: Stroke,
        lamport: u64,
        site: String,
    },
    #[serde(rename = "delete_stroke")]
    Delete {
        target: String,
        lamport: u64,
        site: String,
    },
}

impl Operation {
    /// Originating site of the operation.
    pub fn site(&self) -> &str {
        match self {
            Operation::Insert { site, .. } => site,
            Operation::Delete { site, .. } => site,
        }
    }

    pub fn lamport(&self) -> u64 {
        match self {
            Operation::Insert { lamport, .. } => *lamport,
            Operation::Delete { lamport, .. } => *lamport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Color, Point};

    #[test]
    fn insert_round_trips_through_tagged_json() {
        let op = Operation::Insert {
            stroke: Stroke::new(vec![Point { x: 1.0, y: 2.0 }], Color::BLACK, 2.0, "site-a"),
            lamport: 7,
            site: "site-a".to_string(),
        };
        let line = serde_json::to_string(&op).unwrap();
        assert!(line.contains("\"type\":\"insert_stroke\""));
        // Framing contract: the serialized payload never contains a raw newline.
        assert!(!line.contains('\n'));

        let back: Operation = serde_json::from_str(&line).unwrap();
        assert_eq!(back.lamport(), 7);
        assert_eq!(back.site(), "site-a");
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let err = serde_json::from_str::<Operation>(r#"{"type":"clear_all","site":"x"}"#);
        assert!(err.is_err());
    }
}
