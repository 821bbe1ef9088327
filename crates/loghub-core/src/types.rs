//! Shared data types for shards, cursors, and histogram buckets.

use serde::{Deserialize, Serialize};

/// Identifier of one shard of a log store.
///
/// The service assigns integer shard ids; this type never interprets them
/// beyond identity and ordering. The shard set of a store may grow over
/// time, so it is re-enumerated on demand rather than cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shard(pub u32);

impl std::fmt::Display for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

/// A resolved position within a shard.
///
/// `epoch_seconds` is the approximate, service-assigned write time of the
/// record behind the cursor. `token` is the only value usable to resume
/// reading; it is not stable across service-side compaction, so long-lived
/// checkpoints should persist the time and re-resolve the token rather than
/// trust a stored token verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub epoch_seconds: i64,
    pub token: String,
}

/// Symbolic cursor addresses accepted by cursor resolution.
///
/// Maps onto the service's BEGIN/END cursor positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolicPosition {
    /// The oldest readable position of a shard.
    Earliest,
    /// The position one past the newest record of a shard.
    Latest,
}

impl std::fmt::Display for SymbolicPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolicPosition::Earliest => write!(f, "begin"),
            SymbolicPosition::Latest => write!(f, "end"),
        }
    }
}

/// Approximate record count observed in `[from_time, to_time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub from_time: i64,
    pub to_time: i64,
    pub count: i64,
}

/// The reply to one histogram query.
///
/// The service may mark a reply incomplete; callers re-query a bounded
/// number of times and then accept the approximate counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramBatch {
    pub complete: bool,
    pub buckets: Vec<HistogramBucket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_display_and_order() {
        assert_eq!(Shard(3).to_string(), "shard-3");
        assert!(Shard(1) < Shard(2));
    }

    #[test]
    fn symbolic_position_maps_to_service_names() {
        assert_eq!(SymbolicPosition::Earliest.to_string(), "begin");
        assert_eq!(SymbolicPosition::Latest.to_string(), "end");
    }

    #[test]
    fn cursor_serializes_for_checkpointing() {
        let cursor = Cursor {
            epoch_seconds: 1_700_000_000,
            token: "MTcwMDAwMDAwMA==".to_string(),
        };
        let json = serde_json::to_string(&cursor).expect("serialize");
        let back: Cursor = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, cursor);
    }

    #[test]
    fn shard_serializes_as_bare_id() {
        let json = serde_json::to_string(&Shard(7)).expect("serialize");
        assert_eq!(json, "7");
    }
}
