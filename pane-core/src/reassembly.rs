//! Reassembly of chunked file transfers.
//!
//! A sender splits a base64 payload into `total` text fragments and sends
//! each as a `file` frame carrying `(id, number, total, chunk)`. Fragments may
//! arrive in any order and transfers may interleave. A transfer completes once
//! every slot `0..total` has been filled, regardless of which fragment arrives
//! last; the fragments are then joined in index order and the record is
//! dropped.

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Default cap on concurrently pending transfers.
pub const DEFAULT_MAX_PENDING_TRANSFERS: usize = 64;

/// Errors for fragments that cannot belong to a valid transfer.
///
/// A rejected fragment leaves any existing record untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    /// A transfer must have at least one chunk.
    #[error("transfer {id} declares zero chunks")]
    EmptyTransfer {
        /// Transfer id.
        id: String,
    },

    /// Chunk index is not below the declared total.
    #[error("chunk {number} out of range for transfer {id} ({total} chunks)")]
    ChunkOutOfRange {
        /// Transfer id.
        id: String,
        /// Offending chunk index.
        number: usize,
        /// Declared total.
        total: usize,
    },

    /// A later fragment disagrees with the total declared by the first one.
    #[error("transfer {id} declared {expected} chunks, fragment says {actual}")]
    TotalMismatch {
        /// Transfer id.
        id: String,
        /// Total recorded from the first fragment.
        expected: usize,
        /// Total carried by this fragment.
        actual: usize,
    },

    /// Too many transfers are already in flight.
    #[error("too many pending transfers (limit: {limit})")]
    TooManyTransfers {
        /// Configured cap.
        limit: usize,
    },
}

/// One transfer in progress.
#[derive(Debug)]
struct PendingTransfer {
    total: usize,
    slots: BTreeMap<usize, String>,
}

impl PendingTransfer {
    fn is_complete(&self) -> bool {
        self.slots.len() == self.total
    }

    fn assemble(self) -> String {
        self.slots.into_values().collect()
    }
}

/// Accumulates file fragments keyed by transfer id.
#[derive(Debug)]
pub struct FileChunkReassembler {
    max_pending: usize,
    transfers: HashMap<String, PendingTransfer>,
}

impl FileChunkReassembler {
    /// Create a reassembler that tracks at most `max_pending` transfers.
    pub fn new(max_pending: usize) -> Self {
        Self {
            max_pending,
            transfers: HashMap::new(),
        }
    }

    /// Store one fragment.
    ///
    /// Returns `Some(payload)` when this fragment completed its transfer. A
    /// duplicate fragment overwrites the earlier copy of its slot.
    pub fn receive(
        &mut self,
        id: &str,
        number: usize,
        chunk: impl Into<String>,
        total: usize,
    ) -> Result<Option<String>, ReassemblyError> {
        if total == 0 {
            return Err(ReassemblyError::EmptyTransfer { id: id.to_string() });
        }
        if number >= total {
            return Err(ReassemblyError::ChunkOutOfRange {
                id: id.to_string(),
                number,
                total,
            });
        }

        match self.transfers.get(id) {
            Some(existing) if existing.total != total => {
                return Err(ReassemblyError::TotalMismatch {
                    id: id.to_string(),
                    expected: existing.total,
                    actual: total,
                });
            }
            None if self.transfers.len() >= self.max_pending => {
                return Err(ReassemblyError::TooManyTransfers {
                    limit: self.max_pending,
                });
            }
            _ => {}
        }

        let transfer = self
            .transfers
            .entry(id.to_string())
            .or_insert_with(|| PendingTransfer {
                total,
                slots: BTreeMap::new(),
            });
        transfer.slots.insert(number, chunk.into());

        if !transfer.is_complete() {
            tracing::trace!(
                "Transfer {}: {}/{} chunks",
                id,
                transfer.slots.len(),
                total
            );
            return Ok(None);
        }

        let payload = self
            .transfers
            .remove(id)
            .map(PendingTransfer::assemble)
            .unwrap_or_default();
        tracing::debug!("Transfer {} complete ({} bytes)", id, payload.len());
        Ok(Some(payload))
    }

    /// Drop a pending transfer. Returns whether it existed.
    pub fn abandon(&mut self, id: &str) -> bool {
        self.transfers.remove(id).is_some()
    }

    /// Whether a transfer with this id is in progress.
    pub fn is_pending(&self, id: &str) -> bool {
        self.transfers.contains_key(id)
    }

    /// Number of transfers in progress.
    pub fn pending_count(&self) -> usize {
        self.transfers.len()
    }

    /// Drop all pending transfers.
    pub fn clear(&mut self) {
        self.transfers.clear();
    }
}

impl Default for FileChunkReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING_TRANSFERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNKS: [&str; 3] = ["ab", "cd", "ef"];

    fn feed(order: &[usize]) -> Vec<String> {
        let mut reassembler = FileChunkReassembler::default();
        let mut outputs = Vec::new();
        for &n in order {
            if let Some(payload) = reassembler.receive("t1", n, CHUNKS[n], 3).unwrap() {
                outputs.push(payload);
            }
        }
        assert!(!reassembler.is_pending("t1"));
        outputs
    }

    // ===========================================
    // Ordering Tests
    // ===========================================

    #[test]
    fn in_order_chunks_assemble() {
        assert_eq!(feed(&[0, 1, 2]), vec!["abcdef".to_string()]);
    }

    #[test]
    fn any_arrival_order_assembles_once() {
        let orders = [
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            assert_eq!(feed(&order), vec!["abcdef".to_string()], "order {:?}", order);
        }
    }

    #[test]
    fn last_index_alone_does_not_complete() {
        let mut reassembler = FileChunkReassembler::default();

        assert_eq!(reassembler.receive("t1", 2, "ef", 3).unwrap(), None);

        assert!(reassembler.is_pending("t1"));
    }

    #[test]
    fn single_chunk_transfer() {
        let mut reassembler = FileChunkReassembler::default();
        let payload = reassembler.receive("solo", 0, "aGk=", 1).unwrap();
        assert_eq!(payload.as_deref(), Some("aGk="));
        assert_eq!(reassembler.pending_count(), 0);
    }

    #[test]
    fn duplicate_chunk_overwrites() {
        let mut reassembler = FileChunkReassembler::default();
        reassembler.receive("t1", 0, "xx", 2).unwrap();
        reassembler.receive("t1", 0, "ab", 2).unwrap();
        let payload = reassembler.receive("t1", 1, "cd", 2).unwrap();
        assert_eq!(payload.as_deref(), Some("abcd"));
    }

    #[test]
    fn interleaved_transfers_are_independent() {
        let mut reassembler = FileChunkReassembler::default();
        assert!(reassembler.receive("a", 0, "1", 2).unwrap().is_none());
        assert!(reassembler.receive("b", 1, "Y", 2).unwrap().is_none());
        assert_eq!(reassembler.pending_count(), 2);

        assert_eq!(reassembler.receive("b", 0, "X", 2).unwrap().as_deref(), Some("XY"));
        assert_eq!(reassembler.receive("a", 1, "2", 2).unwrap().as_deref(), Some("12"));
        assert_eq!(reassembler.pending_count(), 0);
    }

    #[test]
    fn completed_id_can_be_reused() {
        let mut reassembler = FileChunkReassembler::default();
        reassembler.receive("t1", 0, "a", 1).unwrap();
        let second = reassembler.receive("t1", 0, "b", 1).unwrap();
        assert_eq!(second.as_deref(), Some("b"));
    }

    // ===========================================
    // Validation Tests
    // ===========================================

    #[test]
    fn zero_total_rejected() {
        let mut reassembler = FileChunkReassembler::default();
        let err = reassembler.receive("t1", 0, "a", 0).unwrap_err();
        assert!(matches!(err, ReassemblyError::EmptyTransfer { .. }));
    }

    #[test]
    fn out_of_range_rejected() {
        let mut reassembler = FileChunkReassembler::default();
        let err = reassembler.receive("t1", 3, "a", 3).unwrap_err();
        assert!(matches!(err, ReassemblyError::ChunkOutOfRange { number: 3, .. }));
        assert!(!reassembler.is_pending("t1"));
    }

    #[test]
    fn total_mismatch_rejected_and_record_kept() {
        let mut reassembler = FileChunkReassembler::default();
        reassembler.receive("t1", 0, "ab", 3).unwrap();

        let err = reassembler.receive("t1", 1, "cd", 4).unwrap_err();

        assert!(matches!(
            err,
            ReassemblyError::TotalMismatch { expected: 3, actual: 4, .. }
        ));
        assert!(reassembler.is_pending("t1"));
    }

    #[test]
    fn pending_cap_enforced() {
        let mut reassembler = FileChunkReassembler::new(2);
        reassembler.receive("a", 0, "x", 2).unwrap();
        reassembler.receive("b", 0, "x", 2).unwrap();

        let err = reassembler.receive("c", 0, "x", 2).unwrap_err();
        assert_eq!(err, ReassemblyError::TooManyTransfers { limit: 2 });

        // Existing transfers still accept fragments
        assert!(reassembler.receive("a", 1, "y", 2).unwrap().is_some());
    }

    #[test]
    fn abandon_and_clear() {
        let mut reassembler = FileChunkReassembler::default();
        reassembler.receive("a", 0, "x", 2).unwrap();
        reassembler.receive("b", 0, "x", 2).unwrap();

        assert!(reassembler.abandon("a"));
        assert!(!reassembler.abandon("a"));
        reassembler.clear();
        assert_eq!(reassembler.pending_count(), 0);
    }
}
