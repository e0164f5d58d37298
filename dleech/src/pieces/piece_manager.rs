use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use sha1::{Digest, Sha1};

use crate::metainfo::metainfo::Metainfo;

/// The single coordinator of piece allocation, block assembly and hash
/// verification, shared by every peer session.
///
/// All piece state lives behind one mutex; no operation performs I/O while
/// holding it. Sessions call in and consume returned values, the manager
/// holds no references back.
#[derive(Debug)]
pub struct PieceManager {
    metainfo: Arc<Metainfo>,
    table: Mutex<PieceTable>,
    // Mirror of the completed count so progress reads skip the mutex.
    completed_count: AtomicUsize,
}

#[derive(Debug)]
struct PieceTable {
    completed: Vec<bool>,
    /// Piece index -> endpoint of the peer currently downloading it.
    in_flight: HashMap<u32, String>,
    /// Piece index -> block begin offset -> received bytes.
    blocks: HashMap<u32, HashMap<u32, Vec<u8>>>,
}

/// Result of offering assembled piece bytes for storage.
#[derive(Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Hash matched; the piece is now complete.
    Stored,
    /// Hash mismatch; the bytes were discarded and the piece re-opened.
    BadHash,
}

/// Posible `PieceManager` errors.
#[derive(Debug)]
pub enum PieceManagerError {
    PoisonedTableLock,
}

impl PieceManager {
    pub fn new(metainfo: Arc<Metainfo>) -> Self {
        let total_pieces = metainfo.total_pieces() as usize;
        Self {
            metainfo,
            table: Mutex::new(PieceTable {
                completed: vec![false; total_pieces],
                in_flight: HashMap::new(),
                blocks: HashMap::new(),
            }),
            completed_count: AtomicUsize::new(0),
        }
    }

    /// Assigns the lowest-index piece that is neither complete nor already
    /// in flight to the peer at `endpoint`. Returns `None` when every
    /// remaining piece is taken or done.
    pub fn assign(&self, endpoint: &str) -> Result<Option<u32>, PieceManagerError> {
        let mut table = self.lock_table()?;

        for index in 0..table.completed.len() as u32 {
            if !table.completed[index as usize] && !table.in_flight.contains_key(&index) {
                table.in_flight.insert(index, endpoint.to_string());
                table.blocks.insert(index, HashMap::new());
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Records one received block and tries to assemble the whole piece by
    /// concatenating contiguous blocks from offset 0.
    ///
    /// Returns the assembled bytes once they exactly cover the piece;
    /// `None` while gaps remain. Blocks may arrive in any order. Data for a
    /// piece that is not in flight (stale or unsolicited) is dropped.
    pub fn add_block(
        &self,
        index: u32,
        begin: u32,
        data: Vec<u8>,
    ) -> Result<Option<Vec<u8>>, PieceManagerError> {
        if index >= self.metainfo.total_pieces() || data.is_empty() {
            return Ok(None);
        }
        let expected_length = self.metainfo.piece_size(index) as usize;

        let mut table = self.lock_table()?;
        let blocks = match table.blocks.get_mut(&index) {
            Some(blocks) => blocks,
            None => return Ok(None),
        };
        blocks.insert(begin, data);

        let mut assembled = Vec::with_capacity(expected_length);
        while assembled.len() < expected_length {
            match blocks.get(&(assembled.len() as u32)) {
                Some(block) => assembled.extend_from_slice(block),
                None => return Ok(None),
            }
        }

        if assembled.len() == expected_length {
            Ok(Some(assembled))
        } else {
            // A block overran the piece boundary; wait for a clean cover.
            Ok(None)
        }
    }

    /// Verifies assembled piece bytes against the expected SHA-1 digest.
    ///
    /// Either way the piece's block buffer and in-flight entry are freed;
    /// only a matching hash marks the piece complete. Never writes files,
    /// persisting the bytes is the caller's next step.
    pub fn store_piece(&self, index: u32, bytes: &[u8]) -> Result<StoreOutcome, PieceManagerError> {
        if index >= self.metainfo.total_pieces() {
            return Ok(StoreOutcome::BadHash);
        }
        let matches = Sha1::digest(bytes).as_slice() == self.metainfo.piece_hash(index);

        let mut table = self.lock_table()?;
        table.blocks.remove(&index);
        table.in_flight.remove(&index);

        if !matches {
            return Ok(StoreOutcome::BadHash);
        }
        if !table.completed[index as usize] {
            table.completed[index as usize] = true;
            self.completed_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(StoreOutcome::Stored)
    }

    /// Re-opens a piece whose downloader went away before assembly:
    /// unconditionally frees its block buffer and in-flight entry.
    pub fn release(&self, index: u32) -> Result<(), PieceManagerError> {
        let mut table = self.lock_table()?;
        table.blocks.remove(&index);
        table.in_flight.remove(&index);
        Ok(())
    }

    /// Returns true once every piece has been verified and stored.
    pub fn is_complete(&self) -> bool {
        self.completed_count.load(Ordering::Relaxed) == self.metainfo.total_pieces() as usize
    }

    /// Returns `(completed_count, total_pieces)`.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.completed_count.load(Ordering::Relaxed),
            self.metainfo.total_pieces() as usize,
        )
    }

    /// Completed payload bytes, clamped to the total length so the short
    /// last piece does not overcount.
    pub fn downloaded_bytes(&self) -> u64 {
        let completed = self.completed_count.load(Ordering::Relaxed) as u64;
        (completed * self.metainfo.piece_length()).min(self.metainfo.total_length())
    }

    fn lock_table(&self) -> Result<MutexGuard<PieceTable>, PieceManagerError> {
        self.table
            .lock()
            .map_err(|_| PieceManagerError::PoisonedTableLock)
    }
}
