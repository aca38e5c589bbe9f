use std::mem;

use crate::types::{Depth, Score};

/// Size of each cluster in the transposition table.
const CLUSTER_SIZE: usize = 4;

/// Bound type for transposition table entries.
///
/// Indicates the relationship between the stored value and the node's true value:
/// - `None`: No valid entry
/// - `Lower`: Value is a lower bound (fail-high occurred)
/// - `Upper`: Value is an upper bound (fail-low)
/// - `Exact`: Value is the exact negamax value
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    #[default]
    None = 0,
    Lower = 1,
    Upper = 2,
    Exact = 3,
}

impl Bound {
    /// Classifies a finished node's value against the window it was searched with.
    ///
    /// # Arguments
    ///
    /// * `value` - The best value found for the node
    /// * `original_alpha` - Alpha before any table adjustment
    /// * `beta` - Beta the node ended with
    #[inline]
    pub fn determine_bound(value: Score, original_alpha: Score, beta: Score) -> Bound {
        if value <= original_alpha {
            Bound::Upper
        } else if value >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        }
    }
}

/// A single entry in the transposition table.
///
/// The ply is stored rather than the remaining depth: an entry computed at a
/// shallower ply searched at least as far below itself as a lookup at a deeper
/// ply would.
#[derive(Clone, Copy, Default)]
struct TTEntry {
    key: u32,
    value: Score,
    depth: u16,
    bound: Bound,
    is_maximizing: bool,
}

impl TTEntry {
    fn data(&self) -> TTData {
        TTData {
            key: self.key,
            value: self.value,
            depth: self.depth as Depth,
            bound: self.bound,
            is_maximizing: self.is_maximizing,
        }
    }

    /// Saves data into the entry, keeping an existing entry for the same
    /// position when it is more trustworthy than the new one.
    fn save(&mut self, key: u32, value: Score, bound: Bound, depth: Depth, is_maximizing: bool) {
        let depth = depth.min(u16::MAX as Depth) as u16;
        let is_key_different = key != self.key || is_maximizing != self.is_maximizing;

        if bound == Bound::Exact
            || is_key_different
            || self.bound == Bound::None
            || depth <= self.depth
        {
            *self = TTEntry {
                key,
                value,
                depth,
                bound,
                is_maximizing,
            };
        }
    }
}

/// Data stored in and retrieved from transposition table entries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TTData {
    pub key: u32,
    pub value: Score,
    /// Ply at which the value was computed.
    pub depth: Depth,
    pub bound: Bound,
    /// Color of the node the value belongs to.
    pub is_maximizing: bool,
}

impl Default for TTData {
    fn default() -> Self {
        TTData {
            key: 0,
            value: 0.0,
            depth: 0,
            bound: Bound::None,
            is_maximizing: false,
        }
    }
}

impl TTData {
    /// Checks if the entry contains valid data.
    pub fn is_occupied(&self) -> bool {
        self.bound != Bound::None
    }

    /// `true` if the entry may stand in for a search of a node of color
    /// `is_maximizing` at ply `depth`.
    #[inline]
    pub fn is_usable(&self, depth: Depth, is_maximizing: bool) -> bool {
        self.is_occupied() && self.is_maximizing == is_maximizing && self.depth <= depth
    }
}

/// Hash-keyed cache of node values owned by a single search tree.
pub struct TranspositionTable {
    /// `cluster_count` clusters of `CLUSTER_SIZE` consecutive entries.
    entries: Vec<TTEntry>,
    cluster_count: u64,
}

impl TranspositionTable {
    /// A table filling about `mb_size` megabytes. Zero gives the smallest
    /// table, 16 clusters.
    pub fn new(mb_size: usize) -> Self {
        let cluster_count = if mb_size == 0 {
            16
        } else {
            let cluster_byte_size = mem::size_of::<TTEntry>() * CLUSTER_SIZE;
            (mb_size as u64 * 1024 * 1024) / cluster_byte_size as u64
        };
        let entries_size = cluster_count as usize * CLUSTER_SIZE;

        TranspositionTable {
            entries: vec![TTEntry::default(); entries_size],
            cluster_count,
        }
    }

    /// Empties every slot.
    pub fn clear(&mut self) {
        self.entries.fill(TTEntry::default());
    }

    /// Looks `key` up in its cluster.
    ///
    /// Returns whether it was found, its data (default on a miss) and the slot
    /// a new value for `key` should go to: the matching entry on a hit, the
    /// replacement victim on a miss.
    pub fn lookup(&self, key: u32) -> (bool, TTData, usize) {
        let base = self.get_cluster_idx(key);
        let cluster = &self.entries[base..base + CLUSTER_SIZE];

        if let Some(i) = cluster
            .iter()
            .position(|entry| entry.bound != Bound::None && entry.key == key)
        {
            return (true, cluster[i].data(), base + i);
        }

        // Prefer an empty slot, then the entry computed at the deepest ply,
        // then a non-exact one.
        let replace = cluster
            .iter()
            .enumerate()
            .max_by_key(|(i, entry)| {
                let empty = entry.bound == Bound::None;
                let inexact = entry.bound != Bound::Exact;
                (empty, entry.depth, inexact, usize::MAX - i)
            })
            .map_or(0, |(i, _)| i);

        (false, TTData::default(), base + replace)
    }

    /// Stores an entry at `index` (as returned by [`TranspositionTable::lookup`]).
    pub fn store(
        &mut self,
        index: usize,
        key: u32,
        value: Score,
        bound: Bound,
        depth: Depth,
        is_maximizing: bool,
    ) {
        self.entries[index].save(key, value, bound, depth, is_maximizing);
    }

    /// Looks up `key` and stores the entry in the slot the lookup selects.
    pub fn save(
        &mut self,
        key: u32,
        value: Score,
        bound: Bound,
        depth: Depth,
        is_maximizing: bool,
    ) {
        let (_, _, index) = self.lookup(key);
        self.store(index, key, value, bound, depth, is_maximizing);
    }

    /// Number of occupied entries.
    pub fn occupancy(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.bound != Bound::None)
            .count()
    }

    /// Calculates the index of the first entry of the cluster for `key`.
    #[inline]
    fn get_cluster_idx(&self, key: u32) -> usize {
        Self::mul_hi32(key, self.cluster_count) as usize * CLUSTER_SIZE
    }

    /// Maps a 32-bit key uniformly onto `0..count`.
    #[inline]
    fn mul_hi32(key: u32, count: u64) -> u64 {
        (key as u64 * count) >> 32
    }
}
