//! Within-row occurrence-rank assignment.
//!
//! The tracker hands out 0-based ranks per distinct k-mer in arrival
//! order and saturates at `2^r` recorded occurrences: a k-mer already at
//! the cap yields `None` and the caller drops the window without
//! advancing any counter.  Backed by a binary-searched sorted vector, so
//! repeated extraction of the same sequence is deterministic.

/// Rank dispenser for one extraction pass.
#[derive(Debug)]
pub struct RankTracker {
    /// `2^r`; with `r = 0` only the first occurrence is kept.
    cap: u32,
    /// `(k-mer, occurrences recorded)` sorted by k-mer.
    entries: Vec<(u64, u32)>,
}

impl RankTracker {
    pub fn new(r: u32) -> Self {
        debug_assert!(r <= 16);
        RankTracker {
            cap: 1u32 << r,
            entries: Vec::new(),
        }
    }

    /// Next rank for `kmer`, or `None` once the k-mer is saturated.
    #[inline]
    pub fn next_rank(&mut self, kmer: u64) -> Option<u32> {
        match self.entries.binary_search_by_key(&kmer, |e| e.0) {
            Ok(i) => {
                let seen = self.entries[i].1;
                if seen >= self.cap {
                    None
                } else {
                    self.entries[i].1 = seen + 1;
                    Some(seen)
                }
            }
            Err(i) => {
                self.entries.insert(i, (kmer, 1));
                Some(0)
            }
        }
    }

    /// Distinct k-mers seen so far.
    #[inline]
    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
