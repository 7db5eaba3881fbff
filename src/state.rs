//! Per-call traversal state.

use smallvec::SmallVec;

use crate::accumulator::Accumulator;
use crate::error::HashResult;

/// Accumulator plus the bookkeeping one traversal needs.
///
/// Owned by exactly one call at a time; see [`StatePool`](crate::pool::StatePool).
pub(crate) struct HashState<A> {
    accumulator: A,
    visited: SmallVec<[usize; 16]>,
    scratch: [u8; 8],
}

impl<A: Accumulator> HashState<A> {
    pub fn new(accumulator: A) -> Self {
        Self {
            accumulator,
            visited: SmallVec::new(),
            scratch: [0; 8],
        }
    }

    /// Clear everything a previous call left behind.
    pub fn reset(&mut self) {
        self.accumulator.reset();
        self.visited.clear();
    }

    /// Prepare as a fold temporary: fresh accumulator, parent's visited set.
    pub fn reset_from(&mut self, parent: &Self) {
        self.accumulator.reset();
        self.visited.clear();
        self.visited.extend_from_slice(&parent.visited);
    }

    /// Record a shared-pointer identity. Returns `false` if already seen.
    pub fn enter(&mut self, identity: usize) -> bool {
        if self.visited.contains(&identity) {
            return false;
        }
        self.visited.push(identity);
        true
    }

    #[inline]
    pub fn write(&mut self, bytes: &[u8]) -> HashResult<()> {
        self.accumulator.write(bytes)?;
        Ok(())
    }

    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> HashResult<()> {
        self.write(&[byte])
    }

    /// Write a 64-bit word, little-endian.
    #[inline]
    pub fn write_u64(&mut self, word: u64) -> HashResult<()> {
        self.scratch = word.to_le_bytes();
        let scratch = self.scratch;
        self.write(&scratch)
    }

    #[inline]
    pub fn sum64(&self) -> u64 {
        self.accumulator.sum64()
    }

    pub fn accumulator_mut(&mut self) -> &mut A {
        &mut self.accumulator
    }
}
