//! Streaming 64-bit hash accumulators.
//!
//! The engine only needs `reset`, `write` and `sum64`; any streaming hash can
//! be plugged in at [`Hasher`](crate::Hasher) construction.

use std::hash::Hasher as StdHasher;

use rustc_hash::FxHasher;

use crate::error::AccumulatorError;

// =============================================================================
// Accumulator trait
// =============================================================================

/// A streaming hash function producing a 64-bit digest.
///
/// Implementations must be deterministic: the same sequence of writes after a
/// `reset` always yields the same `sum64`.
pub trait Accumulator: Send {
    /// Return to the freshly constructed state.
    fn reset(&mut self);

    /// Feed bytes into the hash.
    fn write(&mut self, bytes: &[u8]) -> Result<(), AccumulatorError>;

    /// Current digest. Does not consume or reset the state.
    fn sum64(&self) -> u64;
}

// =============================================================================
// FNV-1a
// =============================================================================

/// FNV-1a 64-bit accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv64a(u64);

impl Fnv64a {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Create an accumulator at the FNV offset basis.
    #[inline]
    pub const fn new() -> Self {
        Self(Self::OFFSET_BASIS)
    }
}

impl Default for Fnv64a {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for Fnv64a {
    #[inline]
    fn reset(&mut self) {
        self.0 = Self::OFFSET_BASIS;
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), AccumulatorError> {
        for &b in bytes {
            self.0 ^= u64::from(b);
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
        Ok(())
    }

    #[inline]
    fn sum64(&self) -> u64 {
        self.0
    }
}

// =============================================================================
// BLAKE3
// =============================================================================

/// BLAKE3 accumulator.
///
/// The digest is the first 8 bytes of the BLAKE3 output as little-endian u64.
#[derive(Debug, Clone, Default)]
pub struct Blake3 {
    inner: blake3::Hasher,
}

impl Blake3 {
    /// Create a new BLAKE3 accumulator.
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }
}

impl Accumulator for Blake3 {
    #[inline]
    fn reset(&mut self) {
        self.inner.reset();
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), AccumulatorError> {
        self.inner.update(bytes);
        Ok(())
    }

    #[inline]
    fn sum64(&self) -> u64 {
        let hash = self.inner.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(word)
    }
}

// =============================================================================
// std::hash::Hasher adapter
// =============================================================================

/// Adapter turning any `std::hash::Hasher + Default` into an accumulator.
///
/// `reset` replaces the hasher with `H::default()`, so the wrapped hasher must
/// be deterministically seeded (e.g. `FxHasher`, not `RandomState` hashers).
#[derive(Debug, Clone, Default)]
pub struct StdAccumulator<H> {
    inner: H,
}

impl<H: StdHasher + Default> StdAccumulator<H> {
    /// Create an adapter around `H::default()`.
    pub fn new() -> Self {
        Self { inner: H::default() }
    }
}

impl<H: StdHasher + Default + Send> Accumulator for StdAccumulator<H> {
    #[inline]
    fn reset(&mut self) {
        self.inner = H::default();
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), AccumulatorError> {
        self.inner.write(bytes);
        Ok(())
    }

    #[inline]
    fn sum64(&self) -> u64 {
        self.inner.finish()
    }
}

/// `rustc_hash::FxHasher` as an accumulator.
pub type FxAccumulator = StdAccumulator<FxHasher>;

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(acc: &mut impl Accumulator, data: &[u8]) -> u64 {
        acc.reset();
        acc.write(data).unwrap();
        acc.sum64()
    }

    #[test]
    fn test_fnv_known_vectors() {
        let mut acc = Fnv64a::new();
        assert_eq!(acc.sum64(), 0xcbf29ce484222325);
        assert_eq!(digest(&mut acc, b"hello"), 0xa430d84680aabd0b);
    }

    #[test]
    fn test_fnv_streaming_matches_one_shot() {
        let mut acc = Fnv64a::new();
        acc.write(b"hel").unwrap();
        acc.write(b"lo").unwrap();
        assert_eq!(acc.sum64(), digest(&mut Fnv64a::new(), b"hello"));
    }

    #[test]
    fn test_blake3_prefix() {
        let mut acc = Blake3::new();
        acc.write(b"tola").unwrap();
        let full = blake3::hash(b"tola");
        let expected = u64::from_le_bytes(full.as_bytes()[..8].try_into().unwrap());
        assert_eq!(acc.sum64(), expected);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut fnv = Fnv64a::new();
        fnv.write(b"noise").unwrap();
        fnv.reset();
        assert_eq!(fnv.sum64(), Fnv64a::new().sum64());

        let mut b3 = Blake3::new();
        b3.write(b"noise").unwrap();
        b3.reset();
        assert_eq!(b3.sum64(), Blake3::new().sum64());

        let mut fx = FxAccumulator::new();
        fx.write(b"noise").unwrap();
        fx.reset();
        assert_eq!(fx.sum64(), FxAccumulator::new().sum64());
    }

    #[test]
    fn test_different_inputs_differ() {
        assert_ne!(digest(&mut Fnv64a::new(), b"alice"), digest(&mut Fnv64a::new(), b"bob"));
        assert_ne!(digest(&mut Blake3::new(), b"alice"), digest(&mut Blake3::new(), b"bob"));
        assert_ne!(
            digest(&mut FxAccumulator::new(), b"alice"),
            digest(&mut FxAccumulator::new(), b"bob")
        );
    }
}
