//! Encoder cache.
//!
//! Append-only map from `(type, flags)` to compiled encoder, owned by one
//! [`Hasher`](crate::Hasher).

use std::any::TypeId;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::encoder::EncoderRef;
use crate::options::Flags;

/// Cache key: the same type compiles differently under different flags.
pub(crate) type CacheKey = (TypeId, Flags);

/// Raw map behind the lock.
pub(crate) type EncoderMap = FxHashMap<CacheKey, EncoderRef>;

/// Thread-safe encoder cache.
///
/// Read-mostly: every hash of an already seen type takes only the read lock.
#[derive(Default)]
pub(crate) struct TypeCache {
    inner: RwLock<EncoderMap>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a closure with read access to the cache.
    pub fn with_read<R>(&self, f: impl FnOnce(&EncoderMap) -> R) -> R {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Execute a closure with write access to the cache.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut EncoderMap) -> R) -> R {
        let mut guard = self.inner.write();
        f(&mut guard)
    }

    pub fn get(&self, key: &CacheKey) -> Option<EncoderRef> {
        self.with_read(|c| c.get(key).cloned())
    }

    pub fn len(&self) -> usize {
        self.with_read(|c| c.len())
    }
}
