//! The hashing entry point.

use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::accumulator::{Accumulator, Fnv64a};
use crate::compiler::Compiler;
use crate::encoder::Context;
use crate::error::HashResult;
use crate::options::{Flags, Options};
use crate::pool::StatePool;
use crate::reflect::{Reflect, Typed};

/// Computes deterministic 64-bit digests of reflected values.
///
/// A `Hasher` owns its encoder cache and state pool; it is `Send + Sync` and
/// meant to be shared. Digests are stable for one configuration within one
/// build of the program.
///
/// ```
/// use tola_datahash::{Fnv64a, Hasher, Options};
///
/// let hasher = Hasher::new(Fnv64a::new, Options::default());
/// let a = hasher.hash(&vec![1, 2, 3]).unwrap();
/// let b = hasher.hash(&vec![1, 2, 3]).unwrap();
/// assert_eq!(a, b);
/// ```
pub struct Hasher<A: Accumulator = Fnv64a> {
    options: Options,
    flags: Flags,
    compiler: Compiler,
    pool: StatePool<A>,
}

impl<A: Accumulator> Hasher<A> {
    /// Create a hasher from an accumulator factory and options.
    pub fn new(factory: impl Fn() -> A + Send + Sync + 'static, options: Options) -> Self {
        Self {
            flags: options.flags(),
            compiler: Compiler::new(options.tag_key()),
            pool: StatePool::new(Box::new(factory)),
            options,
        }
    }

    /// Digest of `value`.
    pub fn hash(&self, value: &dyn Reflect) -> HashResult<u64> {
        let encoder = self.compiler.compile_value(value, self.flags)?;
        let cx = Context {
            compiler: &self.compiler,
            pool: &self.pool,
        };
        self.pool.with_state(|state| {
            encoder.encode(value, state, &cx)?;
            Ok(state.sum64())
        })
    }

    /// Digest of a value that may be absent.
    ///
    /// `None` hashes as an untouched accumulator, the same digest as a nil
    /// pointer.
    pub fn hash_optional(&self, value: Option<&dyn Reflect>) -> HashResult<u64> {
        match value {
            Some(value) => self.hash(value),
            None => Ok(self.pool.empty_digest()),
        }
    }

    /// Compile and cache the encoder for `T` ahead of time.
    ///
    /// Surfaces configuration errors (unknown tag tokens, unsupported types)
    /// without needing a value.
    pub fn prepare<T: Typed>(&self) -> HashResult<()> {
        self.compiler.compile(&T::type_info(), self.flags).map(drop)
    }

    /// Digests of every value, in order. Fails on the first error.
    pub fn hash_all<T: Reflect + Sync>(&self, values: &[T]) -> HashResult<Vec<u64>> {
        #[cfg(feature = "parallel")]
        {
            values.par_iter().map(|v| self.hash(v)).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            values.iter().map(|v| self.hash(v)).collect()
        }
    }

    /// The options this hasher was built with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Number of compiled encoders in the cache.
    pub fn cached_encoders(&self) -> usize {
        self.compiler.cached()
    }
}

impl<A: Accumulator + Default + 'static> Default for Hasher<A> {
    fn default() -> Self {
        Self::new(A::default, Options::default())
    }
}

impl<A: Accumulator> fmt::Debug for Hasher<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("options", &self.options)
            .field("cached_encoders", &self.cached_encoders())
            .finish_non_exhaustive()
    }
}
