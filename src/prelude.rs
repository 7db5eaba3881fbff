//! Prelude module for common imports.
//!
//! ```ignore
//! use tola_datahash::prelude::*;
//! ```

// Hasher and configuration
pub use crate::hasher::Hasher;
pub use crate::options::{DEFAULT_TAG, Options};

// Accumulators
pub use crate::accumulator::{Accumulator, Blake3, Fnv64a};

// Reflection
pub use crate::reflect::{
    Capabilities, HashWriter, MarshalBinary, MarshalText, Pairs, Reflect, ReflectRef, TypeInfo,
    TypeKind, Typed,
};

// Error
pub use crate::error::{DelegateError, DelegateResult, HashError, HashResult};

// Derive
#[cfg(feature = "macros")]
pub use tola_datahash_macros::Reflect;
