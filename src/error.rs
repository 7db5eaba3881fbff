//! Error types for tola-datahash.
//!
//! Every error aborts the whole `Hasher::hash` call; there is no partial digest.

use std::fmt;

use thiserror::Error;

/// Boxed error returned by marshaling delegates.
pub type DelegateError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a marshaling delegate: the bytes to feed into the accumulator.
pub type DelegateResult = Result<Vec<u8>, DelegateError>;

/// The delegate that produced a [`HashError::Delegate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelegateKind {
    /// `HashWriter`: the value writes its own bytes.
    HashWriter,
    /// `MarshalBinary`
    Binary,
    /// `MarshalText`
    Text,
    /// `serde_json` serialization
    Json,
    /// `Display`
    Display,
}

impl DelegateKind {
    /// Lowercase name, as used in error messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HashWriter => "hash_writer",
            Self::Binary => "binary",
            Self::Text => "text",
            Self::Json => "json",
            Self::Display => "display",
        }
    }
}

impl fmt::Display for DelegateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by an [`Accumulator`](crate::Accumulator) that rejected a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AccumulatorError {
    message: String,
}

impl AccumulatorError {
    /// Create an accumulator error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can occur while compiling or running an encoder.
#[derive(Debug, Error)]
pub enum HashError {
    /// No structural encoding applies and no enabled delegate is declared.
    ///
    /// Deterministic: retrying with the same configuration fails again.
    #[error("unsupported type: {type_name} (missing HashWriter or an enabled marshaling capability)")]
    UnsupportedType {
        /// Name of the offending type
        type_name: &'static str,
    },

    /// A custom or marshaling delegate returned an error.
    #[error("{delegate} delegate failed for {type_name}: {source}")]
    Delegate {
        /// Type whose delegate failed
        type_name: &'static str,
        /// Which delegate failed
        delegate: DelegateKind,
        /// The delegate's own error, untouched
        #[source]
        source: DelegateError,
    },

    /// A field tag contains an unknown token.
    #[error("unknown tag option {token:?} on field `{field}` of {type_name}")]
    InvalidTagOption {
        /// Type declaring the field
        type_name: &'static str,
        /// Field carrying the tag
        field: &'static str,
        /// The rejected token
        token: String,
    },

    /// The underlying streaming hash rejected a write.
    #[error("accumulator write failed: {0}")]
    Accumulator(#[from] AccumulatorError),

    /// A value's runtime view contradicts its type descriptor.
    ///
    /// Only reachable through a hand-written `Reflect` impl.
    #[error("value of {type_name} does not match its {expected} descriptor")]
    ShapeMismatch {
        /// Type of the value
        type_name: &'static str,
        /// What the descriptor promised
        expected: &'static str,
    },

    /// A `RefCell` was mutably borrowed while being hashed.
    #[error("value of {type_name} is mutably borrowed")]
    Borrowed {
        /// Type of the cell
        type_name: &'static str,
    },
}

/// Result type alias for hashing operations.
pub type HashResult<T> = Result<T, HashError>;

impl HashError {
    /// Create a delegate error, unwrapping accumulator failures raised inside
    /// a `HashWriter` so they keep their own variant.
    pub fn delegate(type_name: &'static str, delegate: DelegateKind, source: DelegateError) -> Self {
        match source.downcast::<AccumulatorError>() {
            Ok(err) => Self::Accumulator(*err),
            Err(source) => Self::Delegate {
                type_name,
                delegate,
                source,
            },
        }
    }

    pub(crate) fn mismatch(type_name: &'static str, expected: &'static str) -> Self {
        Self::ShapeMismatch {
            type_name,
            expected,
        }
    }
}
