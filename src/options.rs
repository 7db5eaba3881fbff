//! Hashing options and the field-tag mini-language.
//!
//! [`Options`] is the global configuration of a [`Hasher`](crate::Hasher).
//! At compile time it is projected onto [`Flags`]; a field tag can add flags
//! for its subtree or exclude the field, but never clear a flag inherited from
//! the enclosing scope.
//!
//! # Tag tokens
//!
//! | token        | effect                                   |
//! |--------------|------------------------------------------|
//! | `-`          | exclude the field (must be the whole tag) |
//! | `binary`     | prefer `MarshalBinary`                   |
//! | `text`       | prefer `MarshalText`                     |
//! | `json`       | prefer JSON serialization                |
//! | `string`     | prefer `Display`                         |
//! | `set`        | treat every composite kind as unordered  |
//! | `zeronil`    | hash nil pointers as the pointee's zero  |
//! | `ignorezero` | skip zero-valued fields and elements     |
//! | `marker`     | prefix values with their type name       |

use std::ops::{BitOr, BitOrAssign};

/// Tag key read when [`Options::tag`] is empty.
pub const DEFAULT_TAG: &str = "datahash";

// =============================================================================
// Options
// =============================================================================

/// Configuration for hashing behavior.
///
/// ```
/// use tola_datahash::Options;
///
/// let opts = Options::default().with_unordered_slice(true).with_skip_zero(true);
/// assert_eq!(opts.tag, "datahash");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct Options {
    /// Field-tag key to read options from.
    pub tag: String,
    /// Fold struct fields instead of encoding them in declaration order.
    pub unordered_struct: bool,
    /// Fold fixed-size arrays.
    pub unordered_array: bool,
    /// Fold slices (`Vec`, `VecDeque`, boxed slices).
    pub unordered_slice: bool,
    /// Fold value sequences (`LinkedList`, `BTreeSet`).
    pub unordered_seq: bool,
    /// Fold pair sequences ([`Pairs`](crate::Pairs)).
    pub unordered_pairs: bool,
    /// Prefer `MarshalBinary` when declared.
    pub binary: bool,
    /// Prefer `MarshalText` when declared.
    pub text: bool,
    /// Prefer JSON serialization when declared.
    pub json: bool,
    /// Prefer `Display` when declared.
    pub string: bool,
    /// Hash nil pointers like the zero value of the pointee type.
    pub zero_nil: bool,
    /// Skip zero-valued fields, elements and map entries.
    pub skip_zero: bool,
    /// Prefix every value with its type name.
    pub type_marker: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG.to_string(),
            unordered_struct: false,
            unordered_array: false,
            unordered_slice: false,
            unordered_seq: false,
            unordered_pairs: false,
            binary: false,
            text: false,
            json: false,
            string: false,
            zero_nil: false,
            skip_zero: false,
            type_marker: false,
        }
    }
}

impl Options {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field-tag key.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Treat every composite kind as unordered.
    pub fn unordered(mut self) -> Self {
        self.unordered_struct = true;
        self.unordered_array = true;
        self.unordered_slice = true;
        self.unordered_seq = true;
        self.unordered_pairs = true;
        self
    }

    /// Set `unordered_struct`.
    pub fn with_unordered_struct(mut self, on: bool) -> Self {
        self.unordered_struct = on;
        self
    }

    /// Set `unordered_array`.
    pub fn with_unordered_array(mut self, on: bool) -> Self {
        self.unordered_array = on;
        self
    }

    /// Set `unordered_slice`.
    pub fn with_unordered_slice(mut self, on: bool) -> Self {
        self.unordered_slice = on;
        self
    }

    /// Set `unordered_seq`.
    pub fn with_unordered_seq(mut self, on: bool) -> Self {
        self.unordered_seq = on;
        self
    }

    /// Set `unordered_pairs`.
    pub fn with_unordered_pairs(mut self, on: bool) -> Self {
        self.unordered_pairs = on;
        self
    }

    /// Set `binary`.
    pub fn with_binary(mut self, on: bool) -> Self {
        self.binary = on;
        self
    }

    /// Set `text`.
    pub fn with_text(mut self, on: bool) -> Self {
        self.text = on;
        self
    }

    /// Set `json`.
    pub fn with_json(mut self, on: bool) -> Self {
        self.json = on;
        self
    }

    /// Set `string`.
    pub fn with_string(mut self, on: bool) -> Self {
        self.string = on;
        self
    }

    /// Set `type_marker`.
    pub fn with_type_marker(mut self, on: bool) -> Self {
        self.type_marker = on;
        self
    }

    /// Set `zero_nil`.
    pub fn with_zero_nil(mut self, on: bool) -> Self {
        self.zero_nil = on;
        self
    }

    /// Set `skip_zero`.
    pub fn with_skip_zero(mut self, on: bool) -> Self {
        self.skip_zero = on;
        self
    }

    /// Tag key, falling back to [`DEFAULT_TAG`] when empty.
    pub fn tag_key(&self) -> &str {
        if self.tag.is_empty() { DEFAULT_TAG } else { &self.tag }
    }

    pub(crate) fn flags(&self) -> Flags {
        let pairs = [
            (self.unordered_struct, Flags::UNORDERED_STRUCT),
            (self.unordered_array, Flags::UNORDERED_ARRAY),
            (self.unordered_slice, Flags::UNORDERED_SLICE),
            (self.unordered_seq, Flags::UNORDERED_SEQ),
            (self.unordered_pairs, Flags::UNORDERED_PAIRS),
            (self.binary, Flags::BINARY),
            (self.text, Flags::TEXT),
            (self.json, Flags::JSON),
            (self.string, Flags::STRING),
            (self.zero_nil, Flags::ZERO_NIL),
            (self.skip_zero, Flags::SKIP_ZERO),
            (self.type_marker, Flags::TYPE_MARKER),
        ];
        pairs
            .into_iter()
            .filter(|(on, _)| *on)
            .fold(Flags::NONE, |acc, (_, flag)| acc | flag)
    }
}

// =============================================================================
// Flags
// =============================================================================

/// Compile-time projection of [`Options`], part of every cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Flags(u16);

impl Flags {
    pub const NONE: Self = Self(0);
    pub const UNORDERED_STRUCT: Self = Self(1 << 0);
    pub const UNORDERED_ARRAY: Self = Self(1 << 1);
    pub const UNORDERED_SLICE: Self = Self(1 << 2);
    pub const UNORDERED_SEQ: Self = Self(1 << 3);
    pub const UNORDERED_PAIRS: Self = Self(1 << 4);
    pub const BINARY: Self = Self(1 << 5);
    pub const TEXT: Self = Self(1 << 6);
    pub const JSON: Self = Self(1 << 7);
    pub const STRING: Self = Self(1 << 8);
    pub const ZERO_NIL: Self = Self(1 << 9);
    pub const SKIP_ZERO: Self = Self(1 << 10);
    pub const TYPE_MARKER: Self = Self(1 << 11);

    pub const UNORDERED: Self = Self(
        Self::UNORDERED_STRUCT.0
            | Self::UNORDERED_ARRAY.0
            | Self::UNORDERED_SLICE.0
            | Self::UNORDERED_SEQ.0
            | Self::UNORDERED_PAIRS.0,
    );

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// =============================================================================
// Field tags
// =============================================================================

/// A parsed field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldTag {
    /// `-`: the field does not participate in the digest.
    Exclude,
    /// Flags added on top of the enclosing scope.
    Add(Flags),
}

impl FieldTag {
    /// Parse a raw tag value. Returns the first unknown token on failure.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.trim() == "-" {
            return Ok(Self::Exclude);
        }

        let mut flags = Flags::NONE;
        for token in raw.split(',').map(str::trim) {
            flags |= match token {
                "binary" => Flags::BINARY,
                "text" => Flags::TEXT,
                "json" => Flags::JSON,
                "string" => Flags::STRING,
                "set" => Flags::UNORDERED,
                "zeronil" => Flags::ZERO_NIL,
                "ignorezero" => Flags::SKIP_ZERO,
                "marker" => Flags::TYPE_MARKER,
                other => return Err(other.to_string()),
            };
        }
        Ok(Self::Add(flags))
    }
}
