//! Type descriptors and dynamic value views.
//!
//! Hashing needs two things from a type:
//!
//! - a static descriptor ([`Typed::type_info`]) that the compiler turns into an
//!   encoder once per type, and
//! - a dynamic view ([`Reflect::reflect_ref`]) that the encoder walks for each
//!   value.
//!
//! Both are implemented here for the standard library types and generated by
//! `#[derive(Reflect)]` for user types.
//!
//! ```ignore
//! use tola_datahash::Reflect;
//!
//! #[derive(Reflect)]
//! struct User {
//!     name: String,
//!     #[tag(datahash = "-")]
//!     session: String,
//!     #[tag(datahash = "set")]
//!     roles: Vec<String>,
//! }
//! ```

use std::any::TypeId;
use std::fmt;
use std::ops::BitOr;

use crate::accumulator::Accumulator;
use crate::error::{DelegateError, DelegateResult, HashResult};

mod impls;

pub use impls::{Complex, Pairs};

// =============================================================================
// Capabilities
// =============================================================================

/// Hashing capabilities a type declares.
///
/// `HASH_WRITER` always wins; the others are used only when the matching
/// option or field tag is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No capability.
    pub const NONE: Self = Self(0);
    /// [`HashWriter`]
    pub const HASH_WRITER: Self = Self(1 << 0);
    /// [`MarshalBinary`]
    pub const BINARY: Self = Self(1 << 1);
    /// [`MarshalText`]
    pub const TEXT: Self = Self(1 << 2);
    /// `serde::Serialize` through `serde_json`
    pub const JSON: Self = Self(1 << 3);
    /// `Display`
    pub const DISPLAY: Self = Self(1 << 4);

    /// Check whether all capabilities in `other` are declared.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// =============================================================================
// Type descriptors
// =============================================================================

/// Lazily evaluated reference to a child type's descriptor.
///
/// Keeps descriptors of self-referential types finite.
pub type TypeInfoFn = fn() -> TypeInfo;

/// Static description of a type.
#[derive(Clone)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    kind: TypeKind,
    capabilities: Capabilities,
}

impl TypeInfo {
    /// Describe `T` with the given structural kind and no capabilities.
    pub fn of<T: ?Sized + 'static>(kind: TypeKind) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind,
            capabilities: Capabilities::NONE,
        }
    }

    /// Declare capabilities.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Type identity.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Type name, as reported by `std::any::type_name`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Structural kind.
    #[inline]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Declared capabilities.
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("kind", &self.kind.label())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Structural kind of a type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// `bool`
    Bool,
    /// Signed integers and `char`, hashed as 8-byte words.
    Int,
    /// Unsigned integers, hashed as 8-byte words.
    Uint,
    /// Floats, hashed as the bit pattern of the `f64`.
    Float,
    /// Complex numbers, two floats.
    Complex,
    /// UTF-8 text.
    Str,
    /// Raw bytes (`Vec<u8>`).
    Bytes,
    /// Nullable or shared indirection: `Option`, `Box`, `Rc`, `Arc`, `RefCell`.
    Pointer {
        /// Pointee type
        pointee: TypeInfoFn,
    },
    /// `dyn Reflect`: the concrete type is only known per value.
    Dynamic,
    /// Fixed-size array.
    Array {
        /// Element type
        elem: TypeInfoFn,
        /// Array length
        len: usize,
    },
    /// Growable sequence with positional meaning.
    Slice {
        /// Element type
        elem: TypeInfoFn,
    },
    /// Struct, tuple struct, tuple or unit.
    Struct {
        /// Fields in declaration order
        fields: Vec<FieldInfo>,
    },
    /// Enum with data-carrying variants.
    Enum {
        /// Variants in declaration order
        variants: Vec<VariantInfo>,
    },
    /// Key/value map with unspecified iteration order. Always folded.
    Map {
        /// Key type
        key: TypeInfoFn,
        /// Value type
        value: TypeInfoFn,
    },
    /// Set with unspecified iteration order. Always folded.
    Set {
        /// Element type
        elem: TypeInfoFn,
    },
    /// Sequence of values produced by iteration.
    Seq {
        /// Element type
        elem: TypeInfoFn,
    },
    /// Sequence of key/value pairs produced by iteration.
    Pairs {
        /// Key type
        key: TypeInfoFn,
        /// Value type
        value: TypeInfoFn,
    },
    /// No structure is exposed; hashable only through a capability.
    Opaque,
}

impl TypeKind {
    /// Short lowercase name of the kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Complex => "complex",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::Pointer { .. } => "pointer",
            Self::Dynamic => "dynamic",
            Self::Array { .. } => "array",
            Self::Slice { .. } => "slice",
            Self::Struct { .. } => "struct",
            Self::Enum { .. } => "enum",
            Self::Map { .. } => "map",
            Self::Set { .. } => "set",
            Self::Seq { .. } => "seq",
            Self::Pairs { .. } => "pairs",
            Self::Opaque => "opaque",
        }
    }
}

/// A struct or variant field.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    name: &'static str,
    index: usize,
    ty: TypeInfoFn,
    tags: &'static [(&'static str, &'static str)],
}

impl FieldInfo {
    /// Describe a field without tags.
    pub const fn new(name: &'static str, index: usize, ty: TypeInfoFn) -> Self {
        Self {
            name,
            index,
            ty,
            tags: &[],
        }
    }

    /// Attach `(key, value)` tags.
    pub const fn with_tags(mut self, tags: &'static [(&'static str, &'static str)]) -> Self {
        self.tags = tags;
        self
    }

    /// Declared name. Part of the encoded bytes.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Index passed to [`FieldAccess::field`] / [`VariantAccess::variant_field`].
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Field type descriptor.
    #[inline]
    pub fn type_info(&self) -> TypeInfo {
        (self.ty)()
    }

    /// Raw tag value under `key`.
    pub fn tag(&self, key: &str) -> Option<&'static str> {
        self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

/// An enum variant.
#[derive(Debug, Clone)]
pub struct VariantInfo {
    name: &'static str,
    fields: Vec<FieldInfo>,
}

impl VariantInfo {
    /// Describe a variant.
    pub fn new(name: &'static str, fields: Vec<FieldInfo>) -> Self {
        Self { name, fields }
    }

    /// Variant name. Part of the encoded bytes.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Variant fields.
    #[inline]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }
}

// =============================================================================
// Typed / Reflect
// =============================================================================

/// Static type descriptor.
pub trait Typed: 'static {
    /// Describe the type.
    fn type_info() -> TypeInfo;
}

/// Dynamic view of a value.
///
/// Object safe: the encoder works on `&dyn Reflect`.
pub trait Reflect: 'static {
    /// Descriptor of the value's concrete type.
    fn value_type(&self) -> TypeInfo;

    /// Id of the value's concrete type, without building its descriptor.
    ///
    /// Must equal `value_type().id()`.
    fn value_type_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    /// Structural view of the value, matching `value_type().kind()`.
    fn reflect_ref(&self) -> ReflectRef<'_>;

    /// Whether the value is its type's zero value.
    ///
    /// Zero structs and arrays encode as nothing, delegates are not invoked for
    /// zero values, and `skip_zero` drops zero fields and elements.
    fn is_zero(&self) -> bool;

    /// Custom encoder, if declared.
    fn hash_writer(&self) -> Option<&dyn HashWriter> {
        None
    }

    /// Binary delegate, if declared.
    fn binary_delegate(&self) -> Option<DelegateResult> {
        None
    }

    /// Text delegate, if declared.
    fn text_delegate(&self) -> Option<DelegateResult> {
        None
    }

    /// JSON delegate, if declared.
    fn json_delegate(&self) -> Option<DelegateResult> {
        None
    }

    /// String delegate, if declared.
    fn display_delegate(&self) -> Option<String> {
        None
    }
}

/// Structural view of a value.
pub enum ReflectRef<'a> {
    /// `bool`
    Bool(bool),
    /// Signed integer widened to 64 bits.
    Int(i64),
    /// Unsigned integer widened to 64 bits.
    Uint(u64),
    /// Float widened to `f64`.
    Float(f64),
    /// Real and imaginary parts.
    Complex(f64, f64),
    /// Text.
    Str(&'a str),
    /// Raw bytes.
    Bytes(&'a [u8]),
    /// Indirection.
    Pointer(&'a dyn PointerAccess),
    /// Arrays, slices, sets and value sequences.
    Elements(&'a dyn ElementAccess),
    /// Maps and pair sequences.
    Entries(&'a dyn EntryAccess),
    /// Structs and tuples.
    Fields(&'a dyn FieldAccess),
    /// Enums.
    Variant(&'a dyn VariantAccess),
    /// No structure.
    Opaque,
}

impl ReflectRef<'_> {
    /// Short lowercase name of the view.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Complex(..) => "complex",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Pointer(_) => "pointer",
            Self::Elements(_) => "elements",
            Self::Entries(_) => "entries",
            Self::Fields(_) => "fields",
            Self::Variant(_) => "variant",
            Self::Opaque => "opaque",
        }
    }
}

/// Callback receiving one element.
pub type ElementVisitor<'v> = dyn FnMut(&dyn Reflect) -> HashResult<()> + 'v;

/// Callback receiving one key/value pair.
pub type EntryVisitor<'v> = dyn FnMut(&dyn Reflect, &dyn Reflect) -> HashResult<()> + 'v;

/// Access to the target of an indirection.
pub trait PointerAccess {
    /// Stable identity of the target for cycle detection.
    ///
    /// Only shared pointers (`Rc`, `Arc`) report one; uniquely owned targets
    /// cannot form cycles.
    fn identity(&self) -> Option<usize> {
        None
    }

    /// Call `f` with the target, or `None` when nil.
    fn with_pointee(&self, f: &mut dyn FnMut(Option<&dyn Reflect>) -> HashResult<()>) -> HashResult<()>;
}

/// Iteration over the elements of a collection.
pub trait ElementAccess {
    /// Visit every element in iteration order, stopping at the first error.
    fn for_each_element(&self, f: &mut ElementVisitor<'_>) -> HashResult<()>;
}

/// Iteration over the entries of a map-like collection.
pub trait EntryAccess {
    /// Visit every entry in iteration order, stopping at the first error.
    fn for_each_entry(&self, f: &mut EntryVisitor<'_>) -> HashResult<()>;
}

/// Indexed access to struct fields.
pub trait FieldAccess {
    /// Field at `index` (see [`FieldInfo::index`]).
    fn field(&self, index: usize) -> Option<&dyn Reflect>;
}

/// Access to the active variant of an enum.
pub trait VariantAccess {
    /// Index of the active variant in [`TypeKind::Enum`] order.
    fn variant_index(&self) -> usize;

    /// Field of the active variant at `index`.
    fn variant_field(&self, index: usize) -> Option<&dyn Reflect>;
}

// =============================================================================
// Capability traits
// =============================================================================

/// Custom encoder: the value writes its own canonical bytes.
///
/// Declared with `#[reflect(hash_writer)]`; overrides every option.
pub trait HashWriter {
    /// Write the value's representation into the accumulator.
    fn write_hash(&self, acc: &mut dyn Accumulator) -> Result<(), DelegateError>;
}

/// Binary marshaling. Declared with `#[reflect(binary)]`.
pub trait MarshalBinary {
    /// Binary representation of the value.
    fn marshal_binary(&self) -> DelegateResult;
}

/// Text marshaling. Declared with `#[reflect(text)]`.
pub trait MarshalText {
    /// Textual representation of the value.
    fn marshal_text(&self) -> DelegateResult;
}
