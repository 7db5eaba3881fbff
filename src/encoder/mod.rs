//! Compiled encoders.
//!
//! An [`Encoder`] is an immutable node tree built once per `(type, flags)` by
//! the [`Compiler`](crate::compiler::Compiler) and interpreted for every value
//! of that type. Composite nodes delegate to [`ordered`] or [`folded`].
//!
//! # Byte layout
//!
//! | bytes                        | meaning                          |
//! |------------------------------|----------------------------------|
//! | `01 name`                    | type marker (`marker` option)    |
//! | `06 a 03 b 03 c 07`          | ordered elements                 |
//! | `06 name 02 v 03 name 02 v 07` | ordered struct fields          |
//! | `06 k 02 v 03 k 02 v 07`     | ordered pairs                    |
//! | `04 xor_le64 05`             | fold of sub-digests              |
//! | `04 05`                      | empty fold                       |
//!
//! Integers are 8-byte little-endian words, floats the 8-byte bit pattern of
//! the `f64`, booleans one byte, strings and byte strings raw.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::accumulator::Accumulator;
use crate::compiler::Compiler;
use crate::error::{HashError, HashResult};
use crate::options::Flags;
use crate::pool::StatePool;
use crate::reflect::{
    ElementAccess, EntryAccess, FieldAccess, Reflect, ReflectRef, TypeInfoFn, VariantAccess,
};
use crate::state::HashState;

mod delegate;
pub(crate) mod folded;
pub(crate) mod ordered;

pub(crate) use delegate::Delegate;

pub(crate) const MARKER: u8 = 0x01;
pub(crate) const COLON: u8 = 0x02;
pub(crate) const SEPARATOR: u8 = 0x03;
pub(crate) const FOLD_OPEN: u8 = 0x04;
pub(crate) const FOLD_CLOSE: u8 = 0x05;
pub(crate) const OPEN: u8 = 0x06;
pub(crate) const CLOSE: u8 = 0x07;

/// Shared handle to a compiled encoder.
pub(crate) type EncoderRef = Arc<Encoder>;

/// Everything an encoder needs besides the value and the state.
pub(crate) struct Context<'c, A> {
    pub compiler: &'c Compiler,
    pub pool: &'c StatePool<A>,
}

// =============================================================================
// Node tree
// =============================================================================

pub(crate) struct Encoder {
    marker: Option<&'static str>,
    node: Node,
}

pub(crate) enum Node {
    Scalar(Scalar),
    Pointer { pointee: EncoderRef, zero_nil: bool },
    /// `dyn Reflect`: compiled per concrete type at run time.
    Dynamic { flags: Flags },
    Ordered(Composite),
    Folded(Composite),
    Delegate(Delegate),
    /// Re-entry into a type still being compiled.
    Deferred(Slot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scalar {
    Bool,
    Int,
    Uint,
    Float,
    Complex,
    Str,
    Bytes,
}

pub(crate) enum Composite {
    Elements { elem: EncoderRef, skip_zero: bool },
    Fields { fields: Vec<FieldPlan> },
    Variants { variants: Vec<VariantPlan> },
    Entries { key: EncoderRef, value: EncoderRef, skip_zero: bool },
    /// Element encoder compiled on the first element.
    LazyElements { elem: TypeInfoFn, flags: Flags },
    /// Key/value encoders compiled on the first pair.
    LazyEntries { key: TypeInfoFn, value: TypeInfoFn, flags: Flags },
}

/// A struct field surviving tag resolution.
pub(crate) struct FieldPlan {
    pub name: &'static str,
    pub index: usize,
    pub skip_zero: bool,
    pub encoder: EncoderRef,
}

pub(crate) struct VariantPlan {
    pub name: &'static str,
    pub fields: Vec<FieldPlan>,
}

/// Late-bound target of a [`Node::Deferred`].
///
/// Holds a weak reference: the target lives in the type cache, and a strong
/// one would leak every self-referential encoder.
#[derive(Clone, Default)]
pub(crate) struct Slot(Arc<OnceLock<Weak<Encoder>>>);

impl Slot {
    pub fn fill(&self, target: &EncoderRef) {
        let _ = self.0.set(Arc::downgrade(target));
    }

    fn target(&self) -> Option<EncoderRef> {
        self.0.get().and_then(Weak::upgrade)
    }
}

// =============================================================================
// Interpretation
// =============================================================================

impl Encoder {
    pub fn new(marker: Option<&'static str>, node: Node) -> Self {
        Self { marker, node }
    }

    pub fn deferred(slot: Slot) -> Self {
        Self::new(None, Node::Deferred(slot))
    }

    #[cfg(test)]
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Write the canonical bytes of `value`.
    pub fn encode<A: Accumulator>(
        &self,
        value: &dyn Reflect,
        state: &mut HashState<A>,
        cx: &Context<'_, A>,
    ) -> HashResult<()> {
        self.write_marker(state)?;
        match &self.node {
            Node::Scalar(scalar) => scalar.encode(value, state),
            Node::Pointer { pointee, zero_nil } => {
                let ReflectRef::Pointer(access) = value.reflect_ref() else {
                    return Err(mismatch(value, "pointer"));
                };
                if let Some(identity) = access.identity() {
                    if !state.enter(identity) {
                        return Ok(());
                    }
                }
                access.with_pointee(&mut |target| match target {
                    Some(target) => pointee.encode(target, state, cx),
                    None if *zero_nil => pointee.encode_zero(state),
                    None => Ok(()),
                })
            }
            Node::Dynamic { flags } => cx
                .compiler
                .compile_value(value, *flags)?
                .encode(value, state, cx),
            Node::Ordered(composite) => {
                if self.is_zero(value) {
                    return Ok(());
                }
                ordered::encode(composite, value, state, cx)
            }
            Node::Folded(composite) => {
                if self.is_zero(value) {
                    return Ok(());
                }
                folded::encode(composite, value, state, cx)
            }
            Node::Delegate(delegate) => {
                if value.is_zero() {
                    return Ok(());
                }
                delegate.encode(value, state)
            }
            Node::Deferred(slot) => match slot.target() {
                Some(target) => target.encode(value, state, cx),
                None => Ok(()),
            },
        }
    }

    /// Write what a nil pointer to this type hashes as under `zero_nil`.
    pub fn encode_zero<A: Accumulator>(&self, state: &mut HashState<A>) -> HashResult<()> {
        self.write_marker(state)?;
        match &self.node {
            Node::Scalar(scalar) => scalar.encode_zero(state),
            Node::Pointer { pointee, zero_nil: true } => pointee.encode_zero(state),
            Node::Deferred(slot) => match slot.target() {
                Some(target) => target.encode_zero(state),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Whether `value` is zero as far as this encoder can tell.
    ///
    /// Struct fields and array elements are judged by their own encoders, so
    /// excluded fields never count and a nil pointer under `zero_nil` is
    /// never zero (it hashes like the pointee's zero value).
    pub fn is_zero(&self, value: &dyn Reflect) -> bool {
        match &self.node {
            Node::Pointer { zero_nil: true, .. } => false,
            Node::Ordered(composite) | Node::Folded(composite) => match composite {
                Composite::Fields { fields } => FieldSource::of_struct(value)
                    .is_ok_and(|source| fields_zero(fields, source, value)),
                Composite::Elements { elem, .. } => {
                    value.is_zero() && elements_zero(elem, value)
                }
                _ => value.is_zero(),
            },
            Node::Deferred(slot) => match slot.target() {
                Some(target) => target.is_zero(value),
                None => value.is_zero(),
            },
            _ => value.is_zero(),
        }
    }

    fn write_marker<A: Accumulator>(&self, state: &mut HashState<A>) -> HashResult<()> {
        if let Some(name) = self.marker {
            state.write_byte(MARKER)?;
            state.write(name.as_bytes())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("marker", &self.marker)
            .field("node", &self.node.label())
            .finish()
    }
}

impl Node {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scalar(scalar) => scalar.label(),
            Self::Pointer { .. } => "pointer",
            Self::Dynamic { .. } => "dynamic",
            Self::Ordered(_) => "ordered",
            Self::Folded(_) => "folded",
            Self::Delegate(_) => "delegate",
            Self::Deferred(_) => "deferred",
        }
    }
}

impl Scalar {
    fn label(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Complex => "complex",
            Self::Str => "str",
            Self::Bytes => "bytes",
        }
    }

    fn encode<A: Accumulator>(self, value: &dyn Reflect, state: &mut HashState<A>) -> HashResult<()> {
        match (self, value.reflect_ref()) {
            (Self::Bool, ReflectRef::Bool(b)) => state.write_byte(u8::from(b)),
            (Self::Int, ReflectRef::Int(i)) => state.write_u64(i as u64),
            (Self::Uint, ReflectRef::Uint(u)) => state.write_u64(u),
            (Self::Float, ReflectRef::Float(f)) => state.write_u64(f.to_bits()),
            (Self::Complex, ReflectRef::Complex(re, im)) => {
                state.write_u64(re.to_bits())?;
                state.write_u64(im.to_bits())
            }
            (Self::Str, ReflectRef::Str(s)) => state.write(s.as_bytes()),
            (Self::Bytes, ReflectRef::Bytes(b)) => state.write(b),
            _ => Err(mismatch(value, self.label())),
        }
    }

    fn encode_zero<A: Accumulator>(self, state: &mut HashState<A>) -> HashResult<()> {
        match self {
            Self::Bool => state.write_byte(0),
            Self::Int | Self::Uint | Self::Float => state.write_u64(0),
            Self::Complex => {
                state.write_u64(0)?;
                state.write_u64(0)
            }
            Self::Str | Self::Bytes => Ok(()),
        }
    }
}

// =============================================================================
// View helpers
// =============================================================================

pub(crate) fn mismatch(value: &dyn Reflect, expected: &'static str) -> HashError {
    HashError::mismatch(value.value_type().name(), expected)
}

pub(crate) fn elements<'v>(value: &'v dyn Reflect) -> HashResult<&'v dyn ElementAccess> {
    match value.reflect_ref() {
        ReflectRef::Elements(access) => Ok(access),
        _ => Err(mismatch(value, "elements")),
    }
}

pub(crate) fn entries<'v>(value: &'v dyn Reflect) -> HashResult<&'v dyn EntryAccess> {
    match value.reflect_ref() {
        ReflectRef::Entries(access) => Ok(access),
        _ => Err(mismatch(value, "entries")),
    }
}

pub(crate) fn variant<'v>(value: &'v dyn Reflect) -> HashResult<&'v dyn VariantAccess> {
    match value.reflect_ref() {
        ReflectRef::Variant(access) => Ok(access),
        _ => Err(mismatch(value, "variant")),
    }
}

/// Struct fields or the fields of an enum's active variant.
#[derive(Clone, Copy)]
pub(crate) enum FieldSource<'v> {
    Struct(&'v dyn FieldAccess),
    Variant(&'v dyn VariantAccess),
}

impl<'v> FieldSource<'v> {
    pub fn of_struct(value: &'v dyn Reflect) -> HashResult<Self> {
        match value.reflect_ref() {
            ReflectRef::Fields(access) => Ok(Self::Struct(access)),
            _ => Err(mismatch(value, "struct")),
        }
    }

    pub fn get(self, owner: &dyn Reflect, index: usize) -> HashResult<&'v dyn Reflect> {
        let field = match self {
            Self::Struct(access) => access.field(index),
            Self::Variant(access) => access.variant_field(index),
        };
        field.ok_or_else(|| mismatch(owner, "field"))
    }
}

fn fields_zero(fields: &[FieldPlan], source: FieldSource<'_>, owner: &dyn Reflect) -> bool {
    fields.iter().all(|plan| {
        source
            .get(owner, plan.index)
            .is_ok_and(|field| plan.encoder.is_zero(field))
    })
}

fn elements_zero(elem: &Encoder, value: &dyn Reflect) -> bool {
    let Ok(access) = elements(value) else {
        return false;
    };
    let mut zero = true;
    let _ = access.for_each_element(&mut |item| {
        zero = zero && elem.is_zero(item);
        Ok(())
    });
    zero
}

/// Variant plan for the active variant of `value`.
pub(crate) fn active_variant<'p, 'v>(
    variants: &'p [VariantPlan],
    value: &'v dyn Reflect,
) -> HashResult<(&'p VariantPlan, FieldSource<'v>)> {
    let access = variant(value)?;
    let plan = variants
        .get(access.variant_index())
        .ok_or_else(|| mismatch(value, "variant"))?;
    Ok((plan, FieldSource::Variant(access)))
}

/// Lazily compiled encoder shared by one traversal of a sequence.
pub(crate) struct LazyEncoder<'a> {
    info: TypeInfoFn,
    flags: Flags,
    compiled: Option<EncoderRef>,
    compiler: &'a Compiler,
}

impl<'a> LazyEncoder<'a> {
    pub fn new(info: TypeInfoFn, flags: Flags, compiler: &'a Compiler) -> Self {
        Self {
            info,
            flags,
            compiled: None,
            compiler,
        }
    }

    pub fn get(&mut self) -> HashResult<EncoderRef> {
        if let Some(encoder) = &self.compiled {
            return Ok(Arc::clone(encoder));
        }
        let encoder = self.compiler.compile(&(self.info)(), self.flags)?;
        self.compiled = Some(Arc::clone(&encoder));
        Ok(encoder)
    }
}
