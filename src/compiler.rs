//! Type-to-encoder compiler.
//!
//! Turns a [`TypeInfo`] and the active [`Flags`] into an [`Encoder`]. The
//! decision order for every type is:
//!
//! 1. a declared `HashWriter` always wins;
//! 2. an enabled delegate (`binary`, `text`, `json`, `string`, in that order)
//!    whose capability the type declares;
//! 3. the structural encoding of its [`TypeKind`];
//! 4. otherwise [`HashError::UnsupportedType`].
//!
//! Each top-level compile runs in a [`Session`]. A type reached again while it
//! is still being compiled gets a deferred placeholder, which is bound to the
//! finished encoder when the session publishes. Nothing reaches the cache
//! unless the whole session succeeds.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::cache::{CacheKey, TypeCache};
use crate::encoder::{
    Composite, Delegate, Encoder, EncoderRef, FieldPlan, Node, Scalar, Slot, VariantPlan,
};
use crate::error::{DelegateKind, HashError, HashResult};
use crate::options::{FieldTag, Flags};
use crate::reflect::{Capabilities, FieldInfo, Reflect, TypeInfo, TypeKind};

/// Delegates tried after `HashWriter`, in precedence order.
const DELEGATES: [(Flags, Capabilities, DelegateKind); 4] = [
    (Flags::BINARY, Capabilities::BINARY, DelegateKind::Binary),
    (Flags::TEXT, Capabilities::TEXT, DelegateKind::Text),
    (Flags::JSON, Capabilities::JSON, DelegateKind::Json),
    (Flags::STRING, Capabilities::DISPLAY, DelegateKind::Display),
];

pub(crate) struct Compiler {
    tag: String,
    cache: TypeCache,
}

impl Compiler {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            cache: TypeCache::new(),
        }
    }

    /// Fetch or build the encoder for `info` under `flags`.
    pub fn compile(&self, info: &TypeInfo, flags: Flags) -> HashResult<EncoderRef> {
        let key = (info.id(), flags);
        if let Some(encoder) = self.cache.get(&key) {
            trace!(type_name = info.name(), "encoder cache hit");
            return Ok(encoder);
        }

        let mut session = Session::new(self);
        match session.compile(info, flags) {
            Ok(root) => Ok(session.publish(key, root)),
            Err(err) => {
                debug!(type_name = info.name(), error = %err, "encoder compile failed");
                Err(err)
            }
        }
    }

    /// Encoder for the concrete type of `value`.
    ///
    /// A cache hit is resolved from the type id alone; the descriptor is only
    /// built on a miss.
    pub fn compile_value(&self, value: &dyn Reflect, flags: Flags) -> HashResult<EncoderRef> {
        if let Some(encoder) = self.cache.get(&(value.value_type_id(), flags)) {
            return Ok(encoder);
        }
        let info = value.value_type();
        if matches!(info.kind(), TypeKind::Dynamic) {
            return Err(HashError::mismatch(info.name(), "concrete"));
        }
        self.compile(&info, flags)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Scratch space of one top-level compile.
struct Session<'c> {
    compiler: &'c Compiler,
    done: FxHashMap<CacheKey, EncoderRef>,
    in_flight: FxHashMap<CacheKey, Slot>,
    slots: Vec<(CacheKey, Slot)>,
}

impl<'c> Session<'c> {
    fn new(compiler: &'c Compiler) -> Self {
        Self {
            compiler,
            done: FxHashMap::default(),
            in_flight: FxHashMap::default(),
            slots: Vec::new(),
        }
    }

    fn compile(&mut self, info: &TypeInfo, flags: Flags) -> HashResult<EncoderRef> {
        let key = (info.id(), flags);
        if let Some(encoder) = self.done.get(&key) {
            return Ok(Arc::clone(encoder));
        }
        if let Some(encoder) = self.compiler.cache.get(&key) {
            return Ok(encoder);
        }
        if let Some(slot) = self.in_flight.get(&key) {
            trace!(type_name = info.name(), "recursive type, deferring");
            return Ok(Arc::new(Encoder::deferred(slot.clone())));
        }

        self.in_flight.insert(key, Slot::default());
        let built = self.build(info, flags);
        let slot = self.in_flight.remove(&key);
        let node = built?;

        let marker = flags.contains(Flags::TYPE_MARKER).then(|| info.name());
        let encoder = Arc::new(Encoder::new(marker, node));
        self.done.insert(key, Arc::clone(&encoder));
        if let Some(slot) = slot {
            self.slots.push((key, slot));
        }
        Ok(encoder)
    }

    /// Store everything compiled, bind placeholders, return the canonical root.
    ///
    /// Runs under the write lock: no reader can observe an unbound placeholder.
    fn publish(self, root_key: CacheKey, root: EncoderRef) -> EncoderRef {
        let Session {
            compiler,
            done,
            slots,
            ..
        } = self;
        let compiled = done.len();

        let canonical_root = compiler.cache.with_write(|map| {
            let mut canonical = FxHashMap::default();
            for (key, encoder) in done {
                let stored = map.entry(key).or_insert(encoder);
                canonical.insert(key, Arc::clone(stored));
            }
            for (key, slot) in &slots {
                if let Some(target) = canonical.get(key) {
                    slot.fill(target);
                }
            }
            canonical.remove(&root_key)
        });

        debug!(compiled, cached = compiler.cache.len(), "published encoders");
        canonical_root.unwrap_or(root)
    }

    fn build(&mut self, info: &TypeInfo, flags: Flags) -> HashResult<Node> {
        let caps = info.capabilities();
        if caps.contains(Capabilities::HASH_WRITER) {
            return Ok(delegate(DelegateKind::HashWriter, info));
        }
        for (flag, cap, kind) in DELEGATES {
            if flags.contains(flag) && caps.contains(cap) {
                return Ok(delegate(kind, info));
            }
        }

        let node = match info.kind() {
            TypeKind::Bool => Node::Scalar(Scalar::Bool),
            TypeKind::Int => Node::Scalar(Scalar::Int),
            TypeKind::Uint => Node::Scalar(Scalar::Uint),
            TypeKind::Float => Node::Scalar(Scalar::Float),
            TypeKind::Complex => Node::Scalar(Scalar::Complex),
            TypeKind::Str => Node::Scalar(Scalar::Str),
            TypeKind::Bytes => Node::Scalar(Scalar::Bytes),
            TypeKind::Pointer { pointee } => Node::Pointer {
                pointee: self.compile(&pointee(), flags)?,
                zero_nil: flags.contains(Flags::ZERO_NIL),
            },
            TypeKind::Dynamic => Node::Dynamic { flags },
            TypeKind::Array { elem, .. } => wrap(
                Composite::Elements {
                    elem: self.compile(&elem(), flags)?,
                    skip_zero: flags.contains(Flags::SKIP_ZERO),
                },
                flags.contains(Flags::UNORDERED_ARRAY),
            ),
            TypeKind::Slice { elem } => wrap(
                Composite::Elements {
                    elem: self.compile(&elem(), flags)?,
                    skip_zero: flags.contains(Flags::SKIP_ZERO),
                },
                flags.contains(Flags::UNORDERED_SLICE),
            ),
            TypeKind::Struct { fields } => wrap(
                Composite::Fields {
                    fields: self.field_plans(info, fields, flags)?,
                },
                flags.contains(Flags::UNORDERED_STRUCT),
            ),
            TypeKind::Enum { variants } => {
                let mut plans = Vec::with_capacity(variants.len());
                for variant in variants {
                    plans.push(VariantPlan {
                        name: variant.name(),
                        fields: self.field_plans(info, variant.fields(), flags)?,
                    });
                }
                wrap(
                    Composite::Variants { variants: plans },
                    flags.contains(Flags::UNORDERED_STRUCT),
                )
            }
            TypeKind::Map { key, value } => Node::Folded(Composite::Entries {
                key: self.compile(&key(), flags)?,
                value: self.compile(&value(), flags)?,
                skip_zero: flags.contains(Flags::SKIP_ZERO),
            }),
            TypeKind::Set { elem } => Node::Folded(Composite::Elements {
                elem: self.compile(&elem(), flags)?,
                skip_zero: flags.contains(Flags::SKIP_ZERO),
            }),
            TypeKind::Seq { elem } => wrap(
                Composite::LazyElements { elem: *elem, flags },
                flags.contains(Flags::UNORDERED_SEQ),
            ),
            TypeKind::Pairs { key, value } => wrap(
                Composite::LazyEntries {
                    key: *key,
                    value: *value,
                    flags,
                },
                flags.contains(Flags::UNORDERED_PAIRS),
            ),
            TypeKind::Opaque => {
                return Err(HashError::UnsupportedType {
                    type_name: info.name(),
                });
            }
        };
        Ok(node)
    }

    /// Resolve tags and compile every surviving field.
    fn field_plans(
        &mut self,
        owner: &TypeInfo,
        fields: &[FieldInfo],
        flags: Flags,
    ) -> HashResult<Vec<FieldPlan>> {
        let mut plans = Vec::with_capacity(fields.len());
        for field in fields {
            let mut local = flags;
            if let Some(raw) = field.tag(&self.compiler.tag) {
                let tag = FieldTag::parse(raw).map_err(|token| HashError::InvalidTagOption {
                    type_name: owner.name(),
                    field: field.name(),
                    token,
                })?;
                match tag {
                    FieldTag::Exclude => continue,
                    FieldTag::Add(extra) => local |= extra,
                }
            }
            plans.push(FieldPlan {
                name: field.name(),
                index: field.index(),
                skip_zero: local.contains(Flags::SKIP_ZERO),
                encoder: self.compile(&field.type_info(), local)?,
            });
        }
        Ok(plans)
    }
}

fn delegate(kind: DelegateKind, info: &TypeInfo) -> Node {
    Node::Delegate(Delegate::new(kind, info.name()))
}

fn wrap(composite: Composite, unordered: bool) -> Node {
    if unordered {
        Node::Folded(composite)
    } else {
        Node::Ordered(composite)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::reflect::Typed;

    fn compiler() -> Compiler {
        Compiler::new("datahash")
    }

    struct Secret;

    impl Typed for Secret {
        fn type_info() -> TypeInfo {
            TypeInfo::of::<Secret>(TypeKind::Opaque)
        }
    }

    struct Tagged;

    impl Typed for Tagged {
        fn type_info() -> TypeInfo {
            static TAGS: &[(&str, &str)] = &[("datahash", "set,bogus")];
            TypeInfo::of::<Tagged>(TypeKind::Struct {
                fields: vec![FieldInfo::new("a", 0, <i64 as Typed>::type_info).with_tags(TAGS)],
            })
        }
    }

    #[test]
    fn test_compile_is_memoised() {
        let compiler = compiler();
        let a = compiler.compile(&<Vec<i64> as Typed>::type_info(), Flags::NONE).unwrap();
        let b = compiler.compile(&<Vec<i64> as Typed>::type_info(), Flags::NONE).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        // Vec<i64> and i64
        assert_eq!(compiler.cached(), 2);
    }

    #[test]
    fn test_flags_are_part_of_the_key() {
        let compiler = compiler();
        let info = <Vec<i64> as Typed>::type_info();
        let a = compiler.compile(&info, Flags::NONE).unwrap();
        let b = compiler.compile(&info, Flags::UNORDERED_SLICE).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(matches!(b.node(), Node::Folded(_)));
        assert!(matches!(a.node(), Node::Ordered(_)));
    }

    #[test]
    fn test_maps_always_fold() {
        let compiler = compiler();
        let enc = compiler
            .compile(&<HashMap<String, i64> as Typed>::type_info(), Flags::NONE)
            .unwrap();
        assert!(matches!(enc.node(), Node::Folded(Composite::Entries { .. })));
    }

    #[test]
    fn test_opaque_is_unsupported() {
        let compiler = compiler();
        let err = compiler.compile(&Secret::type_info(), Flags::NONE).unwrap_err();
        assert!(matches!(err, HashError::UnsupportedType { .. }));
    }

    #[test]
    fn test_failed_compile_leaves_cache_untouched() {
        let compiler = compiler();
        let err = compiler.compile(&Tagged::type_info(), Flags::NONE).unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidTagOption { field: "a", ref token, .. } if token == "bogus"
        ));
        assert_eq!(compiler.cached(), 0);
    }

    #[test]
    fn test_compile_value_hits_by_type_id() {
        let compiler = compiler();
        let a = compiler.compile_value(&vec![1i64], Flags::NONE).unwrap();
        let b = compiler
            .compile(&<Vec<i64> as Typed>::type_info(), Flags::NONE)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(compiler.compile_value(&Vec::<i64>::new(), Flags::NONE).unwrap().node().label(), "ordered");
    }

    #[test]
    fn test_encoder_debug() {
        let enc = compiler()
            .compile(&<Option<i64> as Typed>::type_info(), Flags::NONE)
            .unwrap();
        assert_eq!(format!("{enc:?}"), r#"Encoder { marker: None, node: "pointer" }"#);
    }

    #[test]
    fn test_lazy_sequences_do_not_compile_elements() {
        let compiler = compiler();
        let info = <std::collections::LinkedList<Secret> as Typed>::type_info();
        let enc = compiler.compile(&info, Flags::NONE).unwrap();
        assert!(matches!(enc.node(), Node::Ordered(Composite::LazyElements { .. })));
    }

    impl Reflect for Secret {
        fn value_type(&self) -> TypeInfo {
            Self::type_info()
        }

        fn reflect_ref(&self) -> crate::reflect::ReflectRef<'_> {
            crate::reflect::ReflectRef::Opaque
        }

        fn is_zero(&self) -> bool {
            false
        }
    }
}
