//! tola-datahash - Deterministic 64-bit content digests
//!
//! ## Core Concepts
//!
//! **Compiled encoders**: every `(type, options)` pair is compiled once into an
//! encoder tree, cached in the [`Hasher`], and replayed for each value.
//!
//! **Reflection**: types describe themselves through [`Typed`] and [`Reflect`],
//! implemented for the standard library and derived with `#[derive(Reflect)]`.
//!
//! **Ordered vs folded**: sequences, structs and iterated pairs are encoded in
//! order by default; maps and hash sets are always folded, so non-deterministic
//! iteration order never changes a digest.
//!
//! ## Modules
//! - `accumulator`: pluggable streaming hashes (FNV-1a, BLAKE3, `std::hash`)
//! - `reflect`: type descriptors, value views and capability traits
//! - `options`: hashing options and the field-tag mini-language
//! - `error`: error types
//!
//! ## Usage
//!
//! ```ignore
//! use tola_datahash::{Fnv64a, Hasher, Options, Reflect};
//!
//! #[derive(Reflect)]
//! struct Config {
//!     name: String,
//!     #[tag(datahash = "set")]
//!     hosts: Vec<String>,
//!     #[tag(datahash = "-")]
//!     loaded_at: u64,
//! }
//!
//! let hasher = Hasher::new(Fnv64a::new, Options::default());
//! let digest = hasher.hash(&config)?;
//! ```

extern crate self as tola_datahash;

// =============================================================================
// Modules
// =============================================================================

/// Streaming hash accumulators
pub mod accumulator;

/// Error types
pub mod error;

/// Options and field tags
pub mod options;

/// Type descriptors and value views
pub mod reflect;

/// Prelude for common imports
pub mod prelude;

mod cache;
mod compiler;
mod encoder;
mod hasher;
mod pool;
mod state;

// =============================================================================
// Re-exports
// =============================================================================

pub use accumulator::{Accumulator, Blake3, Fnv64a, FxAccumulator, StdAccumulator};

pub use error::{
    AccumulatorError, DelegateError, DelegateKind, DelegateResult, HashError, HashResult,
};

pub use hasher::Hasher;

pub use options::{DEFAULT_TAG, Options};

pub use reflect::{
    Capabilities, Complex, ElementAccess, EntryAccess, FieldAccess, FieldInfo, HashWriter,
    MarshalBinary, MarshalText, Pairs, PointerAccess, Reflect, ReflectRef, TypeInfo, TypeInfoFn,
    TypeKind, Typed, VariantAccess, VariantInfo,
};

// Derive macro (macro namespace, alongside the trait)
#[cfg(feature = "macros")]
pub use tola_datahash_macros::Reflect;

#[doc(hidden)]
pub mod __private {
    #[cfg(feature = "json")]
    pub use serde_json;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(all(test, feature = "macros"))]
#[allow(non_snake_case)]
mod tests {
    use std::cell::RefCell;
    use std::fmt;
    use std::rc::Rc;

    use super::*;

    fn fnv(options: Options) -> Hasher<Fnv64a> {
        Hasher::new(Fnv64a::new, options)
    }

    fn digest(value: &dyn Reflect) -> u64 {
        fnv(Options::default()).hash(value).unwrap()
    }

    #[derive(Reflect)]
    struct Hidden {
        #[tag(datahash = "-")]
        Secret: String,
        X: i64,
    }

    #[derive(Reflect)]
    struct OnlyX {
        X: i64,
    }

    #[derive(Reflect)]
    struct Holder {
        V: Box<dyn Reflect>,
    }

    #[derive(Reflect)]
    #[reflect(display)]
    struct Stringer {
        V: i64,
    }

    impl fmt::Display for Stringer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "S:{}", self.V)
        }
    }

    #[derive(Reflect)]
    struct StringerField {
        V: Stringer,
    }

    #[derive(Reflect)]
    #[reflect(binary)]
    struct Binary {
        N: i64,
    }

    impl MarshalBinary for Binary {
        fn marshal_binary(&self) -> DelegateResult {
            if self.N < 0 {
                return Err("negative".into());
            }
            Ok(vec![self.N as u8])
        }
    }

    #[derive(Reflect)]
    struct BinaryField {
        V: Binary,
    }

    #[derive(Reflect)]
    #[reflect(text)]
    struct Text {
        V: String,
    }

    impl MarshalText for Text {
        fn marshal_text(&self) -> DelegateResult {
            Ok(format!("TM:{}", self.V).into_bytes())
        }
    }

    #[derive(Reflect)]
    #[reflect(hash_writer, display)]
    struct Custom {
        value: String,
    }

    impl HashWriter for Custom {
        fn write_hash(&self, acc: &mut dyn Accumulator) -> Result<(), DelegateError> {
            acc.write(format!("custom:{}", self.value).as_bytes())?;
            Ok(())
        }
    }

    impl fmt::Display for Custom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.value)
        }
    }

    #[derive(Reflect)]
    struct AC {
        A: i64,
        C: i64,
    }

    #[derive(Reflect)]
    struct AB {
        A: i64,
        B: i64,
    }

    #[derive(Reflect)]
    struct CycleNode {
        Value: i64,
        Next: Option<Rc<RefCell<CycleNode>>>,
    }

    fn binary_options() -> Options {
        Options::default().with_binary(true)
    }

    fn string_options() -> Options {
        Options::default().with_string(true)
    }

    #[test]
    fn test_golden_structs() {
        let hidden = Hidden {
            Secret: "hidden".into(),
            X: 1,
        };
        assert_eq!(digest(&hidden), 16533391434161719775);

        let json = Options {
            json: true,
            ..Options::default()
        };
        assert_eq!(fnv(json).hash(&OnlyX { X: 1 }).unwrap(), 16533391434161719775);

        let holder = Holder {
            V: Box::new(vec![1i64, 2, 3]),
        };
        assert_eq!(digest(&holder), 5608028861651753673);
    }

    #[test]
    fn test_golden_skip_zero() {
        let skip = fnv(Options::default().with_skip_zero(true));
        assert_eq!(skip.hash(&AC { A: 1, C: 0 }).unwrap(), 14952894133494373672);
        assert_eq!(skip.hash(&AB { A: 1, B: 0 }).unwrap(), 14952894133494373672);

        let skip_set = fnv(Options::default().with_skip_zero(true).with_unordered_struct(true));
        assert_eq!(skip_set.hash(&AB { A: 1, B: 0 }).unwrap(), 11905026311571686442);
    }

    #[test]
    fn test_golden_delegates() {
        assert_eq!(digest(&Custom { value: "abc".into() }), 9627794456967199124);

        let text = Options {
            text: true,
            ..Options::default()
        };
        let value = Text { V: "global".into() };
        assert_eq!(fnv(text).hash(&value).unwrap(), 6256686775322657367);

        let binary = fnv(binary_options());
        assert_eq!(binary.hash(&Binary { N: 5 }).unwrap(), 12638147618137026400);
        let field = BinaryField { V: Binary { N: 255 } };
        assert_eq!(binary.hash(&field).unwrap(), 11192428154555478883);

        let string = fnv(string_options());
        assert_eq!(string.hash(&Stringer { V: 42 }).unwrap(), 13766696074135465618);
        let field = StringerField { V: Stringer { V: 9 } };
        assert_eq!(string.hash(&field).unwrap(), 1704179339678544436);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_golden_json_delegate() {
        #[derive(Reflect, serde::Serialize)]
        #[serde(transparent)]
        #[reflect(json)]
        struct Json {
            val: String,
        }

        let json = Options {
            json: true,
            ..Options::default()
        };
        let value = Json { val: "json".into() };
        assert_eq!(fnv(json).hash(&value).unwrap(), 2069784589039126867);
    }

    #[test]
    fn test_golden_cycle() {
        let a = Rc::new(RefCell::new(CycleNode {
            Value: 1,
            Next: None,
        }));
        let b = Rc::new(RefCell::new(CycleNode {
            Value: 2,
            Next: Some(Rc::clone(&a)),
        }));
        a.borrow_mut().Next = Some(Rc::clone(&b));

        assert_eq!(digest(&a), 16044026119415053980);

        b.borrow_mut().Next = None;
    }

    #[test]
    fn test_delegates_are_opt_in() {
        let value = Binary { N: 5 };
        let plain = digest(&value);
        let delegated = fnv(binary_options()).hash(&value).unwrap();
        assert_ne!(plain, delegated);
    }

    #[test]
    fn test_hash_writer_beats_enabled_delegates() {
        let value = Custom { value: "abc".into() };
        assert_eq!(fnv(string_options()).hash(&value).unwrap(), digest(&value));
    }

    #[test]
    fn test_delegate_error_keeps_source() {
        let err = fnv(binary_options()).hash(&Binary { N: -1 }).unwrap_err();
        let HashError::Delegate {
            delegate, source, ..
        } = &err
        else {
            panic!("expected delegate error, got {err}");
        };
        assert_eq!(*delegate, DelegateKind::Binary);
        assert_eq!(source.to_string(), "negative");
    }

    #[test]
    fn test_zero_values_skip_delegates() {
        // A zero value never reaches its delegate, so it cannot fail.
        let hasher = fnv(binary_options());
        assert_eq!(
            hasher.hash(&Binary { N: 0 }).unwrap(),
            hasher.hash_optional(None).unwrap()
        );
    }

    #[test]
    fn test_field_exclusion() {
        let a = Hidden {
            Secret: "one".into(),
            X: 7,
        };
        let b = Hidden {
            Secret: "two".into(),
            X: 7,
        };
        assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn test_excluded_field_does_not_decide_zero() {
        let empty = Hidden {
            Secret: String::new(),
            X: 0,
        };
        let filled = Hidden {
            Secret: "b".into(),
            X: 0,
        };
        assert_eq!(digest(&empty), digest(&filled));

        #[derive(Reflect)]
        struct Outer {
            inner: Hidden,
            n: i64,
        }

        // Under skip_zero the inner struct is dropped either way.
        let skip = fnv(Options::default().with_skip_zero(true));
        let a = Outer { inner: empty, n: 1 };
        let b = Outer { inner: filled, n: 1 };
        assert_eq!(skip.hash(&a).unwrap(), skip.hash(&b).unwrap());
        assert_eq!(skip.hash(&a).unwrap(), skip.hash(&OnlyN { n: 1 }).unwrap());

        #[derive(Reflect)]
        struct OnlyN {
            n: i64,
        }
    }

    #[test]
    fn test_field_name_sensitivity() {
        #[derive(Reflect)]
        struct Left {
            left: i64,
        }

        #[derive(Reflect)]
        struct Right {
            right: i64,
        }

        assert_ne!(digest(&Left { left: 3 }), digest(&Right { right: 3 }));
    }

    #[test]
    fn test_nil_vs_zero() {
        #[derive(Reflect)]
        struct Slot {
            value: Option<i64>,
        }

        let nil = Slot { value: None };
        let zero = Slot { value: Some(0) };
        assert_ne!(digest(&nil), digest(&zero));

        let zero_nil = fnv(Options::default().with_zero_nil(true));
        assert_eq!(zero_nil.hash(&nil).unwrap(), 8692627439575607601);
        assert_eq!(zero_nil.hash(&nil).unwrap(), zero_nil.hash(&zero).unwrap());
    }

    #[test]
    fn test_zero_nil_inside_nested_structs() {
        #[derive(Reflect)]
        struct Inner {
            v: Option<i64>,
            w: i64,
        }

        #[derive(Reflect)]
        struct Outer {
            inner: Inner,
            items: [Option<u8>; 2],
        }

        let zero_nil = fnv(Options::default().with_zero_nil(true));
        let nil = Outer {
            inner: Inner { v: None, w: 0 },
            items: [None, None],
        };
        let zero = Outer {
            inner: Inner { v: Some(0), w: 0 },
            items: [Some(0), Some(0)],
        };
        assert_eq!(zero_nil.hash(&nil).unwrap(), zero_nil.hash(&zero).unwrap());
        assert_ne!(zero_nil.hash(&nil).unwrap(), zero_nil.hash_optional(None).unwrap());

        // Without the option a struct of nil pointers is zero and writes nothing.
        assert_eq!(digest(&nil), digest(&AB { A: 0, B: 0 }));
        assert_ne!(digest(&nil), digest(&zero));
    }

    #[test]
    fn test_zero_struct_writes_nothing() {
        let hasher = fnv(Options::default());
        assert_eq!(
            hasher.hash(&AB { A: 0, B: 0 }).unwrap(),
            hasher.hash_optional(None).unwrap()
        );
    }

    #[test]
    fn test_set_tag_folds_field() {
        #[derive(Reflect)]
        struct Tagged {
            #[tag(datahash = "set")]
            items: Vec<i64>,
            order: Vec<i64>,
        }

        let a = Tagged {
            items: vec![1, 2, 3],
            order: vec![1, 2],
        };
        let b = Tagged {
            items: vec![3, 1, 2],
            order: vec![1, 2],
        };
        let c = Tagged {
            items: vec![1, 2, 3],
            order: vec![2, 1],
        };
        assert_eq!(digest(&a), digest(&b));
        assert_ne!(digest(&a), digest(&c));
    }

    #[test]
    fn test_tag_flags_only_add() {
        #[derive(Reflect)]
        struct Scoped {
            #[tag(datahash = "ignorezero")]
            inner: AB,
        }

        let plain = fnv(Options::default());
        let global = fnv(Options::default().with_skip_zero(true));
        let value = Scoped {
            inner: AB { A: 1, B: 0 },
        };
        // The tag enables skip_zero below the field even when it is off globally.
        assert_eq!(plain.hash(&value).unwrap(), global.hash(&value).unwrap());
    }

    #[test]
    fn test_custom_tag_key() {
        #[derive(Reflect)]
        struct Keyed {
            #[tag(fp = "-")]
            noise: i64,
            #[tag(datahash = "-")]
            kept: i64,
        }

        let fp = fnv(Options::default().with_tag("fp"));
        let a = Keyed { noise: 1, kept: 5 };
        let b = Keyed { noise: 2, kept: 5 };
        let c = Keyed { noise: 1, kept: 6 };
        assert_eq!(fp.hash(&a).unwrap(), fp.hash(&b).unwrap());
        assert_ne!(fp.hash(&a).unwrap(), fp.hash(&c).unwrap());

        // Under the default key only `datahash` tags apply.
        assert_eq!(digest(&a), digest(&c));
        assert_ne!(digest(&a), digest(&b));
    }

    #[test]
    fn test_invalid_tag_is_reported() {
        #[derive(Reflect)]
        struct Broken {
            #[tag(datahash = "set,sorted")]
            items: Vec<i64>,
        }

        let hasher = fnv(Options::default());
        let err = hasher.prepare::<Broken>().unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidTagOption { field: "items", ref token, .. } if token == "sorted"
        ));
        // Deterministic: the same error on every attempt, nothing cached.
        assert!(hasher.hash(&Broken { items: vec![] }).is_err());
        assert_eq!(hasher.cached_encoders(), 0);
    }

    #[test]
    fn test_opaque_needs_enabled_capability() {
        #[derive(Reflect)]
        #[reflect(opaque, display)]
        struct Token(u64);

        impl fmt::Display for Token {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "tok-{}", self.0)
            }
        }

        let err = digest_err(&Token(1));
        assert!(matches!(err, HashError::UnsupportedType { .. }));

        let string = fnv(string_options());
        assert_ne!(string.hash(&Token(1)).unwrap(), string.hash(&Token(2)).unwrap());
    }

    fn digest_err(value: &dyn Reflect) -> HashError {
        fnv(Options::default()).hash(value).unwrap_err()
    }

    #[test]
    fn test_skip_attribute() {
        struct NotHashable;

        #[derive(Reflect)]
        struct Partial {
            id: u32,
            #[reflect(skip)]
            _cache: NotHashable,
        }

        #[derive(Reflect)]
        struct IdOnly {
            id: u32,
        }

        let a = Partial {
            id: 4,
            _cache: NotHashable,
        };
        assert_eq!(digest(&a), digest(&IdOnly { id: 4 }));
        assert_ne!(digest(&a), digest(&Partial { id: 5, _cache: NotHashable }));
    }

    #[test]
    fn test_enums() {
        #[derive(Reflect)]
        enum Shape {
            Empty,
            Circle(f64),
            Rect { w: i64, h: i64 },
        }

        let hasher = fnv(Options::default());
        let mut expected = Fnv64a::new();
        expected.write(b"Empty").unwrap();
        assert_eq!(hasher.hash(&Shape::Empty).unwrap(), expected.sum64());

        let circle = hasher.hash(&Shape::Circle(1.0)).unwrap();
        assert_ne!(circle, hasher.hash(&Shape::Circle(2.0)).unwrap());

        let rect = hasher.hash(&Shape::Rect { w: 2, h: 3 }).unwrap();
        assert_ne!(rect, hasher.hash(&Shape::Rect { w: 3, h: 2 }).unwrap());

        let folded = fnv(Options::default().with_unordered_struct(true));
        assert_eq!(
            folded.hash(&Shape::Rect { w: 2, h: 3 }).unwrap(),
            folded.hash(&Shape::Rect { h: 3, w: 2 }).unwrap()
        );
        assert_ne!(folded.hash(&Shape::Rect { w: 2, h: 3 }).unwrap(), rect);
    }

    #[test]
    fn test_recursive_type() {
        #[derive(Reflect)]
        struct Tree {
            label: String,
            children: Vec<Tree>,
        }

        let leaf = |label: &str| Tree {
            label: label.into(),
            children: vec![],
        };
        let a = Tree {
            label: "root".into(),
            children: vec![leaf("x"), leaf("y")],
        };
        let b = Tree {
            label: "root".into(),
            children: vec![leaf("y"), leaf("x")],
        };

        let hasher = fnv(Options::default());
        let first = hasher.hash(&a).unwrap();
        assert_eq!(hasher.hash(&a).unwrap(), first);
        assert_ne!(first, hasher.hash(&b).unwrap());
        assert_ne!(first, hasher.hash(&leaf("root")).unwrap());
    }

    #[test]
    fn test_generic_struct() {
        #[derive(Reflect)]
        struct Wrapper<T> {
            inner: T,
        }

        let a = Wrapper { inner: vec![1u16, 2] };
        let b = Wrapper {
            inner: Wrapper { inner: 9i64 },
        };
        assert_ne!(digest(&a), digest(&Wrapper { inner: vec![2u16, 1] }));
        assert_eq!(digest(&b), digest(&Wrapper { inner: Wrapper { inner: 9i64 } }));
    }

    #[test]
    fn test_type_marker() {
        let plain = fnv(Options::default());
        assert_eq!(plain.hash(&1i32).unwrap(), plain.hash(&1i64).unwrap());

        let marked = fnv(Options::default().with_type_marker(true));
        assert_ne!(marked.hash(&1i32).unwrap(), marked.hash(&1i64).unwrap());
        assert_eq!(marked.hash(&1i64).unwrap(), marked.hash(&1i64).unwrap());
    }
}
