//! `Typed` / `Reflect` for standard library types.

use std::any::{Any, TypeId, type_name};
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::BuildHasher;
use std::rc::Rc;
use std::sync::Arc;

use super::{
    ElementAccess, ElementVisitor, EntryAccess, EntryVisitor, FieldAccess, FieldInfo,
    PointerAccess, Reflect, ReflectRef, TypeInfo, TypeKind, Typed,
};
use crate::error::{HashError, HashResult};

fn visit_elements<'a, T: Reflect>(
    items: impl IntoIterator<Item = &'a T>,
    f: &mut ElementVisitor<'_>,
) -> HashResult<()> {
    for item in items {
        f(item as &dyn Reflect)?;
    }
    Ok(())
}

fn visit_entries<'a, K: Reflect, V: Reflect>(
    entries: impl IntoIterator<Item = (&'a K, &'a V)>,
    f: &mut EntryVisitor<'_>,
) -> HashResult<()> {
    for (key, value) in entries {
        f(key as &dyn Reflect, value as &dyn Reflect)?;
    }
    Ok(())
}

// =============================================================================
// Scalars
// =============================================================================

macro_rules! impl_int {
    ($variant:ident, $wide:ty, $($ty:ty),*) => {$(
        impl Typed for $ty {
            fn type_info() -> TypeInfo {
                TypeInfo::of::<$ty>(TypeKind::$variant)
            }
        }

        impl Reflect for $ty {
            fn value_type(&self) -> TypeInfo {
                Self::type_info()
            }

            #[inline]
            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::$variant(*self as $wide)
            }

            #[inline]
            fn is_zero(&self) -> bool {
                *self == 0
            }
        }
    )*};
}

impl_int!(Int, i64, i8, i16, i32, i64, isize);
impl_int!(Uint, u64, u8, u16, u32, u64, usize);

macro_rules! impl_float {
    ($($ty:ty),*) => {$(
        impl Typed for $ty {
            fn type_info() -> TypeInfo {
                TypeInfo::of::<$ty>(TypeKind::Float)
            }
        }

        impl Reflect for $ty {
            fn value_type(&self) -> TypeInfo {
                Self::type_info()
            }

            #[inline]
            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Float(f64::from(*self))
            }

            // -0.0 is not zero: it hashes differently.
            #[inline]
            fn is_zero(&self) -> bool {
                self.to_bits() == 0
            }
        }
    )*};
}

impl_float!(f32, f64);

impl Typed for bool {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<bool>(TypeKind::Bool)
    }
}

impl Reflect for bool {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Bool(*self)
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl Typed for char {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<char>(TypeKind::Int)
    }
}

impl Reflect for char {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Int(i64::from(u32::from(*self)))
    }

    fn is_zero(&self) -> bool {
        *self == '\0'
    }
}

/// A complex number, hashed as its real part then its imaginary part.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    /// Real part
    pub re: f64,
    /// Imaginary part
    pub im: f64,
}

impl Complex {
    /// Create a complex number.
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

impl Typed for Complex {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Complex>(TypeKind::Complex)
    }
}

impl Reflect for Complex {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Complex(self.re, self.im)
    }

    fn is_zero(&self) -> bool {
        self.re.to_bits() == 0 && self.im.to_bits() == 0
    }
}

// =============================================================================
// Text
// =============================================================================

macro_rules! impl_str {
    ($($ty:ty),*) => {$(
        impl Typed for $ty {
            fn type_info() -> TypeInfo {
                TypeInfo::of::<$ty>(TypeKind::Str)
            }
        }

        impl Reflect for $ty {
            fn value_type(&self) -> TypeInfo {
                Self::type_info()
            }

            #[inline]
            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Str(<$ty as AsRef<str>>::as_ref(self))
            }

            #[inline]
            fn is_zero(&self) -> bool {
                <$ty as AsRef<str>>::as_ref(self).is_empty()
            }
        }
    )*};
}

impl_str!(String, &'static str, Box<str>, Rc<str>, Arc<str>, Cow<'static, str>);

// =============================================================================
// Pointers
// =============================================================================

impl Typed for dyn Reflect {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<dyn Reflect>(TypeKind::Dynamic)
    }
}

impl<T: Typed + Reflect> Typed for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Pointer {
            pointee: T::type_info,
        })
    }
}

impl<T: Typed + Reflect> Reflect for Option<T> {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Pointer(self)
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<T: Reflect> PointerAccess for Option<T> {
    fn with_pointee(&self, f: &mut dyn FnMut(Option<&dyn Reflect>) -> HashResult<()>) -> HashResult<()> {
        f(self.as_ref().map(|v| v as &dyn Reflect))
    }
}

impl<T: Typed + Reflect> Typed for Box<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Pointer {
            pointee: T::type_info,
        })
    }
}

// Boxes own their target, so zero-ness looks through them.
impl<T: Typed + Reflect> Reflect for Box<T> {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Pointer(self)
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

impl<T: Reflect> PointerAccess for Box<T> {
    fn with_pointee(&self, f: &mut dyn FnMut(Option<&dyn Reflect>) -> HashResult<()>) -> HashResult<()> {
        f(Some(&**self as &dyn Reflect))
    }
}

impl Typed for Box<dyn Reflect> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Pointer {
            pointee: <dyn Reflect as Typed>::type_info,
        })
    }
}

impl Reflect for Box<dyn Reflect> {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Pointer(self)
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

impl PointerAccess for Box<dyn Reflect> {
    fn with_pointee(&self, f: &mut dyn FnMut(Option<&dyn Reflect>) -> HashResult<()>) -> HashResult<()> {
        f(Some(&**self))
    }
}

// Shared pointers are never zero and carry identity: they are the only way
// to build a cycle.
macro_rules! impl_shared {
    ($($ptr:ident),*) => {$(
        impl<T: Typed + Reflect> Typed for $ptr<T> {
            fn type_info() -> TypeInfo {
                TypeInfo::of::<Self>(TypeKind::Pointer {
                    pointee: T::type_info,
                })
            }
        }

        impl<T: Typed + Reflect> Reflect for $ptr<T> {
            fn value_type(&self) -> TypeInfo {
                Self::type_info()
            }

            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Pointer(self)
            }

            fn is_zero(&self) -> bool {
                false
            }
        }

        impl<T: Reflect> PointerAccess for $ptr<T> {
            fn identity(&self) -> Option<usize> {
                Some($ptr::as_ptr(self) as *const () as usize)
            }

            fn with_pointee(
                &self,
                f: &mut dyn FnMut(Option<&dyn Reflect>) -> HashResult<()>,
            ) -> HashResult<()> {
                f(Some(&**self as &dyn Reflect))
            }
        }
    )*};
}

impl_shared!(Rc, Arc);

impl<T: Typed + Reflect> Typed for RefCell<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Pointer {
            pointee: T::type_info,
        })
    }
}

impl<T: Typed + Reflect> Reflect for RefCell<T> {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Pointer(self)
    }

    fn is_zero(&self) -> bool {
        false
    }
}

impl<T: Reflect> PointerAccess for RefCell<T> {
    fn with_pointee(&self, f: &mut dyn FnMut(Option<&dyn Reflect>) -> HashResult<()>) -> HashResult<()> {
        let inner = self.try_borrow().map_err(|_| HashError::Borrowed {
            type_name: type_name::<Self>(),
        })?;
        f(Some(&*inner as &dyn Reflect))
    }
}

// =============================================================================
// Sequences
// =============================================================================

// `Vec<u8>` is a byte string, every other `Vec` is a slice.
impl<T: Typed + Reflect> Typed for Vec<T> {
    fn type_info() -> TypeInfo {
        if TypeId::of::<T>() == TypeId::of::<u8>() {
            TypeInfo::of::<Self>(TypeKind::Bytes)
        } else {
            TypeInfo::of::<Self>(TypeKind::Slice { elem: T::type_info })
        }
    }
}

impl<T: Typed + Reflect> Reflect for Vec<T> {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        match (self as &dyn Any).downcast_ref::<Vec<u8>>() {
            Some(bytes) => ReflectRef::Bytes(bytes.as_slice()),
            None => ReflectRef::Elements(self),
        }
    }

    fn is_zero(&self) -> bool {
        false
    }
}

impl<T: Reflect> ElementAccess for Vec<T> {
    fn for_each_element(&self, f: &mut ElementVisitor<'_>) -> HashResult<()> {
        visit_elements(self, f)
    }
}

macro_rules! impl_elements {
    ($kind:ident, $($ty:ty),*) => {$(
        impl<T: Typed + Reflect> Typed for $ty {
            fn type_info() -> TypeInfo {
                TypeInfo::of::<Self>(TypeKind::$kind { elem: T::type_info })
            }
        }

        impl<T: Typed + Reflect> Reflect for $ty {
            fn value_type(&self) -> TypeInfo {
                Self::type_info()
            }

            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Elements(self)
            }

            fn is_zero(&self) -> bool {
                false
            }
        }

        impl<T: Reflect> ElementAccess for $ty {
            fn for_each_element(&self, f: &mut ElementVisitor<'_>) -> HashResult<()> {
                visit_elements(self.iter(), f)
            }
        }
    )*};
}

impl_elements!(Slice, VecDeque<T>, Box<[T]>);
impl_elements!(Seq, LinkedList<T>, BTreeSet<T>);

impl<T: Typed + Reflect, const N: usize> Typed for [T; N] {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Array {
            elem: T::type_info,
            len: N,
        })
    }
}

impl<T: Typed + Reflect, const N: usize> Reflect for [T; N] {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Elements(self)
    }

    fn is_zero(&self) -> bool {
        self.iter().all(Reflect::is_zero)
    }
}

impl<T: Reflect, const N: usize> ElementAccess for [T; N] {
    fn for_each_element(&self, f: &mut ElementVisitor<'_>) -> HashResult<()> {
        visit_elements(self, f)
    }
}

impl<T: Typed + Reflect, S: BuildHasher + 'static> Typed for HashSet<T, S> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Set { elem: T::type_info })
    }
}

impl<T: Typed + Reflect, S: BuildHasher + 'static> Reflect for HashSet<T, S> {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Elements(self)
    }

    fn is_zero(&self) -> bool {
        false
    }
}

impl<T: Reflect, S> ElementAccess for HashSet<T, S> {
    fn for_each_element(&self, f: &mut ElementVisitor<'_>) -> HashResult<()> {
        visit_elements(self, f)
    }
}

// =============================================================================
// Maps
// =============================================================================

impl<K: Typed + Reflect, V: Typed + Reflect, S: BuildHasher + 'static> Typed for HashMap<K, V, S> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Map {
            key: K::type_info,
            value: V::type_info,
        })
    }
}

impl<K: Typed + Reflect, V: Typed + Reflect, S: BuildHasher + 'static> Reflect
    for HashMap<K, V, S>
{
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Entries(self)
    }

    fn is_zero(&self) -> bool {
        false
    }
}

impl<K: Reflect, V: Reflect, S> EntryAccess for HashMap<K, V, S> {
    fn for_each_entry(&self, f: &mut EntryVisitor<'_>) -> HashResult<()> {
        visit_entries(self, f)
    }
}

impl<K: Typed + Reflect, V: Typed + Reflect> Typed for BTreeMap<K, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Map {
            key: K::type_info,
            value: V::type_info,
        })
    }
}

impl<K: Typed + Reflect, V: Typed + Reflect> Reflect for BTreeMap<K, V> {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Entries(self)
    }

    fn is_zero(&self) -> bool {
        false
    }
}

impl<K: Reflect, V: Reflect> EntryAccess for BTreeMap<K, V> {
    fn for_each_entry(&self, f: &mut EntryVisitor<'_>) -> HashResult<()> {
        visit_entries(self, f)
    }
}

/// Ordered key/value pairs, e.g. the output of a custom iterator.
///
/// Encoded in order unless `unordered_pairs` (or the `set` tag) is on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pairs<K, V>(pub Vec<(K, V)>);

impl<K, V> FromIterator<(K, V)> for Pairs<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<K: Typed + Reflect, V: Typed + Reflect> Typed for Pairs<K, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(TypeKind::Pairs {
            key: K::type_info,
            value: V::type_info,
        })
    }
}

impl<K: Typed + Reflect, V: Typed + Reflect> Reflect for Pairs<K, V> {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Entries(self)
    }

    fn is_zero(&self) -> bool {
        false
    }
}

impl<K: Reflect, V: Reflect> EntryAccess for Pairs<K, V> {
    fn for_each_entry(&self, f: &mut EntryVisitor<'_>) -> HashResult<()> {
        visit_entries(self.0.iter().map(|(k, v)| (k, v)), f)
    }
}

// =============================================================================
// Tuples
// =============================================================================

impl Typed for () {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<()>(TypeKind::Struct { fields: Vec::new() })
    }
}

impl Reflect for () {
    fn value_type(&self) -> TypeInfo {
        Self::type_info()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Fields(self)
    }

    fn is_zero(&self) -> bool {
        true
    }
}

impl FieldAccess for () {
    fn field(&self, _index: usize) -> Option<&dyn Reflect> {
        None
    }
}

macro_rules! impl_tuple {
    ($(($idx:tt, $name:ident)),+) => {
        impl<$($name: Typed + Reflect),+> Typed for ($($name,)+) {
            fn type_info() -> TypeInfo {
                TypeInfo::of::<Self>(TypeKind::Struct {
                    fields: vec![$(FieldInfo::new(stringify!($idx), $idx, $name::type_info)),+],
                })
            }
        }

        impl<$($name: Typed + Reflect),+> Reflect for ($($name,)+) {
            fn value_type(&self) -> TypeInfo {
                Self::type_info()
            }

            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Fields(self)
            }

            fn is_zero(&self) -> bool {
                $(self.$idx.is_zero())&&+
            }
        }

        impl<$($name: Reflect),+> FieldAccess for ($($name,)+) {
            fn field(&self, index: usize) -> Option<&dyn Reflect> {
                match index {
                    $($idx => Some(&self.$idx as &dyn Reflect),)+
                    _ => None,
                }
            }
        }
    };
}

impl_tuple!((0, A));
impl_tuple!((0, A), (1, B));
impl_tuple!((0, A), (1, B), (2, C));
impl_tuple!((0, A), (1, B), (2, C), (3, D));
impl_tuple!((0, A), (1, B), (2, C), (3, D), (4, E));
impl_tuple!((0, A), (1, B), (2, C), (3, D), (4, E), (5, F));

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_elements(value: &dyn Reflect) -> Vec<String> {
        let ReflectRef::Elements(access) = value.reflect_ref() else {
            panic!("expected elements");
        };
        let mut out = Vec::new();
        access
            .for_each_element(&mut |item| {
                out.push(item.reflect_ref().label().to_string());
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn test_scalar_views() {
        assert!(matches!((-3i8).reflect_ref(), ReflectRef::Int(-3)));
        assert!(matches!(7u16.reflect_ref(), ReflectRef::Uint(7)));
        assert!(matches!('a'.reflect_ref(), ReflectRef::Int(97)));
        assert!(matches!(1.5f32.reflect_ref(), ReflectRef::Float(f) if f == 1.5));
        assert!(matches!("hi".reflect_ref(), ReflectRef::Str("hi")));
    }

    #[test]
    fn test_zero_values() {
        assert!(0i32.is_zero());
        assert!(!1i32.is_zero());
        assert!(0.0f64.is_zero());
        assert!(!(-0.0f64).is_zero());
        assert!(String::new().is_zero());
        assert!(None::<u8>.is_zero());
        assert!(Box::new(0u8).is_zero());
        assert!(!Rc::new(0u8).is_zero());
        assert!([0u8; 4].is_zero());
        assert!((0i32, false, "").is_zero());
        assert!(!(0i32, true).is_zero());
        assert!(!Vec::<u8>::new().is_zero());
        assert!(Complex::default().is_zero());
    }

    #[test]
    fn test_vec_u8_is_bytes() {
        assert!(matches!(<Vec<u8> as Typed>::type_info().kind(), TypeKind::Bytes));
        assert!(matches!(vec![1u8, 2].reflect_ref(), ReflectRef::Bytes(&[1, 2])));
        assert!(matches!(
            <Vec<u16> as Typed>::type_info().kind(),
            TypeKind::Slice { .. }
        ));
    }

    #[test]
    fn test_collection_kinds() {
        assert!(matches!(<HashMap<String, i32> as Typed>::type_info().kind(), TypeKind::Map { .. }));
        assert!(matches!(<BTreeMap<String, i32> as Typed>::type_info().kind(), TypeKind::Map { .. }));
        assert!(matches!(<HashSet<i32> as Typed>::type_info().kind(), TypeKind::Set { .. }));
        assert!(matches!(<BTreeSet<i32> as Typed>::type_info().kind(), TypeKind::Seq { .. }));
        assert!(matches!(<LinkedList<i32> as Typed>::type_info().kind(), TypeKind::Seq { .. }));
        assert!(matches!(<Pairs<i32, i32> as Typed>::type_info().kind(), TypeKind::Pairs { .. }));
        assert!(matches!(<[i32; 3] as Typed>::type_info().kind(), TypeKind::Array { len: 3, .. }));
        assert!(matches!(<Box<dyn Reflect> as Typed>::type_info().kind(), TypeKind::Pointer { .. }));
        assert!(matches!(<dyn Reflect as Typed>::type_info().kind(), TypeKind::Dynamic));
    }

    #[test]
    fn test_elements_in_order() {
        let items: Vec<Box<dyn Reflect>> = vec![Box::new(1i32), Box::new("x"), Box::new(true)];
        assert_eq!(collect_elements(&items), ["pointer", "pointer", "pointer"]);
        assert_eq!(collect_elements(&VecDeque::from([1u8, 2])), ["uint", "uint"]);
    }

    #[test]
    fn test_shared_identity() {
        let a = Rc::new(5i32);
        let b = Rc::clone(&a);
        let c = Rc::new(5i32);
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
        assert_eq!(Box::new(5i32).identity(), None);
    }

    #[test]
    fn test_refcell_borrowed() {
        let cell = RefCell::new(1i32);
        let _guard = cell.borrow_mut();
        let err = cell.with_pointee(&mut |_| Ok(())).unwrap_err();
        assert!(matches!(err, HashError::Borrowed { .. }));
    }

    #[test]
    fn test_tuple_fields() {
        let info = <(i32, String) as Typed>::type_info();
        let TypeKind::Struct { fields } = info.kind() else {
            panic!("expected struct");
        };
        let names: Vec<_> = fields.iter().map(FieldInfo::name).collect();
        assert_eq!(names, ["0", "1"]);

        let value = (3i32, String::from("x"));
        assert!(matches!(value.field(0).map(|f| f.reflect_ref()), Some(ReflectRef::Int(3))));
        assert!(value.field(2).is_none());
    }
}
