use core::{
    any::TypeId,
    fmt::{self, Display, Formatter},
};
use std::collections::BTreeMap;

use crate::any::TypeInfo;

/// Lexical conversion targets and their canonical Rust spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
}

impl PrimitiveKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::Isize => "isize",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    #[must_use]
    pub(crate) fn type_info(self) -> TypeInfo {
        match self {
            Self::Bool => TypeInfo::of::<bool>(),
            Self::Char => TypeInfo::of::<char>(),
            Self::I8 => TypeInfo::of::<i8>(),
            Self::I16 => TypeInfo::of::<i16>(),
            Self::I32 => TypeInfo::of::<i32>(),
            Self::I64 => TypeInfo::of::<i64>(),
            Self::I128 => TypeInfo::of::<i128>(),
            Self::Isize => TypeInfo::of::<isize>(),
            Self::U8 => TypeInfo::of::<u8>(),
            Self::U16 => TypeInfo::of::<u16>(),
            Self::U32 => TypeInfo::of::<u32>(),
            Self::U64 => TypeInfo::of::<u64>(),
            Self::U128 => TypeInfo::of::<u128>(),
            Self::Usize => TypeInfo::of::<usize>(),
            Self::F32 => TypeInfo::of::<f32>(),
            Self::F64 => TypeInfo::of::<f64>(),
        }
    }

    #[must_use]
    pub(crate) fn of_id(id: TypeId) -> Option<Self> {
        const ALL: [PrimitiveKind; 16] = [
            PrimitiveKind::Bool,
            PrimitiveKind::Char,
            PrimitiveKind::I8,
            PrimitiveKind::I16,
            PrimitiveKind::I32,
            PrimitiveKind::I64,
            PrimitiveKind::I128,
            PrimitiveKind::Isize,
            PrimitiveKind::U8,
            PrimitiveKind::U16,
            PrimitiveKind::U32,
            PrimitiveKind::U64,
            PrimitiveKind::U128,
            PrimitiveKind::Usize,
            PrimitiveKind::F32,
            PrimitiveKind::F64,
        ];

        ALL.into_iter().find(|kind| kind.type_info().id == id)
    }
}

/// Runtime representation of a possibly-parametric type.
///
/// `of::<T>()` canonicalises: the descriptor of a numeric/bool/char Rust type
/// and the abstract [`TypeDescriptor::Primitive`] spelling of the same kind
/// compare equal, so lookup under either form hits the same binding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeDescriptor {
    Simple(TypeInfo),
    Primitive(PrimitiveKind),
    Parametric { raw: TypeInfo, args: Vec<TypeDescriptor> },
    Array(Box<TypeDescriptor>),
    Variable(&'static str),
}

impl TypeDescriptor {
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        let info = TypeInfo::of::<T>();
        match PrimitiveKind::of_id(info.id) {
            Some(kind) => Self::Primitive(kind),
            None => Self::Simple(info),
        }
    }

    #[inline]
    #[must_use]
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }

    #[inline]
    #[must_use]
    pub fn parametric(raw: TypeInfo, args: Vec<TypeDescriptor>) -> Self {
        Self::Parametric { raw, args }
    }

    #[inline]
    #[must_use]
    pub fn array(elem: TypeDescriptor) -> Self {
        Self::Array(Box::new(elem))
    }

    #[inline]
    #[must_use]
    pub fn variable(name: &'static str) -> Self {
        Self::Variable(name)
    }

    /// Raw-type projection: the descriptor with type arguments stripped.
    ///
    /// Arrays and unresolved variables have no raw projection.
    #[must_use]
    pub fn raw(&self) -> Option<TypeInfo> {
        match self {
            Self::Simple(info) => Some(*info),
            Self::Primitive(kind) => Some(kind.type_info()),
            Self::Parametric { raw, .. } => Some(*raw),
            Self::Array(_) | Self::Variable(_) => None,
        }
    }

    /// Structural assignability: identical shape, with variables on the left
    /// matching anything.
    #[must_use]
    pub fn is_assignable_from(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Variable(_), _) => true,
            (Self::Array(a), Self::Array(b)) => a.is_assignable_from(b),
            (Self::Parametric { raw: a, args: x }, Self::Parametric { raw: b, args: y }) => {
                a == b && x.len() == y.len() && x.iter().zip(y).all(|(a, b)| a.is_assignable_from(b))
            }
            _ => self == other,
        }
    }

    /// Replaces bound type variables according to `map`, leaving unbound
    /// variables in place.
    #[must_use]
    pub fn substitute(&self, map: &BTreeMap<&'static str, TypeDescriptor>) -> TypeDescriptor {
        match self {
            Self::Variable(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            Self::Parametric { raw, args } => Self::Parametric {
                raw: *raw,
                args: args.iter().map(|arg| arg.substitute(map)).collect(),
            },
            Self::Array(elem) => Self::Array(Box::new(elem.substitute(map))),
            _ => self.clone(),
        }
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(info) => Display::fmt(info, f),
            Self::Primitive(kind) => f.write_str(kind.name()),
            Self::Parametric { raw, args } => {
                if *raw == crate::provider_of::provider_raw() {
                    f.write_str("Provider")?;
                } else {
                    Display::fmt(raw, f)?;
                }
                f.write_str("<")?;
                for (ix, arg) in args.iter().enumerate() {
                    if ix > 0 {
                        f.write_str(", ")?;
                    }
                    Display::fmt(arg, f)?;
                }
                f.write_str(">")
            }
            Self::Array(elem) => write!(f, "[{elem}]"),
            Self::Variable(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{PrimitiveKind, TypeDescriptor};
    use crate::any::TypeInfo;

    struct Foo;

    #[test]
    fn test_primitive_canonicalisation() {
        assert_eq!(TypeDescriptor::of::<i32>(), TypeDescriptor::primitive(PrimitiveKind::I32));
        assert_eq!(TypeDescriptor::of::<bool>(), TypeDescriptor::primitive(PrimitiveKind::Bool));
        assert_ne!(TypeDescriptor::of::<i32>(), TypeDescriptor::of::<i64>());
        assert_eq!(TypeDescriptor::of::<Foo>(), TypeDescriptor::Simple(TypeInfo::of::<Foo>()));
    }

    #[test]
    fn test_raw_projection() {
        assert_eq!(TypeDescriptor::of::<Foo>().raw(), Some(TypeInfo::of::<Foo>()));
        assert_eq!(TypeDescriptor::of::<i32>().raw(), Some(TypeInfo::of::<i32>()));

        let parametric = TypeDescriptor::parametric(TypeInfo::of::<Foo>(), vec![TypeDescriptor::of::<i32>()]);
        assert_eq!(parametric.raw(), Some(TypeInfo::of::<Foo>()));

        assert_eq!(TypeDescriptor::variable("T").raw(), None);
        assert_eq!(TypeDescriptor::array(TypeDescriptor::of::<i32>()).raw(), None);
    }

    #[test]
    fn test_substitute() {
        let map = BTreeMap::from([("T", TypeDescriptor::of::<i32>())]);

        let parametric = TypeDescriptor::parametric(TypeInfo::of::<Foo>(), vec![TypeDescriptor::variable("T")]);
        let substituted = parametric.substitute(&map);
        assert_eq!(
            substituted,
            TypeDescriptor::parametric(TypeInfo::of::<Foo>(), vec![TypeDescriptor::of::<i32>()])
        );

        let unbound = TypeDescriptor::variable("U").substitute(&map);
        assert_eq!(unbound, TypeDescriptor::variable("U"));
    }

    #[test]
    fn test_assignability() {
        let concrete = TypeDescriptor::parametric(TypeInfo::of::<Foo>(), vec![TypeDescriptor::of::<i32>()]);
        let open = TypeDescriptor::parametric(TypeInfo::of::<Foo>(), vec![TypeDescriptor::variable("T")]);

        assert!(open.is_assignable_from(&concrete));
        assert!(!concrete.is_assignable_from(&open));
        assert!(concrete.is_assignable_from(&concrete));
    }
}
