use core::{any::TypeId, fmt::Display, str::FromStr};
use std::{collections::BTreeMap, sync::Arc};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::{
    descriptor::{PrimitiveKind, TypeDescriptor},
    errors::ConvertErrorKind,
    provider::Instance,
};

type ConvertFn = Box<dyn Fn(&str) -> Result<Instance, ConvertErrorKind> + Send + Sync>;

/// Converts configured string constants into target values on demand.
///
/// Built-in targets are the primitive lexical forms, `char` (trimmed single
/// character) and [`TypeDescriptor`] itself (resolved by fully-qualified
/// type name against the sealed container's known types). Further targets,
/// enumerations included, register through their [`FromStr`] impls.
pub(crate) struct ConstantConverter {
    targets: BTreeMap<TypeId, ConvertFn>,
    type_names: OnceCell<BTreeMap<String, TypeDescriptor>>,
}

impl ConstantConverter {
    #[must_use]
    pub(crate) fn with_defaults() -> Self {
        let mut converter = Self {
            targets: BTreeMap::new(),
            type_names: OnceCell::new(),
        };
        converter.register_parse::<bool>();
        converter.register_parse::<i8>();
        converter.register_parse::<i16>();
        converter.register_parse::<i32>();
        converter.register_parse::<i64>();
        converter.register_parse::<i128>();
        converter.register_parse::<isize>();
        converter.register_parse::<u8>();
        converter.register_parse::<u16>();
        converter.register_parse::<u32>();
        converter.register_parse::<u64>();
        converter.register_parse::<u128>();
        converter.register_parse::<usize>();
        converter.register_parse::<f32>();
        converter.register_parse::<f64>();
        converter.targets.insert(
            TypeId::of::<char>(),
            Box::new(|value| {
                let trimmed = value.trim();
                let mut chars = trimmed.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(Arc::new(ch) as Instance),
                    _ => Err(ConvertErrorKind::NotSingleChar { value: value.to_owned() }),
                }
            }),
        );
        converter
    }

    pub(crate) fn register_parse<T>(&mut self)
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: Display,
    {
        self.targets.insert(
            TypeId::of::<T>(),
            Box::new(|value| {
                value.parse::<T>().map(|parsed| Arc::new(parsed) as Instance).map_err(|err| {
                    ConvertErrorKind::Parse {
                        value: value.to_owned(),
                        target: TypeDescriptor::of::<T>(),
                        reason: err.to_string(),
                    }
                })
            }),
        );
    }

    /// Known type names become resolvable once, when the container seals.
    pub(crate) fn install_type_names(&self, names: BTreeMap<String, TypeDescriptor>) {
        let _ = self.type_names.set(names);
    }

    #[must_use]
    pub(crate) fn supports(&self, target: &TypeDescriptor) -> bool {
        match target.raw() {
            Some(info) => info.id == TypeId::of::<TypeDescriptor>() || self.targets.contains_key(&info.id),
            None => false,
        }
    }

    pub(crate) fn convert(&self, value: &str, target: &TypeDescriptor) -> Result<Instance, ConvertErrorKind> {
        let Some(raw) = target.raw() else {
            return Err(ConvertErrorKind::UnsupportedTarget { target: target.clone() });
        };

        if raw.id == TypeId::of::<TypeDescriptor>() {
            let resolved = self
                .type_names
                .get()
                .and_then(|names| names.get(value.trim()))
                .cloned()
                .ok_or_else(|| ConvertErrorKind::UnknownTypeName { value: value.to_owned() })?;
            debug!(%value, "Type name resolved");
            return Ok(Arc::new(resolved) as Instance);
        }

        match self.targets.get(&raw.id) {
            Some(convert) => convert(value),
            None => Err(ConvertErrorKind::UnsupportedTarget { target: target.clone() }),
        }
    }
}

/// Names every descriptor is known under, for the type-name conversion
/// target. Primitives resolve under their canonical spellings.
#[must_use]
pub(crate) fn primitive_type_names() -> BTreeMap<String, TypeDescriptor> {
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

    ALL.into_iter()
        .map(|kind| (kind.name().to_owned(), TypeDescriptor::primitive(kind)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::ConstantConverter;
    use crate::{
        descriptor::{PrimitiveKind, TypeDescriptor},
        errors::ConvertErrorKind,
    };

    #[derive(Debug, PartialEq, Eq)]
    enum Mode {
        Fast,
        Safe,
    }

    impl core::str::FromStr for Mode {
        type Err = String;

        fn from_str(value: &str) -> Result<Self, Self::Err> {
            match value {
                "Fast" => Ok(Self::Fast),
                "Safe" => Ok(Self::Safe),
                other => Err(format!("no member named {other}")),
            }
        }
    }

    #[test]
    fn test_numeric_targets() {
        let converter = ConstantConverter::with_defaults();

        let int = converter.convert("5", &TypeDescriptor::of::<i32>()).unwrap();
        assert_eq!(*int.downcast::<i32>().unwrap(), 5);

        let float = converter.convert("2.5", &TypeDescriptor::of::<f64>()).unwrap();
        assert_eq!(*float.downcast::<f64>().unwrap(), 2.5);

        let flag = converter.convert("true", &TypeDescriptor::of::<bool>()).unwrap();
        assert!(*flag.downcast::<bool>().unwrap());
    }

    #[test]
    fn test_primitive_and_concrete_spelling_share_target() {
        let converter = ConstantConverter::with_defaults();

        let abstract_target = TypeDescriptor::primitive(PrimitiveKind::U16);
        let value = converter.convert("80", &abstract_target).unwrap();
        assert_eq!(*value.downcast::<u16>().unwrap(), 80);
    }

    #[test]
    fn test_char_target_trims_and_requires_single() {
        let converter = ConstantConverter::with_defaults();

        let ch = converter.convert("  x ", &TypeDescriptor::of::<char>()).unwrap();
        assert_eq!(*ch.downcast::<char>().unwrap(), 'x');

        let err = converter.convert("xy", &TypeDescriptor::of::<char>()).unwrap_err();
        assert!(matches!(err, ConvertErrorKind::NotSingleChar { .. }));
    }

    #[test]
    fn test_parse_failure_carries_value_and_target() {
        let converter = ConstantConverter::with_defaults();

        let err = converter.convert("five", &TypeDescriptor::of::<i32>()).unwrap_err();
        match err {
            ConvertErrorKind::Parse { value, target, .. } => {
                assert_eq!(value, "five");
                assert_eq!(target, TypeDescriptor::of::<i32>());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_registered_enum_target() {
        let mut converter = ConstantConverter::with_defaults();
        converter.register_parse::<Mode>();

        let mode = converter.convert("Safe", &TypeDescriptor::of::<Mode>()).unwrap();
        assert_eq!(*mode.downcast::<Mode>().unwrap(), Mode::Safe);

        let err = converter.convert("Slow", &TypeDescriptor::of::<Mode>()).unwrap_err();
        assert!(matches!(err, ConvertErrorKind::Parse { .. }));
    }

    #[test]
    fn test_unsupported_target() {
        struct Opaque;

        let converter = ConstantConverter::with_defaults();
        assert!(!converter.supports(&TypeDescriptor::of::<Opaque>()));
        let err = converter.convert("x", &TypeDescriptor::of::<Opaque>()).unwrap_err();
        assert!(matches!(err, ConvertErrorKind::UnsupportedTarget { .. }));
    }

    #[test]
    fn test_type_name_target() {
        struct Service;

        let converter = ConstantConverter::with_defaults();
        let mut names = super::primitive_type_names();
        names.insert(core::any::type_name::<Service>().to_owned(), TypeDescriptor::of::<Service>());
        converter.install_type_names(names);

        let target = TypeDescriptor::of::<TypeDescriptor>();
        let resolved = converter.convert(core::any::type_name::<Service>(), &target).unwrap();
        assert_eq!(*resolved.downcast::<TypeDescriptor>().unwrap(), TypeDescriptor::of::<Service>());

        let resolved = converter.convert("i32", &target).unwrap();
        assert_eq!(*resolved.downcast::<TypeDescriptor>().unwrap(), TypeDescriptor::of::<i32>());

        let err = converter.convert("nope::Missing", &target).unwrap_err();
        assert!(matches!(err, ConvertErrorKind::UnknownTypeName { .. }));
    }
}
