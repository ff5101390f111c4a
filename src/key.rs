use core::fmt::{self, Display, Formatter};
use std::borrow::Cow;

use crate::{any::TypeInfo, descriptor::TypeDescriptor};

/// Tag disambiguating multiple bindings of the same type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Qualifier {
    /// Opaque name.
    Named(Cow<'static, str>),
    /// Marker type acting as an annotation-like tagged value. Any `'static`
    /// type can serve; recognition is structural.
    Tag(TypeInfo),
}

impl Qualifier {
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Named(name.into())
    }

    #[inline]
    #[must_use]
    pub fn tag<M>() -> Self
    where
        M: ?Sized + 'static,
    {
        Self::Tag(TypeInfo::of::<M>())
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Named(name) => format!("\"{name}\""),
            Self::Tag(info) => info.short_name_without_path().to_owned(),
        }
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "named {name:?}"),
            Self::Tag(info) => write!(f, "tagged {info}"),
        }
    }
}

/// Lookup identity: a type descriptor plus an optional qualifier.
///
/// Keys are the sole currency of lookup; equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    descriptor: TypeDescriptor,
    qualifier: Option<Qualifier>,
}

impl Key {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            descriptor: TypeDescriptor::of::<T>(),
            qualifier: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn named<T>(name: impl Into<Cow<'static, str>>) -> Self
    where
        T: ?Sized + 'static,
    {
        Self::of::<T>().with_qualifier(Qualifier::named(name))
    }

    #[inline]
    #[must_use]
    pub fn tagged<T, M>() -> Self
    where
        T: ?Sized + 'static,
        M: ?Sized + 'static,
    {
        Self::of::<T>().with_qualifier(Qualifier::tag::<M>())
    }

    #[inline]
    #[must_use]
    pub fn from_descriptor(descriptor: TypeDescriptor) -> Self {
        Self { descriptor, qualifier: None }
    }

    #[inline]
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// Substitution: the same qualifier attached to another type.
    #[inline]
    #[must_use]
    pub fn with_type(self, descriptor: TypeDescriptor) -> Self {
        Self {
            descriptor,
            qualifier: self.qualifier,
        }
    }

    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    #[inline]
    #[must_use]
    pub fn raw(&self) -> Option<TypeInfo> {
        self.descriptor.raw()
    }

    #[inline]
    #[must_use]
    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }

    /// Key for "provider of `self`": same qualifier, parametric provider
    /// descriptor around the type.
    #[must_use]
    pub fn provider_of(&self) -> Self {
        Self {
            descriptor: crate::provider_of::provider_descriptor(self.descriptor.clone()),
            qualifier: self.qualifier.clone(),
        }
    }

    /// Inverse of [`Self::provider_of`]: the payload key if this key has the
    /// parametric provider form.
    #[must_use]
    pub(crate) fn provider_target(&self) -> Option<Self> {
        let TypeDescriptor::Parametric { raw, args } = &self.descriptor else {
            return None;
        };
        if *raw != crate::provider_of::provider_raw() || args.len() != 1 {
            return None;
        }
        Some(Self {
            descriptor: args[0].clone(),
            qualifier: self.qualifier.clone(),
        })
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.descriptor, f)?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, " ({qualifier})")?;
        }
        Ok(())
    }
}
