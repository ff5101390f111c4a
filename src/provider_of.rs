use core::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};
use std::sync::Arc;

use crate::{
    any::TypeInfo,
    container::Container,
    context::ProvisionContext,
    dependency::Dependency,
    dependency_resolver::DependencyResolver,
    descriptor::TypeDescriptor,
    errors::ProvisionErrorKind,
    key::Key,
};

/// Marker behind the parametric "provider of T" descriptor form.
pub(crate) enum ProviderMarker {}

#[inline]
#[must_use]
pub(crate) fn provider_raw() -> TypeInfo {
    TypeInfo::of::<ProviderMarker>()
}

#[inline]
#[must_use]
pub(crate) fn provider_descriptor(payload: TypeDescriptor) -> TypeDescriptor {
    TypeDescriptor::parametric(provider_raw(), vec![payload])
}

/// Bound accessor for one key: each [`get`](Self::get) runs the full
/// resolution mechanism, so an unscoped payload yields a fresh instance per
/// call and the payload is not materialised until then.
///
/// Declaring a `Provider<T>` argument instead of [`Inject<T>`](crate::Inject)
/// also breaks construction cycles, because the handle is created without
/// constructing `T`.
pub struct Provider<T> {
    container: Container,
    key: Key,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Debug for Provider<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("key", &self.key).finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Provider<T> {
    #[must_use]
    pub(crate) fn new(container: Container, key: Key) -> Self {
        Self {
            container,
            key,
            _marker: PhantomData,
        }
    }

    /// Resolves the payload now.
    pub fn get(&self) -> Result<Arc<T>, ProvisionErrorKind> {
        self.container.get_instance_by_key(self.key.clone())
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl<T: Send + Sync + 'static> DependencyResolver for Provider<T> {
    type Error = ProvisionErrorKind;

    fn resolve(cx: &mut ProvisionContext) -> Result<Self, Self::Error> {
        cx.provider()
    }

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::lazy(Key::of::<T>())]
    }
}

/// Untyped provider handle: what the resolver materialises when asked for a
/// parametric provider-of key directly.
#[derive(Clone)]
pub struct UntypedProvider {
    container: Container,
    key: Key,
}

impl UntypedProvider {
    #[must_use]
    pub(crate) fn new(container: Container, key: Key) -> Self {
        Self { container, key }
    }

    /// Resolves the payload now, type-erased.
    pub fn get(&self) -> Result<crate::provider::Instance, ProvisionErrorKind> {
        self.container.provision_untyped(&self.key)
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }
}
