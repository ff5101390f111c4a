use std::{borrow::Cow, collections::BTreeMap, sync::Arc};

use crate::{
    any::TypeInfo,
    binding::{Binding, BindingTable},
    cache::ComputeCache,
    context::ProvisionContext,
    convert::ConstantConverter,
    errors::ProvisionErrorKind,
    key::{Key, Qualifier},
    plan::PlanStore,
    provider::{Instance, ProvideResult},
    provider_of::Provider,
    resolver,
    scope::{Scope, ScopeStrategy, SingletonScope, Stage},
};

/// The sealed container: public entry points over the binding table, the
/// injection-plan engine and the scope machinery.
///
/// Cloning is cheap and shares the container; it is usable from any number
/// of threads.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").finish_non_exhaustive()
    }
}

pub(crate) struct ContainerInner {
    pub(crate) table: BindingTable,
    pub(crate) plans: PlanStore,
    pub(crate) jit: ComputeCache<Key, Binding>,
    pub(crate) constants: ComputeCache<Key, Instance>,
    pub(crate) scopes: BTreeMap<&'static str, Arc<dyn Scope>>,
    pub(crate) singleton: SingletonScope,
    pub(crate) converter: ConstantConverter,
    pub(crate) strategy: Option<Arc<dyn ScopeStrategy>>,
    pub(crate) stage: Stage,
}

impl Container {
    fn context(&self) -> ProvisionContext {
        ProvisionContext::new(self.clone())
    }

    /// Resolves a value through the full mechanism, honouring scope.
    pub fn get_instance<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ProvisionErrorKind> {
        self.get_instance_by_key(Key::of::<T>())
    }

    /// Resolves a value under a name qualifier.
    pub fn get_instance_named<T: Send + Sync + 'static>(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> Result<Arc<T>, ProvisionErrorKind> {
        self.get_instance_by_key(Key::of::<T>().with_qualifier(Qualifier::named(name)))
    }

    pub fn get_instance_by_key<T: Send + Sync + 'static>(&self, key: Key) -> Result<Arc<T>, ProvisionErrorKind> {
        self.context().get_by_key(key)
    }

    /// Resolves an owned fresh instance from an unscoped binding.
    ///
    /// Fails with [`ProvisionErrorKind::NotTransient`] for scoped bindings,
    /// so scope identity can never be bypassed accidentally.
    pub fn get_transient<T: Send + Sync + 'static>(&self) -> Result<T, ProvisionErrorKind> {
        self.context().get_transient()
    }

    pub fn get_transient_by_key<T: Send + Sync + 'static>(&self, key: Key) -> Result<T, ProvisionErrorKind> {
        self.context().get_transient_by_key(key)
    }

    /// A bound accessor that runs the full mechanism on every
    /// [`get`](Provider::get); the payload is not materialised until then.
    pub fn get_provider<T: Send + Sync + 'static>(&self) -> Result<Provider<T>, ProvisionErrorKind> {
        self.get_provider_by_key(Key::of::<T>())
    }

    pub fn get_provider_by_key<T: Send + Sync + 'static>(&self, key: Key) -> Result<Provider<T>, ProvisionErrorKind> {
        resolver::ensure_resolvable(self, &key)?;
        Ok(Provider::new(self.clone(), key))
    }

    /// Applies the member levels of `T`'s injection plan to a pre-existing
    /// instance, without running a constructor. Calling it twice applies the
    /// plan twice.
    pub fn inject_members<T: 'static>(&self, target: &T) -> Result<(), ProvisionErrorKind> {
        resolver::inject_members_dyn(&mut self.context(), TypeInfo::of::<T>(), target)
    }

    /// All bindings whose raw type is `raw`, in configuration-insertion
    /// order.
    #[must_use]
    pub fn find_bindings_by_type(&self, raw: TypeInfo) -> Vec<&Binding> {
        self.inner.table.find_by_raw_type(&raw)
    }

    #[must_use]
    pub fn find_bindings<T: ?Sized + 'static>(&self) -> Vec<&Binding> {
        self.find_bindings_by_type(TypeInfo::of::<T>())
    }

    /// Every binding, in configuration-insertion order.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.inner.table.iter()
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.inner.stage
    }

    /// Keyed, type-erased resolution; backs untyped provider handles and
    /// seal-time eager construction.
    pub(crate) fn provision_untyped(&self, key: &Key) -> ProvideResult {
        resolver::resolve(&mut self.context(), key)
    }
}
