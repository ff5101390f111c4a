use std::sync::Arc;

use crate::{
    context::ProvisionContext, dependency::Dependency, dependency_resolver::DependencyResolver, errors::ProvisionErrorKind, key::Key,
};

/// Shared dependency resolved through the full mechanism, honouring scope.
pub struct Inject<Dep>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    type Error = ProvisionErrorKind;

    fn resolve(cx: &mut ProvisionContext) -> Result<Self, Self::Error> {
        cx.get().map(Self)
    }

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::hard(Key::of::<Dep>())]
    }
}

/// Owned fresh dependency from an unscoped binding.
pub struct InjectTransient<Dep>(pub Dep);

impl<Dep: Send + Sync + 'static> DependencyResolver for InjectTransient<Dep> {
    type Error = ProvisionErrorKind;

    fn resolve(cx: &mut ProvisionContext) -> Result<Self, Self::Error> {
        cx.get_transient().map(Self)
    }

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::hard(Key::of::<Dep>())]
    }
}

/// Optional dependency: absent when no binding can produce the key, instead
/// of failing resolution.
impl<Dep: Send + Sync + 'static> DependencyResolver for Option<Inject<Dep>> {
    type Error = ProvisionErrorKind;

    fn resolve(cx: &mut ProvisionContext) -> Result<Self, Self::Error> {
        match cx.get().map(Inject) {
            Ok(dependency) => Ok(Some(dependency)),
            Err(err) if err.is_missing_binding() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::hard(Key::of::<Dep>()).with_optional(true)]
    }
}
