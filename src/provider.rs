use core::any::Any;
use std::sync::Arc;

use crate::{context::ProvisionContext, errors::ProvisionErrorKind};

/// A provisioned value, type-erased and shareable.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub type ProvideResult = Result<Instance, ProvisionErrorKind>;

/// Opaque producer of values for one key, parameterised by the provisioning
/// context.
pub trait Provide: Send + Sync {
    fn provide(&self, cx: &mut ProvisionContext) -> ProvideResult;
}

pub(crate) trait CloneProvide: Provide {
    #[must_use]
    fn clone_box(&self) -> Box<dyn CloneProvide>;
}

impl<T> CloneProvide for T
where
    T: Provide + Clone + 'static,
{
    #[inline]
    fn clone_box(&self) -> Box<dyn CloneProvide> {
        Box::new(self.clone())
    }
}

/// Boxed clonable provider; the currency bindings and scopes trade in.
pub struct BoxProvider(Box<dyn CloneProvide>);

impl BoxProvider {
    #[inline]
    #[must_use]
    pub fn new<P>(provider: P) -> Self
    where
        P: Provide + Clone + 'static,
    {
        Self(Box::new(provider))
    }

    #[inline]
    #[must_use]
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut ProvisionContext) -> ProvideResult + Clone + Send + Sync + 'static,
    {
        Self::new(provider_fn(f))
    }
}

impl Clone for BoxProvider {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl Provide for BoxProvider {
    #[inline]
    fn provide(&self, cx: &mut ProvisionContext) -> ProvideResult {
        self.0.provide(cx)
    }
}

#[inline]
#[must_use]
pub(crate) const fn provider_fn<F>(f: F) -> ProviderFn<F> {
    ProviderFn { f }
}

#[derive(Clone)]
pub(crate) struct ProviderFn<F> {
    f: F,
}

impl<F> Provide for ProviderFn<F>
where
    F: Fn(&mut ProvisionContext) -> ProvideResult + Send + Sync,
{
    #[inline]
    fn provide(&self, cx: &mut ProvisionContext) -> ProvideResult {
        (self.f)(cx)
    }
}
