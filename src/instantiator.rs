use std::sync::Arc;

use tracing::debug;

use crate::{
    context::ProvisionContext,
    dependency::Dependency,
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ProvisionErrorKind},
    provider::{provider_fn, BoxProvider, Instance},
};

/// A user factory for one type, with its arguments described by a
/// [`DependencyResolver`].
pub trait Instantiator<Deps>: Clone + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;

    #[inline]
    #[must_use]
    fn dependencies() -> Vec<Dependency> {
        Deps::dependencies()
    }
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

/// Wrapper to create an instantiator that just returns the passed value.
/// It can be used when the value was created outside the container.
#[inline]
#[must_use]
pub const fn instance<T: Clone + 'static>(val: T) -> impl Instantiator<(), Provides = T, Error = InstantiateErrorKind> {
    move || Ok(val.clone())
}

/// Erases an instantiator into the provider currency: resolve the declared
/// dependencies, drive the factory, box the result.
#[must_use]
pub(crate) fn boxed_instantiator<Inst, Deps>(instantiator: Inst) -> BoxProvider
where
    Inst: Instantiator<Deps> + Send + Sync,
    Inst::Provides: Send + Sync,
    Deps: DependencyResolver + 'static,
{
    BoxProvider::new(provider_fn(move |cx: &mut ProvisionContext| {
        let dependencies = match Deps::resolve(cx) {
            Ok(dependencies) => dependencies,
            Err(err) => {
                return Err(ProvisionErrorKind::Instantiator(InstantiatorErrorKind::Deps(Box::new(err.into()))));
            }
        };
        let mut instantiator = instantiator.clone();
        match instantiator.instantiate(dependencies) {
            Ok(dependency) => {
                debug!("Provided");
                Ok(Arc::new(dependency) as Instance)
            }
            Err(err) => Err(ProvisionErrorKind::Instantiator(InstantiatorErrorKind::Factory(err.into()))),
        }
    }))
}
