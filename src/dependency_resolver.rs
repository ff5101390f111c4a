use crate::{context::ProvisionContext, dependency::Dependency, errors::ProvisionErrorKind};

/// How an instantiator argument obtains itself from the provisioning
/// context, and which dependency keys doing so requires.
pub trait DependencyResolver: Sized {
    type Error: Into<ProvisionErrorKind>;

    fn resolve(cx: &mut ProvisionContext) -> Result<Self, Self::Error>;

    /// The keys this resolver consumes, for seal-time validation and cycle
    /// analysis.
    fn dependencies() -> Vec<Dependency>;
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ProvisionErrorKind;

            #[inline]
            fn resolve(cx: &mut ProvisionContext) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(cx).map_err(Into::into)?,)*))
            }

            #[inline]
            fn dependencies() -> Vec<Dependency> {
                let mut dependencies = Vec::new();
                $( dependencies.extend($ty::dependencies()); )*
                dependencies
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
