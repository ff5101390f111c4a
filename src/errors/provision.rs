use core::{
    any::TypeId,
    fmt::{self, Display, Formatter},
};

use super::{convert::ConvertErrorKind, instantiate::InstantiateErrorKind, plan::PlanErrorKind};
use crate::{any::TypeInfo, context::InjectionPoint, key::Key};

/// Error from driving an instantiator: either a dependency failed to
/// resolve, or the factory itself failed.
#[derive(thiserror::Error, Debug)]
pub enum InstantiatorErrorKind<DepsErr, FactoryErr> {
    #[error(transparent)]
    Deps(DepsErr),
    #[error(transparent)]
    Factory(FactoryErr),
}

/// Other qualifiers under which bindings to the same raw type exist, shown
/// with missing-binding diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions(pub Vec<String>);

impl Display for Suggestions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, "; bindings to the same type exist under qualifiers: [{}]", self.0.join(", "))
    }
}

/// The keys participating in a circular construction, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(pub Box<[Key]>);

impl Display for CyclePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Some(first) = self.0.first() else {
            return Ok(());
        };
        write!(f, "\n{first}")?;
        for key in self.0.iter().skip(1) {
            write!(f, "\n  ↳ depends on {key}")?;
        }
        write!(f, "\n  ↳ depends on {first}")
    }
}

/// Runtime resolution failure.
#[derive(thiserror::Error, Debug)]
pub enum ProvisionErrorKind {
    #[error("No binding found for {key}{suggestions}")]
    NoBinding { key: Key, suggestions: Suggestions },
    #[error("Circular dependency detected:{path}")]
    CircularDependency { path: CyclePath },
    #[error("Scope \"{scope}\" is not active while provisioning {key}")]
    OutOfScope { scope: &'static str, key: Key },
    #[error("Scope \"{scope}\" configured for {key} is not bound in the container")]
    UnknownScope { scope: &'static str, key: Key },
    #[error("Binding for {key} provides the wrong type. Expected {expected}, actual type id {actual:?}")]
    IncorrectType {
        key: Key,
        expected: TypeInfo,
        actual: TypeId,
    },
    #[error("Binding for {key} is scoped or shared and cannot be provided as an owned transient")]
    NotTransient { key: Key },
    #[error(transparent)]
    Convert(#[from] ConvertErrorKind),
    #[error(transparent)]
    Plan(#[from] PlanErrorKind),
    #[error(transparent)]
    Instantiator(InstantiatorErrorKind<Box<ProvisionErrorKind>, InstantiateErrorKind>),
    #[error("{point}: {source}")]
    AtInjectionPoint {
        point: InjectionPoint,
        #[source]
        source: Box<ProvisionErrorKind>,
    },
}

impl ProvisionErrorKind {
    /// The innermost failure, with injection-point wrappers stripped.
    #[must_use]
    pub fn root(&self) -> &ProvisionErrorKind {
        match self {
            Self::AtInjectionPoint { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for failures that mean "nothing can produce this key", the
    /// condition an optional injection step swallows.
    #[must_use]
    pub(crate) fn is_missing_binding(&self) -> bool {
        matches!(self, Self::NoBinding { .. })
    }
}
