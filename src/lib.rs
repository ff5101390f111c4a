//! Runtime dependency-injection container.
//!
//! A [`ContainerBuilder`] collects bindings — rules mapping a [`Key`] (type
//! plus optional [`Qualifier`]) to a construction strategy and a scope —
//! and seals them into an immutable [`Container`]. Resolution walks the
//! binding graph, drives registered injection plans (constructor plus
//! member steps), converts string constants on demand, synthesises implicit
//! bindings for types with registered plans, and breaks circular
//! construction with deferred-reference proxies.

#[macro_use]
mod macros;

mod any;
mod binder;
mod binding;
mod cache;
mod collector;
mod container;
mod context;
mod convert;
mod deferred;
mod dependency;
mod dependency_resolver;
mod descriptor;
mod errors;
mod inject;
mod instantiator;
mod key;
mod plan;
mod provider;
mod provider_of;
mod resolver;
mod scope;

pub use any::TypeInfo;
pub use binder::{BindingBuilder, ContainerBuilder, Module};
pub use binding::Binding;
pub use container::Container;
pub use context::{InjectionPoint, MemberKind, ProvisionContext};
pub use deferred::Deferred;
pub use dependency::{Dependency, DependencyEdge};
pub use dependency_resolver::DependencyResolver;
pub use descriptor::{PrimitiveKind, TypeDescriptor};
pub use errors::{
    ConvertErrorKind, CyclePath, InstantiateErrorKind, InstantiatorErrorKind, Message, PlanErrorKind, ProvisionErrorKind,
    SealErrorKind, Suggestions,
};
pub use inject::{Inject, InjectTransient};
pub use instantiator::{instance, Instantiator};
pub use key::{Key, Qualifier};
pub use plan::{InjectionPlan, PlanBuilder};
pub use provider::{BoxProvider, Instance, Provide};
pub use provider_of::{Provider, UntypedProvider};
pub use scope::{LoadStrategy, LocalScope, LocalScopeGuard, Scope, ScopePolicy, ScopeStorage, ScopeStrategy, Stage};
