use core::{
    any::{Any, TypeId},
    marker::PhantomData,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    any::TypeInfo,
    cache::ComputeCache,
    context::{MemberKind, ProvisionContext},
    dependency::Dependency,
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, PlanErrorKind, ProvisionErrorKind},
    instantiator::Instantiator,
    key::Key,
    provider::Instance,
    scope::ScopePolicy,
};

#[derive(Clone)]
pub(crate) struct CtorStep {
    pub(crate) label: &'static str,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) construct: Arc<dyn Fn(&mut ProvisionContext) -> Result<Instance, ProvisionErrorKind> + Send + Sync>,
}

pub(crate) struct MemberStep {
    pub(crate) kind: MemberKind,
    pub(crate) member: &'static str,
    pub(crate) optional: bool,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) apply: Box<dyn Fn(&dyn Any, &mut ProvisionContext) -> Result<(), ProvisionErrorKind> + Send + Sync>,
}

pub(crate) struct StaticStep {
    pub(crate) label: &'static str,
    pub(crate) run: Box<dyn Fn(&mut ProvisionContext) -> Result<(), ProvisionErrorKind> + Send + Sync>,
}

/// The registered injection recipe for one type: at most one constructor,
/// member steps in declaration order, optional parent plan and scope
/// annotation.
///
/// Built through [`PlanBuilder`]; the reflectionless replacement for member
/// discovery.
pub struct InjectionPlan {
    pub(crate) type_info: TypeInfo,
    pub(crate) parent: Option<TypeInfo>,
    pub(crate) ctor: Option<CtorStep>,
    pub(crate) ctor_conflict: Option<(&'static str, &'static str)>,
    pub(crate) fields: Vec<Arc<MemberStep>>,
    pub(crate) methods: Vec<Arc<MemberStep>>,
    pub(crate) statics: Vec<Arc<StaticStep>>,
    pub(crate) scope: Option<ScopePolicy>,
}

impl InjectionPlan {
    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }
}

/// Registrar DSL for [`InjectionPlan`]s.
///
/// Member `apply` closures receive `&T`: by the time member injection runs
/// the instance is already installed in its construction frame and may be
/// shared with cyclic dependants, so injectable members use interior
/// mutability.
pub struct PlanBuilder<T> {
    plan: InjectionPlan,
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + Sync + 'static> Default for PlanBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> PlanBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            plan: InjectionPlan {
                type_info: TypeInfo::of::<T>(),
                parent: None,
                ctor: None,
                ctor_conflict: None,
                fields: Vec::new(),
                methods: Vec::new(),
                statics: Vec::new(),
                scope: None,
            },
            _marker: PhantomData,
        }
    }

    /// Declares a parent plan whose member steps run before this type's, so
    /// the compiled plan contains the parent's levels as a strict prefix.
    #[must_use]
    pub fn extends<P: 'static>(mut self) -> Self {
        self.plan.parent = Some(TypeInfo::of::<P>());
        self
    }

    /// The type's scope annotation analog, consumed when an implicit binding
    /// is synthesised from this plan.
    #[must_use]
    pub fn in_scope(mut self, policy: ScopePolicy) -> Self {
        self.plan.scope = Some(policy);
        self
    }

    /// Registers the constructor. A second registration invalidates the
    /// plan; the diagnostic names both labels.
    #[must_use]
    pub fn constructor<Inst, Deps>(mut self, label: &'static str, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T> + Send + Sync,
        Deps: DependencyResolver + 'static,
    {
        if let Some(existing) = &self.plan.ctor {
            if self.plan.ctor_conflict.is_none() {
                self.plan.ctor_conflict = Some((existing.label, label));
            }
            return self;
        }
        let dependencies = Inst::dependencies();
        let construct = Arc::new(move |cx: &mut ProvisionContext| {
            let dependencies = Deps::resolve(cx)
                .map_err(|err| ProvisionErrorKind::Instantiator(InstantiatorErrorKind::Deps(Box::new(err.into()))))?;
            let mut instantiator = instantiator.clone();
            let value = instantiator
                .instantiate(dependencies)
                .map_err(|err| ProvisionErrorKind::Instantiator(InstantiatorErrorKind::Factory(err.into())))?;
            Ok(Arc::new(value) as Instance)
        });
        self.plan.ctor = Some(CtorStep {
            label,
            dependencies,
            construct,
        });
        self
    }

    /// Constructor with explicitly declared dependencies, for arguments that
    /// need qualifiers.
    #[must_use]
    pub fn constructor_ctx<F>(mut self, label: &'static str, dependencies: Vec<Dependency>, f: F) -> Self
    where
        F: Fn(&mut ProvisionContext) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        if let Some(existing) = &self.plan.ctor {
            if self.plan.ctor_conflict.is_none() {
                self.plan.ctor_conflict = Some((existing.label, label));
            }
            return self;
        }
        let construct = Arc::new(move |cx: &mut ProvisionContext| {
            f(cx)
                .map(|value| Arc::new(value) as Instance)
                .map_err(|err| ProvisionErrorKind::Instantiator(InstantiatorErrorKind::Factory(err)))
        });
        self.plan.ctor = Some(CtorStep {
            label,
            dependencies,
            construct,
        });
        self
    }

    #[must_use]
    pub fn field<D, F>(self, member: &'static str, apply: F) -> Self
    where
        D: DependencyResolver + 'static,
        F: Fn(&T, D) + Send + Sync + 'static,
    {
        self.push_resolved_member::<D, F>(MemberKind::Field, member, false, apply)
    }

    /// Field step skipped instead of failing when nothing can produce its
    /// dependencies.
    #[must_use]
    pub fn optional_field<D, F>(self, member: &'static str, apply: F) -> Self
    where
        D: DependencyResolver + 'static,
        F: Fn(&T, D) + Send + Sync + 'static,
    {
        self.push_resolved_member::<D, F>(MemberKind::Field, member, true, apply)
    }

    /// Field step with an explicit key, for qualified dependencies.
    #[must_use]
    pub fn field_with<Dep, F>(self, member: &'static str, key: Key, apply: F) -> Self
    where
        Dep: Send + Sync + 'static,
        F: Fn(&T, Arc<Dep>) + Send + Sync + 'static,
    {
        self.push_keyed_member(MemberKind::Field, member, false, key, apply)
    }

    #[must_use]
    pub fn optional_field_with<Dep, F>(self, member: &'static str, key: Key, apply: F) -> Self
    where
        Dep: Send + Sync + 'static,
        F: Fn(&T, Arc<Dep>) + Send + Sync + 'static,
    {
        self.push_keyed_member(MemberKind::Field, member, true, key, apply)
    }

    #[must_use]
    pub fn method<D, F>(self, member: &'static str, apply: F) -> Self
    where
        D: DependencyResolver + 'static,
        F: Fn(&T, D) + Send + Sync + 'static,
    {
        self.push_resolved_member::<D, F>(MemberKind::Method, member, false, apply)
    }

    #[must_use]
    pub fn optional_method<D, F>(self, member: &'static str, apply: F) -> Self
    where
        D: DependencyResolver + 'static,
        F: Fn(&T, D) + Send + Sync + 'static,
    {
        self.push_resolved_member::<D, F>(MemberKind::Method, member, true, apply)
    }

    /// Static step, run once at seal time when this type was handed to
    /// [`request_static_injection`](crate::ContainerBuilder::request_static_injection).
    #[must_use]
    pub fn static_member<F>(mut self, label: &'static str, run: F) -> Self
    where
        F: Fn(&mut ProvisionContext) -> Result<(), ProvisionErrorKind> + Send + Sync + 'static,
    {
        self.plan.statics.push(Arc::new(StaticStep { label, run: Box::new(run) }));
        self
    }

    #[must_use]
    pub fn build(self) -> InjectionPlan {
        self.plan
    }

    fn push_resolved_member<D, F>(mut self, kind: MemberKind, member: &'static str, optional: bool, apply: F) -> Self
    where
        D: DependencyResolver + 'static,
        F: Fn(&T, D) + Send + Sync + 'static,
    {
        let dependencies = D::dependencies()
            .into_iter()
            .map(|dependency| {
                let declared_optional = dependency.optional;
                dependency.as_member().with_optional(declared_optional || optional)
            })
            .collect();
        let step = MemberStep {
            kind,
            member,
            optional,
            dependencies,
            apply: Box::new(move |target, cx| {
                let target = downcast_target::<T>(target)?;
                let dependencies = D::resolve(cx).map_err(Into::into)?;
                apply(target, dependencies);
                Ok(())
            }),
        };
        self.push_member(kind, step);
        self
    }

    fn push_keyed_member<Dep, F>(mut self, kind: MemberKind, member: &'static str, optional: bool, key: Key, apply: F) -> Self
    where
        Dep: Send + Sync + 'static,
        F: Fn(&T, Arc<Dep>) + Send + Sync + 'static,
    {
        let dependencies = vec![Dependency::member(key.clone()).with_optional(optional)];
        let step = MemberStep {
            kind,
            member,
            optional,
            dependencies,
            apply: Box::new(move |target, cx| {
                let target = downcast_target::<T>(target)?;
                let dependency = cx.get_by_key::<Dep>(key.clone())?;
                apply(target, dependency);
                Ok(())
            }),
        };
        self.push_member(kind, step);
        self
    }

    fn push_member(&mut self, kind: MemberKind, step: MemberStep) {
        match kind {
            MemberKind::Field => self.plan.fields.push(Arc::new(step)),
            _ => self.plan.methods.push(Arc::new(step)),
        }
    }
}

fn downcast_target<T: 'static>(target: &dyn Any) -> Result<&T, ProvisionErrorKind> {
    target.downcast_ref::<T>().ok_or_else(|| ProvisionErrorKind::IncorrectType {
        key: Key::of::<T>(),
        expected: TypeInfo::of::<T>(),
        actual: target.type_id(),
    })
}

/// One class level of a compiled plan: its fields, then its methods, in
/// declaration order.
pub(crate) struct MemberLevel {
    pub(crate) type_info: TypeInfo,
    pub(crate) fields: Vec<Arc<MemberStep>>,
    pub(crate) methods: Vec<Arc<MemberStep>>,
}

/// A plan flattened against its parent chain: ancestor levels first.
pub(crate) struct CompiledPlan {
    pub(crate) type_info: TypeInfo,
    pub(crate) ctor: Option<CtorStep>,
    pub(crate) levels: Vec<MemberLevel>,
    pub(crate) statics: Vec<Arc<StaticStep>>,
    pub(crate) scope: Option<ScopePolicy>,
}

impl std::fmt::Debug for CompiledPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPlan").field("type_info", &self.type_info).finish_non_exhaustive()
    }
}

impl CompiledPlan {
    /// Every key this plan consumes, constructor first.
    #[must_use]
    pub(crate) fn dependencies(&self) -> Vec<Dependency> {
        let mut dependencies: Vec<Dependency> = self.ctor.as_ref().map(|ctor| ctor.dependencies.clone()).unwrap_or_default();
        for level in &self.levels {
            for step in level.fields.iter().chain(level.methods.iter()) {
                dependencies.extend(step.dependencies.iter().cloned());
            }
        }
        dependencies
    }
}

fn compile(registry: &BTreeMap<TypeId, InjectionPlan>, info: TypeInfo) -> Result<CompiledPlan, PlanErrorKind> {
    let plan = registry.get(&info.id).ok_or(PlanErrorKind::NoPlan { type_info: info })?;
    if let Some((first, second)) = plan.ctor_conflict {
        return Err(PlanErrorKind::DuplicateConstructor {
            type_info: plan.type_info,
            first,
            second,
        });
    }

    let mut chain = vec![plan];
    let mut seen = BTreeSet::from([info.id]);
    let mut current = plan;
    while let Some(parent_info) = current.parent {
        if !seen.insert(parent_info.id) {
            return Err(PlanErrorKind::ParentCycle { type_info: plan.type_info });
        }
        current = registry.get(&parent_info.id).ok_or(PlanErrorKind::UnknownParent {
            type_info: current.type_info,
            parent: parent_info,
        })?;
        chain.push(current);
    }

    let levels = chain
        .iter()
        .rev()
        .map(|level_plan| MemberLevel {
            type_info: level_plan.type_info,
            fields: level_plan.fields.clone(),
            methods: level_plan.methods.clone(),
        })
        .collect();

    Ok(CompiledPlan {
        type_info: plan.type_info,
        ctor: plan.ctor.clone(),
        levels,
        statics: plan.statics.clone(),
        scope: plan.scope,
    })
}

/// Registered plans plus their compiled forms, memoised at most once per
/// type.
pub(crate) struct PlanStore {
    registry: BTreeMap<TypeId, InjectionPlan>,
    compiled: ComputeCache<TypeId, Arc<CompiledPlan>>,
}

impl PlanStore {
    #[must_use]
    pub(crate) fn new(registry: BTreeMap<TypeId, InjectionPlan>) -> Self {
        Self {
            registry,
            compiled: ComputeCache::new(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_registered(&self, id: TypeId) -> bool {
        self.registry.contains_key(&id)
    }

    pub(crate) fn plan_for(&self, info: TypeInfo) -> Result<Arc<CompiledPlan>, PlanErrorKind> {
        self.compiled.get_or_try_create(&info.id, || compile(&self.registry, info).map(Arc::new))
    }

    pub(crate) fn registered_types(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.registry.values().map(|plan| plan.type_info)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{PlanBuilder, PlanStore};
    use crate::{
        any::TypeInfo,
        errors::{InstantiateErrorKind, PlanErrorKind},
        inject::Inject,
        scope::ScopePolicy,
    };

    struct Base;
    struct Derived;
    struct Dep;

    fn store(plans: Vec<crate::plan::InjectionPlan>) -> PlanStore {
        PlanStore::new(BTreeMap::from_iter(plans.into_iter().map(|plan| (plan.type_info.id, plan))))
    }

    #[test]
    fn test_parent_levels_are_strict_prefix() {
        let base = PlanBuilder::<Base>::new()
            .constructor("Base::new", || Ok::<_, InstantiateErrorKind>(Base))
            .field::<Inject<Dep>, _>("base_dep", |_, _| {})
            .method::<Inject<Dep>, _>("base_setup", |_, _| {})
            .build();
        let derived = PlanBuilder::<Derived>::new()
            .extends::<Base>()
            .constructor("Derived::new", || Ok::<_, InstantiateErrorKind>(Derived))
            .field::<Inject<Dep>, _>("derived_dep", |_, _| {})
            .build();

        let store = store(vec![base, derived]);
        let base_plan = store.plan_for(TypeInfo::of::<Base>()).unwrap();
        let derived_plan = store.plan_for(TypeInfo::of::<Derived>()).unwrap();

        assert_eq!(base_plan.levels.len(), 1);
        assert_eq!(derived_plan.levels.len(), 2);
        assert_eq!(derived_plan.levels[0].type_info, TypeInfo::of::<Base>());
        assert_eq!(derived_plan.levels[0].fields.len(), 1);
        assert_eq!(derived_plan.levels[0].fields[0].member, "base_dep");
        assert_eq!(derived_plan.levels[0].methods[0].member, "base_setup");
        assert_eq!(derived_plan.levels[1].type_info, TypeInfo::of::<Derived>());
        assert_eq!(derived_plan.levels[1].fields[0].member, "derived_dep");
    }

    #[test]
    fn test_duplicate_constructor_names_both() {
        let plan = PlanBuilder::<Base>::new()
            .constructor("Base::new", || Ok::<_, InstantiateErrorKind>(Base))
            .constructor("Base::with_dep", |Inject(_): Inject<Dep>| Ok::<_, InstantiateErrorKind>(Base))
            .build();

        let store = store(vec![plan]);
        let err = store.plan_for(TypeInfo::of::<Base>()).unwrap_err();
        assert_eq!(
            err,
            PlanErrorKind::DuplicateConstructor {
                type_info: TypeInfo::of::<Base>(),
                first: "Base::new",
                second: "Base::with_dep",
            }
        );
    }

    #[test]
    fn test_unknown_parent_and_missing_plan() {
        let derived = PlanBuilder::<Derived>::new().extends::<Base>().build();

        let store = store(vec![derived]);
        assert_eq!(
            store.plan_for(TypeInfo::of::<Derived>()).unwrap_err(),
            PlanErrorKind::UnknownParent {
                type_info: TypeInfo::of::<Derived>(),
                parent: TypeInfo::of::<Base>(),
            }
        );
        assert_eq!(
            store.plan_for(TypeInfo::of::<Base>()).unwrap_err(),
            PlanErrorKind::NoPlan {
                type_info: TypeInfo::of::<Base>(),
            }
        );
    }

    #[test]
    fn test_scope_annotation_kept() {
        let plan = PlanBuilder::<Base>::new()
            .in_scope(ScopePolicy::Singleton)
            .constructor("Base::new", || Ok::<_, InstantiateErrorKind>(Base))
            .build();

        let store = store(vec![plan]);
        let compiled = store.plan_for(TypeInfo::of::<Base>()).unwrap();
        assert_eq!(compiled.scope, Some(ScopePolicy::Singleton));
    }
}
