use core::{any::TypeId, fmt::Display, marker::PhantomData, str::FromStr};
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use parking_lot::ReentrantMutex;
use tracing::debug;

use crate::{
    any::TypeInfo,
    binding::{Binding, BindingTable},
    cache::ComputeCache,
    collector::ErrorCollector,
    container::{Container, ContainerInner},
    context::ProvisionContext,
    convert::{primitive_type_names, ConstantConverter},
    deferred::{CycleBreaker, Deferred},
    dependency::{Dependency, DependencyEdge},
    dependency_resolver::DependencyResolver,
    descriptor::TypeDescriptor,
    errors::{CyclePath, InstantiateErrorKind, InstantiatorErrorKind, PlanErrorKind, ProvisionErrorKind, SealErrorKind},
    instantiator::{boxed_instantiator, Instantiator},
    key::{Key, Qualifier},
    plan::{InjectionPlan, PlanStore},
    provider::{BoxProvider, Instance},
    resolver,
    scope::{self, LoadStrategy, Scope, ScopePolicy, ScopeStrategy, SingletonScope, Stage},
};

/// A reusable unit of configuration: modules contribute bindings, plans and
/// scopes to a builder before it seals.
pub trait Module {
    fn configure(&self, builder: &mut ContainerBuilder);
}

enum PendingFactory {
    Provider(BoxProvider),
    Plan,
}

struct PendingBinding {
    key: Key,
    source: Cow<'static, str>,
    factory: PendingFactory,
    scope: ScopePolicy,
    explicit_scope: bool,
    load: LoadStrategy,
    dependencies: Vec<Dependency>,
    breaker: Option<Arc<CycleBreaker>>,
}

/// Collects bindings, injection plans, scopes and converters, then seals
/// them into an immutable [`Container`].
///
/// Sealing validates the whole configuration at once: duplicate keys,
/// unresolvable required dependencies, invalid plans and non-breakable
/// declared cycles are reported together in one aggregate failure.
pub struct ContainerBuilder {
    pending: Vec<PendingBinding>,
    plans: BTreeMap<TypeId, InjectionPlan>,
    duplicate_plans: Vec<TypeInfo>,
    scopes: BTreeMap<&'static str, Arc<dyn Scope>>,
    static_requests: Vec<TypeInfo>,
    converter: ConstantConverter,
    strategy: Option<Arc<dyn ScopeStrategy>>,
    stage: Stage,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            plans: BTreeMap::new(),
            duplicate_plans: Vec::new(),
            scopes: BTreeMap::new(),
            static_requests: Vec::new(),
            converter: ConstantConverter::with_defaults(),
            strategy: None,
            stage: Stage::default(),
        }
    }

    /// Starts a binding for `T`; one of the `to_*` terminal methods
    /// registers it.
    pub fn bind<T: Send + Sync + 'static>(&mut self) -> BindingBuilder<'_, T> {
        BindingBuilder {
            key: Key::of::<T>(),
            source: Cow::Owned(format!("bind::<{}>", TypeInfo::of::<T>())),
            scope: ScopePolicy::NoScope,
            explicit_scope: false,
            load: LoadStrategy::Lazy,
            breaker: None,
            parent: self,
            _marker: PhantomData,
        }
    }

    /// Applies a module's configuration to this builder.
    pub fn install(&mut self, module: &dyn Module) {
        module.configure(self);
    }

    /// Binds a named string constant, the feed of on-demand constant
    /// conversion.
    pub fn bind_constant(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) {
        let name = name.into();
        let source = format!("constant {name:?}");
        self.bind::<String>().named(name).with_source(source).to_instance(value.into());
    }

    /// Registers the injection plan for a type; implicit bindings and
    /// [`inject_members`](Container::inject_members) draw from here.
    pub fn register_plan(&mut self, plan: InjectionPlan) {
        let info = plan.type_info();
        if self.plans.insert(info.id, plan).is_some() {
            self.duplicate_plans.push(info);
        }
    }

    /// Requests that `T`'s static plan steps run once at seal time.
    pub fn request_static_injection<T: 'static>(&mut self) {
        self.static_requests.push(TypeInfo::of::<T>());
    }

    /// Makes a named scope available to `ScopePolicy::Scoped` bindings.
    pub fn bind_scope(&mut self, name: &'static str, scope: Arc<dyn Scope>) {
        self.scopes.insert(name, scope);
    }

    /// Adds a constant-conversion target; enumerations arrive here via
    /// their [`FromStr`] impls.
    pub fn register_converter<T>(&mut self)
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: Display,
    {
        self.converter.register_parse::<T>();
    }

    /// Installs the default external scope strategy carried by every
    /// provisioning context.
    pub fn scope_strategy(&mut self, strategy: Arc<dyn ScopeStrategy>) {
        self.strategy = Some(strategy);
    }

    pub fn stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Seals the configuration into a container.
    ///
    /// # Errors
    /// Returns the aggregate of every configuration diagnostic, in the
    /// order recorded.
    pub fn build(self) -> Result<Container, SealErrorKind> {
        let Self {
            pending,
            plans,
            duplicate_plans,
            scopes,
            static_requests,
            converter,
            strategy,
            stage,
        } = self;

        let mut collector = ErrorCollector::new();
        for info in &duplicate_plans {
            collector.report(
                format!("plan for {info}"),
                "an injection plan for this type was already registered",
            );
        }

        let singleton = SingletonScope::new(Arc::new(ReentrantMutex::new(())));
        let plan_store = PlanStore::new(plans);

        let mut table = BindingTable::new();
        let mut bound_plan_types = BTreeSet::new();
        for pending_binding in pending {
            let PendingBinding {
                key,
                source,
                factory,
                scope: mut policy,
                explicit_scope,
                load,
                mut dependencies,
                breaker,
            } = pending_binding;

            let factory = match factory {
                PendingFactory::Provider(provider) => provider,
                PendingFactory::Plan => {
                    let Some(raw) = key.raw() else {
                        collector.report(source, format!("{key} has no raw type to attach a plan to"));
                        continue;
                    };
                    match plan_store.plan_for(raw) {
                        Ok(plan) => {
                            if plan.ctor.is_none() {
                                collector.report(source, PlanErrorKind::NoConstructor { type_info: raw }.to_string());
                                continue;
                            }
                            if !explicit_scope {
                                if let Some(annotated) = plan.scope {
                                    policy = annotated;
                                }
                            }
                            dependencies = plan.dependencies();
                            bound_plan_types.insert(raw.id);
                            resolver::plan_provider(key.clone(), raw)
                        }
                        Err(err) => {
                            collector.report(source, err.to_string());
                            continue;
                        }
                    }
                }
            };

            let scoped = match scope::apply_policy(&policy, &key, factory.clone(), &singleton, &scopes) {
                Ok(scoped) => scoped,
                Err(err) => {
                    collector.report(source, err.to_string());
                    continue;
                }
            };

            let binding = Binding {
                key,
                source: source.clone(),
                factory,
                scoped,
                scope: policy,
                load,
                dependencies,
                breaker,
            };
            if let Err(existing) = table.insert(binding) {
                collector.report(source, format!("a binding for this key was already configured at {existing}"));
            }
        }

        for binding in table.iter() {
            for dependency in binding.dependencies() {
                if dependency.optional {
                    continue;
                }
                if !resolver::seal_resolvable(&table, &plan_store, &converter, &dependency.key) {
                    collector.report(
                        binding.source.clone(),
                        format!("depends on {}, which nothing can provide", dependency.key),
                    );
                }
            }
        }

        let plan_types: Vec<TypeInfo> = plan_store.registered_types().collect();
        for info in &plan_types {
            if bound_plan_types.contains(&info.id) {
                continue;
            }
            match plan_store.plan_for(*info) {
                Ok(plan) => {
                    for dependency in plan.dependencies() {
                        if dependency.optional {
                            continue;
                        }
                        if !resolver::seal_resolvable(&table, &plan_store, &converter, &dependency.key) {
                            collector.report(
                                format!("plan for {info}"),
                                format!("depends on {}, which nothing can provide", dependency.key),
                            );
                        }
                    }
                }
                Err(err) => {
                    // An invalid plan that nothing references yet fails at
                    // first use instead.
                    if static_requests.iter().any(|requested| requested.id == info.id) {
                        collector.report(format!("plan for {info}"), err.to_string());
                    }
                }
            }
        }

        if let Err(path) = dfs_detect(&table) {
            let source = table
                .get(&path[0])
                .map(|binding| binding.source.clone())
                .unwrap_or(Cow::Borrowed("container"));
            let err = ProvisionErrorKind::CircularDependency {
                path: CyclePath(path.into_boxed_slice()),
            };
            collector.report(source, err.to_string());
        }

        let mut type_names = primitive_type_names();
        for binding in table.iter() {
            if let Some(raw) = binding.key().raw() {
                type_names.insert(raw.name.to_owned(), binding.key().descriptor().clone());
            }
        }
        for info in &plan_types {
            type_names.insert(info.name.to_owned(), TypeDescriptor::Simple(*info));
        }
        converter.install_type_names(type_names);

        let container = Container {
            inner: Arc::new(ContainerInner {
                table,
                plans: plan_store,
                jit: ComputeCache::new(),
                constants: ComputeCache::new(),
                scopes,
                singleton,
                converter,
                strategy,
                stage,
            }),
        };

        for info in &static_requests {
            match container.inner.plans.plan_for(*info) {
                Ok(plan) => {
                    let mut cx = ProvisionContext::new(container.clone());
                    if let Err(err) = resolver::run_static_steps(&mut cx, &plan) {
                        collector.report(format!("static injection of {info}"), err.to_string());
                    }
                }
                Err(err) => collector.report(format!("static injection of {info}"), err.to_string()),
            }
        }

        let eager: Vec<(Key, Cow<'static, str>)> = container
            .inner
            .table
            .iter()
            .filter(|binding| {
                binding.load() == LoadStrategy::Eager || (stage == Stage::Production && binding.scope() == ScopePolicy::Singleton)
            })
            .map(|binding| (binding.key().clone(), binding.source.clone()))
            .collect();
        for (key, source) in eager {
            if let Err(err) = container.provision_untyped(&key) {
                collector.report(source, err.to_string());
            }
        }

        collector.seal()?;
        debug!("Container sealed");
        Ok(container)
    }
}

/// One binding under configuration; terminal `to_*` methods register it
/// with the builder.
pub struct BindingBuilder<'a, T> {
    key: Key,
    source: Cow<'static, str>,
    scope: ScopePolicy,
    explicit_scope: bool,
    load: LoadStrategy,
    breaker: Option<Arc<CycleBreaker>>,
    parent: &'a mut ContainerBuilder,
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + Sync + 'static> BindingBuilder<'_, T> {
    #[must_use]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.key = self.key.with_qualifier(Qualifier::named(name));
        self
    }

    #[must_use]
    pub fn tagged<M: ?Sized + 'static>(mut self) -> Self {
        self.key = self.key.with_qualifier(Qualifier::tag::<M>());
        self
    }

    /// Overrides the diagnostic source label for this binding.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn in_scope(mut self, policy: ScopePolicy) -> Self {
        self.scope = policy;
        self.explicit_scope = true;
        self
    }

    #[must_use]
    pub fn singleton(self) -> Self {
        self.in_scope(ScopePolicy::Singleton)
    }

    /// Singleton constructed at seal time instead of on first demand.
    #[must_use]
    pub fn eager(mut self) -> Self {
        self.scope = ScopePolicy::Singleton;
        self.explicit_scope = true;
        self.load = LoadStrategy::Eager;
        self
    }

    /// Registers the deferred-reference proxy factory used when a request
    /// for this key re-enters its own construction. Meant for
    /// interface-shaped keys: the closure wraps the empty [`Deferred`] slot
    /// in an implementation that forwards every call.
    #[must_use]
    pub fn with_cycle_proxy<F>(mut self, proxy: F) -> Self
    where
        F: Fn(Deferred<T>) -> T + Send + Sync + 'static,
    {
        self.breaker = Some(Arc::new(CycleBreaker::new(proxy)));
        self
    }

    /// Binds to a factory whose arguments are declared by a
    /// [`DependencyResolver`].
    pub fn to_factory<Inst, Deps>(self, instantiator: Inst)
    where
        Inst: Instantiator<Deps, Provides = T> + Send + Sync,
        Deps: DependencyResolver + 'static,
    {
        let dependencies = Inst::dependencies();
        let factory = resolver::framed(self.key.clone(), boxed_instantiator(instantiator));
        self.finish(PendingFactory::Provider(factory), dependencies);
    }

    /// Binds to a factory that resolves its own dependencies through the
    /// provisioning context; `dependencies` declares them for validation
    /// and cycle analysis.
    pub fn to_factory_ctx<F>(self, dependencies: Vec<Dependency>, f: F)
    where
        F: Fn(&mut ProvisionContext) -> Result<T, InstantiateErrorKind> + Clone + Send + Sync + 'static,
    {
        let provider = BoxProvider::from_fn(move |cx| {
            f(cx)
                .map(|value| Arc::new(value) as Instance)
                .map_err(|err| ProvisionErrorKind::Instantiator(InstantiatorErrorKind::Factory(err)))
        });
        let factory = resolver::framed(self.key.clone(), provider);
        self.finish(PendingFactory::Provider(factory), dependencies);
    }

    /// Binds to a value created outside the container; every provision
    /// shares it.
    pub fn to_instance(self, value: T) {
        let shared = Arc::new(value);
        let provider = BoxProvider::from_fn(move |_cx| Ok(shared.clone() as Instance));
        self.finish(PendingFactory::Provider(provider), Vec::new());
    }

    /// Binds to the registered injection plan for `T`. Unless a scope was
    /// set here, the plan's scope annotation applies.
    pub fn to_plan(self) {
        self.finish(PendingFactory::Plan, Vec::new());
    }

    fn finish(self, factory: PendingFactory, dependencies: Vec<Dependency>) {
        self.parent.pending.push(PendingBinding {
            key: self.key,
            source: self.source,
            factory,
            scope: self.scope,
            explicit_scope: self.explicit_scope,
            load: self.load,
            dependencies,
            breaker: self.breaker,
        });
    }
}

/// Seal-time cycle detection over declared constructor edges; bindings with
/// a cycle breaker stop traversal because re-entering them resolves via
/// proxy. Returns the offending cycle.
fn dfs_detect(table: &BindingTable) -> Result<(), Vec<Key>> {
    let mut visited = BTreeSet::new();
    let mut stack = Vec::new();

    for key in table.keys() {
        if dfs_visit(table, key, &mut visited, &mut stack) {
            return Err(stack);
        }
    }
    Ok(())
}

fn dfs_visit(table: &BindingTable, key: &Key, visited: &mut BTreeSet<Key>, stack: &mut Vec<Key>) -> bool {
    if visited.contains(key) {
        return false;
    }
    if let Some(pos) = stack.iter().position(|frame| frame == key) {
        stack.drain(..pos);
        return true;
    }
    stack.push(key.clone());

    if let Some(binding) = table.get(key) {
        if binding.breaker.is_none() {
            for dependency in binding.dependencies() {
                if dependency.edge != DependencyEdge::Constructor {
                    continue;
                }
                if dfs_visit(table, &dependency.key, visited, stack) {
                    return true;
                }
            }
        }
    }

    stack.pop();
    visited.insert(key.clone());
    false
}
