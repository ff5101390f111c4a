use core::any::Any;
use std::{borrow::Cow, sync::Arc};

use tracing::{debug, debug_span, error, warn};

use crate::{
    any::TypeInfo,
    binding::Binding,
    container::Container,
    context::{downcast_shared, FramePhase, InjectionPoint, MemberKind, ProvisionContext, Slot},
    errors::{PlanErrorKind, ProvisionErrorKind, Suggestions},
    key::Key,
    plan::{CompiledPlan, CtorStep},
    provider::{BoxProvider, Instance, Provide as _, ProvideResult},
    provider_of::UntypedProvider,
    scope::{self, LoadStrategy, ScopePolicy},
};

/// Resolves a key to a provisioned instance: explicit binding, provider-of
/// unwrap, constant conversion, then implicit binding, in that order.
pub(crate) fn resolve(cx: &mut ProvisionContext, key: &Key) -> ProvideResult {
    let span = debug_span!("resolve", key = %key);
    let _guard = span.enter();

    if let Some(result) = check_reentrance(cx, key) {
        return result;
    }

    let container = cx.container.clone();

    if let Some(binding) = container.inner.table.get(key) {
        debug!("Explicit binding found");
        let provider = binding.scoped.clone();
        return provider.provide(cx);
    }

    if let Some(target) = key.provider_target() {
        debug!("Unwrapping provider-of key");
        ensure_resolvable(&container, &target)?;
        return Ok(Arc::new(UntypedProvider::new(container.clone(), target)) as Instance);
    }

    if let Some(instance) = try_convert_constant(cx, &container, key)? {
        return Ok(instance);
    }

    if let Some(instance) = try_just_in_time(cx, &container, key)? {
        return Ok(instance);
    }

    let err = missing_binding(&container, key);
    warn!("{err}");
    Err(err)
}

/// Resolves an owned fresh instance, bypassing the scope layer; only
/// unscoped bindings qualify.
pub(crate) fn resolve_transient(cx: &mut ProvisionContext, key: &Key) -> ProvideResult {
    let span = debug_span!("resolve_transient", key = %key);
    let _guard = span.enter();

    if let Some(result) = check_reentrance(cx, key) {
        return result;
    }

    let container = cx.container.clone();

    if let Some(binding) = container.inner.table.get(key) {
        if binding.scope != ScopePolicy::NoScope {
            let err = ProvisionErrorKind::NotTransient { key: key.clone() };
            warn!("{err}");
            return Err(err);
        }
        let provider = binding.factory.clone();
        return provider.provide(cx);
    }

    if implicit_candidate(&container, key) {
        let raw = key.raw().expect("implicit candidates have a raw projection");
        let binding = container.inner.jit.get_or_try_create(key, || synthesise_implicit(&container, key, raw))?;
        if binding.scope != ScopePolicy::NoScope {
            let err = ProvisionErrorKind::NotTransient { key: key.clone() };
            warn!("{err}");
            return Err(err);
        }
        let provider = binding.factory.clone();
        return provider.provide(cx);
    }

    let err = missing_binding(&container, key);
    warn!("{err}");
    Err(err)
}

/// Handles a re-entrant request for a key whose construction frame is on the
/// stack: the partially-injected instance during member injection, a
/// deferred-reference proxy during construction when the binding carries a
/// breaker, a circular-dependency failure otherwise.
fn check_reentrance(cx: &ProvisionContext, key: &Key) -> Option<ProvideResult> {
    let (ix, slot, phase) = cx.find_frame(key)?;
    match phase {
        FramePhase::InjectingMembers => {
            debug!("Re-entrant request served with the partially-injected instance");
            Some(Ok(slot.get().expect("a frame in member phase holds its instance").clone()))
        }
        FramePhase::Constructing => {
            let breaker = cx.container.inner.table.get(key).and_then(|binding| binding.breaker.clone());
            match breaker {
                Some(breaker) => {
                    debug!("Returning deferred-reference proxy");
                    Some(Ok(breaker.proxy(slot)))
                }
                None => {
                    let err = ProvisionErrorKind::CircularDependency {
                        path: cx.cycle_path(ix, key),
                    };
                    error!("{err}");
                    Some(Err(err))
                }
            }
        }
    }
}

fn try_convert_constant(cx: &mut ProvisionContext, container: &Container, key: &Key) -> Result<Option<Instance>, ProvisionErrorKind> {
    let inner = &container.inner;
    if !inner.converter.supports(key.descriptor()) {
        return Ok(None);
    }
    let string_key = string_key_for(key);
    if inner.table.get(&string_key).is_none() {
        return Ok(None);
    }

    let instance = inner.constants.get_or_try_create(key, || {
        let raw = resolve(cx, &string_key)?;
        let value = downcast_shared::<String>(&string_key, raw)?;
        let converted = inner.converter.convert(&value, key.descriptor())?;
        debug!("Constant converted and memoised");
        Ok::<_, ProvisionErrorKind>(converted)
    })?;
    Ok(Some(instance))
}

fn try_just_in_time(cx: &mut ProvisionContext, container: &Container, key: &Key) -> Result<Option<Instance>, ProvisionErrorKind> {
    if !implicit_candidate(container, key) {
        return Ok(None);
    }
    let raw = key.raw().expect("implicit candidates have a raw projection");
    let binding = container.inner.jit.get_or_try_create(key, || synthesise_implicit(container, key, raw))?;
    debug!("Implicit binding");
    let provider = binding.scoped.clone();
    provider.provide(cx).map(Some)
}

/// Implicit bindings serve unqualified keys whose raw type has a registered
/// injection plan.
fn implicit_candidate(container: &Container, key: &Key) -> bool {
    key.qualifier().is_none()
        && key
            .raw()
            .is_some_and(|raw| container.inner.plans.is_registered(raw.id))
}

fn synthesise_implicit(container: &Container, key: &Key, raw: TypeInfo) -> Result<Binding, ProvisionErrorKind> {
    let inner = &container.inner;
    let plan = inner.plans.plan_for(raw)?;
    if plan.ctor.is_none() {
        return Err(PlanErrorKind::NoConstructor { type_info: raw }.into());
    }

    let factory = plan_provider(key.clone(), raw);
    let policy = plan.scope.unwrap_or_default();
    let scoped = scope::apply_policy(&policy, key, factory.clone(), &inner.singleton, &inner.scopes)?;
    debug!(%key, "Implicit binding synthesised");

    Ok(Binding {
        key: key.clone(),
        source: Cow::Owned(format!("implicit binding for {raw}")),
        factory,
        scoped,
        scope: policy,
        load: LoadStrategy::Lazy,
        dependencies: plan.dependencies(),
        breaker: None,
    })
}

/// The raw provider of a plan-backed binding: frame bookkeeping plus the
/// plan's construction steps.
pub(crate) fn plan_provider(key: Key, raw: TypeInfo) -> BoxProvider {
    BoxProvider::from_fn(move |cx| construct_with_plan(cx, &key, raw))
}

fn construct_with_plan(cx: &mut ProvisionContext, key: &Key, raw: TypeInfo) -> ProvideResult {
    let container = cx.container.clone();
    let plan = container.inner.plans.plan_for(raw)?;
    let Some(ctor) = plan.ctor.clone() else {
        return Err(PlanErrorKind::NoConstructor { type_info: raw }.into());
    };

    let slot = cx.push_frame(key.clone());
    let result = run_construction(cx, &plan, &ctor, &slot);
    cx.pop_frame();
    result
}

/// Constructor, then installation into the frame, then member levels.
fn run_construction(cx: &mut ProvisionContext, plan: &CompiledPlan, ctor: &CtorStep, slot: &Slot) -> ProvideResult {
    let point = InjectionPoint {
        target: plan.type_info,
        member: ctor.label,
        kind: MemberKind::Constructor,
    };
    let instance = cx
        .with_point(point.clone(), |cx| (ctor.construct)(cx))
        .map_err(|err| at_point(point, err))?;

    // Satisfies deferred proxies handed out while constructing.
    let _ = slot.set(instance.clone());
    cx.set_top_phase(FramePhase::InjectingMembers);

    apply_member_levels(cx, plan, &*instance)?;
    Ok(instance)
}

pub(crate) fn apply_member_levels(cx: &mut ProvisionContext, plan: &CompiledPlan, target: &dyn Any) -> Result<(), ProvisionErrorKind> {
    for level in &plan.levels {
        for step in level.fields.iter().chain(level.methods.iter()) {
            let point = InjectionPoint {
                target: level.type_info,
                member: step.member,
                kind: step.kind,
            };
            match cx.with_point(point.clone(), |cx| (step.apply)(target, cx)) {
                Ok(()) => {}
                Err(err) if step.optional && err.is_missing_binding() => {
                    debug!(member = step.member, "Optional member skipped");
                }
                Err(err) => return Err(at_point(point, err)),
            }
        }
    }
    Ok(())
}

pub(crate) fn inject_members_dyn(cx: &mut ProvisionContext, info: TypeInfo, target: &dyn Any) -> Result<(), ProvisionErrorKind> {
    let span = debug_span!("inject_members", ty = %info);
    let _guard = span.enter();

    let container = cx.container.clone();
    let plan = container.inner.plans.plan_for(info)?;
    apply_member_levels(cx, &plan, target)
}

pub(crate) fn run_static_steps(cx: &mut ProvisionContext, plan: &CompiledPlan) -> Result<(), ProvisionErrorKind> {
    for step in &plan.statics {
        let point = InjectionPoint {
            target: plan.type_info,
            member: step.label,
            kind: MemberKind::Static,
        };
        cx.with_point(point.clone(), |cx| (step.run)(cx))
            .map_err(|err| at_point(point, err))?;
    }
    Ok(())
}

/// Wraps a factory binding's provider with construction-frame bookkeeping so
/// re-entrant requests are detected and proxies can be satisfied.
pub(crate) fn framed(key: Key, inner: BoxProvider) -> BoxProvider {
    BoxProvider::from_fn(move |cx| {
        let slot = cx.push_frame(key.clone());
        let result = inner.provide(cx);
        if let Ok(instance) = &result {
            let _ = slot.set(instance.clone());
        }
        cx.pop_frame();
        result
    })
}

/// Checks that some strategy could produce `key`, without materialising
/// anything.
pub(crate) fn ensure_resolvable(container: &Container, key: &Key) -> Result<(), ProvisionErrorKind> {
    if resolvable(container, key) {
        Ok(())
    } else {
        Err(missing_binding(container, key))
    }
}

fn resolvable(container: &Container, key: &Key) -> bool {
    let inner = &container.inner;
    seal_resolvable(&inner.table, &inner.plans, &inner.converter, key)
}

/// Whether some strategy could produce `key`, phrased over the sealed
/// parts so the builder can validate before the container exists.
pub(crate) fn seal_resolvable(
    table: &crate::binding::BindingTable,
    plans: &crate::plan::PlanStore,
    converter: &crate::convert::ConstantConverter,
    key: &Key,
) -> bool {
    if table.get(key).is_some() {
        return true;
    }
    if let Some(target) = key.provider_target() {
        return seal_resolvable(table, plans, converter, &target);
    }
    if converter.supports(key.descriptor()) && table.get(&string_key_for(key)).is_some() {
        return true;
    }
    key.qualifier().is_none() && key.raw().is_some_and(|raw| plans.is_registered(raw.id))
}

fn string_key_for(key: &Key) -> Key {
    let string_key = Key::of::<String>();
    match key.qualifier() {
        Some(qualifier) => string_key.with_qualifier(qualifier.clone()),
        None => string_key,
    }
}

fn missing_binding(container: &Container, key: &Key) -> ProvisionErrorKind {
    ProvisionErrorKind::NoBinding {
        key: key.clone(),
        suggestions: Suggestions(container.inner.table.qualifiers_for_raw(key.raw())),
    }
}

fn at_point(point: InjectionPoint, err: ProvisionErrorKind) -> ProvisionErrorKind {
    ProvisionErrorKind::AtInjectionPoint {
        point,
        source: Box::new(err),
    }
}
