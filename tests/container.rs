use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc, Mutex, OnceLock,
};

use tracing_test::traced_test;

use rivet::{
    ContainerBuilder, Inject, InstantiateErrorKind, Key, PlanBuilder, Provider, ProvisionErrorKind, ScopePolicy, Stage, TypeInfo,
};

#[derive(Debug)]
struct Single;
struct Fresh;

#[test]
#[traced_test]
fn test_singleton_identity_vs_unscoped() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<Single>().singleton().to_factory(|| Ok::<_, InstantiateErrorKind>(Single));
    builder.bind::<Fresh>().to_factory(|| Ok::<_, InstantiateErrorKind>(Fresh));
    let container = builder.build().unwrap();

    let first = container.get_instance::<Single>().unwrap();
    let second = container.get_instance::<Single>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let third = container.get_instance::<Fresh>().unwrap();
    let fourth = container.get_instance::<Fresh>().unwrap();
    assert!(!Arc::ptr_eq(&third, &fourth));
}

#[test]
#[traced_test]
fn test_singleton_factory_runs_once() {
    let calls = Arc::new(AtomicU8::new(0));

    let mut builder = ContainerBuilder::new();
    builder.bind::<Single>().singleton().to_factory({
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, InstantiateErrorKind>(Single)
        }
    });
    let container = builder.build().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let _ = container.get_instance::<Single>().unwrap();
    let _ = container.get_instance::<Single>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

struct Payload;
struct Holder {
    payload: Provider<Payload>,
}

#[test]
#[traced_test]
fn test_provider_injection_is_lazy_and_multi_shot() {
    let calls = Arc::new(AtomicU8::new(0));

    let mut builder = ContainerBuilder::new();
    builder.bind::<Payload>().to_factory({
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, InstantiateErrorKind>(Payload)
        }
    });
    builder
        .bind::<Holder>()
        .to_factory(|payload: Provider<Payload>| Ok::<_, InstantiateErrorKind>(Holder { payload }));
    let container = builder.build().unwrap();

    let holder = container.get_instance::<Holder>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let first = holder.payload.get().unwrap();
    let second = holder.payload.get().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
#[traced_test]
fn test_get_provider_facade() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<Payload>().to_factory(|| Ok::<_, InstantiateErrorKind>(Payload));
    let container = builder.build().unwrap();

    let provider = container.get_provider::<Payload>().unwrap();
    let first = provider.get().unwrap();
    let second = provider.get().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    let err = container.get_provider::<Holder>().unwrap_err();
    assert!(matches!(err, ProvisionErrorKind::NoBinding { .. }));
}

#[derive(Debug)]
struct Repo;

#[test]
#[traced_test]
fn test_missing_binding_suggests_other_qualifiers() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<Repo>().named("a").to_factory(|| Ok::<_, InstantiateErrorKind>(Repo));
    let container = builder.build().unwrap();

    let err = container.get_instance_named::<Repo>("b").unwrap_err();
    match err {
        ProvisionErrorKind::NoBinding { key, suggestions } => {
            assert_eq!(key, Key::named::<Repo>("b"));
            assert_eq!(suggestions.0, ["\"a\"".to_owned()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
#[traced_test]
fn test_find_bindings_in_insertion_order() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<Repo>().named("b").to_factory(|| Ok::<_, InstantiateErrorKind>(Repo));
    builder.bind::<Fresh>().to_factory(|| Ok::<_, InstantiateErrorKind>(Fresh));
    builder.bind::<Repo>().named("a").to_factory(|| Ok::<_, InstantiateErrorKind>(Repo));
    builder.bind::<Repo>().to_factory(|| Ok::<_, InstantiateErrorKind>(Repo));
    let container = builder.build().unwrap();

    let keys: Vec<_> = container.find_bindings::<Repo>().into_iter().map(|binding| binding.key().clone()).collect();
    assert_eq!(keys, [Key::named::<Repo>("b"), Key::named::<Repo>("a"), Key::of::<Repo>()]);

    let all: Vec<_> = container.bindings().map(|binding| binding.key().clone()).collect();
    assert_eq!(
        all,
        [
            Key::named::<Repo>("b"),
            Key::of::<Fresh>(),
            Key::named::<Repo>("a"),
            Key::of::<Repo>()
        ]
    );
}

#[test]
#[traced_test]
fn test_duplicate_binding_fails_at_seal() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<Repo>().to_factory(|| Ok::<_, InstantiateErrorKind>(Repo));
    builder.bind::<Repo>().to_factory(|| Ok::<_, InstantiateErrorKind>(Repo));

    let err = builder.build().unwrap_err();
    assert_eq!(err.messages.len(), 1);
    assert!(err.messages[0].text.contains("already configured"));
}

#[test]
#[traced_test]
fn test_missing_dependency_fails_at_seal() {
    struct Needs;

    let mut builder = ContainerBuilder::new();
    builder
        .bind::<Needs>()
        .to_factory(|Inject(_): Inject<Repo>| Ok::<_, InstantiateErrorKind>(Needs));

    let err = builder.build().unwrap_err();
    assert_eq!(err.messages.len(), 1);
    assert!(err.messages[0].text.contains("nothing can provide"));
}

#[test]
#[traced_test]
fn test_eager_singleton_constructed_at_seal() {
    let calls = Arc::new(AtomicU8::new(0));

    let mut builder = ContainerBuilder::new();
    builder.bind::<Single>().eager().to_factory({
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, InstantiateErrorKind>(Single)
        }
    });
    let container = builder.build().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let _ = container.get_instance::<Single>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
#[traced_test]
fn test_production_stage_constructs_all_singletons() {
    let lazy_calls = Arc::new(AtomicU8::new(0));

    let build = |stage: Stage, calls: Arc<AtomicU8>| {
        let mut builder = ContainerBuilder::new();
        builder.stage(stage);
        builder.bind::<Single>().singleton().to_factory(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, InstantiateErrorKind>(Single)
        });
        builder.build().unwrap()
    };

    let _development = build(Stage::Development, lazy_calls.clone());
    assert_eq!(lazy_calls.load(Ordering::SeqCst), 0);

    let eager_calls = Arc::new(AtomicU8::new(0));
    let _production = build(Stage::Production, eager_calls.clone());
    assert_eq!(eager_calls.load(Ordering::SeqCst), 1);
}

struct Engine;

#[derive(Default)]
struct Car {
    engine: Mutex<Option<Arc<Engine>>>,
    tuned: AtomicU8,
}

fn car_plan() -> rivet::InjectionPlan {
    PlanBuilder::<Car>::new()
        .constructor("Car::default", || Ok::<_, InstantiateErrorKind>(Car::default()))
        .field::<Inject<Engine>, _>("engine", |car, Inject(engine)| {
            *car.engine.lock().unwrap() = Some(engine);
        })
        .method::<(), _>("tune", |car, ()| {
            car.tuned.fetch_add(1, Ordering::SeqCst);
        })
        .build()
}

#[test]
#[traced_test]
fn test_implicit_binding_from_registered_plan() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<Engine>().to_factory(|| Ok::<_, InstantiateErrorKind>(Engine));
    builder.register_plan(car_plan());
    let container = builder.build().unwrap();

    // No explicit Car binding; the plan serves the request just in time.
    let car = container.get_instance::<Car>().unwrap();
    assert!(car.engine.lock().unwrap().is_some());
    assert_eq!(car.tuned.load(Ordering::SeqCst), 1);
}

#[test]
#[traced_test]
fn test_implicit_binding_honours_plan_scope() {
    struct Cached;

    let mut builder = ContainerBuilder::new();
    builder.register_plan(
        PlanBuilder::<Cached>::new()
            .in_scope(ScopePolicy::Singleton)
            .constructor("Cached::new", || Ok::<_, InstantiateErrorKind>(Cached))
            .build(),
    );
    let container = builder.build().unwrap();

    let first = container.get_instance::<Cached>().unwrap();
    let second = container.get_instance::<Cached>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
#[traced_test]
fn test_inject_members_applies_plan_without_construction() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<Engine>().to_factory(|| Ok::<_, InstantiateErrorKind>(Engine));
    builder.register_plan(car_plan());
    let container = builder.build().unwrap();

    let car = Car::default();
    container.inject_members(&car).unwrap();
    assert!(car.engine.lock().unwrap().is_some());
    assert_eq!(car.tuned.load(Ordering::SeqCst), 1);

    // Applying the plan again re-runs every member step.
    container.inject_members(&car).unwrap();
    assert_eq!(car.tuned.load(Ordering::SeqCst), 2);
}

#[test]
#[traced_test]
fn test_inject_members_without_plan_fails() {
    let container = ContainerBuilder::new().build().unwrap();

    let repo = Repo;
    let err = container.inject_members(&repo).unwrap_err();
    assert!(matches!(
        err,
        ProvisionErrorKind::Plan(rivet::PlanErrorKind::NoPlan { type_info }) if type_info == TypeInfo::of::<Repo>()
    ));
}

#[test]
#[traced_test]
fn test_two_registered_constructors_diagnostic_names_both() {
    #[derive(Debug)]
    struct Torn;

    let mut builder = ContainerBuilder::new();
    builder.register_plan(
        PlanBuilder::<Torn>::new()
            .constructor("Torn::new", || Ok::<_, InstantiateErrorKind>(Torn))
            .constructor("Torn::with_repo", |Inject(_): Inject<Repo>| Ok::<_, InstantiateErrorKind>(Torn))
            .build(),
    );
    builder.bind::<Repo>().to_factory(|| Ok::<_, InstantiateErrorKind>(Repo));
    let container = builder.build().unwrap();

    let err = container.get_instance::<Torn>().unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("Torn"));
    assert!(rendered.contains("Torn::new"));
    assert!(rendered.contains("Torn::with_repo"));
}

#[test]
#[traced_test]
fn test_optional_member_skipped_when_unbindable() {
    struct Sparse {
        repo: OnceLock<Arc<Repo>>,
    }

    let mut builder = ContainerBuilder::new();
    builder.register_plan(
        PlanBuilder::<Sparse>::new()
            .constructor("Sparse::new", || Ok::<_, InstantiateErrorKind>(Sparse { repo: OnceLock::new() }))
            .optional_field::<Inject<Repo>, _>("repo", |sparse, Inject(repo)| {
                let _ = sparse.repo.set(repo);
            })
            .build(),
    );
    let container = builder.build().unwrap();

    let sparse = container.get_instance::<Sparse>().unwrap();
    assert!(sparse.repo.get().is_none());
}

#[test]
#[traced_test]
fn test_static_injection_runs_once_at_seal() {
    struct Configured;

    let hits = Arc::new(AtomicU8::new(0));

    let mut builder = ContainerBuilder::new();
    builder.register_plan(
        PlanBuilder::<Configured>::new()
            .static_member("Configured::init", {
                let hits = hits.clone();
                move |_cx| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build(),
    );
    builder.request_static_injection::<Configured>();
    let _container = builder.build().unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
#[traced_test]
fn test_transient_is_owned_and_refused_for_scoped() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<Fresh>().to_factory(|| Ok::<_, InstantiateErrorKind>(Fresh));
    builder.bind::<Single>().singleton().to_factory(|| Ok::<_, InstantiateErrorKind>(Single));
    let container = builder.build().unwrap();

    let _owned: Fresh = container.get_transient::<Fresh>().unwrap();

    let err = container.get_transient::<Single>().unwrap_err();
    assert!(matches!(err, ProvisionErrorKind::NotTransient { .. }));
}

struct StorageModule;

impl rivet::Module for StorageModule {
    fn configure(&self, builder: &mut ContainerBuilder) {
        builder.bind::<Repo>().named("primary").to_factory(|| Ok::<_, InstantiateErrorKind>(Repo));
        builder.bind_constant("pool_size", "8");
    }
}

#[test]
#[traced_test]
fn test_module_contributes_configuration() {
    let mut builder = ContainerBuilder::new();
    builder.install(&StorageModule);
    let container = builder.build().unwrap();

    let _repo = container.get_instance_named::<Repo>("primary").unwrap();
    let pool_size = container.get_instance_named::<u32>("pool_size").unwrap();
    assert_eq!(*pool_size, 8);
}

#[test]
#[traced_test]
fn test_unknown_named_scope_fails_at_seal() {
    let mut builder = ContainerBuilder::new();
    builder
        .bind::<Repo>()
        .in_scope(ScopePolicy::Scoped("request"))
        .to_factory(|| Ok::<_, InstantiateErrorKind>(Repo));

    let err = builder.build().unwrap_err();
    assert_eq!(err.messages.len(), 1);
    assert!(err.messages[0].text.contains("request"));
}
