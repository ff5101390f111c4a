use std::sync::{Arc, OnceLock};

use tracing_test::traced_test;

use rivet::{
    ContainerBuilder, ConvertErrorKind, InstantiateErrorKind, Key, PlanBuilder, PrimitiveKind, ProvisionErrorKind, TypeDescriptor,
};

#[derive(Debug)]
struct Settings {
    workers: OnceLock<i32>,
}

fn settings_plan() -> rivet::InjectionPlan {
    PlanBuilder::<Settings>::new()
        .constructor("Settings::new", || {
            Ok::<_, InstantiateErrorKind>(Settings { workers: OnceLock::new() })
        })
        .field_with::<i32, _>("workers", Key::named::<i32>("n"), |settings, workers| {
            let _ = settings.workers.set(*workers);
        })
        .build()
}

#[test]
#[traced_test]
fn test_constant_injected_into_qualified_integer_field() {
    let mut builder = ContainerBuilder::new();
    builder.bind_constant("n", "5");
    builder.register_plan(settings_plan());
    let container = builder.build().unwrap();

    let settings = container.get_instance::<Settings>().unwrap();
    assert_eq!(settings.workers.get(), Some(&5));
}

#[test]
#[traced_test]
fn test_conversion_is_memoised_per_key() {
    let mut builder = ContainerBuilder::new();
    builder.bind_constant("n", "5");
    let container = builder.build().unwrap();

    let first = container.get_instance_named::<i32>("n").unwrap();
    let second = container.get_instance_named::<i32>("n").unwrap();
    assert_eq!(*first, 5);
    // The first successful conversion becomes a constant: same value, same
    // allocation.
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
#[traced_test]
fn test_conversion_failure_carries_value_target_and_member() {
    let mut builder = ContainerBuilder::new();
    builder.bind_constant("n", "five");
    builder.register_plan(settings_plan());
    let container = builder.build().unwrap();

    let err = container.get_instance::<Settings>().unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("field `workers`"));
    assert!(rendered.contains("\"five\""));
    assert!(rendered.contains("i32"));
    assert!(matches!(err.root(), ProvisionErrorKind::Convert(ConvertErrorKind::Parse { .. })));
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Fast,
    Safe,
}

impl core::str::FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Fast" => Ok(Self::Fast),
            "Safe" => Ok(Self::Safe),
            other => Err(format!("no member named {other}")),
        }
    }
}

#[test]
#[traced_test]
fn test_enum_constant_by_member_name() {
    let mut builder = ContainerBuilder::new();
    builder.register_converter::<Mode>();
    builder.bind_constant("mode", "Fast");
    let container = builder.build().unwrap();

    let mode = container.get_instance_named::<Mode>("mode").unwrap();
    assert_eq!(*mode, Mode::Fast);
}

#[test]
#[traced_test]
fn test_char_constant_trimmed_single() {
    let mut builder = ContainerBuilder::new();
    builder.bind_constant("separator", " | ");
    let container = builder.build().unwrap();

    let separator = container.get_instance_named::<char>("separator").unwrap();
    assert_eq!(*separator, '|');
}

struct Service;

#[test]
#[traced_test]
fn test_type_descriptor_constant_by_type_name() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<Service>().to_factory(|| Ok::<_, InstantiateErrorKind>(Service));
    builder.bind_constant("impl", core::any::type_name::<Service>());
    let container = builder.build().unwrap();

    let descriptor = container.get_instance_named::<TypeDescriptor>("impl").unwrap();
    assert_eq!(*descriptor, TypeDescriptor::of::<Service>());
}

#[test]
#[traced_test]
fn test_abstract_primitive_spelling_resolves_concrete_binding() {
    let mut builder = ContainerBuilder::new();
    builder.bind::<u16>().named("port").to_instance(80);
    let container = builder.build().unwrap();

    let key = Key::from_descriptor(TypeDescriptor::primitive(PrimitiveKind::U16)).with_qualifier(rivet::Qualifier::named("port"));
    let port = container.get_instance_by_key::<u16>(key).unwrap();
    assert_eq!(*port, 80);
}

#[test]
#[traced_test]
fn test_string_constant_resolves_directly() {
    let mut builder = ContainerBuilder::new();
    builder.bind_constant("greeting", "hola");
    let container = builder.build().unwrap();

    let greeting = container.get_instance_named::<String>("greeting").unwrap();
    assert_eq!(greeting.as_str(), "hola");
}
