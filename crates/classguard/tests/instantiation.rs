//! Tests for the instance lifecycle guard: instantiation, initializers and
//! retroactive attribute installation.

use classguard::{
    Attribute, BuiltinType, ClassBody, ExcType, Function, HeapId, Receiver, Runtime, Value, Variable,
};
use pretty_assertions::assert_eq;

/// A class with one unoverridden abstract method is not instantiable; a subclass
/// supplying a distinct function is.
#[test]
fn abstract_class_cannot_be_instantiated() {
    let mut rt = Runtime::new();
    let base = rt
        .define_class(
            "Base",
            &[],
            ClassBody::new().abstract_method("run", Function::stub("run")),
        )
        .unwrap();
    let err = rt.instantiate(base, &[]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::AbstractInstantiationError);
    assert_eq!(
        err.message(),
        Some("cannot instantiate abstract class 'Base' with abstract methods run")
    );

    let impl_class = rt
        .define_class("Impl", &[base], ClassBody::new().method("run", Function::stub("run")))
        .unwrap();
    let inst = rt.instantiate(impl_class, &[]).unwrap();
    assert_eq!(rt.instance(inst).unwrap().class_id(), impl_class);
}

/// Explicitly abstract classes without abstract methods are refused too.
#[test]
fn explicitly_abstract_class_cannot_be_instantiated() {
    let mut rt = Runtime::new();
    let base = rt
        .define_class("Base", &[], ClassBody::new().mark_abstract())
        .unwrap();
    let err = rt.instantiate(base, &[]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::AbstractInstantiationError);
    assert_eq!(err.message(), Some("cannot instantiate abstract class 'Base'"));
}

/// Interfaces are refused with their own error, before the abstract check.
#[test]
fn interface_cannot_be_instantiated() {
    let mut rt = Runtime::new();
    let iface = rt
        .define_interface("Greeter", &[], ClassBody::new().value("greet", Function::stub("greet")))
        .unwrap();
    let err = rt.instantiate(iface, &[]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::InterfaceInstantiationError);
    assert!(err.exc_type().is_instantiation_error());
}

/// `__init__` receives the instance followed by the arguments.
#[test]
fn initializer_runs_with_arguments() {
    let mut rt = Runtime::new();
    let init = Function::new("__init__", |rt, args| {
        let Some(this) = args[0].as_instance() else {
            return Err(ExcType::TypeError.with_message("expected an instance"));
        };
        rt.set_attr(Receiver::Instance(this), "x", args[1].clone())?;
        rt.set_attr(Receiver::Instance(this), "y", args[2].clone())?;
        Ok(Value::None)
    });
    let point = rt
        .define_class(
            "Point",
            &[],
            ClassBody::new()
                .variable("x", Variable::new().typed(BuiltinType::Int))
                .variable("y", Variable::new().typed(BuiltinType::Int))
                .value("__init__", init),
        )
        .unwrap();
    let p = rt.instantiate(point, &[Value::Int(1), Value::from("2")]).unwrap();
    assert_eq!(rt.get_attr(Receiver::Instance(p), "x").unwrap(), Value::Int(1));
    assert_eq!(rt.get_attr(Receiver::Instance(p), "y").unwrap(), Value::Int(2));
}

/// A failing initializer frees the half-built instance and propagates the error.
#[test]
fn failing_initializer_frees_instance() {
    let mut rt = Runtime::new();
    let init = Function::new("__init__", |rt, args| {
        let this = args[0].as_instance().unwrap_or_else(|| unreachable!());
        rt.set_attr(Receiver::Instance(this), "n", args[1].clone())?;
        Ok(Value::None)
    });
    let class = rt
        .define_class(
            "Positive",
            &[],
            ClassBody::new()
                .variable(
                    "n",
                    Variable::new()
                        .typed(BuiltinType::Int)
                        .validate(|v| v.as_int().is_some_and(|n| n > 0)),
                )
                .method("__init__", init),
        )
        .unwrap();

    let before = rt.heap_stats();
    let err = rt.instantiate(class, &[Value::Int(-1)]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::ContractViolationError);
    let after = rt.heap_stats();
    assert_eq!(after.live_objects, before.live_objects);
    assert_eq!(after.objects_by_type.get("Instance"), None);

    rt.instantiate(class, &[Value::Int(3)]).unwrap();
    assert_eq!(rt.heap_stats().objects_by_type.get("Instance"), Some(&1));
}

/// Methods are called with the instance prepended.
#[test]
fn call_method_passes_receiver() {
    let mut rt = Runtime::new();
    let describe = Function::new("describe", |rt, args| {
        let this = args[0].as_instance().unwrap_or_else(|| unreachable!());
        let name = rt.get_attr(Receiver::Instance(this), "name")?;
        Ok(Value::from(format!("{name} ({} args)", args.len() - 1)))
    });
    let class = rt
        .define_class(
            "Pet",
            &[],
            ClassBody::new()
                .variable("name", Variable::new().with_default("rex"))
                .method("describe", describe)
                .constant("LEGS", 4),
        )
        .unwrap();
    let pet = rt.instantiate(class, &[]).unwrap();
    assert_eq!(
        rt.call_method(pet, "describe", &[Value::Int(1)]).unwrap(),
        Value::from("rex (1 args)")
    );
    let err = rt.call_method(pet, "LEGS", &[]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

// ============================================================================
// Retroactive installation
// ============================================================================

fn three_level_hierarchy(rt: &mut Runtime) -> (HeapId, HeapId, HeapId) {
    let base = rt.define_class("Base", &[], ClassBody::new()).unwrap();
    let mid = rt.define_class("Mid", &[base], ClassBody::new()).unwrap();
    let leaf = rt.define_class("Leaf", &[mid], ClassBody::new()).unwrap();
    (base, mid, leaf)
}

/// Installing an abstract method makes the class and its subclasses abstract.
#[test]
fn installing_abstract_method_propagates_to_subclasses() {
    let mut rt = Runtime::new();
    let (base, mid, leaf) = three_level_hierarchy(&mut rt);
    rt.instantiate(leaf, &[]).unwrap();

    rt.install_attribute(mid, "run", Attribute::abstract_method(Function::stub("run")))
        .unwrap();
    assert!(!rt.is_abstract(base));
    assert!(rt.is_abstract(mid));
    assert!(rt.is_abstract(leaf));
    let err = rt.instantiate(leaf, &[]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::AbstractInstantiationError);

    rt.instantiate(base, &[]).unwrap();
}

/// Installed attributes show up in registries computed before the installation.
#[test]
fn installation_invalidates_registries() {
    let mut rt = Runtime::new();
    let (base, _, leaf) = three_level_hierarchy(&mut rt);
    assert!(rt.attributes(leaf).unwrap().is_empty());

    rt.install_attribute(base, "VERSION", Attribute::constant(2)).unwrap();
    let registry = rt.attributes(leaf).unwrap();
    assert_eq!(registry.get("VERSION").map(|entry| entry.owner), Some(base));
    assert_eq!(registry.get("VERSION").unwrap().attribute.name(), Some("VERSION"));
}

/// Assigning an attribute through an instance installs it on the instance's class.
#[test]
fn set_attr_with_attribute_installs_on_class() {
    let mut rt = Runtime::new();
    let (_, mid, leaf) = three_level_hierarchy(&mut rt);
    let inst = rt.instantiate(mid, &[]).unwrap();
    rt.set_attr(Receiver::Instance(inst), "MAX", Attribute::constant(9)).unwrap();

    let other = rt.instantiate(leaf, &[]).unwrap();
    assert_eq!(rt.get_attr(Receiver::Instance(other), "MAX").unwrap(), Value::Int(9));
    assert!(rt.is_attribute(mid, "MAX"));
}

/// Installing over a name that already resolves to an attribute fails.
#[test]
fn installing_over_existing_attribute_fails() {
    let mut rt = Runtime::new();
    let base = rt
        .define_class("Base", &[], ClassBody::new().constant("A", 1))
        .unwrap();
    let sub = rt.define_class("Sub", &[base], ClassBody::new()).unwrap();
    let err = rt.install_attribute(sub, "A", Attribute::constant(2)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::InvalidOverrideError);
    assert_eq!(err.message(), Some("cannot override 'Sub' attribute 'A' by assignment"));
    assert_eq!(rt.get_attr(Receiver::Class(sub), "A").unwrap(), Value::Int(1));
}

/// Installing a method that overrides a final method fails and changes nothing.
#[test]
fn installing_final_override_is_rolled_back() {
    let mut rt = Runtime::new();
    let base = rt
        .define_class("Base", &[], ClassBody::new().final_method("f", Function::stub("f")))
        .unwrap();
    let sub = rt.define_class("Sub", &[base], ClassBody::new().value("f", Value::Int(0)));
    assert_eq!(sub.unwrap_err().exc_type(), ExcType::FinalMethodViolationError);

    let sub = rt.define_class("Sub", &[base], ClassBody::new()).unwrap();
    let before = rt.class(sub).unwrap().namespace().len();
    let err = rt
        .set_attr(Receiver::Class(sub), "f", Function::stub("g"))
        .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::ImmutableAttributeError);

    let mixin = rt.define_class("Mixin", &[], ClassBody::new()).unwrap();
    let both = rt.define_class("Both", &[mixin, base], ClassBody::new()).unwrap();
    let err = rt
        .install_attribute(mixin, "f", Attribute::method(Function::stub("g")))
        .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::FinalMethodViolationError);
    assert!(!rt.is_attribute(mixin, "f"));
    assert_eq!(rt.class(sub).unwrap().namespace().len(), before);
    rt.instantiate(both, &[]).unwrap();
}

/// Interfaces cannot be extended after definition.
#[test]
fn interfaces_cannot_be_extended() {
    let mut rt = Runtime::new();
    let iface = rt.define_interface("Marker", &[], ClassBody::new()).unwrap();
    let err = rt
        .install_attribute(iface, "x", Attribute::constant(1))
        .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::DefinitionError);
    let err = rt.set_attr(Receiver::Class(iface), "x", Value::Int(1)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::DefinitionError);
}

/// Shadowing an abstract method with a plain function at class scope makes a
/// sibling-ordered subclass concrete.
#[test]
fn class_scope_function_rederives_abstractness() {
    let mut rt = Runtime::new();
    let left = rt.define_class("Left", &[], ClassBody::new()).unwrap();
    let right = rt
        .define_class(
            "Right",
            &[],
            ClassBody::new().abstract_method("run", Function::stub("run")),
        )
        .unwrap();
    let both = rt.define_class("Both", &[left, right], ClassBody::new()).unwrap();
    assert!(rt.is_abstract(both));

    rt.set_attr(Receiver::Class(left), "run", Function::stub("impl")).unwrap();
    assert!(!rt.is_abstract(both));
    assert!(rt.is_abstract(right));
    rt.instantiate(both, &[]).unwrap();

    rt.del_attr(Receiver::Class(left), "run").unwrap();
    assert!(rt.is_abstract(both));
}
