mod common;

use std::cell::RefCell;
use std::rc::Rc;

use bindexpr as bx;
use pretty_assertions::assert_eq;

use bx::builtins::{MathFunctions, Record};
use bx::convert::{coerce, FromValue};
use bx::reflect::{PropertyDescriptor, TypeAccessorCache};
use bx::{Engine, ExprError, TypeRef, Value, ValueType};
use common::{Child, Clock, ViewModel};

fn child_value() -> (Value, Rc<RefCell<Child>>) {
    let child = Rc::new(RefCell::new(Child {
        one: 1,
        name: "c".to_string(),
    }));
    (Value::from(Rc::clone(&child)), child)
}

#[test]
fn test_property_descriptors() {
    let cache = TypeAccessorCache::new();
    let accessor = cache.get(TypeRef::of::<Child>());

    assert_eq!(accessor.name(), "Child");
    assert_eq!(
        accessor.property("one"),
        Some(&PropertyDescriptor {
            name: "one".to_string(),
            ty: ValueType::Int,
            readable: true,
            writable: true,
            is_static: false,
        })
    );

    let vm = cache.get(TypeRef::of::<ViewModel>());
    let calls = vm.property("Calls").unwrap();
    assert!(calls.readable && !calls.writable);
    assert_eq!(vm.member_type("Child"), Some(ValueType::Object(TypeRef::of::<Child>())));
    assert_eq!(vm.member_type("Items"), Some(ValueType::List));
    assert_eq!(vm.member_type("nope"), None);

    let clock = cache.get(TypeRef::of::<Clock>());
    assert!(clock.property("Ticks").unwrap().is_static);
}

#[test]
fn test_method_descriptors() {
    let cache = TypeAccessorCache::new();
    let vm = cache.get(TypeRef::of::<ViewModel>());

    let adds: Vec<_> = vm.methods().iter().filter(|m| m.name == "Add").collect();
    assert_eq!(adds.len(), 2);
    assert_eq!(adds[0].params, vec![ValueType::Int, ValueType::Int]);
    assert_eq!(adds[0].returns, ValueType::Int);
    assert_eq!(adds[1].params, vec![ValueType::Float, ValueType::Float]);

    assert_eq!(format!("{:?}", adds[1]), "Add(float, float)");

    let set_name = vm.methods().iter().find(|m| m.name == "SetName").unwrap();
    assert_eq!(set_name.returns, ValueType::Void);

    let math = cache.get(TypeRef::of::<MathFunctions>());
    assert!(math.methods().iter().all(|m| m.is_static));
}

#[test]
fn test_accessors_are_built_once_per_type() {
    let cache = TypeAccessorCache::new();
    assert!(cache.is_empty());

    let first = cache.get(TypeRef::of::<Child>());
    let second = cache.get(TypeRef::of::<Child>());
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(TypeRef::of::<Child>()));
    assert!(!cache.contains(TypeRef::of::<ViewModel>()));

    cache.clear();
    assert!(cache.is_empty());
    assert!(!Rc::ptr_eq(&first, &cache.get(TypeRef::of::<Child>())));
}

#[test]
fn test_engine_builds_accessors_on_demand() {
    let (scope, _) = common::scope();
    let accessors = scope.engine().accessors();

    assert!(!accessors.contains(TypeRef::of::<Child>()));
    common::eval(&scope, "vm.Child.one");
    assert!(accessors.contains(TypeRef::of::<ViewModel>()));
    assert!(accessors.contains(TypeRef::of::<Child>()));
}

#[test]
fn test_accessor_for_null_fails() {
    let engine = Engine::new().unwrap();
    let err = engine.accessor_for(&Value::Null).unwrap_err();
    assert!(matches!(err, ExprError::Binding(_)), "{:?}", err);
}

#[test]
fn test_get_and_set() {
    let engine = Engine::new().unwrap();
    let (value, child) = child_value();
    let accessor = engine.accessor_for(&value).unwrap();

    assert_eq!(accessor.get(&value, "Name").unwrap(), Value::str("c"));

    accessor.set(&value, "one", Value::Short(9)).unwrap();
    assert_eq!(child.borrow().one, 9);

    let err = accessor.set(&value, "one", Value::Long(9)).unwrap_err();
    assert!(matches!(err, ExprError::Type(_)), "{:?}", err);

    let err = accessor.get(&value, "missing").unwrap_err();
    assert!(matches!(err, ExprError::Binding(_)), "{:?}", err);
}

#[test]
fn test_accessor_rejects_foreign_context() {
    let engine = Engine::new().unwrap();
    let accessor = engine.accessor(TypeRef::of::<Child>());

    assert!(accessor.get(&Value::Int(1), "one").is_err());
}

#[test]
fn test_call_method_resolution() {
    let (scope, vm) = common::scope();
    let context = Value::from(Rc::clone(&vm));
    let accessor = scope.engine().accessor_for(&context).unwrap();

    // exact match per overload
    assert_eq!(
        accessor.call_method(&context, "Add", false, &[Value::Int(1), Value::Int(2)]).unwrap(),
        Value::Int(3)
    );
    assert_eq!(
        accessor
            .call_method(&context, "Add", false, &[Value::Float(1.5), Value::Float(2.0)])
            .unwrap(),
        Value::Float(3.5)
    );

    // single candidate: arguments coerced
    assert_eq!(
        accessor.call_method(&context, "Scale", false, &[Value::str("4")]).unwrap(),
        Value::Double(2.0)
    );

    // no exact match among several candidates
    let err = accessor
        .call_method(&context, "Add", false, &[Value::Int(1), Value::Float(2.0)])
        .unwrap_err();
    assert!(err.to_string().contains("Ambiguous"), "{}", err);

    let err = accessor.call_method(&context, "Touch", false, &[Value::Int(1)]).unwrap_err();
    assert!(err.to_string().contains("Argument count mismatch"), "{}", err);

    let err = accessor.call_method(&context, "Nope", false, &[]).unwrap_err();
    assert!(matches!(err, ExprError::Binding(_)), "{:?}", err);
}

#[test]
fn test_call_method_without_execution() {
    let (scope, vm) = common::scope();
    let context = Value::from(Rc::clone(&vm));
    let accessor = scope.engine().accessor_for(&context).unwrap();

    assert_eq!(accessor.call_method(&context, "Touch", true, &[]).unwrap(), Value::Null);
    assert_eq!(vm.borrow().calls, 0);

    // resolution still fails loudly
    assert!(accessor.call_method(&context, "Nope", true, &[]).is_err());
}

#[test]
fn test_null_binds_to_nullable_parameters() {
    let (scope, vm) = common::scope();
    let context = Value::from(Rc::clone(&vm));
    let accessor = scope.engine().accessor_for(&context).unwrap();

    // null fits the string parameter of Greet exactly, then fails to convert to a String
    let err = accessor.call_method(&context, "Greet", false, &[Value::Null]).unwrap_err();
    assert!(matches!(err, ExprError::Type(_)), "{:?}", err);
}

#[test]
fn test_indexer_resolution() {
    let (scope, vm) = common::scope();
    let grid = Value::from(Rc::clone(&vm.borrow().grid));
    let accessor = scope.engine().accessor_for(&grid).unwrap();

    assert_eq!(
        accessor.get_indexed(&grid, "Grid", false, &[Value::Int(2), Value::Int(0)]).unwrap(),
        Value::Int(7)
    );
    // converted to int when no indexer matches exactly
    assert_eq!(
        accessor
            .get_indexed(&grid, "Grid", false, &[Value::Float(1.0), Value::str("1")])
            .unwrap(),
        Value::Int(5)
    );
    assert_eq!(
        accessor.get_indexed(&grid, "Grid", true, &[Value::Int(0), Value::Int(0)]).unwrap(),
        Value::Null
    );

    let err = accessor.get_indexed(&grid, "Grid", false, &[Value::Int(0)]).unwrap_err();
    assert!(matches!(err, ExprError::Binding(_)), "{:?}", err);

    let err = accessor
        .get_indexed(&grid, "Grid", false, &[Value::Int(5), Value::Int(0)])
        .unwrap_err();
    assert!(matches!(err, ExprError::Host(_)), "{:?}", err);
}

#[test]
fn test_record_dynamic_members() {
    let engine = Engine::new().unwrap();
    let mut record = Record::new();
    record.insert("x", 1);

    let value = Value::object(record);
    let accessor = engine.accessor_for(&value).unwrap();

    assert_eq!(accessor.get(&value, "x").unwrap(), Value::Int(1));
    assert_eq!(accessor.get(&value, "Count").unwrap(), Value::Int(1));
    assert!(accessor.get(&value, "y").is_err());

    accessor.set(&value, "y", Value::Bool(true)).unwrap();
    assert_eq!(accessor.get(&value, "y").unwrap(), Value::Bool(true));
    assert_eq!(accessor.member_type_of(&value, "y").unwrap(), ValueType::Bool);
    assert_eq!(
        accessor.call_method(&value, "ContainsKey", false, &[Value::str("y")]).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_explicit_coercion() {
    assert_eq!(coerce(&Value::Float(2.5), ValueType::Int).unwrap(), Value::Int(2));
    assert_eq!(coerce(&Value::Float(3.5), ValueType::Int).unwrap(), Value::Int(4));
    assert_eq!(coerce(&Value::str(" 12 "), ValueType::Short).unwrap(), Value::Short(12));
    assert_eq!(coerce(&Value::Bool(true), ValueType::Double).unwrap(), Value::Double(1.0));
    assert_eq!(coerce(&Value::Null, ValueType::Long).unwrap(), Value::Long(0));
    assert_eq!(coerce(&Value::Int(3), ValueType::String).unwrap(), Value::Int(3));

    let err = coerce(&Value::Int(300), ValueType::Byte).unwrap_err();
    assert!(matches!(err, ExprError::Arithmetic(_)), "{:?}", err);

    let err = coerce(&Value::str("ten"), ValueType::Int).unwrap_err();
    assert!(matches!(err, ExprError::Type(_)), "{:?}", err);
}

#[test]
fn test_implicit_conversion_only_widens() {
    assert_eq!(i64::from_value(&Value::Int(4)).unwrap(), 4);
    assert_eq!(f64::from_value(&Value::Float(0.5)).unwrap(), 0.5);
    assert!(i32::from_value(&Value::Long(4)).is_err());
    assert!(i32::from_value(&Value::Float(1.0)).is_err());
    assert!(bool::from_value(&Value::Int(1)).is_err());
    assert_eq!(Option::<String>::from_value(&Value::Null).unwrap(), None);
    assert!(String::from_value(&Value::Int(1)).is_err());
}
