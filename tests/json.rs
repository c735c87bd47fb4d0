mod common;

use bindexpr as bx;
use pretty_assertions::assert_eq;
use serde_json::json;

use bx::builtins::Record;
use bx::json::{from_value, roots_from_reader, roots_from_str, to_value};
use bx::{ExprError, Scope, Value};
use common::{engine, eval};

#[test]
fn test_numbers_keep_their_width() {
    assert_eq!(to_value(&json!(7)), Value::Int(7));
    assert_eq!(to_value(&json!(-7)), Value::Int(-7));
    assert_eq!(to_value(&json!(5_000_000_000i64)), Value::Long(5_000_000_000));
    assert_eq!(to_value(&json!(1.5)), Value::Double(1.5));
}

#[test]
fn test_objects_become_records() {
    let value = to_value(&json!({ "name": "box", "size": [1, 2] }));

    let record = value
        .as_object()
        .and_then(|obj| obj.downcast::<Record>())
        .expect("record");
    let record = record.borrow();

    assert_eq!(record.len(), 2);
    assert_eq!(record.get("name"), Some(&Value::str("box")));
    assert_eq!(
        record.get("size"),
        Some(&Value::list(vec![Value::Int(1), Value::Int(2)]))
    );
}

#[test]
fn test_values_render_back_to_json() {
    let document = json!({
        "flag": true,
        "nothing": null,
        "items": [1, "two", 3.5],
        "nested": { "deep": -4 }
    });

    assert_eq!(from_value(&to_value(&document)), document);
}

#[test]
fn test_from_value_of_host_values() {
    assert_eq!(from_value(&Value::Float(0.1)), json!(0.1));
    assert_eq!(from_value(&Value::Double(f64::NAN)), json!(null));
    assert_eq!(from_value(&Value::Byte(200)), json!(200));

    let (scope, _) = common::scope();
    assert_eq!(from_value(&eval(&scope, "vm.Child")), json!("<Child>"));
    assert_eq!(from_value(&eval(&scope, "Clock")), json!("Clock"));
}

#[test]
fn test_roots_from_str() {
    let mut scope = Scope::new(engine());

    let count = roots_from_str(
        &mut scope,
        r#"{ "order": { "qty": 3, "price": 2.5, "tags": ["a", "b"] }, "rate": 2 }"#,
    )
    .unwrap();

    assert_eq!(count, 2);
    assert_eq!(eval(&scope, "order.qty * rate"), Value::Int(6));
    assert_eq!(eval(&scope, "order.price * order.qty"), Value::Float(7.5));
    assert_eq!(eval(&scope, "order.tags[1]"), Value::str("b"));
    assert_eq!(eval(&scope, "order.tags.Count"), Value::Int(2));
    assert_eq!(eval(&scope, "order['qty']"), Value::Int(3));
    assert_eq!(eval(&scope, "'{order.qty} x {order.price:F2}'"), Value::str("3 x 2.50"));
}

#[test]
fn test_roots_from_reader() {
    let mut scope = Scope::new(engine());
    let text = br#"{ "user": { "name": "ada" } }"#;

    assert_eq!(roots_from_reader(&mut scope, &text[..]).unwrap(), 1);
    assert_eq!(eval(&scope, "user.name"), Value::str("ada"));

    scope.set_path("user.name", Value::str("grace")).unwrap();
    assert_eq!(eval(&scope, "user.name"), Value::str("grace"));
}

#[test]
fn test_root_document_must_be_an_object() {
    let mut scope = Scope::new(engine());

    let err = roots_from_str(&mut scope, "[1, 2]").unwrap_err();
    assert!(matches!(err, ExprError::Host(_)), "{:?}", err);

    let err = roots_from_str(&mut scope, "{ broken").unwrap_err();
    assert!(matches!(err, ExprError::Json(_)), "{:?}", err);
}
