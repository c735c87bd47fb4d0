mod common;

use bindexpr as bx;
use pretty_assertions::assert_eq;

use bx::{ExprError, Value};
use common::{eval, scope};

fn eval_error(code: &str) -> ExprError {
    let (scope, _) = scope();
    match scope.evaluate(code) {
        Ok(value) => panic!("{:?} evaluated to {:?}", code, value),
        Err(e) => e,
    }
}

#[test]
fn test_integer_arithmetic() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "2+3*4"), Value::Int(14));
    assert_eq!(eval(&scope, "(2+3)*4"), Value::Int(20));
    assert_eq!(eval(&scope, "7/2"), Value::Int(3));
    assert_eq!(eval(&scope, "-7/2"), Value::Int(-3));
    assert_eq!(eval(&scope, "7%3"), Value::Int(1));
    assert_eq!(eval(&scope, "3+-2"), Value::Int(1));
    assert_eq!(eval(&scope, "+5"), Value::Int(5));
    assert_eq!(eval(&scope, "6 × 2 ÷ 3 − 1"), Value::Int(3));
}

#[test]
fn test_integer_overflow_wraps() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "2147483647 + 1"), Value::Int(i32::MIN));
    assert_eq!(eval(&scope, "65536 * 65536"), Value::Int(0));
}

#[test]
fn test_float_promotion() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "7/2.0"), Value::Float(3.5));
    assert_eq!(eval(&scope, "1 + 0.5f"), Value::Float(1.5));
    assert_eq!(eval(&scope, "5 % 2.5"), Value::Float(0.0));
    assert_eq!(eval(&scope, "-1.5"), Value::Float(-1.5));
}

#[test]
fn test_power_is_always_float() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "2**3"), Value::Float(8.0));
    assert_eq!(eval(&scope, "2**3**2"), Value::Float(512.0));
    assert_eq!(eval(&scope, "4**0.5"), Value::Float(2.0));
}

#[test]
fn test_mixed_member_division() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "vm.Index/vm.Pi"), Value::Float(10f32 / 3.14159f32));
    assert_eq!(eval(&scope, "vm.Index/4"), Value::Int(2));
}

#[test]
fn test_division_by_zero() {
    assert!(matches!(eval_error("1/0"), ExprError::Arithmetic(_)));
    assert!(matches!(eval_error("1%0"), ExprError::Arithmetic(_)));

    let (scope, _) = scope();
    match eval(&scope, "1/0.0") {
        Value::Float(v) => assert!(v.is_infinite()),
        other => panic!("expected a float, got {:?}", other),
    }
}

#[test]
fn test_string_concatenation() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "'a' + 1 + 2"), Value::str("a12"));
    assert_eq!(eval(&scope, "1 + 2 + 'a'"), Value::str("3a"));
    assert_eq!(eval(&scope, "'x' + true + null"), Value::str("xtrue"));
    assert_eq!(eval(&scope, "vm.Name + '!'"), Value::str("vm!"));
}

#[test]
fn test_arithmetic_type_errors() {
    assert!(matches!(eval_error("true + 1"), ExprError::Type(_)));
    assert!(matches!(eval_error("null * 2"), ExprError::Type(_)));
    assert!(matches!(eval_error("'a' - 1"), ExprError::Type(_)));
    assert!(matches!(eval_error("-'a'"), ExprError::Type(_)));
    assert!(matches!(eval_error("vm < 1"), ExprError::Type(_)));
}

#[test]
fn test_comparisons() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "1 < 2"), Value::Bool(true));
    assert_eq!(eval(&scope, "2 <= 2"), Value::Bool(true));
    assert_eq!(eval(&scope, "1.5 > 2"), Value::Bool(false));
    assert_eq!(eval(&scope, "vm.Index >= 10"), Value::Bool(true));
}

#[test]
fn test_equality() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "1 == 1.0"), Value::Bool(true));
    assert_eq!(eval(&scope, "'1' == 1"), Value::Bool(true));
    assert_eq!(eval(&scope, "'a' != 'b'"), Value::Bool(true));
    assert_eq!(eval(&scope, "null == null"), Value::Bool(true));
    assert_eq!(eval(&scope, "vm == vm"), Value::Bool(true));
    assert_eq!(eval(&scope, "vm == vm.Child"), Value::Bool(false));
    assert_eq!(eval(&scope, "nullVm == null"), Value::Bool(true));
    assert_eq!(eval(&scope, "true == 1"), Value::Bool(false));
    assert_eq!(eval(&scope, "vm.Scale(2) == 1"), Value::Bool(true));
}

#[test]
fn test_boolean_operators() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "!false"), Value::Bool(true));
    assert_eq!(eval(&scope, "true && !vm.Flag"), Value::Bool(false));
    assert_eq!(eval(&scope, "false || 1 < 2"), Value::Bool(true));

    assert!(matches!(eval_error("!1"), ExprError::Type(_)));
    assert!(matches!(eval_error("1 && true"), ExprError::Type(_)));
}

#[test]
fn test_short_circuit() {
    let (scope, vm) = scope();

    assert_eq!(eval(&scope, "false && vm.throwException()"), Value::Bool(false));
    assert_eq!(eval(&scope, "true || vm.throwException()"), Value::Bool(true));
    assert_eq!(eval(&scope, "true ? 1 : vm.throwException()"), Value::Int(1));
    assert_eq!(eval(&scope, "false ? vm.Touch() : 2"), Value::Int(2));

    assert_eq!(vm.borrow().calls, 0);
    assert!(matches!(
        scope.evaluate("true && vm.throwException()"),
        Err(ExprError::Host(_))
    ));
}

#[test]
fn test_ternary_requires_bool() {
    assert!(matches!(eval_error("1 ? 2 : 3"), ExprError::Type(_)));
}

#[test]
fn test_member_reads() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "vm.Index"), Value::Int(10));
    assert_eq!(eval(&scope, "vm.Child.one"), Value::Int(11));
    assert_eq!(eval(&scope, "vm.Child.Name.Length"), Value::Int(5));
    assert_eq!(eval(&scope, "(true ? vm : vm.Child).one"), Value::Int(1));
    assert_eq!(eval(&scope, "(false ? vm : vm.Child).one"), Value::Int(11));
    assert_eq!(eval(&scope, "Clock.Ticks"), Value::Int(42));
    assert_eq!(eval(&scope, "Math.PI > 3"), Value::Bool(true));
}

#[test]
fn test_null_propagation() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "nullVm?.Pi"), Value::Null);
    assert_eq!(eval(&scope, "nullVm?.Child?.one"), Value::Null);
    assert_eq!(eval(&scope, "vm?.Index"), Value::Int(10));

    assert!(matches!(eval_error("nullVm.Pi"), ExprError::Binding(_)));
    // only the dot that met null short-circuits
    assert!(matches!(eval_error("nullVm?.Child.one"), ExprError::Binding(_)));
}

#[test]
fn test_unknown_names() {
    let err = eval_error("nobody.Pi");
    assert!(matches!(err, ExprError::Binding(_)));
    assert!(err.to_string().contains("Unable to find member root for nobody"), "{}", err);

    assert!(matches!(eval_error("vm.Missing"), ExprError::Binding(_)));
    assert!(matches!(eval_error("vm.Missing()"), ExprError::Binding(_)));
    assert!(matches!(eval_error("Clock.Index"), ExprError::Binding(_)));
}

#[test]
fn test_methods() {
    let (scope, vm) = scope();

    assert_eq!(eval(&scope, "vm.Add(1, 2)"), Value::Int(3));
    assert_eq!(eval(&scope, "vm.Add(1.5f, 2.5f)"), Value::Float(4.0));
    assert_eq!(eval(&scope, "vm.Greet('you')"), Value::str("vm greets you"));
    assert_eq!(eval(&scope, "vm.GetOne().one"), Value::Int(11));
    assert_eq!(eval(&scope, "Clock.Twice(21)"), Value::Int(42));
    assert_eq!(eval(&scope, "Math.Max(3, 7)"), Value::Int(7));
    assert_eq!(eval(&scope, "vm.Name.ToUpper()"), Value::str("VM"));
    assert_eq!(eval(&scope, "vm.SetName('renamed')"), Value::Null);

    assert_eq!(vm.borrow().name, "renamed");
    assert_eq!(vm.borrow().calls, 2);
}

#[test]
fn test_method_arguments_are_coerced_for_a_single_candidate() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "vm.Scale(4)"), Value::Double(2.0));
    assert_eq!(eval(&scope, "Math.Sqrt(16)"), Value::Float(4.0));
}

#[test]
fn test_method_overload_errors() {
    let err = eval_error("vm.Add(1.5f, 2)");
    assert!(err.to_string().contains("Ambiguous"), "{}", err);

    let err = eval_error("vm.Greet('a', 'b')");
    assert!(matches!(err, ExprError::Binding(_)), "{:?}", err);
}

#[test]
fn test_method_needs_a_context() {
    let err = eval_error("Touch()");
    assert!(err.to_string().contains("Methods can only be used"), "{}", err);
}

#[test]
fn test_indexers() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "vm.Grid[1, 2]"), Value::Int(6));
    assert_eq!(eval(&scope, "vm.Grid[2, 0] + vm.Grid[0, 0]"), Value::Int(8));
    assert_eq!(eval(&scope, "vm.Items[1]"), Value::str("x"));
    assert_eq!(eval(&scope, "vm.Items['2']"), Value::Bool(false));
    assert_eq!(eval(&scope, "vm.Name[1]"), Value::str("m"));
    assert_eq!(eval(&scope, "vm.Items.Count"), Value::Int(3));
}

#[test]
fn test_indexer_on_a_root() {
    let (mut scope, _) = scope();
    scope.add_value_root("list", Value::list([Value::Int(5), Value::Int(6)]));

    assert_eq!(eval(&scope, "list[1]"), Value::Int(6));
    assert!(matches!(eval_error("nullVm[0]"), ExprError::Binding(_)));
    assert!(matches!(scope.evaluate("list[7]"), Err(ExprError::Binding(_))));
}

#[test]
fn test_assignment() {
    let (scope, vm) = scope();

    assert_eq!(eval(&scope, "vm.a=15"), Value::Int(15));
    assert_eq!(vm.borrow().a, 15);
    assert_eq!(eval(&scope, "vm.a"), Value::Int(15));

    assert_eq!(eval(&scope, "vm.Child.Name = 'x' + vm.a"), Value::str("x15"));
    assert_eq!(vm.borrow().child.as_ref().unwrap().borrow().name, "x15");

    assert_eq!(eval(&scope, "vm.a = vm.one = 7"), Value::Int(7));
    assert_eq!((vm.borrow().a, vm.borrow().one), (7, 7));
}

#[test]
fn test_assignment_converts_implicitly() {
    let (scope, vm) = scope();

    assert_eq!(eval(&scope, "vm.Pi = 2"), Value::Int(2));
    assert_eq!(vm.borrow().pi, 2.0);

    assert!(matches!(eval_error("vm.a = 1.5"), ExprError::Type(_)));
    assert!(matches!(eval_error("vm.Flag = 1"), ExprError::Type(_)));
}

#[test]
fn test_assignment_targets() {
    let err = eval_error("vm = 1");
    assert!(err.to_string().contains("Left part of assignment must be dot"), "{}", err);

    assert!(matches!(eval_error("vm.Touch() = 1"), ExprError::Binding(_)));
    assert!(matches!(eval_error("vm.Calls = 1"), ExprError::Binding(_)));
}

#[test]
fn test_null_propagating_dot_is_not_an_assignment_target() {
    let (scope, vm) = scope();

    let err = scope.evaluate("vm?.a = 5").unwrap_err();
    assert!(err.to_string().contains("Left part of assignment must be dot"), "{}", err);
    assert_eq!(vm.borrow().a, 0);

    assert!(matches!(scope.evaluate("nullVm?.a = 5"), Err(ExprError::Binding(_))));
    assert!(matches!(scope.evaluate("nullVm.a = 5"), Err(ExprError::Binding(_))));

    // `?.` further left only guards the context
    assert_eq!(eval(&scope, "vm?.Child.one = 3"), Value::Int(3));
    assert_eq!(vm.borrow().child.as_ref().unwrap().borrow().one, 3);
}

#[test]
fn test_disabled_execution() {
    let (mut scope, vm) = scope();
    scope.set_disable_execute(true);

    assert_eq!(eval(&scope, "vm.Touch()"), Value::Null);
    assert_eq!(eval(&scope, "vm.a = 3"), Value::Int(3));
    assert_eq!(eval(&scope, "vm.Index"), Value::Int(10));

    let vm = vm.borrow();
    assert_eq!(vm.calls, 0);
    assert_eq!(vm.a, 0);
}

#[test]
fn test_disabled_set() {
    let (mut scope, vm) = scope();
    scope.set_disable_set(true);

    assert_eq!(eval(&scope, "vm.a = 3"), Value::Int(3));
    assert_eq!(eval(&scope, "vm.Touch()"), Value::Int(1));
    assert_eq!(vm.borrow().a, 0);
}

#[test]
fn test_interpolation() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "'arne [{2+1,4}]'"), Value::str("arne [   3]"));
    assert_eq!(eval(&scope, "'[{vm.Name,-4}]'"), Value::str("[vm  ]"));
    assert_eq!(eval(&scope, "\"{vm.Index} of {vm.Child.one}\""), Value::str("10 of 11"));
    assert_eq!(eval(&scope, "'{vm.Pi:F2}'"), Value::str("3.14"));
    assert_eq!(eval(&scope, "'{{literal}}'"), Value::str("{literal}"));
    assert_eq!(eval(&scope, "'{nullVm?.Pi}|'"), Value::str("|"));
}

#[test]
fn test_interpolation_sees_current_values() {
    let (scope, vm) = scope();
    let expression = scope.build_or_get_expression("'a={vm.a}'").unwrap();

    assert_eq!(expression.evaluate(&scope).unwrap(), Value::str("a=0"));
    vm.borrow_mut().a = 9;
    assert_eq!(expression.evaluate(&scope).unwrap(), Value::str("a=9"));
}

#[test]
fn test_to_string_with_format() {
    let (scope, _) = scope();

    assert_eq!(eval(&scope, "vm.Index.ToString()"), Value::str("10"));
    assert_eq!(eval(&scope, "vm.Index.ToString('D4')"), Value::str("0010"));
    assert_eq!(eval(&scope, "(1.5).ToString('0.00')"), Value::str("1.50"));
}
