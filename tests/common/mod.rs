#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use bindexpr as bx;

use bx::builtins::MathFunctions;
use bx::{Engine, ExprError, Reflect, Scope, TypeBuilder, TypeRef, Value, ValueType};

#[derive(Debug, Clone)]
pub struct Child {
    pub one: i32,
    pub name: String,
}

impl Reflect for Child {
    const NAME: &'static str = "Child";

    fn reflect(b: &mut TypeBuilder<Self>) {
        b.field("one", |c: &Child| c.one, |c: &mut Child, v: i32| c.one = v)
            .field("Name", |c: &Child| c.name.clone(), |c: &mut Child, v: String| c.name = v);
    }
}

/// Fixed 3x3 grid reachable through a two-dimensional indexer.
#[derive(Debug, Clone)]
pub struct Grid {
    pub cells: [[i32; 3]; 3],
}

impl Reflect for Grid {
    const NAME: &'static str = "Grid";

    fn reflect(b: &mut TypeBuilder<Self>) {
        b.property("Width", |g: &Grid| g.cells.len() as i32).indexer_with(
            &[ValueType::Int, ValueType::Int],
            ValueType::Int,
            |g: &Grid, args: &[Value]| {
                let row = args[0].to_i32("row")?;
                let column = args[1].to_i32("column")?;

                usize::try_from(row)
                    .ok()
                    .zip(usize::try_from(column).ok())
                    .and_then(|(r, c)| g.cells.get(r)?.get(c).copied())
                    .map(Value::Int)
                    .ok_or_else(|| ExprError::host(format!("No cell at {}, {}", row, column)))
            },
        );
    }
}

#[derive(Debug)]
pub struct ViewModel {
    pub index: i32,
    pub pi: f32,
    pub a: i32,
    pub one: i32,
    pub flag: bool,
    pub name: String,
    pub ratio: f64,
    pub child: Option<Rc<RefCell<Child>>>,
    pub grid: Rc<RefCell<Grid>>,
    pub items: Vec<Value>,
    pub calls: i32,
}

impl ViewModel {
    pub fn new() -> Self {
        Self {
            index: 10,
            pi: 3.14159,
            a: 0,
            one: 1,
            flag: true,
            name: "vm".to_string(),
            ratio: 0.5,
            child: Some(Rc::new(RefCell::new(Child {
                one: 11,
                name: "child".to_string(),
            }))),
            grid: Rc::new(RefCell::new(Grid {
                cells: [[1, 2, 3], [4, 5, 6], [7, 8, 9]],
            })),
            items: vec![Value::Int(3), Value::str("x"), Value::Bool(false)],
            calls: 0,
        }
    }
}

impl Reflect for ViewModel {
    const NAME: &'static str = "ViewModel";

    fn reflect(b: &mut TypeBuilder<Self>) {
        b.field("Index", |vm: &ViewModel| vm.index, |vm: &mut ViewModel, v: i32| vm.index = v)
            .field("Pi", |vm: &ViewModel| vm.pi, |vm: &mut ViewModel, v: f32| vm.pi = v)
            .field("a", |vm: &ViewModel| vm.a, |vm: &mut ViewModel, v: i32| vm.a = v)
            .field("one", |vm: &ViewModel| vm.one, |vm: &mut ViewModel, v: i32| vm.one = v)
            .field("Flag", |vm: &ViewModel| vm.flag, |vm: &mut ViewModel, v: bool| vm.flag = v)
            .field("Name", |vm: &ViewModel| vm.name.clone(), |vm: &mut ViewModel, v: String| {
                vm.name = v
            })
            .field("Ratio", |vm: &ViewModel| vm.ratio, |vm: &mut ViewModel, v: f64| vm.ratio = v)
            .field(
                "Child",
                |vm: &ViewModel| vm.child.clone(),
                |vm: &mut ViewModel, v: Option<Rc<RefCell<Child>>>| vm.child = v,
            )
            .property("Grid", |vm: &ViewModel| Rc::clone(&vm.grid))
            .property("Items", |vm: &ViewModel| vm.items.clone())
            .property("Calls", |vm: &ViewModel| vm.calls)
            .method("throwException", &[], ValueType::Void, |_: &mut ViewModel, _: &[Value]| {
                Err(ExprError::host("throwException was called"))
            })
            .method0("GetOne", |vm: &mut ViewModel| {
                vm.calls += 1;
                vm.child.clone()
            })
            .method0("Touch", |vm: &mut ViewModel| {
                vm.calls += 1;
                vm.calls
            })
            .method1("SetName", |vm: &mut ViewModel, name: String| {
                vm.calls += 1;
                vm.name = name;
            })
            .method1("Greet", |vm: &mut ViewModel, who: String| format!("{} greets {}", vm.name, who))
            .method2("Add", |_: &mut ViewModel, x: i32, y: i32| x + y)
            .method2("Add", |_: &mut ViewModel, x: f32, y: f32| x + y)
            .method1("Scale", |vm: &mut ViewModel, by: f64| vm.ratio * by);
    }
}

/// Static-only type: `Clock.Ticks`, `Clock.Twice(x)`.
pub struct Clock;

impl Reflect for Clock {
    const NAME: &'static str = "Clock";

    fn reflect(b: &mut TypeBuilder<Self>) {
        b.static_property("Ticks", || 42)
            .static_method1("Twice", |x: i32| x * 2);
    }
}

pub fn engine() -> Rc<Engine> {
    Rc::new(Engine::new().expect("standard grammar"))
}

/// Scope with roots `vm`, `nullVm`, `Clock` and `Math`.
pub fn scope() -> (Scope, Rc<RefCell<ViewModel>>) {
    let vm = Rc::new(RefCell::new(ViewModel::new()));

    let mut scope = Scope::new(engine());
    scope.add_value_root("vm", Rc::clone(&vm));
    scope.add_value_root("nullVm", Value::Null);
    scope.add_static_root("Clock", TypeRef::of::<Clock>());
    scope.add_static_root("Math", TypeRef::of::<MathFunctions>());

    (scope, vm)
}

pub fn eval(scope: &Scope, code: &str) -> Value {
    scope
        .evaluate(code)
        .unwrap_or_else(|e| panic!("{:?} failed: {}", code, e))
}
