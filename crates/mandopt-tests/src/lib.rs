//! Scenario modules shared by the end-to-end tests and the benchmark.
//!
//! Every builder returns the module together with the ids the tests inspect.

use mandopt::ir::{
    Apply, BinOp, Body, FuncId, Function, FunctionBuilder, Global, GlobalId, InlineStrategy,
    Module, PerformanceConstraint, VTable,
};
use std::collections::HashMap;

/// Installs `env_logger` once per test binary. Honors `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn function(name: &str, body: Body) -> Function {
    let mut f = Function::new(name);
    f.body = Some(body);
    f
}

fn hot(name: &str, body: Body) -> Function {
    let mut f = function(name, body);
    f.performance = PerformanceConstraint::NoAllocation;
    f
}

fn initializer(name: &str, body: Body) -> Function {
    let mut f = function(name, body);
    f.global_init_once = true;
    f
}

fn static_global(module: &mut Module, name: &str) -> GlobalId {
    let mut g = Global::new(name);
    g.must_be_initialized_statically = true;
    module.add_global(g)
}

/// `makeValue() -> (1, 2)` as a two-field struct.
fn make_value_body() -> Body {
    let mut b = FunctionBuilder::new();
    let one = b.constant(1);
    let two = b.constant(2);
    let s = b.structure(vec![one, two]);
    b.ret(Some(s));
    b.finish()
}

// ── Global initializers ──────────────────────────────────────────────────────

pub struct GlobalInit {
    pub module: Module,
    pub global: GlobalId,
    pub init: FuncId,
    pub make_value: FuncId,
}

/// `initG` allocates the statically initialized global `G` and stores the
/// result of `makeValue()` into it.
pub fn global_init() -> GlobalInit {
    let mut module = Module::new();
    let global = static_global(&mut module, "G");
    let make_value = module.add_function(function("makeValue", make_value_body()));

    let mut b = FunctionBuilder::new();
    b.alloc_global(global);
    let addr = b.global_addr(global);
    let v = b.call(make_value, vec![]);
    b.store(v, addr);
    b.ret(None);
    let init = module.add_function(initializer("initG", b.finish()));

    GlobalInit {
        module,
        global,
        init,
        make_value,
    }
}

/// `initG` stores `makeValue()` twice into field 0 of `G`. Only the first
/// call may be inlined.
pub fn repeated_field_store() -> GlobalInit {
    let mut module = Module::new();
    let global = static_global(&mut module, "G");
    let make_value = module.add_function(function("makeValue", make_value_body()));

    let mut b = FunctionBuilder::new();
    b.alloc_global(global);
    let addr = b.global_addr(global);
    for _ in 0..2 {
        let field = b.struct_element_addr(addr, 0);
        let v = b.call(make_value, vec![]);
        b.store(v, field);
    }
    b.ret(None);
    let init = module.add_function(initializer("initG", b.finish()));

    GlobalInit {
        module,
        global,
        init,
        make_value,
    }
}

/// `initG` passes the result of `makeValue()` to an unrelated function
/// before storing it, so the flow into `G` cannot be proven.
pub fn escaping_initializer() -> GlobalInit {
    let mut module = Module::new();
    let global = static_global(&mut module, "G");
    let make_value = module.add_function(function("makeValue", make_value_body()));
    let log = module.add_function(Function::new("log"));

    let mut b = FunctionBuilder::new();
    b.alloc_global(global);
    let addr = b.global_addr(global);
    let v = b.call(make_value, vec![]);
    b.call_void(log, vec![v]);
    b.store(v, addr);
    b.ret(None);
    let init = module.add_function(initializer("initG", b.finish()));

    GlobalInit {
        module,
        global,
        init,
        make_value,
    }
}

// ── Inline attributes ────────────────────────────────────────────────────────

pub struct TransparentChain {
    pub module: Module,
    pub entry: FuncId,
    pub outer: FuncId,
    pub inner: FuncId,
}

/// `entry(x)` calls transparent `outer(x)`, which calls transparent
/// `inner(x) = x + 1` twice.
pub fn transparent_chain() -> TransparentChain {
    let mut module = Module::new();

    let mut b = FunctionBuilder::new();
    let x = b.param();
    let one = b.constant(1);
    let r = b.binop(BinOp::Add, x, one);
    b.ret(Some(r));
    let mut inner = function("inner", b.finish());
    inner.transparent = true;
    let inner = module.add_function(inner);

    let mut b = FunctionBuilder::new();
    let x = b.param();
    let y = b.call(inner, vec![x]);
    let z = b.call(inner, vec![y]);
    b.ret(Some(z));
    let mut outer = function("outer", b.finish());
    outer.transparent = true;
    let outer = module.add_function(outer);

    let mut b = FunctionBuilder::new();
    let x = b.param();
    let r = b.call(outer, vec![x]);
    b.ret(Some(r));
    let entry = module.add_function(hot("entry", b.finish()));

    TransparentChain {
        module,
        entry,
        outer,
        inner,
    }
}

pub struct AlwaysInline {
    pub module: Module,
    pub init: FuncId,
    pub hot: FuncId,
    pub setup: FuncId,
}

/// `setup` is marked always-inline. The initializer and a performance
/// annotated function both call it without storing its result.
pub fn always_inline() -> AlwaysInline {
    let mut module = Module::new();
    let global = static_global(&mut module, "Config");
    let effect = module.add_function(Function::new("registerDefaults"));

    let mut b = FunctionBuilder::new();
    b.call_void(effect, vec![]);
    b.ret(None);
    let mut setup = function("setup", b.finish());
    setup.inline_strategy = InlineStrategy::Always;
    let setup = module.add_function(setup);

    let mut b = FunctionBuilder::new();
    b.alloc_global(global);
    b.call_void(setup, vec![]);
    b.ret(None);
    let init = module.add_function(initializer("initConfig", b.finish()));

    let mut b = FunctionBuilder::new();
    b.call_void(setup, vec![]);
    b.ret(None);
    let hot = module.add_function(hot("hot", b.finish()));

    AlwaysInline {
        module,
        init,
        hot,
        setup,
    }
}

pub struct AlwaysInlineGeneric {
    pub module: Module,
    pub init: FuncId,
    pub conv: FuncId,
}

/// `initG` stores `conv<Int>(7)` into `G`. `conv<T>(x)` is always-inline and
/// only mentions `T` through a metatype.
pub fn always_inline_generic() -> AlwaysInlineGeneric {
    let mut module = Module::new();
    let global = static_global(&mut module, "G");

    let mut b = FunctionBuilder::new();
    let x = b.param();
    let ty = b.metatype("T");
    b.debug_value(ty);
    b.ret(Some(x));
    let mut conv = function("conv", b.finish());
    conv.generic_params = vec!["T".to_string()];
    conv.inline_strategy = InlineStrategy::Always;
    let conv = module.add_function(conv);

    let mut b = FunctionBuilder::new();
    b.alloc_global(global);
    let addr = b.global_addr(global);
    let seven = b.constant(7);
    let v = b.new_var();
    b.apply(Apply {
        substitutions: vec!["Int".to_string()],
        ..Apply::direct(Some(v), conv, vec![seven])
    });
    b.store(v, addr);
    b.ret(None);
    let init = module.add_function(initializer("initG", b.finish()));

    AlwaysInlineGeneric { module, init, conv }
}

// ── Classes ──────────────────────────────────────────────────────────────────

pub struct Shapes {
    pub module: Module,
    pub entry: FuncId,
    pub square_area: FuncId,
    pub shape_describe: FuncId,
}

/// `Square` inherits `describe` from `Shape` and overrides `area`. `entry`
/// allocates a `Square` and calls both methods dynamically. `describe` is
/// transparent, `area` is not.
pub fn shapes() -> Shapes {
    let mut module = Module::new();

    let mut b = FunctionBuilder::new();
    let _this = b.param();
    let side = b.constant(4);
    let area = b.binop(BinOp::Mul, side, side);
    b.ret(Some(area));
    let square_area = module.add_function(function("Square.area", b.finish()));

    let mut b = FunctionBuilder::new();
    let _this = b.param();
    let tag = b.constant(7);
    b.ret(Some(tag));
    let mut describe = function("Shape.describe", b.finish());
    describe.transparent = true;
    let shape_describe = module.add_function(describe);

    let shape_area = module.add_function(Function::new("Shape.area"));
    module.vtables.push(VTable {
        class: "Shape".to_string(),
        superclass: None,
        entries: HashMap::from([
            ("area".to_string(), shape_area),
            ("describe".to_string(), shape_describe),
        ]),
    });
    module.vtables.push(VTable {
        class: "Square".to_string(),
        superclass: Some("Shape".to_string()),
        entries: HashMap::from([("area".to_string(), square_area)]),
    });

    let mut b = FunctionBuilder::new();
    let obj = b.alloc_ref("Square");
    let a = b.method_call("area", vec![], obj);
    let d = b.method_call("describe", vec![], obj);
    let sum = b.binop(BinOp::Add, a, d);
    b.dealloc_ref(obj);
    b.ret(Some(sum));
    let entry = module.add_function(hot("entry", b.finish()));

    Shapes {
        module,
        entry,
        square_area,
        shape_describe,
    }
}

// ── Lazy bodies and generics ─────────────────────────────────────────────────

pub struct LazyLibrary {
    pub module: Module,
    pub entry: FuncId,
    pub helper: FuncId,
    pub external: FuncId,
}

/// `entry` calls `helper`, whose body only exists in the library. `helper`
/// calls `external`, which has no body anywhere.
pub fn lazy_library() -> LazyLibrary {
    let mut module = Module::new();
    let external = module.add_function(Function::new("external"));
    let helper = module.add_function(Function::new("helper"));

    let mut b = FunctionBuilder::new();
    b.constant(3);
    b.call_void(external, vec![]);
    b.ret(None);
    module.library.insert(helper, b.finish());

    let mut b = FunctionBuilder::new();
    b.call_void(helper, vec![]);
    b.ret(None);
    let entry = module.add_function(hot("entry", b.finish()));

    LazyLibrary {
        module,
        entry,
        helper,
        external,
    }
}

pub struct Generic {
    pub module: Module,
    pub entry: FuncId,
    pub generic: FuncId,
}

/// `entry` calls the generic `typeName<T>` twice with `Int` and once with
/// `String`.
pub fn generic_calls() -> Generic {
    let mut module = Module::new();

    let mut b = FunctionBuilder::new();
    let m = b.metatype("T");
    b.ret(Some(m));
    let mut generic = function("typeName", b.finish());
    generic.generic_params = vec!["T".to_string()];
    let generic = module.add_function(generic);

    let mut b = FunctionBuilder::new();
    for ty in ["Int", "Int", "String"] {
        b.apply(Apply {
            substitutions: vec![ty.to_string()],
            ..Apply::direct(None, generic, vec![])
        });
    }
    b.ret(None);
    let entry = module.add_function(hot("entry", b.finish()));

    Generic {
        module,
        entry,
        generic,
    }
}

/// A module with `width` performance-annotated functions, each calling a
/// chain of `depth` transparent helpers.
pub fn wide_module(width: usize, depth: usize) -> Module {
    let mut module = Module::new();
    let mut previous: Option<FuncId> = None;
    for level in 0..depth {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let step = b.constant(level as i64);
        let mut r = b.binop(BinOp::Add, x, step);
        if let Some(callee) = previous {
            r = b.call(callee, vec![r]);
        }
        b.ret(Some(r));
        let mut f = function(&format!("helper{level}"), b.finish());
        f.transparent = true;
        previous = Some(module.add_function(f));
    }
    for i in 0..width {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let r = match previous {
            Some(callee) => b.call(callee, vec![x]),
            None => x,
        };
        b.ret(Some(r));
        module.add_function(hot(&format!("entry{i}"), b.finish()));
    }
    module
}
