//! Devirtualization of class method calls.
//!
//! A `Method` apply whose receiver is a fresh `AllocRef` has a statically
//! known dynamic type. The method is resolved in that class's vtable (walking
//! superclasses) and the apply becomes a `Direct` call.

use crate::ir::{Callee, DefUse, FuncId, Instr, InstrRef, Module};
use log::debug;

/// Rewrites the method apply at `at` in `f` into a direct call.
///
/// Without `mandatory`, the call is only rewritten when the resolved
/// implementation has a body the optimizer can work with.
pub fn devirtualize(module: &mut Module, f: FuncId, at: InstrRef, mandatory: bool) -> bool {
    let Some(target) = resolve(module, f, at) else {
        return false;
    };
    if !mandatory && !module.body_available(target) {
        return false;
    }
    let Some(apply) = module
        .function_mut(f)
        .body
        .as_mut()
        .and_then(|body| body.blocks.get_mut(at.block))
        .and_then(|block| block.instructions.get_mut(at.index))
        .and_then(Instr::as_apply_mut)
    else {
        return false;
    };
    debug!("devirtualize: {} -> {target} in {f}", apply.callee);
    apply.callee = Callee::Direct(target);
    true
}

/// The implementation a method apply dispatches to, if the receiver's class
/// is known.
fn resolve(module: &Module, f: FuncId, at: InstrRef) -> Option<FuncId> {
    let body = module.functions.get(f.as_usize())?.body.as_ref()?;
    let apply = body.get_instr(at)?.as_apply()?;
    let Callee::Method(method) = &apply.callee else {
        return None;
    };
    let receiver = apply.receiver()?;
    let def_use = DefUse::build(body);
    match body.instr(def_use.single_def(receiver)?) {
        Instr::AllocRef { class, .. } => module.lookup_method(class, method),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, FunctionBuilder, VTable};
    use std::collections::HashMap;

    fn shapes() -> (Module, FuncId) {
        let mut module = Module::new();
        let area = module.add_function(Function::new("Square.area"));
        module.vtables.push(VTable {
            class: "Square".to_string(),
            superclass: None,
            entries: HashMap::from([("area".to_string(), area)]),
        });
        (module, area)
    }

    fn caller_with_receiver(module: &mut Module, known: bool) -> FuncId {
        let mut b = FunctionBuilder::new();
        let p = b.param();
        let obj = if known { b.alloc_ref("Square") } else { p };
        b.method_call("area", vec![], obj);
        b.ret(None);
        let mut f = Function::new("caller");
        f.body = Some(b.finish());
        module.add_function(f)
    }

    #[test]
    fn known_receiver_becomes_direct_call() {
        let (mut module, area) = shapes();
        let caller = caller_with_receiver(&mut module, true);
        assert!(devirtualize(&mut module, caller, InstrRef::new(0, 1), true));
        let body = module.function(caller).body.as_ref().unwrap();
        let apply = body.instr(InstrRef::new(0, 1)).as_apply().unwrap();
        assert_eq!(apply.callee, Callee::Direct(area));
    }

    #[test]
    fn optional_devirtualization_needs_a_body() {
        let (mut module, _) = shapes();
        let caller = caller_with_receiver(&mut module, true);
        assert!(!devirtualize(&mut module, caller, InstrRef::new(0, 1), false));
        assert!(devirtualize(&mut module, caller, InstrRef::new(0, 1), true));
    }

    #[test]
    fn unknown_receiver_is_left_alone() {
        let (mut module, _) = shapes();
        let caller = caller_with_receiver(&mut module, false);
        assert!(!devirtualize(&mut module, caller, InstrRef::new(0, 0), true));
    }

    #[test]
    fn direct_call_is_not_a_candidate() {
        let (mut module, area) = shapes();
        let mut b = FunctionBuilder::new();
        b.call_void(area, vec![]);
        b.ret(None);
        let mut f = Function::new("caller");
        f.body = Some(b.finish());
        let caller = module.add_function(f);
        assert!(!devirtualize(&mut module, caller, InstrRef::new(0, 0), true));
    }
}
