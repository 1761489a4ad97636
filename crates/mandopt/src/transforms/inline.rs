//! Call-site inlining.
//!
//! ## Algorithm
//!
//! 1. Split the caller's block at the apply: the instructions after it move to
//!    a fresh continuation block that inherits the old terminator.
//! 2. Clone every callee block into the caller. Callee values are renumbered
//!    above the caller's counter; callee parameters become the call arguments.
//! 3. Each callee `Return` becomes `Assign { dest: <call result>, src }`
//!    followed by a `Jump` to the continuation block. A callee with several
//!    returns therefore defines the call result once per return.
//! 4. The apply's block jumps to the cloned entry.
//!
//! Generic substitutions of the call are applied to the cloned instructions.

use super::specialize::{substitution_map, substitute_types};
use crate::ir::utils::{for_each_use_mut, for_each_use_terminator_mut, instr_dest, instr_dest_mut};
use crate::ir::{Block, BlockId, Body, FuncId, InlineStrategy, Instr, InstrRef, Module, Terminator, VarId};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};

/// Inlines the direct apply at `at` in `caller`. Returns `false`, leaving the
/// caller untouched, when the call cannot be inlined.
pub fn inline_call(module: &mut Module, caller: FuncId, at: InstrRef, mandatory: bool) -> bool {
    let Some(apply) = module
        .functions
        .get(caller.as_usize())
        .and_then(|f| f.body.as_ref())
        .and_then(|body| body.get_instr(at))
        .and_then(Instr::as_apply)
        .cloned()
    else {
        return false;
    };
    let Some(callee) = apply.direct_callee() else {
        return false;
    };
    if callee == caller || callee.as_usize() >= module.functions.len() {
        return false;
    }
    // Expanding a recursive callee would never bottom out.
    if reaches_itself(module, callee) {
        debug!("inline: {} is recursive", module.function(callee).name);
        return false;
    }
    let callee_fn = module.function(callee);
    if !mandatory && callee_fn.inline_strategy == InlineStrategy::Never {
        return false;
    }
    let Some(callee_body) = &callee_fn.body else {
        return false;
    };
    if callee_body.params.len() != apply.args.len() {
        debug!(
            "inline: {} takes {} arguments, call passes {}",
            callee_fn.name,
            callee_body.params.len(),
            apply.args.len()
        );
        return false;
    }
    // Parameters map onto caller values, which the callee must not redefine.
    if callee_body
        .instructions()
        .any(|(_, i)| instr_dest(i).is_some_and(|d| callee_body.params.contains(&d)))
    {
        return false;
    }
    let returns_value = callee_body
        .blocks
        .iter()
        .any(|b| matches!(b.terminator, Terminator::Return { value: Some(_) }));
    if apply.dest.is_some() && !returns_value {
        return false;
    }
    let mut cloned_body = callee_body.clone();
    if apply.has_substitutions() {
        let Some(map) = substitution_map(&callee_fn.generic_params, &apply.substitutions) else {
            return false;
        };
        substitute_types(&mut cloned_body, &map);
    }
    let callee_name = callee_fn.name.clone();

    let Some(body) = module.function_mut(caller).body.as_mut() else {
        return false;
    };
    splice(body, at, &apply.args, apply.dest, cloned_body);
    trace!("inline: {callee_name} into {caller} at {at:?}");
    true
}

/// Whether `f` can call itself through direct calls of loaded bodies.
fn reaches_itself(module: &Module, f: FuncId) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![f];
    while let Some(current) = stack.pop() {
        let Some(body) = module.functions.get(current.as_usize()).and_then(|c| c.body.as_ref()) else {
            continue;
        };
        for (_, instr) in body.instructions() {
            let Some(callee) = instr.as_apply().and_then(|a| a.direct_callee()) else {
                continue;
            };
            if callee == f {
                return true;
            }
            if seen.insert(callee) {
                stack.push(callee);
            }
        }
    }
    false
}

fn splice(body: &mut Body, at: InstrRef, args: &[VarId], dest: Option<VarId>, callee: Body) {
    let var_base = body.next_var;
    let block_base = body.next_block;
    body.next_var += callee.next_var;
    body.next_block += callee.next_block;
    let continuation = body.new_block_id();

    let params: HashMap<VarId, VarId> = callee.params.iter().copied().zip(args.iter().copied()).collect();
    let map_var = |v: &mut VarId| {
        *v = params.get(v).copied().unwrap_or(VarId(v.0 + var_base));
    };
    let map_block = |b: BlockId| BlockId(b.0 + block_base);

    let mut cloned = Vec::with_capacity(callee.blocks.len() + 1);
    for block in callee.blocks {
        let mut instructions = block.instructions;
        for instr in &mut instructions {
            for_each_use_mut(instr, map_var);
            if let Some(d) = instr_dest_mut(instr) {
                map_var(d);
            }
        }
        let mut terminator = block.terminator;
        for_each_use_terminator_mut(&mut terminator, map_var);
        let terminator = match terminator {
            Terminator::Return { value } => {
                if let (Some(dest), Some(src)) = (dest, value) {
                    instructions.push(Instr::Assign { dest, src });
                }
                Terminator::Jump {
                    target: continuation,
                }
            }
            Terminator::Jump { target } => Terminator::Jump {
                target: map_block(target),
            },
            Terminator::BranchIf {
                condition,
                if_true,
                if_false,
            } => Terminator::BranchIf {
                condition,
                if_true: map_block(if_true),
                if_false: map_block(if_false),
            },
            Terminator::Unreachable => Terminator::Unreachable,
        };
        cloned.push(Block {
            id: map_block(block.id),
            instructions,
            terminator,
        });
    }

    let split = &mut body.blocks[at.block];
    let suffix = split.instructions.split_off(at.index + 1);
    split.instructions.pop();
    let old_terminator = std::mem::replace(
        &mut split.terminator,
        Terminator::Jump {
            target: map_block(callee.entry_block),
        },
    );
    cloned.push(Block {
        id: continuation,
        instructions: suffix,
        terminator: old_terminator,
    });
    body.blocks.splice(at.block + 1..at.block + 1, cloned);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::verify::verify_function;
    use crate::ir::{Apply, BinOp, Function, FunctionBuilder};

    fn add_one(module: &mut Module) -> FuncId {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let one = b.constant(1);
        let sum = b.binop(BinOp::Add, x, one);
        b.ret(Some(sum));
        let mut f = Function::new("addOne");
        f.body = Some(b.finish());
        module.add_function(f)
    }

    #[test]
    fn inlines_single_block_callee() {
        let mut module = Module::new();
        let callee = add_one(&mut module);
        let mut b = FunctionBuilder::new();
        let a = b.param();
        let r = b.call(callee, vec![a]);
        let twice = b.binop(BinOp::Add, r, r);
        b.ret(Some(twice));
        let mut f = Function::new("caller");
        f.body = Some(b.finish());
        let caller = module.add_function(f);

        assert!(inline_call(&mut module, caller, InstrRef::new(0, 0), true));
        verify_function(&module, caller).unwrap();

        let body = module.function(caller).body.as_ref().unwrap();
        assert_eq!(body.blocks.len(), 3);
        assert!(body.instructions().all(|(_, i)| !i.is_full_apply_site()));
        // The return became an assignment to the call result.
        assert!(body
            .instructions()
            .any(|(_, i)| matches!(i, Instr::Assign { dest, .. } if *dest == r)));
        // The continuation keeps the code after the call.
        let cont = &body.blocks[2];
        assert_eq!(cont.terminator, Terminator::Return { value: Some(twice) });
        assert_eq!(cont.instructions.len(), 1);
    }

    #[test]
    fn multiple_returns_each_assign_the_result() {
        let mut module = Module::new();
        let mut b = FunctionBuilder::new();
        let c = b.param();
        let t = b.new_block();
        let e = b.new_block();
        b.branch_if(c, t, e);
        b.switch_to(t);
        let one = b.constant(1);
        b.ret(Some(one));
        b.switch_to(e);
        let two = b.constant(2);
        b.ret(Some(two));
        let mut f = Function::new("pick");
        f.body = Some(b.finish());
        let callee = module.add_function(f);

        let mut b = FunctionBuilder::new();
        let c = b.param();
        let r = b.call(callee, vec![c]);
        b.ret(Some(r));
        let mut f = Function::new("caller");
        f.body = Some(b.finish());
        let caller = module.add_function(f);

        assert!(inline_call(&mut module, caller, InstrRef::new(0, 0), true));
        verify_function(&module, caller).unwrap();
        let body = module.function(caller).body.as_ref().unwrap();
        let assigns = body
            .instructions()
            .filter(|(_, i)| matches!(i, Instr::Assign { dest, .. } if *dest == r))
            .count();
        assert_eq!(assigns, 2);
    }

    #[test]
    fn refuses_self_and_missing_callee_body() {
        let mut module = Module::new();
        let external = module.add_function(Function::new("external"));
        let mut b = FunctionBuilder::new();
        b.call_void(external, vec![]);
        b.call_void(FuncId::new(1), vec![]);
        b.ret(None);
        let mut f = Function::new("recursive");
        f.body = Some(b.finish());
        let caller = module.add_function(f);

        assert!(!inline_call(&mut module, caller, InstrRef::new(0, 0), true));
        assert!(!inline_call(&mut module, caller, InstrRef::new(0, 1), true));
        assert_eq!(
            module.function(caller).body.as_ref().unwrap().instruction_count(),
            2
        );
    }

    #[test]
    fn never_strategy_only_blocks_optional_inlining() {
        let mut module = Module::new();
        let callee = add_one(&mut module);
        module.function_mut(callee).inline_strategy = InlineStrategy::Never;
        let mut b = FunctionBuilder::new();
        let a = b.param();
        let r = b.call(callee, vec![a]);
        b.ret(Some(r));
        let mut f = Function::new("caller");
        f.body = Some(b.finish());
        let caller = module.add_function(f);

        assert!(!inline_call(&mut module, caller, InstrRef::new(0, 0), false));
        assert!(inline_call(&mut module, caller, InstrRef::new(0, 0), true));
    }

    #[test]
    fn generic_callee_gets_substituted_types() {
        let mut module = Module::new();
        let mut b = FunctionBuilder::new();
        let m = b.metatype("T");
        b.ret(Some(m));
        let mut f = Function::new("typeOf");
        f.generic_params = vec!["T".to_string()];
        f.body = Some(b.finish());
        let callee = module.add_function(f);

        let mut b = FunctionBuilder::new();
        let r = b.new_var();
        b.apply(Apply {
            substitutions: vec!["Int".to_string()],
            ..Apply::direct(Some(r), callee, vec![])
        });
        b.ret(Some(r));
        let mut f = Function::new("caller");
        f.body = Some(b.finish());
        let caller = module.add_function(f);

        assert!(inline_call(&mut module, caller, InstrRef::new(0, 0), true));
        let body = module.function(caller).body.as_ref().unwrap();
        assert!(body
            .instructions()
            .any(|(_, i)| matches!(i, Instr::Metatype { ty, .. } if ty == "Int")));
    }

    #[test]
    fn refuses_mutually_recursive_callee() {
        let mut module = Module::new();
        let a = FuncId::new(0);
        let b_id = FuncId::new(1);
        for (name, next) in [("a", b_id), ("b", a)] {
            let mut b = FunctionBuilder::new();
            b.call_void(next, vec![]);
            b.ret(None);
            let mut f = Function::new(name);
            f.transparent = true;
            f.body = Some(b.finish());
            module.add_function(f);
        }
        let mut b = FunctionBuilder::new();
        b.call_void(a, vec![]);
        b.ret(None);
        let mut f = Function::new("caller");
        f.body = Some(b.finish());
        let caller = module.add_function(f);

        assert!(!inline_call(&mut module, caller, InstrRef::new(0, 0), true));
    }
}
