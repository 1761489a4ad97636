//! Structural IR verifier.
//!
//! Checks the invariants every pass relies on. A failure means a pass (or the
//! producer of the module) broke the IR, so it is reported as an error rather
//! than skipped.

use super::types::{Body, FuncId, Instr, Module, VarId};
use super::utils::{for_each_use, for_each_use_terminator, instr_dest, terminator_successors};
use anyhow::{bail, ensure, Context, Result};
use std::collections::HashSet;

/// Verifies the body of `id`. Functions without a body trivially pass.
pub fn verify_function(module: &Module, id: FuncId) -> Result<()> {
    ensure!(
        id.as_usize() < module.functions.len(),
        "function {id} is out of range"
    );
    let function = module.function(id);
    let Some(body) = &function.body else {
        return Ok(());
    };
    verify_body(module, body).with_context(|| format!("in function {} ({id})", function.name))
}

/// Verifies every function with a body.
pub fn verify_module(module: &Module) -> Result<()> {
    for id in module.func_ids() {
        verify_function(module, id)?;
    }
    Ok(())
}

fn verify_body(module: &Module, body: &Body) -> Result<()> {
    // ── Blocks ───────────────────────────────────────────────────────────
    let mut block_ids = HashSet::new();
    for block in &body.blocks {
        ensure!(block_ids.insert(block.id), "duplicate block {}", block.id);
        ensure!(
            block.id.0 < body.next_block,
            "block {} is not below the block counter {}",
            block.id,
            body.next_block
        );
    }
    ensure!(
        block_ids.contains(&body.entry_block),
        "entry block {} does not exist",
        body.entry_block
    );
    for block in &body.blocks {
        for succ in terminator_successors(&block.terminator) {
            ensure!(
                block_ids.contains(&succ),
                "terminator of {} targets missing block {succ}",
                block.id
            );
        }
    }

    // ── Values ───────────────────────────────────────────────────────────
    let mut defined: HashSet<VarId> = HashSet::new();
    for param in &body.params {
        ensure!(defined.insert(*param), "parameter {param} declared twice");
    }
    for (_, instr) in body.instructions() {
        if let Some(dest) = instr_dest(instr) {
            // Only `Assign` may redefine a value.
            if !defined.insert(dest) && !matches!(instr, Instr::Assign { .. }) {
                bail!("{dest} is defined more than once (by `{instr}`)");
            }
        }
    }
    for v in &defined {
        ensure!(
            v.0 < body.next_var,
            "{v} is not below the value counter {}",
            body.next_var
        );
    }

    let mut undefined = None;
    for block in &body.blocks {
        for instr in &block.instructions {
            for_each_use(instr, |v| {
                if !defined.contains(&v) {
                    undefined.get_or_insert((v, instr.to_string()));
                }
            });
        }
        for_each_use_terminator(&block.terminator, |v| {
            if !defined.contains(&v) {
                undefined.get_or_insert((v, block.terminator.to_string()));
            }
        });
    }
    if let Some((v, user)) = undefined {
        bail!("{v} is used by `{user}` but never defined");
    }

    // ── Module references ────────────────────────────────────────────────
    for (_, instr) in body.instructions() {
        match instr {
            Instr::Apply(apply) => {
                if let Some(callee) = apply.direct_callee() {
                    ensure!(
                        callee.as_usize() < module.functions.len(),
                        "call to unknown function {callee}"
                    );
                }
                ensure!(
                    apply.indirect_results <= apply.args.len(),
                    "`{instr}` declares more indirect results than arguments"
                );
            }
            Instr::Once { initializer, .. } => ensure!(
                initializer.as_usize() < module.functions.len(),
                "once with unknown initializer {initializer}"
            ),
            Instr::AllocGlobal { global } | Instr::GlobalAddr { global, .. } => ensure!(
                global.as_usize() < module.globals.len(),
                "reference to unknown global {global}"
            ),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, BlockId, Function, FunctionBuilder, Global, GlobalId, Terminator};

    fn module_with(body: Body) -> (Module, FuncId) {
        let mut module = Module::new();
        module.add_global(Global::new("G"));
        let mut f = Function::new("f");
        f.body = Some(body);
        let id = module.add_function(f);
        (module, id)
    }

    #[test]
    fn well_formed_body_passes() {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let addr = b.global_addr(GlobalId::new(0));
        b.store(x, addr);
        let exit = b.new_block();
        b.jump(exit);
        b.switch_to(exit);
        b.ret(Some(x));
        let (module, id) = module_with(b.finish());
        verify_function(&module, id).unwrap();
        verify_module(&module).unwrap();
    }

    #[test]
    fn missing_jump_target_fails() {
        let mut b = FunctionBuilder::new();
        b.jump(BlockId(7));
        let (module, id) = module_with(b.finish());
        let err = verify_function(&module, id).unwrap_err();
        assert!(format!("{err:#}").contains("missing block bb7"));
    }

    #[test]
    fn undefined_use_fails_with_function_name() {
        let mut b = FunctionBuilder::new();
        b.ret(Some(VarId(0)));
        let mut body = b.finish();
        body.next_var = 1;
        let (module, id) = module_with(body);
        let err = verify_function(&module, id).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("in function f"), "{msg}");
        assert!(msg.contains("v0 is used by `return v0`"), "{msg}");
    }

    #[test]
    fn redefinition_only_allowed_for_assign() {
        let body = Body {
            params: vec![VarId(0)],
            blocks: vec![Block {
                id: BlockId(0),
                instructions: vec![
                    Instr::Const {
                        dest: VarId(1),
                        value: 1,
                    },
                    Instr::Const {
                        dest: VarId(1),
                        value: 2,
                    },
                ],
                terminator: Terminator::Return { value: None },
            }],
            entry_block: BlockId(0),
            next_var: 2,
            next_block: 1,
        };
        let (module, id) = module_with(body.clone());
        assert!(verify_function(&module, id).is_err());

        let mut merged = body;
        merged.blocks[0].instructions = vec![
            Instr::Assign {
                dest: VarId(1),
                src: VarId(0),
            },
            Instr::Assign {
                dest: VarId(1),
                src: VarId(0),
            },
        ];
        let (module, id) = module_with(merged);
        verify_function(&module, id).unwrap();
    }

    #[test]
    fn unknown_callee_and_global_fail() {
        let mut b = FunctionBuilder::new();
        b.call_void(FuncId::new(9), vec![]);
        b.ret(None);
        let (module, id) = module_with(b.finish());
        assert!(verify_function(&module, id).is_err());

        let mut b = FunctionBuilder::new();
        b.alloc_global(GlobalId::new(4));
        b.ret(None);
        let (module, id) = module_with(b.finish());
        assert!(verify_function(&module, id).is_err());
    }

    #[test]
    fn counters_bound_ids() {
        let mut b = FunctionBuilder::new();
        let c = b.constant(1);
        b.ret(Some(c));
        let mut body = b.finish();
        body.next_var = 0;
        let (module, id) = module_with(body);
        assert!(verify_function(&module, id).is_err());
    }
}
