//! Store-to-load forwarding for private stack slots.
//!
//! ## Algorithm (block-local)
//!
//! 1. A stack slot is *private* when its address is only used as the address
//!    operand of `Store`, `Load`, `CopyAddr`, `DeallocStack` or
//!    `DebugValue`. Nothing else can read or write a private slot.
//! 2. Walk each block in order, tracking the value last stored to each
//!    private slot:
//!    - `Store v to s` records `s → v`.
//!    - `Load s` of a tracked slot is erased; its result is replaced by the
//!      tracked value.
//!    - `CopyAddr a to s` becomes `Store v to s` when `a` is tracked, and
//!      forgets `s` otherwise.
//!    - `DeallocStack s` forgets `s`.
//! 3. Only values with a single definition are forwarded, so a value that is
//!    later reassigned is never read early.

use crate::ir::utils::replace_all_uses;
use crate::ir::{Body, DefUse, Instr, UseSite, VarId};
use log::trace;
use std::collections::{HashMap, HashSet};

/// Forwards stored values to later loads. Returns whether the body changed.
pub fn forward_stored_values(body: &mut Body) -> bool {
    let def_use = DefUse::build(body);
    let private = private_slots(body, &def_use);
    if private.is_empty() {
        return false;
    }

    let mut replacements: HashMap<VarId, VarId> = HashMap::new();
    let resolve = |repl: &HashMap<VarId, VarId>, v: VarId| repl.get(&v).copied().unwrap_or(v);
    let mut changed = false;

    for block in &mut body.blocks {
        let mut known: HashMap<VarId, VarId> = HashMap::new();
        let mut i = 0;
        while i < block.instructions.len() {
            match &block.instructions[i] {
                Instr::Store { value, addr } if private.contains(addr) => {
                    if def_use.has_single_definition(*value) {
                        known.insert(*addr, resolve(&replacements, *value));
                    } else {
                        known.remove(addr);
                    }
                }
                Instr::Load { dest, addr } if private.contains(addr) => {
                    let dest = *dest;
                    if let Some(&value) = known.get(addr) {
                        if def_use.has_single_definition(dest) {
                            trace!("memory: {dest} forwarded from {value}");
                            replacements.insert(dest, value);
                            block.instructions.remove(i);
                            changed = true;
                            continue;
                        }
                    }
                }
                Instr::CopyAddr { src, to } if private.contains(to) => {
                    let to = *to;
                    match known.get(src).copied() {
                        Some(value) => {
                            block.instructions[i] = Instr::Store { value, addr: to };
                            known.insert(to, value);
                            changed = true;
                        }
                        None => {
                            known.remove(&to);
                        }
                    }
                }
                Instr::DeallocStack { operand } => {
                    known.remove(operand);
                }
                _ => {}
            }
            i += 1;
        }
    }

    for (old, new) in replacements {
        replace_all_uses(body, old, new);
    }
    changed
}

/// Stack slots whose address never escapes to an unknown user.
fn private_slots(body: &Body, def_use: &DefUse) -> HashSet<VarId> {
    body.instructions()
        .filter_map(|(_, instr)| match instr {
            Instr::AllocStack { dest } => Some(*dest),
            _ => None,
        })
        .filter(|slot| def_use.has_single_definition(*slot))
        .filter(|slot| {
            def_use.uses(*slot).iter().all(|u| match u.site {
                UseSite::Instr(at) => match body.instr(at) {
                    Instr::Store { value, .. } => value != slot,
                    Instr::CopyAddr { .. }
                    | Instr::Load { .. }
                    | Instr::DeallocStack { .. }
                    | Instr::DebugValue { .. } => true,
                    _ => false,
                },
                UseSite::Terminator(_) => false,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FuncId, FunctionBuilder, Terminator};

    #[test]
    fn load_after_store_is_forwarded() {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let slot = b.alloc_stack();
        b.store(x, slot);
        let y = b.load(slot);
        b.dealloc_stack(slot);
        b.ret(Some(y));
        let mut body = b.finish();

        assert!(forward_stored_values(&mut body));
        assert_eq!(body.blocks[0].terminator, Terminator::Return { value: Some(x) });
        assert!(!body
            .instructions()
            .any(|(_, i)| matches!(i, Instr::Load { .. })));
        // Second run finds nothing new.
        assert!(!forward_stored_values(&mut body));
    }

    #[test]
    fn copy_between_slots_becomes_store() {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let a = b.alloc_stack();
        let c = b.alloc_stack();
        b.store(x, a);
        b.copy_addr(a, c);
        let y = b.load(c);
        b.ret(Some(y));
        let mut body = b.finish();

        assert!(forward_stored_values(&mut body));
        assert!(body
            .instructions()
            .any(|(_, i)| *i == Instr::Store { value: x, addr: c }));
        assert_eq!(body.blocks[0].terminator, Terminator::Return { value: Some(x) });
    }

    #[test]
    fn escaping_slot_is_not_touched() {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let slot = b.alloc_stack();
        b.store(x, slot);
        b.call_void(FuncId::new(0), vec![slot]);
        let y = b.load(slot);
        b.ret(Some(y));
        let mut body = b.finish();
        assert!(!forward_stored_values(&mut body));
    }

    #[test]
    fn knowledge_does_not_cross_blocks() {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let slot = b.alloc_stack();
        b.store(x, slot);
        let next = b.new_block();
        b.jump(next);
        b.switch_to(next);
        let y = b.load(slot);
        b.ret(Some(y));
        let mut body = b.finish();
        assert!(!forward_stored_values(&mut body));
    }

    #[test]
    fn chained_forwarding_resolves_to_original_value() {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let a = b.alloc_stack();
        let c = b.alloc_stack();
        b.store(x, a);
        let y = b.load(a);
        b.store(y, c);
        let z = b.load(c);
        b.ret(Some(z));
        let mut body = b.finish();

        assert!(forward_stored_values(&mut body));
        assert_eq!(body.blocks[0].terminator, Terminator::Return { value: Some(x) });
        assert!(body
            .instructions()
            .any(|(_, i)| *i == Instr::Store { value: x, addr: c }));
    }
}
