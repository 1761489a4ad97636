//! Dead allocation elimination.
//!
//! A stack slot that is only written (by `Store`/`CopyAddr` into it),
//! deallocated or debug-inspected is never read, so the slot and all of its
//! users are removed. The same holds for an object allocation whose only users
//! are `DeallocRef` and `DebugValue`.

use crate::ir::{Body, DefUse, Instr, InstrRef, UseSite, VarId};
use log::trace;
use std::collections::HashSet;

/// Removes dead allocations with their users. Returns whether anything was
/// removed. A second run on the result removes nothing.
pub fn eliminate(body: &mut Body) -> bool {
    let def_use = DefUse::build(body);
    let mut doomed: HashSet<InstrRef> = HashSet::new();

    for (at, instr) in body.instructions() {
        let (slot, user_is_dead): (VarId, fn(&Instr, VarId) -> bool) = match instr {
            Instr::AllocStack { dest } => (*dest, dead_stack_user),
            Instr::AllocRef { dest, .. } => (*dest, dead_object_user),
            _ => continue,
        };
        if def_use.single_def(slot) != Some(at) {
            continue;
        }
        let uses = def_use.uses(slot);
        let all_dead = uses.iter().all(|u| match u.site {
            UseSite::Instr(user) => user_is_dead(body.instr(user), slot),
            UseSite::Terminator(_) => false,
        });
        if !all_dead {
            continue;
        }
        trace!("dead allocation `{instr}` with {} users", uses.len());
        doomed.insert(at);
        doomed.extend(uses.iter().filter_map(|u| u.instr()));
    }

    if doomed.is_empty() {
        return false;
    }
    for (b, block) in body.blocks.iter_mut().enumerate() {
        let mut index = 0;
        block.instructions.retain(|_| {
            let keep = !doomed.contains(&InstrRef::new(b, index));
            index += 1;
            keep
        });
    }
    true
}

fn dead_stack_user(user: &Instr, slot: VarId) -> bool {
    match user {
        Instr::Store { value, addr } => *addr == slot && *value != slot,
        Instr::CopyAddr { src, to } => *to == slot && *src != slot,
        Instr::DeallocStack { .. } | Instr::DebugValue { .. } => true,
        _ => false,
    }
}

fn dead_object_user(user: &Instr, _object: VarId) -> bool {
    matches!(user, Instr::DeallocRef { .. } | Instr::DebugValue { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn write_only_slot_is_removed_with_users() {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let slot = b.alloc_stack();
        b.store(x, slot);
        b.debug_value(slot);
        b.dealloc_stack(slot);
        b.ret(Some(x));
        let mut body = b.finish();

        assert!(eliminate(&mut body));
        assert!(body.blocks[0].instructions.is_empty());
    }

    #[test]
    fn elimination_is_idempotent() {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let dead = b.alloc_stack();
        b.store(x, dead);
        let live = b.alloc_stack();
        b.store(x, live);
        let y = b.load(live);
        b.dealloc_stack(live);
        b.dealloc_stack(dead);
        let obj = b.alloc_ref("Box");
        b.dealloc_ref(obj);
        b.ret(Some(y));
        let mut body = b.finish();

        assert!(eliminate(&mut body));
        let after_first = body.clone();
        assert!(!eliminate(&mut body));
        assert_eq!(body.blocks[0].instructions, after_first.blocks[0].instructions);
        assert_eq!(body.blocks[0].instructions.len(), 4);
    }

    #[test]
    fn read_slot_is_kept() {
        let mut b = FunctionBuilder::new();
        let x = b.param();
        let slot = b.alloc_stack();
        b.store(x, slot);
        let y = b.load(slot);
        b.ret(Some(y));
        let mut body = b.finish();
        assert!(!eliminate(&mut body));
    }

    #[test]
    fn slot_passed_to_call_is_kept() {
        let mut b = FunctionBuilder::new();
        let slot = b.alloc_stack();
        b.call_void(crate::ir::FuncId::new(0), vec![slot]);
        b.dealloc_stack(slot);
        b.ret(None);
        let mut body = b.finish();
        assert!(!eliminate(&mut body));
    }
}
