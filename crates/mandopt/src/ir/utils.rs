//! Shared utility functions over IR instructions, terminators and bodies.
//!
//! Provides the operand/destination traversal every analysis and rewrite in
//! the crate is built on.

use super::types::{BlockId, Body, Instr, Terminator, VarId};
use std::collections::{HashMap, HashSet};

// ── Terminator successors ────────────────────────────────────────────────────

/// Returns the successor block IDs for a terminator.
pub fn terminator_successors(term: &Terminator) -> Vec<BlockId> {
    match term {
        Terminator::Return { .. } | Terminator::Unreachable => vec![],
        Terminator::Jump { target } => vec![*target],
        Terminator::BranchIf {
            if_true, if_false, ..
        } => vec![*if_true, *if_false],
    }
}

/// Build a map from each block ID to the set of *distinct* predecessor block IDs.
pub fn build_predecessors(body: &Body) -> HashMap<BlockId, HashSet<BlockId>> {
    let mut preds: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
    // Ensure every block has an entry (even if no predecessors).
    for block in &body.blocks {
        preds.entry(block.id).or_default();
    }
    for block in &body.blocks {
        for succ in terminator_successors(&block.terminator) {
            preds.entry(succ).or_default().insert(block.id);
        }
    }
    preds
}

// ── Instruction variable traversal ───────────────────────────────────────────

/// Calls `f` with every value read by `instr`, in operand order.
pub fn for_each_use<F: FnMut(VarId)>(instr: &Instr, mut f: F) {
    match instr {
        Instr::Const { .. }
        | Instr::Metatype { .. }
        | Instr::AllocStack { .. }
        | Instr::AllocRef { .. }
        | Instr::AllocGlobal { .. }
        | Instr::GlobalAddr { .. } => {}
        Instr::BinOp { lhs, rhs, .. } => {
            f(*lhs);
            f(*rhs);
        }
        Instr::Assign { src, .. } => f(*src),
        Instr::Struct { fields, .. } => fields.iter().for_each(|v| f(*v)),
        Instr::Tuple { elements, .. } => elements.iter().for_each(|v| f(*v)),
        Instr::Enum { payload, .. } => {
            if let Some(p) = payload {
                f(*p);
            }
        }
        Instr::StructExtract { operand, .. }
        | Instr::TupleExtract { operand, .. }
        | Instr::DebugValue { operand }
        | Instr::DeallocStack { operand }
        | Instr::DeallocRef { operand }
        | Instr::AddressToPointer { operand, .. }
        | Instr::PointerToAddress { operand, .. } => f(*operand),
        Instr::StructElementAddr { base, .. } | Instr::TupleElementAddr { base, .. } => f(*base),
        Instr::IndexAddr { base, index, .. } => {
            f(*base);
            f(*index);
        }
        Instr::BeginAccess { address, .. } => f(*address),
        Instr::EndAccess { access } => f(*access),
        Instr::Load { addr, .. } => f(*addr),
        Instr::Store { value, addr } => {
            f(*value);
            f(*addr);
        }
        Instr::CopyAddr { src, to } => {
            f(*src);
            f(*to);
        }
        Instr::Apply(apply) => apply.args.iter().for_each(|v| f(*v)),
        Instr::Once { token, .. } => f(*token),
    }
}

/// Calls `f` with a mutable reference to every operand slot of `instr`, in
/// the same order as [`for_each_use`]. The destination slot is never visited.
pub fn for_each_use_mut<F: FnMut(&mut VarId)>(instr: &mut Instr, mut f: F) {
    match instr {
        Instr::Const { .. }
        | Instr::Metatype { .. }
        | Instr::AllocStack { .. }
        | Instr::AllocRef { .. }
        | Instr::AllocGlobal { .. }
        | Instr::GlobalAddr { .. } => {}
        Instr::BinOp { lhs, rhs, .. } => {
            f(lhs);
            f(rhs);
        }
        Instr::Assign { src, .. } => f(src),
        Instr::Struct { fields, .. } => fields.iter_mut().for_each(f),
        Instr::Tuple { elements, .. } => elements.iter_mut().for_each(f),
        Instr::Enum { payload, .. } => {
            if let Some(p) = payload {
                f(p);
            }
        }
        Instr::StructExtract { operand, .. }
        | Instr::TupleExtract { operand, .. }
        | Instr::DebugValue { operand }
        | Instr::DeallocStack { operand }
        | Instr::DeallocRef { operand }
        | Instr::AddressToPointer { operand, .. }
        | Instr::PointerToAddress { operand, .. } => f(operand),
        Instr::StructElementAddr { base, .. } | Instr::TupleElementAddr { base, .. } => f(base),
        Instr::IndexAddr { base, index, .. } => {
            f(base);
            f(index);
        }
        Instr::BeginAccess { address, .. } => f(address),
        Instr::EndAccess { access } => f(access),
        Instr::Load { addr, .. } => f(addr),
        Instr::Store { value, addr } => {
            f(value);
            f(addr);
        }
        Instr::CopyAddr { src, to } => {
            f(src);
            f(to);
        }
        Instr::Apply(apply) => apply.args.iter_mut().for_each(f),
        Instr::Once { token, .. } => f(token),
    }
}

/// Calls `f` with every value read by a block terminator.
pub fn for_each_use_terminator<F: FnMut(VarId)>(term: &Terminator, mut f: F) {
    match term {
        Terminator::Return { value: Some(v) } => f(*v),
        Terminator::BranchIf { condition, .. } => f(*condition),
        Terminator::Return { value: None } | Terminator::Jump { .. } | Terminator::Unreachable => {}
    }
}

/// Mutable counterpart of [`for_each_use_terminator`].
pub fn for_each_use_terminator_mut<F: FnMut(&mut VarId)>(term: &mut Terminator, mut f: F) {
    match term {
        Terminator::Return { value: Some(v) } => f(v),
        Terminator::BranchIf { condition, .. } => f(condition),
        Terminator::Return { value: None } | Terminator::Jump { .. } | Terminator::Unreachable => {}
    }
}

// ── Instruction destination ──────────────────────────────────────────────────

/// Returns the value written by `instr`, or `None` for effect-only instructions.
pub fn instr_dest(instr: &Instr) -> Option<VarId> {
    match instr {
        Instr::Const { dest, .. }
        | Instr::BinOp { dest, .. }
        | Instr::Assign { dest, .. }
        | Instr::Struct { dest, .. }
        | Instr::Tuple { dest, .. }
        | Instr::Enum { dest, .. }
        | Instr::StructExtract { dest, .. }
        | Instr::TupleExtract { dest, .. }
        | Instr::Metatype { dest, .. }
        | Instr::AllocStack { dest }
        | Instr::AllocRef { dest, .. }
        | Instr::GlobalAddr { dest, .. }
        | Instr::StructElementAddr { dest, .. }
        | Instr::TupleElementAddr { dest, .. }
        | Instr::IndexAddr { dest, .. }
        | Instr::AddressToPointer { dest, .. }
        | Instr::PointerToAddress { dest, .. }
        | Instr::BeginAccess { dest, .. }
        | Instr::Load { dest, .. } => Some(*dest),

        Instr::Apply(apply) => apply.dest,

        Instr::DebugValue { .. }
        | Instr::DeallocStack { .. }
        | Instr::DeallocRef { .. }
        | Instr::AllocGlobal { .. }
        | Instr::EndAccess { .. }
        | Instr::Store { .. }
        | Instr::CopyAddr { .. }
        | Instr::Once { .. } => None,
    }
}

/// Mutable access to the destination slot of `instr`, if it has one.
pub fn instr_dest_mut(instr: &mut Instr) -> Option<&mut VarId> {
    match instr {
        Instr::Const { dest, .. }
        | Instr::BinOp { dest, .. }
        | Instr::Assign { dest, .. }
        | Instr::Struct { dest, .. }
        | Instr::Tuple { dest, .. }
        | Instr::Enum { dest, .. }
        | Instr::StructExtract { dest, .. }
        | Instr::TupleExtract { dest, .. }
        | Instr::Metatype { dest, .. }
        | Instr::AllocStack { dest }
        | Instr::AllocRef { dest, .. }
        | Instr::GlobalAddr { dest, .. }
        | Instr::StructElementAddr { dest, .. }
        | Instr::TupleElementAddr { dest, .. }
        | Instr::IndexAddr { dest, .. }
        | Instr::AddressToPointer { dest, .. }
        | Instr::PointerToAddress { dest, .. }
        | Instr::BeginAccess { dest, .. }
        | Instr::Load { dest, .. } => Some(dest),

        Instr::Apply(apply) => apply.dest.as_mut(),

        Instr::DebugValue { .. }
        | Instr::DeallocStack { .. }
        | Instr::DeallocRef { .. }
        | Instr::AllocGlobal { .. }
        | Instr::EndAccess { .. }
        | Instr::Store { .. }
        | Instr::CopyAddr { .. }
        | Instr::Once { .. } => None,
    }
}

// ── Use-replacement helpers ──────────────────────────────────────────────────

/// Replace every read-occurrence of `old` with `new` in `instr`.
/// Only touches operand (source) slots; the destination slot is never modified.
pub fn replace_uses_of(instr: &mut Instr, old: VarId, new: VarId) {
    for_each_use_mut(instr, |v| {
        if *v == old {
            *v = new;
        }
    });
}

/// Replace every read of `old` with `new` across the whole body.
pub fn replace_all_uses(body: &mut Body, old: VarId, new: VarId) {
    for block in &mut body.blocks {
        for instr in &mut block.instructions {
            replace_uses_of(instr, old, new);
        }
        for_each_use_terminator_mut(&mut block.terminator, |v| {
            if *v == old {
                *v = new;
            }
        });
    }
}

// ── Side-effect classification ───────────────────────────────────────────────

/// Returns `true` if the instruction can be deleted when its result is unused.
///
/// Allocations are excluded: their removal is the job of dead-allocation
/// elimination, which also removes the matching deallocations.
pub fn is_side_effect_free(instr: &Instr) -> bool {
    !instr.may_have_side_effects()
        && instr_dest(instr).is_some()
        && !matches!(instr, Instr::AllocStack { .. } | Instr::AllocRef { .. })
}

// ── Tests ────────────────────────────────────────────────────────────────────
