//! Single-instruction simplification.
//!
//! ## Rules
//!
//! - A side-effect-free instruction whose result is never read is erased.
//! - `BinOp` of two single-definition constants folds into a `Const`.
//! - `StructExtract` / `TupleExtract` of a single-definition aggregate is
//!   replaced by the extracted operand.
//! - `Assign` whose destination and source each have exactly one definition
//!   is removed and its destination is replaced by the source.
//!
//! Applies are never touched here: calls are the job of the inlining policy.
//! Every rule either removes an instruction or turns a `BinOp` into a
//! `Const`, so repeated simplification terminates.

use crate::context::Simplified;
use crate::ir::utils::{instr_dest, is_side_effect_free, replace_all_uses};
use crate::ir::{Body, DefUse, Instr, InstrRef, VarId};
use log::trace;

/// Simplifies the instruction at `at`. Stale positions are left alone.
pub fn simplify_instruction(body: &mut Body, at: InstrRef) -> Simplified {
    let Some(instr) = body.get_instr(at).cloned() else {
        return Simplified::Unchanged;
    };
    if instr.is_full_apply_site() {
        return Simplified::Unchanged;
    }
    let def_use = DefUse::build(body);

    // ── Dead results ─────────────────────────────────────────────────────
    if let Some(dest) = instr_dest(&instr) {
        if def_use.use_count(dest) == 0 && is_side_effect_free(&instr) {
            trace!("simplify: `{instr}` is dead");
            body.blocks[at.block].instructions.remove(at.index);
            return Simplified::Erased;
        }
    }

    match &instr {
        Instr::BinOp { dest, op, lhs, rhs } => {
            let (Some(l), Some(r)) = (
                constant_value(body, &def_use, *lhs),
                constant_value(body, &def_use, *rhs),
            ) else {
                return Simplified::Unchanged;
            };
            let folded = Instr::Const {
                dest: *dest,
                value: op.fold(l, r),
            };
            trace!("simplify: `{instr}` folds to `{folded}`");
            *body.instr_mut(at) = folded;
            Simplified::Changed
        }

        Instr::StructExtract {
            dest,
            operand,
            field,
        } => {
            let replacement = def_use.single_def(*operand).and_then(|d| match body.instr(d) {
                Instr::Struct { fields, .. } => fields.get(*field as usize).copied(),
                _ => None,
            });
            forward(body, &def_use, at, *dest, replacement)
        }

        Instr::TupleExtract {
            dest,
            operand,
            index,
        } => {
            let replacement = def_use.single_def(*operand).and_then(|d| match body.instr(d) {
                Instr::Tuple { elements, .. } => elements.get(*index as usize).copied(),
                _ => None,
            });
            forward(body, &def_use, at, *dest, replacement)
        }

        Instr::Assign { dest, src } => {
            if dest == src {
                body.blocks[at.block].instructions.remove(at.index);
                return Simplified::Erased;
            }
            forward(body, &def_use, at, *dest, Some(*src))
        }

        _ => Simplified::Unchanged,
    }
}

/// Value of `var` if it is defined once, by a `Const`.
fn constant_value(body: &Body, def_use: &DefUse, var: VarId) -> Option<i64> {
    match body.instr(def_use.single_def(var)?) {
        Instr::Const { value, .. } => Some(*value),
        _ => None,
    }
}

/// Replaces every read of `dest` (defined only at `at`) with `replacement`
/// and erases the instruction at `at`.
fn forward(
    body: &mut Body,
    def_use: &DefUse,
    at: InstrRef,
    dest: VarId,
    replacement: Option<VarId>,
) -> Simplified {
    let Some(replacement) = replacement else {
        return Simplified::Unchanged;
    };
    // A value redefined by `Assign` may change after this point.
    if def_use.single_def(dest) != Some(at) || !def_use.has_single_definition(replacement) {
        return Simplified::Unchanged;
    }
    trace!("simplify: {dest} -> {replacement}");
    body.blocks[at.block].instructions.remove(at.index);
    replace_all_uses(body, dest, replacement);
    Simplified::Erased
}
