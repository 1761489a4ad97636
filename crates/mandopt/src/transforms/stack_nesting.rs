//! Stack-nesting repair.
//!
//! Stack slots must be released in the reverse order of their allocation.
//! Inlining a coroutine call can interleave the callee's slots with the
//! caller's, so each run of consecutive `DeallocStack`s is re-sorted so that
//! the most recently allocated slot is released first.

use crate::ir::{Body, Instr, VarId};
use std::collections::HashMap;

/// Restores LIFO deallocation order. Returns whether anything moved.
pub fn fix(body: &mut Body) -> bool {
    let order: HashMap<VarId, usize> = body
        .instructions()
        .filter_map(|(_, instr)| match instr {
            Instr::AllocStack { dest } => Some(*dest),
            _ => None,
        })
        .enumerate()
        .map(|(i, slot)| (slot, i))
        .collect();

    let mut changed = false;
    for block in &mut body.blocks {
        let mut start = 0;
        while start < block.instructions.len() {
            if !block.instructions[start].is_deallocating_stack() {
                start += 1;
                continue;
            }
            let end = block.instructions[start..]
                .iter()
                .position(|i| !i.is_deallocating_stack())
                .map_or(block.instructions.len(), |len| start + len);
            let run = &mut block.instructions[start..end];
            let before = run.to_vec();
            // Stable: slots of unknown origin keep their relative order.
            run.sort_by_key(|instr| match instr {
                Instr::DeallocStack { operand } => {
                    std::cmp::Reverse(order.get(operand).copied().unwrap_or(usize::MAX))
                }
                _ => std::cmp::Reverse(usize::MAX),
            });
            changed |= run != before.as_slice();
            start = end;
        }
    }
    changed
}
