//! Control-flow graph cleanup.
//!
//! Two steps, repeated until neither changes the body:
//!
//! 1. **Dead blocks**: blocks unreachable from the entry are removed.
//! 2. **Block merging**: when a block `B` has exactly one predecessor `P`,
//!    and `P` ends in an unconditional `Jump` to `B`, `B` is appended to `P`.
//!
//! Inlining splits the caller's block at the call site, so every inlined call
//! leaves a `Jump` chain behind that this pass folds back together.

use crate::ir::utils::{build_predecessors, terminator_successors};
use crate::ir::{BlockId, Body, Terminator};
use std::collections::{HashMap, HashSet};

/// Runs both steps to a fixed point. Returns whether the body changed.
pub fn simplify(body: &mut Body) -> bool {
    let mut changed = false;
    loop {
        let round = remove_dead_blocks(body) | merge_blocks(body);
        if !round {
            return changed;
        }
        changed = true;
    }
}

/// Computes the set of block IDs reachable from the entry block.
///
/// Targets that name no existing block are ignored; the verifier reports them.
fn reachable_blocks(body: &Body) -> HashSet<BlockId> {
    let block_map: HashMap<BlockId, usize> = body
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id, i))
        .collect();

    let mut reachable = HashSet::new();
    let mut worklist = vec![body.entry_block];
    while let Some(id) = worklist.pop() {
        let Some(&idx) = block_map.get(&id) else {
            continue;
        };
        if !reachable.insert(id) {
            continue;
        }
        worklist.extend(terminator_successors(&body.blocks[idx].terminator));
    }
    reachable
}

fn remove_dead_blocks(body: &mut Body) -> bool {
    let reachable = reachable_blocks(body);
    let before = body.blocks.len();
    body.blocks.retain(|b| reachable.contains(&b.id));
    body.blocks.len() != before
}

/// Merges single-predecessor blocks reached via unconditional `Jump`.
fn merge_blocks(body: &mut Body) -> bool {
    let preds = build_predecessors(body);
    let block_map: HashMap<BlockId, usize> = body
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id, i))
        .collect();

    // Each block participates in at most one merge per round.
    let mut merges: Vec<(usize, usize)> = Vec::new();
    let mut involved: HashSet<usize> = HashSet::new();
    for (pred_idx, block) in body.blocks.iter().enumerate() {
        let Terminator::Jump { target } = block.terminator else {
            continue;
        };
        if target == block.id || target == body.entry_block {
            continue;
        }
        let Some(&target_idx) = block_map.get(&target) else {
            continue;
        };
        if preds.get(&target).map_or(0, HashSet::len) != 1 {
            continue;
        }
        if !involved.contains(&pred_idx) && !involved.contains(&target_idx) {
            merges.push((pred_idx, target_idx));
            involved.insert(pred_idx);
            involved.insert(target_idx);
        }
    }
    if merges.is_empty() {
        return false;
    }

    for &(pred_idx, target_idx) in &merges {
        let instrs = std::mem::take(&mut body.blocks[target_idx].instructions);
        let term = std::mem::replace(
            &mut body.blocks[target_idx].terminator,
            Terminator::Unreachable,
        );
        body.blocks[pred_idx].instructions.extend(instrs);
        body.blocks[pred_idx].terminator = term;
    }

    let mut absorbed: Vec<usize> = merges.iter().map(|&(_, t)| t).collect();
    absorbed.sort_unstable_by(|a, b| b.cmp(a));
    for idx in absorbed {
        body.blocks.remove(idx);
    }
    true
}
