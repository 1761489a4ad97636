use crate::context::OptimizerContext;
use crate::ir::{DefUse, FuncId, Instr, InstrRef};

/// Erases `Metatype` instructions that are only debug-inspected, together
/// with their `DebugValue` uses.
pub fn eliminate<C: OptimizerContext>(ctx: &mut C, f: FuncId) -> bool {
    let Some(body) = ctx.module().function(f).body.as_ref() else {
        return false;
    };
    let def_use = DefUse::build(body);
    let mut doomed: Vec<InstrRef> = Vec::new();
    for (at, instr) in body.instructions() {
        let Instr::Metatype { dest, .. } = instr else {
            continue;
        };
        let debug_uses: Option<Vec<InstrRef>> = def_use
            .uses(*dest)
            .iter()
            .map(|u| {
                u.instr()
                    .filter(|user| matches!(body.instr(*user), Instr::DebugValue { .. }))
            })
            .collect();
        if let Some(debug_uses) = debug_uses {
            doomed.push(at);
            doomed.extend(debug_uses);
        }
    }
    if doomed.is_empty() {
        return false;
    }

    // Back to front, so earlier positions stay valid.
    doomed.sort_unstable();
    doomed.dedup();
    for at in doomed.into_iter().rev() {
        ctx.erase(f, at);
    }
    true
}
