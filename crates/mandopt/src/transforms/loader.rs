//! On-demand body materialization.
//!
//! Bodies that are not yet attached to their function wait in
//! [`Module::library`]. Loading moves a body out of the library; a loaded
//! body is never moved back, so loading is idempotent.

use crate::ir::{FuncId, Instr, Module};
use log::trace;
use std::collections::HashSet;

/// Loads the body of `f` and, with `recursive`, the bodies of everything it
/// can call directly or run as a once-initializer.
///
/// Returns whether `f` has a body afterwards.
pub fn load(module: &mut Module, f: FuncId, recursive: bool) -> bool {
    if f.as_usize() >= module.functions.len() {
        return false;
    }

    let mut seen = HashSet::new();
    let mut pending = vec![f];
    while let Some(id) = pending.pop() {
        if !seen.insert(id) || id.as_usize() >= module.functions.len() {
            continue;
        }
        materialize(module, id);
        if !recursive {
            break;
        }
        if let Some(body) = &module.function(id).body {
            for (_, instr) in body.instructions() {
                match instr {
                    Instr::Apply(apply) => pending.extend(apply.direct_callee()),
                    Instr::Once { initializer, .. } => pending.push(*initializer),
                    _ => {}
                }
            }
        }
    }
    module.function(f).has_body()
}

fn materialize(module: &mut Module, id: FuncId) {
    if module.function(id).has_body() {
        return;
    }
    if let Some(body) = module.library.remove(&id) {
        trace!("loaded body of {} ({id})", module.function(id).name);
        module.function_mut(id).body = Some(body);
    }
}
