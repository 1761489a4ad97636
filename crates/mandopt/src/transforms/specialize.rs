//! Generic specialization.
//!
//! A call that binds the generic parameters of its callee is redirected to a
//! clone of the callee with the substitutions applied to its body. Clones are
//! memoized per `(callee, substitutions)`, so every call site with the same
//! bindings shares one specialization.

use super::loader;
use super::SpecializationMemo;
use crate::ir::{Body, Callee, FuncId, Function, Instr, InstrRef, Module};
use log::debug;
use std::collections::HashMap;

/// Callees larger than this are only specialized when it is mandatory.
const OPTIONAL_SIZE_LIMIT: usize = 256;

/// Binds generic parameter names to substituted types. `None` when the
/// counts disagree.
pub fn substitution_map(
    params: &[String],
    substitutions: &[String],
) -> Option<HashMap<String, String>> {
    if params.len() != substitutions.len() {
        return None;
    }
    Some(params.iter().cloned().zip(substitutions.iter().cloned()).collect())
}

/// Rewrites every type mentioned by `body` according to `map`.
pub fn substitute_types(body: &mut Body, map: &HashMap<String, String>) {
    for block in &mut body.blocks {
        for instr in &mut block.instructions {
            match instr {
                Instr::Metatype { ty, .. } => {
                    if let Some(concrete) = map.get(ty.as_str()) {
                        *ty = concrete.clone();
                    }
                }
                Instr::Apply(apply) => {
                    for s in &mut apply.substitutions {
                        if let Some(concrete) = map.get(s.as_str()) {
                            *s = concrete.clone();
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Specializes every generic call in `f`. Returns whether a call changed.
pub fn specialize_calls(
    module: &mut Module,
    memo: &mut SpecializationMemo,
    f: FuncId,
    mandatory: bool,
) -> bool {
    let Some(body) = module.functions.get(f.as_usize()).and_then(|func| func.body.as_ref()) else {
        return false;
    };
    let sites: Vec<(InstrRef, FuncId, Vec<String>)> = body
        .instructions()
        .filter_map(|(at, instr)| {
            let apply = instr.as_apply()?;
            let callee = apply.direct_callee()?;
            if !apply.has_substitutions() {
                return None;
            }
            let callee_fn = module.functions.get(callee.as_usize())?;
            (callee_fn.generic_params.len() == apply.substitutions.len())
                .then(|| (at, callee, apply.substitutions.clone()))
        })
        .collect();

    let mut changed = false;
    for (at, callee, substitutions) in sites {
        let key = (callee, substitutions);
        let specialized = match memo.get(&key) {
            Some(&id) => id,
            None => {
                let Some(id) = create_specialization(module, key.0, &key.1, mandatory) else {
                    continue;
                };
                memo.insert(key, id);
                id
            }
        };
        let Some(apply) = module
            .function_mut(f)
            .body
            .as_mut()
            .and_then(|body| body.blocks.get_mut(at.block))
            .and_then(|block| block.instructions.get_mut(at.index))
            .and_then(Instr::as_apply_mut)
        else {
            continue;
        };
        apply.callee = Callee::Direct(specialized);
        apply.substitutions.clear();
        changed = true;
    }
    changed
}

fn create_specialization(
    module: &mut Module,
    callee: FuncId,
    substitutions: &[String],
    mandatory: bool,
) -> Option<FuncId> {
    if !loader::load(module, callee, false) {
        return None;
    }
    let generic = module.function(callee);
    let mut body = generic.body.clone()?;
    if !mandatory && body.instruction_count() > OPTIONAL_SIZE_LIMIT {
        return None;
    }
    let map = substitution_map(&generic.generic_params, substitutions)?;
    substitute_types(&mut body, &map);

    let specialized = Function {
        name: format!("{}<{}>", generic.name, substitutions.join(", ")),
        performance: generic.performance,
        inline_strategy: generic.inline_strategy,
        transparent: generic.transparent,
        global_init_once: false,
        generic_params: Vec::new(),
        body: Some(body),
    };
    debug!("specialize: created {}", specialized.name);
    Some(module.add_function(specialized))
}
