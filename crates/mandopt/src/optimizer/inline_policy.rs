//! Inlining and devirtualization decisions for one apply site.

use super::global_init::stored_to_global_path;
use crate::context::OptimizerContext;
use crate::ir::{ApplyKind, Callee, FuncId, InlineStrategy, Instr, InstrRef, Module, ProjectionPath};
use log::debug;
use std::collections::HashSet;

/// `(location inside the initialized global, callee)` pairs already inlined
/// by one optimizer invocation.
pub type PathFunctionSet = HashSet<(ProjectionPath, FuncId)>;

/// What happened to an apply site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Unchanged,
    /// The call now has a direct callee. It is reconsidered in a later round.
    Devirtualized,
    /// The call was replaced by the callee's body. The rest of its block
    /// moved to a new block.
    Inlined,
}

/// Devirtualizes or inlines the apply at `at` in `f` when the mandatory
/// pipeline requires it.
pub fn process_apply<C: OptimizerContext>(
    ctx: &mut C,
    f: FuncId,
    at: InstrRef,
    already_inlined: &mut PathFunctionSet,
) -> ApplyOutcome {
    let Some(apply) = ctx
        .module()
        .function(f)
        .body
        .as_ref()
        .and_then(|body| body.get_instr(at))
        .and_then(Instr::as_apply)
        .cloned()
    else {
        return ApplyOutcome::Unchanged;
    };

    let callee = match &apply.callee {
        Callee::Method(method) => {
            if ctx.try_devirtualize(f, at, true) {
                debug!("{f}: devirtualized call to #{method}");
                return ApplyOutcome::Devirtualized;
            }
            return ApplyOutcome::Unchanged;
        }
        Callee::Direct(callee) => *callee,
    };

    if !ctx.load_body(callee, false) {
        debug!("{f}: body of {callee} is not available");
        return ApplyOutcome::Unchanged;
    }
    let Some(reason) = inline_reason(ctx.module(), f, at, callee, already_inlined) else {
        return ApplyOutcome::Unchanged;
    };

    if apply.inlining_can_invalidate_stack_nesting() {
        ctx.notify_stack_nesting_may_be_invalidated();
    }
    if !ctx.inline_call(f, at, true) {
        debug!("{f}: inliner refused {callee}");
        return ApplyOutcome::Unchanged;
    }
    // Only a location that actually received the callee is used up.
    if let InlineReason::StoredToGlobal(path) = reason {
        already_inlined.insert((path, callee));
    }
    debug!("{f}: inlined {}", ctx.module().function(callee).name);
    ApplyOutcome::Inlined
}

/// Why a direct call must be inlined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineReason {
    Transparent,
    Coroutine,
    /// Always-inline callee of a global initializer.
    AlwaysInInitializer,
    /// The result is stored to this location of the initialized global.
    StoredToGlobal(ProjectionPath),
}

/// Decides whether the direct call to `callee` at `at` in `caller` must be
/// inlined and records the global location for the flow-analysis rule.
pub fn should_inline(
    module: &Module,
    caller: FuncId,
    at: InstrRef,
    callee: FuncId,
    already_inlined: &mut PathFunctionSet,
) -> bool {
    match inline_reason(module, caller, at, callee, already_inlined) {
        Some(InlineReason::StoredToGlobal(path)) => already_inlined.insert((path, callee)),
        Some(_) => true,
        None => false,
    }
}

/// The rule that requires inlining the call at `at`, if any. Locations in
/// `already_inlined` no longer qualify.
pub fn inline_reason(
    module: &Module,
    caller: FuncId,
    at: InstrRef,
    callee: FuncId,
    already_inlined: &PathFunctionSet,
) -> Option<InlineReason> {
    let caller_fn = module.function(caller);
    let callee_fn = module.function(callee);
    let apply = caller_fn
        .body
        .as_ref()
        .and_then(|body| body.get_instr(at))
        .and_then(Instr::as_apply)?;

    if callee_fn.transparent {
        return Some(InlineReason::Transparent);
    }
    if apply.kind == ApplyKind::Coroutine {
        return Some(InlineReason::Coroutine);
    }
    if caller_fn.global_init_once && callee_fn.inline_strategy == InlineStrategy::Always {
        return Some(InlineReason::AlwaysInInitializer);
    }
    // Inlining lets the global be initialized statically, but only once per
    // location and callee.
    if apply.has_substitutions() {
        return None;
    }
    let path = stored_to_global_path(caller_fn, at)?;
    if already_inlined.contains(&(path.clone(), callee)) {
        return None;
    }
    Some(InlineReason::StoredToGlobal(path))
}
