//! Flow analysis for global initializers.
//!
//! Inside a once-initializer, a call whose result ends up, unchanged except
//! for being wrapped into aggregates, in the storage of the initialized
//! global is worth inlining: the global can then be initialized statically.
//!
//! ## Algorithm
//!
//! Starting from the call result, repeatedly follow its single relevant use
//! (debug uses and `EndAccess` do not count):
//!
//! - `Struct` / `Tuple` / `Enum` construction: the value becomes a field of a
//!   larger value, so the matching step is added as the new outermost step.
//! - `AddressToPointer` / `PointerToAddress` / `BeginAccess`: follow the
//!   result unchanged.
//! - `Store` of the value: the destination address is walked back to its
//!   base. The walk succeeds iff the base is the initialized global and the
//!   full path is materializable.
//! - anything else, or a value with zero or several relevant uses: fail.

use crate::ir::{
    AccessBase, AccessPath, Body, DefUse, Function, GlobalId, Instr, InstrRef, ProjectionPath,
    ProjectionStep, UseSite, VarId,
};
use log::trace;

/// The location inside the caller's initialized global that the result of
/// the apply at `at` is stored to, if provable.
pub fn stored_to_global_path(caller: &Function, at: InstrRef) -> Option<ProjectionPath> {
    if !caller.global_init_once {
        return None;
    }
    let target = caller.initialized_global()?;
    let body = caller.body.as_ref()?;
    let apply = body.get_instr(at)?.as_apply()?;
    let def_use = DefUse::build(body);
    let analysis = GlobalFlow {
        body,
        def_use: &def_use,
        target,
    };

    let path = match apply.indirect_results {
        0 => analysis.is_stored_to_global(apply.dest?),
        1 => {
            let out = *apply.args.first()?;
            let access = AccessPath::compute(body, &def_use, out, ProjectionPath::new());
            match access.base {
                AccessBase::Global(g) if g == target => access.materializable_path(),
                AccessBase::Stack(slot) if access.path.is_empty() && slot == out => {
                    let loaded = analysis.single_load_from(slot, at)?;
                    analysis.is_stored_to_global(loaded)
                }
                _ => None,
            }
        }
        // Several indirect results cannot be attributed to one location.
        _ => None,
    };
    trace!(
        "global flow of {at:?} in {}: {}",
        caller.name,
        path.as_ref()
            .map_or_else(|| "not provable".to_string(), ToString::to_string)
    );
    path
}

struct GlobalFlow<'a> {
    body: &'a Body,
    def_use: &'a DefUse,
    target: GlobalId,
}

impl GlobalFlow<'_> {
    /// The projection path at which `value` is stored into the target global.
    fn is_stored_to_global(&self, value: VarId) -> Option<ProjectionPath> {
        let mut path = ProjectionPath::new();
        let mut current = value;
        // Each step moves to a different instruction; the bound only guards
        // against malformed cyclic input.
        for _ in 0..=self.body.instruction_count() {
            let use_ = self.def_use.single_relevant_use(self.body, current)?;
            let at = use_.instr()?;
            match self.body.instr(at) {
                Instr::Struct { dest, .. } => {
                    path = path.prepend(ProjectionStep::StructField(use_.operand as u32));
                    current = *dest;
                }
                Instr::Tuple { dest, .. } => {
                    path = path.prepend(ProjectionStep::TupleField(use_.operand as u32));
                    current = *dest;
                }
                Instr::Enum { dest, case, .. } => {
                    path = path.prepend(ProjectionStep::EnumCase(*case));
                    current = *dest;
                }
                Instr::AddressToPointer { dest, .. }
                | Instr::PointerToAddress { dest, .. }
                | Instr::BeginAccess { dest, .. } => current = *dest,
                Instr::Store { addr, .. } if use_.operand == 0 => {
                    let access = AccessPath::compute(self.body, self.def_use, *addr, path);
                    return match access.base {
                        AccessBase::Global(g) if g == self.target => access.materializable_path(),
                        _ => None,
                    };
                }
                _ => return None,
            }
        }
        None
    }

    /// The value read by the only `Load` of `slot`, provided the slot is
    /// otherwise only passed to the apply at `apply_at`, deallocated or
    /// debug-inspected.
    fn single_load_from(&self, slot: VarId, apply_at: InstrRef) -> Option<VarId> {
        let mut loaded = None;
        for use_ in self.def_use.uses(slot) {
            let UseSite::Instr(at) = use_.site else {
                return None;
            };
            if at == apply_at {
                continue;
            }
            match self.body.instr(at) {
                Instr::DeallocStack { .. } | Instr::DebugValue { .. } => {}
                Instr::Load { dest, .. } => {
                    if loaded.replace(*dest).is_some() {
                        return None;
                    }
                }
                _ => return None,
            }
        }
        loaded
    }
}
