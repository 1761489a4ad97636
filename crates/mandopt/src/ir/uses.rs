//! Def-use index of a function body.
//!
//! The IR stores operands by value number only, so analyses that walk from a
//! value to its consumers build a [`DefUse`] index first. The index is a
//! snapshot: any rewrite of the body invalidates it.

use super::types::{Body, Instr, InstrRef, VarId};
use super::utils::{for_each_use, for_each_use_terminator, instr_dest};
use std::collections::{HashMap, HashSet};

/// Where a value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseSite {
    Instr(InstrRef),
    /// Terminator of the block at this position in `Body::blocks`.
    Terminator(usize),
}

/// A single read of a value: the consuming site plus the operand index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub site: UseSite,
    pub operand: usize,
}

impl Use {
    pub fn instr(&self) -> Option<InstrRef> {
        match self.site {
            UseSite::Instr(at) => Some(at),
            UseSite::Terminator(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct DefUse {
    defs: HashMap<VarId, Vec<InstrRef>>,
    uses: HashMap<VarId, Vec<Use>>,
    params: HashSet<VarId>,
}

impl DefUse {
    pub fn build(body: &Body) -> Self {
        let mut index = DefUse {
            params: body.params.iter().copied().collect(),
            ..Default::default()
        };
        for (b, block) in body.blocks.iter().enumerate() {
            for (i, instr) in block.instructions.iter().enumerate() {
                let at = InstrRef::new(b, i);
                let mut operand = 0;
                for_each_use(instr, |v| {
                    index.uses.entry(v).or_default().push(Use {
                        site: UseSite::Instr(at),
                        operand,
                    });
                    operand += 1;
                });
                if let Some(dest) = instr_dest(instr) {
                    index.defs.entry(dest).or_default().push(at);
                }
            }
            let mut operand = 0;
            for_each_use_terminator(&block.terminator, |v| {
                index.uses.entry(v).or_default().push(Use {
                    site: UseSite::Terminator(b),
                    operand,
                });
                operand += 1;
            });
        }
        index
    }

    pub fn uses(&self, var: VarId) -> &[Use] {
        self.uses.get(&var).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn use_count(&self, var: VarId) -> usize {
        self.uses(var).len()
    }

    pub fn defs(&self, var: VarId) -> &[InstrRef] {
        self.defs.get(&var).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_param(&self, var: VarId) -> bool {
        self.params.contains(&var)
    }

    /// The defining instruction, if `var` is defined by exactly one
    /// instruction and is not a parameter.
    pub fn single_def(&self, var: VarId) -> Option<InstrRef> {
        match self.defs(var) {
            [at] if !self.is_param(var) => Some(*at),
            _ => None,
        }
    }

    /// `var` has exactly one definition, either as a parameter or as an
    /// instruction result.
    pub fn has_single_definition(&self, var: VarId) -> bool {
        let defs = self.defs(var).len();
        (self.is_param(var) && defs == 0) || (!self.is_param(var) && defs == 1)
    }

    /// The only use of `var` that matters for data flow.
    ///
    /// Debug uses and the `EndAccess` closing a scoped access are ignored.
    /// Returns `None` if there is no such use or more than one.
    pub fn single_relevant_use(&self, body: &Body, var: VarId) -> Option<Use> {
        let mut relevant = self.uses(var).iter().filter(|u| match u.site {
            UseSite::Instr(at) => !matches!(
                body.instr(at),
                Instr::DebugValue { .. } | Instr::EndAccess { .. }
            ),
            UseSite::Terminator(_) => true,
        });
        let first = relevant.next()?;
        if relevant.next().is_some() {
            return None;
        }
        Some(*first)
    }
}
