//! Projection paths and access paths.
//!
//! A [`ProjectionPath`] names a position inside an aggregate, ordered from the
//! outermost step to the innermost one. An [`AccessPath`] anchors such a path
//! at a storage base.

use super::types::{Body, GlobalId, Instr, VarId};
use super::uses::DefUse;
use std::fmt;

/// One step into an aggregate value or address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionStep {
    StructField(u32),
    TupleField(u32),
    EnumCase(u32),
    /// Element at a constant offset from an address.
    Index(i64),
    /// Element at an offset that is not known at compile time.
    AnyIndex,
}

impl fmt::Display for ProjectionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionStep::StructField(i) => write!(f, "s{i}"),
            ProjectionStep::TupleField(i) => write!(f, "{i}"),
            ProjectionStep::EnumCase(i) => write!(f, "e{i}"),
            ProjectionStep::Index(i) => write!(f, "i{i}"),
            ProjectionStep::AnyIndex => write!(f, "i*"),
        }
    }
}

/// Ordered sequence of projection steps, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProjectionPath {
    steps: Vec<ProjectionStep>,
}

impl ProjectionPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: impl IntoIterator<Item = ProjectionStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    pub fn steps(&self) -> &[ProjectionStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns this path extended by `step` at the innermost end.
    pub fn push(&self, step: ProjectionStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    /// Returns this path with `step` added as the new outermost step.
    pub fn prepend(&self, step: ProjectionStep) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.push(step);
        steps.extend_from_slice(&self.steps);
        Self { steps }
    }

    /// Concatenation: `self` followed by `inner`.
    pub fn concat(&self, inner: &ProjectionPath) -> Self {
        let mut steps = self.steps.clone();
        steps.extend_from_slice(&inner.steps);
        Self { steps }
    }

    /// Every step addresses a single, statically known element.
    pub fn is_materializable(&self) -> bool {
        !self.steps.contains(&ProjectionStep::AnyIndex)
    }
}

impl fmt::Display for ProjectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "<root>");
        }
        for step in &self.steps {
            write!(f, ".{step}")?;
        }
        Ok(())
    }
}

/// The storage an address points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessBase {
    Global(GlobalId),
    /// A stack slot, identified by the `AllocStack` result.
    Stack(VarId),
    /// An address passed in as a function parameter.
    Argument(VarId),
    Unidentified,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessPath {
    pub base: AccessBase,
    pub path: ProjectionPath,
}

impl AccessPath {
    /// The projection path, if it names a single statically known location.
    pub fn materializable_path(&self) -> Option<ProjectionPath> {
        self.path
            .is_materializable()
            .then(|| self.path.clone())
    }

    /// Walks `address` up to its base through address projections, casts and
    /// scoped accesses. `inner` is appended after the address projections.
    pub fn compute(body: &Body, def_use: &DefUse, address: VarId, inner: ProjectionPath) -> Self {
        let mut path = inner;
        let mut current = address;
        // Each step moves to a strictly earlier definition in a well-formed
        // body; the bound keeps malformed (cyclic) input from hanging.
        for _ in 0..=body.instruction_count() {
            if def_use.is_param(current) {
                return AccessPath {
                    base: AccessBase::Argument(current),
                    path,
                };
            }
            let Some(def) = def_use.single_def(current) else {
                break;
            };
            match body.instr(def) {
                Instr::GlobalAddr { global, .. } => {
                    return AccessPath {
                        base: AccessBase::Global(*global),
                        path,
                    };
                }
                Instr::AllocStack { dest } => {
                    return AccessPath {
                        base: AccessBase::Stack(*dest),
                        path,
                    };
                }
                Instr::StructElementAddr { base, field, .. } => {
                    path = path.prepend(ProjectionStep::StructField(*field));
                    current = *base;
                }
                Instr::TupleElementAddr { base, index, .. } => {
                    path = path.prepend(ProjectionStep::TupleField(*index));
                    current = *base;
                }
                Instr::IndexAddr { base, index, .. } => {
                    let step = match def_use.single_def(*index).map(|d| body.instr(d)) {
                        Some(Instr::Const { value, .. }) => ProjectionStep::Index(*value),
                        _ => ProjectionStep::AnyIndex,
                    };
                    path = path.prepend(step);
                    current = *base;
                }
                Instr::BeginAccess { address, .. } => current = *address,
                Instr::PointerToAddress { operand, .. } | Instr::AddressToPointer { operand, .. } => {
                    current = *operand
                }
                _ => break,
            }
        }
        AccessPath {
            base: AccessBase::Unidentified,
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, BlockId, Terminator};

    fn body(params: Vec<VarId>, instructions: Vec<Instr>) -> Body {
        Body {
            params,
            blocks: vec![Block {
                id: BlockId(0),
                instructions,
                terminator: Terminator::Return { value: None },
            }],
            entry_block: BlockId(0),
            next_var: 32,
            next_block: 1,
        }
    }

    #[test]
    fn path_composition() {
        let outer = ProjectionPath::new().push(ProjectionStep::StructField(1));
        let inner = ProjectionPath::new().push(ProjectionStep::TupleField(0));
        let joined = outer.concat(&inner);
        assert_eq!(
            joined.steps(),
            &[ProjectionStep::StructField(1), ProjectionStep::TupleField(0)]
        );
        assert_eq!(joined, inner.prepend(ProjectionStep::StructField(1)));
        assert_eq!(joined.to_string(), ".s1.0");
        assert_eq!(ProjectionPath::new().to_string(), "<root>");
    }

    #[test]
    fn access_path_through_projections_and_casts() {
        let g = GlobalId::new(2);
        let b = body(
            vec![],
            vec![
                Instr::GlobalAddr {
                    dest: VarId(0),
                    global: g,
                },
                Instr::AddressToPointer {
                    dest: VarId(1),
                    operand: VarId(0),
                },
                Instr::PointerToAddress {
                    dest: VarId(2),
                    operand: VarId(1),
                },
                Instr::BeginAccess {
                    dest: VarId(3),
                    address: VarId(2),
                },
                Instr::StructElementAddr {
                    dest: VarId(4),
                    base: VarId(3),
                    field: 1,
                },
                Instr::TupleElementAddr {
                    dest: VarId(5),
                    base: VarId(4),
                    index: 0,
                },
            ],
        );
        let du = DefUse::build(&b);
        let inner = ProjectionPath::new().push(ProjectionStep::EnumCase(2));
        let ap = AccessPath::compute(&b, &du, VarId(5), inner);
        assert_eq!(ap.base, AccessBase::Global(g));
        assert_eq!(
            ap.path.steps(),
            &[
                ProjectionStep::StructField(1),
                ProjectionStep::TupleField(0),
                ProjectionStep::EnumCase(2),
            ]
        );
        assert!(ap.materializable_path().is_some());
    }

    #[test]
    fn dynamic_index_is_not_materializable() {
        let b = body(
            vec![VarId(9)],
            vec![
                Instr::AllocStack { dest: VarId(0) },
                Instr::IndexAddr {
                    dest: VarId(1),
                    base: VarId(0),
                    index: VarId(9),
                },
            ],
        );
        let du = DefUse::build(&b);
        let ap = AccessPath::compute(&b, &du, VarId(1), ProjectionPath::new());
        assert_eq!(ap.base, AccessBase::Stack(VarId(0)));
        assert_eq!(ap.materializable_path(), None);
    }

    #[test]
    fn constant_index_is_materializable() {
        let b = body(
            vec![],
            vec![
                Instr::AllocStack { dest: VarId(0) },
                Instr::Const {
                    dest: VarId(1),
                    value: 3,
                },
                Instr::IndexAddr {
                    dest: VarId(2),
                    base: VarId(0),
                    index: VarId(1),
                },
            ],
        );
        let du = DefUse::build(&b);
        let ap = AccessPath::compute(&b, &du, VarId(2), ProjectionPath::new());
        assert_eq!(ap.path.steps(), &[ProjectionStep::Index(3)]);
    }

    #[test]
    fn parameter_and_unknown_bases() {
        let b = body(
            vec![VarId(0)],
            vec![Instr::Load {
                dest: VarId(1),
                addr: VarId(0),
            }],
        );
        let du = DefUse::build(&b);
        assert_eq!(
            AccessPath::compute(&b, &du, VarId(0), ProjectionPath::new()).base,
            AccessBase::Argument(VarId(0))
        );
        assert_eq!(
            AccessPath::compute(&b, &du, VarId(1), ProjectionPath::new()).base,
            AccessBase::Unidentified
        );
    }
}
