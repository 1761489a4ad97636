//! IR type definitions.
//!
//! These types represent a structured, SSA-style intermediate representation
//! of a whole module. Values are numbered sequentially per function body
//! (`v0`, `v1`, ...), blocks are numbered `bb0`, `bb1`, ..., and functions and
//! globals are referenced by stable index into the owning [`Module`].
//!
//! `Assign` is the only instruction that may give a value a second
//! definition: the inliner uses it to merge the returns of a multi-exit callee
//! into the call's result.

use std::collections::HashMap;
use std::fmt;

/// Unique identifier for a value within one function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Unique identifier for a basic block within one function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Generic index type with a phantom tag to distinguish different index spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Idx<TAG> {
    idx: usize,
    _marker: std::marker::PhantomData<TAG>,
}

impl<TAG> Idx<TAG> {
    pub fn new(idx: usize) -> Self {
        Self {
            idx,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn as_usize(&self) -> usize {
        self.idx
    }
}

impl<TAG> From<Idx<TAG>> for usize {
    fn from(idx: Idx<TAG>) -> Self {
        idx.idx
    }
}

/// Marker type for function indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionTag;

/// Function index into `Module::functions`.
pub type FuncId = Idx<FunctionTag>;

/// Marker type for global variable indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalTag;

/// Global variable index into `Module::globals`.
pub type GlobalId = Idx<GlobalTag>;

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@f{}", self.idx)
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@g{}", self.idx)
    }
}

/// Position of an instruction: block position in `Body::blocks` and
/// instruction position in that block.
///
/// Positions are not stable across rewrites that insert or erase
/// instructions in the same block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrRef {
    pub block: usize,
    pub index: usize,
}

impl InstrRef {
    pub fn new(block: usize, index: usize) -> Self {
        Self { block, index }
    }
}

// ── Attributes ───────────────────────────────────────────────────────────────

/// Performance constraint a function was annotated with.
///
/// Any value other than `None` makes the function a root of the mandatory
/// optimization pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceConstraint {
    #[default]
    None,
    NoLocks,
    NoAllocation,
    NoRuntime,
    NoExistentials,
}

impl PerformanceConstraint {
    pub fn is_none(&self) -> bool {
        matches!(self, PerformanceConstraint::None)
    }
}

/// Declared inlining preference of a function.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineStrategy {
    #[default]
    Default,
    Always,
    Never,
}

// ── Module entities ──────────────────────────────────────────────────────────

/// A module-level storage location.
#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,

    /// The global's initial value must be computable at compile time.
    pub must_be_initialized_statically: bool,
}

impl Global {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            must_be_initialized_statically: false,
        }
    }
}

/// Method table of a class, used for devirtualization.
#[derive(Debug, Clone)]
pub struct VTable {
    pub class: String,

    /// Lookups that miss in this table continue in the superclass table.
    pub superclass: Option<String>,

    pub entries: HashMap<String, FuncId>,
}

/// IR representation of a complete function.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,

    pub performance: PerformanceConstraint,

    pub inline_strategy: InlineStrategy,

    /// Transparent functions are always inlined into their callers.
    pub transparent: bool,

    /// The function runs exactly once (behind a `Once` guard) to initialize
    /// the global named by the `AllocGlobal` in its entry block.
    pub global_init_once: bool,

    /// Generic parameter names. A call with substitutions binds them in order.
    pub generic_params: Vec<String>,

    /// The function body, or `None` while it has not been materialized (or is
    /// defined outside this module).
    pub body: Option<Body>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            performance: PerformanceConstraint::None,
            inline_strategy: InlineStrategy::Default,
            transparent: false,
            global_init_once: false,
            generic_params: Vec::new(),
            body: None,
        }
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Returns the global this once-initializer allocates, found by scanning
    /// the entry block for an `AllocGlobal`.
    pub fn initialized_global(&self) -> Option<GlobalId> {
        let body = self.body.as_ref()?;
        let entry = body.entry()?;
        entry.instructions.iter().find_map(|instr| match instr {
            Instr::AllocGlobal { global } => Some(*global),
            _ => None,
        })
    }
}

/// A function body: parameters plus a control-flow graph of basic blocks.
#[derive(Debug, Clone)]
pub struct Body {
    /// Function parameters. Indirect result addresses come first.
    pub params: Vec<VarId>,

    /// All basic blocks in the function
    pub blocks: Vec<Block>,

    /// Entry block (where execution starts)
    pub entry_block: BlockId,

    /// Next value number to hand out. Every value in the body is below it.
    pub next_var: u32,

    /// Next block number to hand out. Every block id in the body is below it.
    pub next_block: u32,
}

impl Body {
    /// Allocates a fresh value number.
    pub fn new_var(&mut self) -> VarId {
        let var = VarId(self.next_var);
        self.next_var += 1;
        var
    }

    /// Allocates a fresh block number. The block itself is not created.
    pub fn new_block_id(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    pub fn entry(&self) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == self.entry_block)
    }

    pub fn block_index(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    pub fn instr(&self, at: InstrRef) -> &Instr {
        &self.blocks[at.block].instructions[at.index]
    }

    pub fn instr_mut(&mut self, at: InstrRef) -> &mut Instr {
        &mut self.blocks[at.block].instructions[at.index]
    }

    /// Returns the instruction at `at` if the position is still valid.
    pub fn get_instr(&self, at: InstrRef) -> Option<&Instr> {
        self.blocks.get(at.block)?.instructions.get(at.index)
    }

    /// Iterates over every instruction together with its position.
    pub fn instructions(&self) -> impl Iterator<Item = (InstrRef, &Instr)> {
        self.blocks.iter().enumerate().flat_map(|(b, block)| {
            block
                .instructions
                .iter()
                .enumerate()
                .map(move |(i, instr)| (InstrRef::new(b, i), instr))
        })
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len()).sum()
    }
}

/// A basic block: a sequence of instructions with a single entry and exit.
#[derive(Debug, Clone)]
pub struct Block {
    /// Unique identifier for this block
    pub id: BlockId,

    /// Instructions in this block (no control flow within)
    pub instructions: Vec<Instr>,

    /// How control exits this block
    pub terminator: Terminator,
}

// ── Instructions ─────────────────────────────────────────────────────────────

/// Binary integer operations. All arithmetic wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
}

impl BinOp {
    pub fn fold(&self, lhs: i64, rhs: i64) -> i64 {
        match self {
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Sub => lhs.wrapping_sub(rhs),
            BinOp::Mul => lhs.wrapping_mul(rhs),
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinOp::Add => write!(f, "add"),
            BinOp::Sub => write!(f, "sub"),
            BinOp::Mul => write!(f, "mul"),
        }
    }
}

/// Call target of an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// Statically known function.
    Direct(FuncId),

    /// Dynamically dispatched class method. The receiver is the last argument.
    Method(String),
}

/// Flavor of a call site.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ApplyKind {
    /// Ordinary call.
    #[default]
    Call,

    /// Suspendable (coroutine) call. The callee's frame may be allocated by
    /// the caller, interleaved with the caller's own stack allocations.
    Coroutine,
}

/// A full apply site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apply {
    /// Direct result (None for calls without one)
    pub dest: Option<VarId>,

    pub callee: Callee,

    /// Arguments, indirect result addresses first.
    pub args: Vec<VarId>,

    /// Number of leading `args` that are indirect result addresses.
    pub indirect_results: usize,

    /// Generic substitutions, bound to the callee's `generic_params` in order.
    pub substitutions: Vec<String>,

    pub kind: ApplyKind,
}

impl Apply {
    pub fn direct(dest: Option<VarId>, callee: FuncId, args: Vec<VarId>) -> Self {
        Self {
            dest,
            callee: Callee::Direct(callee),
            args,
            indirect_results: 0,
            substitutions: Vec::new(),
            kind: ApplyKind::Call,
        }
    }

    pub fn direct_callee(&self) -> Option<FuncId> {
        match self.callee {
            Callee::Direct(f) => Some(f),
            Callee::Method(_) => None,
        }
    }

    /// The receiver of a dynamically dispatched call.
    pub fn receiver(&self) -> Option<VarId> {
        match self.callee {
            Callee::Method(_) => self.args.last().copied(),
            Callee::Direct(_) => None,
        }
    }

    pub fn has_substitutions(&self) -> bool {
        !self.substitutions.is_empty()
    }

    /// Removing this call by inlining may leave stack deallocations out of
    /// LIFO order.
    pub fn inlining_can_invalidate_stack_nesting(&self) -> bool {
        matches!(self.kind, ApplyKind::Coroutine)
    }
}

/// A single IR instruction.
///
/// Operand order matters: it defines the operand index of a use (see
/// `ir::utils::for_each_use`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// Define a value from an integer constant
    Const { dest: VarId, value: i64 },

    /// Binary operation (dest = lhs op rhs)
    BinOp {
        dest: VarId,
        op: BinOp,
        lhs: VarId,
        rhs: VarId,
    },

    /// Copy a value (dest = src)
    Assign { dest: VarId, src: VarId },

    /// Construct a struct from its fields
    Struct { dest: VarId, fields: Vec<VarId> },

    /// Construct a tuple from its elements
    Tuple { dest: VarId, elements: Vec<VarId> },

    /// Construct an enum value of the given case
    Enum {
        dest: VarId,
        case: u32,
        payload: Option<VarId>,
    },

    StructExtract {
        dest: VarId,
        operand: VarId,
        field: u32,
    },

    TupleExtract {
        dest: VarId,
        operand: VarId,
        index: u32,
    },

    /// Produce the metatype of `ty`
    Metatype { dest: VarId, ty: String },

    /// Debug-only use of a value
    DebugValue { operand: VarId },

    AllocStack { dest: VarId },

    DeallocStack { operand: VarId },

    /// Allocate an object of `class`
    AllocRef { dest: VarId, class: String },

    DeallocRef { operand: VarId },

    /// Allocate the storage of a global (first instruction of its initializer)
    AllocGlobal { global: GlobalId },

    /// Address of a global's storage
    GlobalAddr { dest: VarId, global: GlobalId },

    StructElementAddr {
        dest: VarId,
        base: VarId,
        field: u32,
    },

    TupleElementAddr {
        dest: VarId,
        base: VarId,
        index: u32,
    },

    /// Address `index` elements past `base`
    IndexAddr {
        dest: VarId,
        base: VarId,
        index: VarId,
    },

    AddressToPointer { dest: VarId, operand: VarId },

    PointerToAddress { dest: VarId, operand: VarId },

    /// Begin a scoped access to `address`; the result is the accessed address
    BeginAccess { dest: VarId, address: VarId },

    EndAccess { access: VarId },

    Load { dest: VarId, addr: VarId },

    Store { value: VarId, addr: VarId },

    /// Copy the value at `src` into `to`
    CopyAddr { src: VarId, to: VarId },

    Apply(Apply),

    /// Run `initializer` once, guarded by `token`
    Once { token: VarId, initializer: FuncId },
}

/// How an instruction may touch memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryBehavior {
    None,
    MayRead,
    MayWrite,
    MayReadWrite,
    MayHaveSideEffects,
}

impl Instr {
    pub fn memory_behavior(&self) -> MemoryBehavior {
        match self {
            Instr::Const { .. }
            | Instr::BinOp { .. }
            | Instr::Assign { .. }
            | Instr::Struct { .. }
            | Instr::Tuple { .. }
            | Instr::Enum { .. }
            | Instr::StructExtract { .. }
            | Instr::TupleExtract { .. }
            | Instr::Metatype { .. }
            | Instr::DebugValue { .. }
            | Instr::AllocStack { .. }
            | Instr::AllocRef { .. }
            | Instr::GlobalAddr { .. }
            | Instr::StructElementAddr { .. }
            | Instr::TupleElementAddr { .. }
            | Instr::IndexAddr { .. }
            | Instr::AddressToPointer { .. }
            | Instr::PointerToAddress { .. } => MemoryBehavior::None,

            Instr::Load { .. } => MemoryBehavior::MayRead,
            Instr::Store { .. } => MemoryBehavior::MayWrite,
            Instr::CopyAddr { .. } => MemoryBehavior::MayReadWrite,

            Instr::DeallocStack { .. }
            | Instr::DeallocRef { .. }
            | Instr::AllocGlobal { .. }
            | Instr::BeginAccess { .. }
            | Instr::EndAccess { .. }
            | Instr::Apply(_)
            | Instr::Once { .. } => MemoryBehavior::MayHaveSideEffects,
        }
    }

    /// The instruction writes memory or has effects beyond its result.
    pub fn may_have_side_effects(&self) -> bool {
        matches!(
            self.memory_behavior(),
            MemoryBehavior::MayWrite
                | MemoryBehavior::MayReadWrite
                | MemoryBehavior::MayHaveSideEffects
        )
    }

    pub fn is_allocating_stack(&self) -> bool {
        matches!(self, Instr::AllocStack { .. })
    }

    pub fn is_deallocating_stack(&self) -> bool {
        matches!(self, Instr::DeallocStack { .. })
    }

    pub fn is_full_apply_site(&self) -> bool {
        matches!(self, Instr::Apply(_))
    }

    pub fn as_apply(&self) -> Option<&Apply> {
        match self {
            Instr::Apply(apply) => Some(apply),
            _ => None,
        }
    }

    pub fn as_apply_mut(&mut self) -> Option<&mut Apply> {
        match self {
            Instr::Apply(apply) => Some(apply),
            _ => None,
        }
    }
}

/// Block terminator: how control flow exits a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Return from function
    Return { value: Option<VarId> },

    /// Unconditional jump to target block
    Jump { target: BlockId },

    /// Conditional branch
    BranchIf {
        condition: VarId,
        if_true: BlockId,
        if_false: BlockId,
    },

    /// Unreachable (trap)
    Unreachable,
}

// ── Module ───────────────────────────────────────────────────────────────────

/// A whole module: functions, globals, class method tables and the library
/// of bodies that can be materialized on demand.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub functions: Vec<Function>,

    pub globals: Vec<Global>,

    pub vtables: Vec<VTable>,

    /// Bodies not yet attached to their function. `load_body` moves a body
    /// from here into `Function::body`.
    pub library: HashMap<FuncId, Body>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: Function) -> FuncId {
        self.functions.push(function);
        FuncId::new(self.functions.len() - 1)
    }

    pub fn add_global(&mut self, global: Global) -> GlobalId {
        self.globals.push(global);
        GlobalId::new(self.globals.len() - 1)
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.as_usize()]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.as_usize()]
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.functions.len()).map(FuncId::new)
    }

    pub fn global_ids(&self) -> impl Iterator<Item = GlobalId> {
        (0..self.globals.len()).map(GlobalId::new)
    }

    /// The body is attached or can be materialized from the library.
    pub fn body_available(&self, id: FuncId) -> bool {
        self.function(id).has_body() || self.library.contains_key(&id)
    }

    pub fn vtable(&self, class: &str) -> Option<&VTable> {
        self.vtables.iter().find(|vt| vt.class == class)
    }

    /// Resolves `method` for an object of dynamic type `class`, walking the
    /// superclass chain.
    pub fn lookup_method(&self, class: &str, method: &str) -> Option<FuncId> {
        let mut current = self.vtable(class);
        // A malformed (cyclic) hierarchy must not hang the lookup.
        let mut remaining = self.vtables.len();
        while let Some(vtable) = current {
            if let Some(f) = vtable.entries.get(method) {
                return Some(*f);
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            current = vtable.superclass.as_deref().and_then(|s| self.vtable(s));
        }
        None
    }
}
