//! Programmatic construction of function bodies.
//!
//! `FunctionBuilder` hands out value and block numbers, appends instructions to
//! the current block and sets terminators. New blocks start out `Unreachable`
//! until a terminator is set.

use super::types::*;

/// Function body builder.
pub struct FunctionBuilder {
    body: Body,

    /// Position of the block receiving new instructions
    current: usize,
}

impl FunctionBuilder {
    /// Create a builder whose entry block is `bb0`.
    pub fn new() -> Self {
        let mut body = Body {
            params: Vec::new(),
            blocks: Vec::new(),
            entry_block: BlockId(0),
            next_var: 0,
            next_block: 0,
        };
        let entry = body.new_block_id();
        body.blocks.push(Block {
            id: entry,
            instructions: Vec::new(),
            terminator: Terminator::Unreachable,
        });
        Self { body, current: 0 }
    }

    /// Add a parameter. Indirect result parameters must be added first.
    pub fn param(&mut self) -> VarId {
        let var = self.body.new_var();
        self.body.params.push(var);
        var
    }

    /// Allocate a new value number without defining it.
    pub fn new_var(&mut self) -> VarId {
        self.body.new_var()
    }

    /// Create a new, empty block. The current block is unchanged.
    pub fn new_block(&mut self) -> BlockId {
        let id = self.body.new_block_id();
        self.body.blocks.push(Block {
            id,
            instructions: Vec::new(),
            terminator: Terminator::Unreachable,
        });
        id
    }

    /// Direct subsequent instructions to block `id`.
    pub fn switch_to(&mut self, id: BlockId) {
        self.current = self
            .body
            .block_index(id)
            .unwrap_or_else(|| panic!("switch_to: {id} was not created by this builder"));
    }

    /// Emit an instruction to the current block.
    pub fn emit(&mut self, instr: Instr) {
        self.body.blocks[self.current].instructions.push(instr);
    }

    /// Set the terminator for the current block.
    pub fn terminate(&mut self, term: Terminator) {
        self.body.blocks[self.current].terminator = term;
    }

    fn emit_with_dest(&mut self, make: impl FnOnce(VarId) -> Instr) -> VarId {
        let dest = self.new_var();
        self.emit(make(dest));
        dest
    }

    // ── Values ───────────────────────────────────────────────────────────

    pub fn constant(&mut self, value: i64) -> VarId {
        self.emit_with_dest(|dest| Instr::Const { dest, value })
    }

    pub fn binop(&mut self, op: BinOp, lhs: VarId, rhs: VarId) -> VarId {
        self.emit_with_dest(|dest| Instr::BinOp { dest, op, lhs, rhs })
    }

    pub fn assign(&mut self, dest: VarId, src: VarId) {
        self.emit(Instr::Assign { dest, src });
    }

    pub fn structure(&mut self, fields: Vec<VarId>) -> VarId {
        self.emit_with_dest(|dest| Instr::Struct { dest, fields })
    }

    pub fn tuple(&mut self, elements: Vec<VarId>) -> VarId {
        self.emit_with_dest(|dest| Instr::Tuple { dest, elements })
    }

    pub fn enum_case(&mut self, case: u32, payload: Option<VarId>) -> VarId {
        self.emit_with_dest(|dest| Instr::Enum {
            dest,
            case,
            payload,
        })
    }

    pub fn struct_extract(&mut self, operand: VarId, field: u32) -> VarId {
        self.emit_with_dest(|dest| Instr::StructExtract {
            dest,
            operand,
            field,
        })
    }

    pub fn tuple_extract(&mut self, operand: VarId, index: u32) -> VarId {
        self.emit_with_dest(|dest| Instr::TupleExtract {
            dest,
            operand,
            index,
        })
    }

    pub fn metatype(&mut self, ty: impl Into<String>) -> VarId {
        let ty = ty.into();
        self.emit_with_dest(|dest| Instr::Metatype { dest, ty })
    }

    pub fn debug_value(&mut self, operand: VarId) {
        self.emit(Instr::DebugValue { operand });
    }

    // ── Memory ───────────────────────────────────────────────────────────

    pub fn alloc_stack(&mut self) -> VarId {
        self.emit_with_dest(|dest| Instr::AllocStack { dest })
    }

    pub fn dealloc_stack(&mut self, operand: VarId) {
        self.emit(Instr::DeallocStack { operand });
    }

    pub fn alloc_ref(&mut self, class: impl Into<String>) -> VarId {
        let class = class.into();
        self.emit_with_dest(|dest| Instr::AllocRef { dest, class })
    }

    pub fn dealloc_ref(&mut self, operand: VarId) {
        self.emit(Instr::DeallocRef { operand });
    }

    pub fn alloc_global(&mut self, global: GlobalId) {
        self.emit(Instr::AllocGlobal { global });
    }

    pub fn global_addr(&mut self, global: GlobalId) -> VarId {
        self.emit_with_dest(|dest| Instr::GlobalAddr { dest, global })
    }

    pub fn struct_element_addr(&mut self, base: VarId, field: u32) -> VarId {
        self.emit_with_dest(|dest| Instr::StructElementAddr { dest, base, field })
    }

    pub fn tuple_element_addr(&mut self, base: VarId, index: u32) -> VarId {
        self.emit_with_dest(|dest| Instr::TupleElementAddr { dest, base, index })
    }

    pub fn index_addr(&mut self, base: VarId, index: VarId) -> VarId {
        self.emit_with_dest(|dest| Instr::IndexAddr { dest, base, index })
    }

    pub fn address_to_pointer(&mut self, operand: VarId) -> VarId {
        self.emit_with_dest(|dest| Instr::AddressToPointer { dest, operand })
    }

    pub fn pointer_to_address(&mut self, operand: VarId) -> VarId {
        self.emit_with_dest(|dest| Instr::PointerToAddress { dest, operand })
    }

    pub fn begin_access(&mut self, address: VarId) -> VarId {
        self.emit_with_dest(|dest| Instr::BeginAccess { dest, address })
    }

    pub fn end_access(&mut self, access: VarId) {
        self.emit(Instr::EndAccess { access });
    }

    pub fn load(&mut self, addr: VarId) -> VarId {
        self.emit_with_dest(|dest| Instr::Load { dest, addr })
    }

    pub fn store(&mut self, value: VarId, addr: VarId) {
        self.emit(Instr::Store { value, addr });
    }

    pub fn copy_addr(&mut self, src: VarId, to: VarId) {
        self.emit(Instr::CopyAddr { src, to });
    }

    // ── Calls ────────────────────────────────────────────────────────────

    /// Direct call producing a result.
    pub fn call(&mut self, callee: FuncId, args: Vec<VarId>) -> VarId {
        self.emit_with_dest(|dest| Instr::Apply(Apply::direct(Some(dest), callee, args)))
    }

    /// Direct call without a direct result.
    pub fn call_void(&mut self, callee: FuncId, args: Vec<VarId>) {
        self.emit(Instr::Apply(Apply::direct(None, callee, args)));
    }

    /// Dynamically dispatched call. `receiver` is appended to `args`.
    pub fn method_call(
        &mut self,
        method: impl Into<String>,
        mut args: Vec<VarId>,
        receiver: VarId,
    ) -> VarId {
        args.push(receiver);
        let method = method.into();
        self.emit_with_dest(|dest| {
            Instr::Apply(Apply {
                dest: Some(dest),
                callee: Callee::Method(method),
                args,
                indirect_results: 0,
                substitutions: Vec::new(),
                kind: ApplyKind::Call,
            })
        })
    }

    /// Emit a fully specified apply.
    pub fn apply(&mut self, apply: Apply) {
        self.emit(Instr::Apply(apply));
    }

    pub fn once(&mut self, token: VarId, initializer: FuncId) {
        self.emit(Instr::Once { token, initializer });
    }

    // ── Terminators ──────────────────────────────────────────────────────

    pub fn ret(&mut self, value: Option<VarId>) {
        self.terminate(Terminator::Return { value });
    }

    pub fn jump(&mut self, target: BlockId) {
        self.terminate(Terminator::Jump { target });
    }

    pub fn branch_if(&mut self, condition: VarId, if_true: BlockId, if_false: BlockId) {
        self.terminate(Terminator::BranchIf {
            condition,
            if_true,
            if_false,
        });
    }

    pub fn finish(self) -> Body {
        self.body
    }
}

impl Default for FunctionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
