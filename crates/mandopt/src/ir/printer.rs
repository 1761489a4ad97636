//! Textual dump of the IR, used by trace logging and test diagnostics.
//!
//! ```text
//! fn initG [global_init_once] {
//! bb0():
//!   alloc_global @g0
//!   v0 = global_addr @g0
//!   v1 = apply @f1()
//!   store v1 to v0
//!   return
//! }
//! ```

use super::types::*;
use std::fmt;

fn write_list(f: &mut fmt::Formatter<'_>, vars: &[VarId]) -> fmt::Result {
    for (i, v) in vars.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{v}")?;
    }
    Ok(())
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Direct(id) => write!(f, "{id}"),
            Callee::Method(name) => write!(f, "#{name}"),
        }
    }
}

impl fmt::Display for Apply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dest) = self.dest {
            write!(f, "{dest} = ")?;
        }
        match self.kind {
            ApplyKind::Call => write!(f, "apply ")?,
            ApplyKind::Coroutine => write!(f, "begin_apply ")?,
        }
        write!(f, "{}", self.callee)?;
        if self.has_substitutions() {
            write!(f, "<{}>", self.substitutions.join(", "))?;
        }
        write!(f, "(")?;
        if self.indirect_results > 0 {
            write!(f, "out ")?;
        }
        write_list(f, &self.args)?;
        write!(f, ")")
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Const { dest, value } => write!(f, "{dest} = const {value}"),
            Instr::BinOp { dest, op, lhs, rhs } => write!(f, "{dest} = {op} {lhs}, {rhs}"),
            Instr::Assign { dest, src } => write!(f, "{dest} = {src}"),
            Instr::Struct { dest, fields } => {
                write!(f, "{dest} = struct (")?;
                write_list(f, fields)?;
                write!(f, ")")
            }
            Instr::Tuple { dest, elements } => {
                write!(f, "{dest} = tuple (")?;
                write_list(f, elements)?;
                write!(f, ")")
            }
            Instr::Enum {
                dest,
                case,
                payload,
            } => match payload {
                Some(p) => write!(f, "{dest} = enum #{case}({p})"),
                None => write!(f, "{dest} = enum #{case}"),
            },
            Instr::StructExtract {
                dest,
                operand,
                field,
            } => write!(f, "{dest} = struct_extract {operand}.s{field}"),
            Instr::TupleExtract {
                dest,
                operand,
                index,
            } => write!(f, "{dest} = tuple_extract {operand}.{index}"),
            Instr::Metatype { dest, ty } => write!(f, "{dest} = metatype ${ty}"),
            Instr::DebugValue { operand } => write!(f, "debug_value {operand}"),
            Instr::AllocStack { dest } => write!(f, "{dest} = alloc_stack"),
            Instr::DeallocStack { operand } => write!(f, "dealloc_stack {operand}"),
            Instr::AllocRef { dest, class } => write!(f, "{dest} = alloc_ref ${class}"),
            Instr::DeallocRef { operand } => write!(f, "dealloc_ref {operand}"),
            Instr::AllocGlobal { global } => write!(f, "alloc_global {global}"),
            Instr::GlobalAddr { dest, global } => write!(f, "{dest} = global_addr {global}"),
            Instr::StructElementAddr { dest, base, field } => {
                write!(f, "{dest} = struct_element_addr {base}.s{field}")
            }
            Instr::TupleElementAddr { dest, base, index } => {
                write!(f, "{dest} = tuple_element_addr {base}.{index}")
            }
            Instr::IndexAddr { dest, base, index } => {
                write!(f, "{dest} = index_addr {base}, {index}")
            }
            Instr::AddressToPointer { dest, operand } => {
                write!(f, "{dest} = address_to_pointer {operand}")
            }
            Instr::PointerToAddress { dest, operand } => {
                write!(f, "{dest} = pointer_to_address {operand}")
            }
            Instr::BeginAccess { dest, address } => write!(f, "{dest} = begin_access {address}"),
            Instr::EndAccess { access } => write!(f, "end_access {access}"),
            Instr::Load { dest, addr } => write!(f, "{dest} = load {addr}"),
            Instr::Store { value, addr } => write!(f, "store {value} to {addr}"),
            Instr::CopyAddr { src, to } => write!(f, "copy_addr {src} to {to}"),
            Instr::Apply(apply) => write!(f, "{apply}"),
            Instr::Once { token, initializer } => write!(f, "once {token}, {initializer}"),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Return { value: Some(v) } => write!(f, "return {v}"),
            Terminator::Return { value: None } => write!(f, "return"),
            Terminator::Jump { target } => write!(f, "br {target}"),
            Terminator::BranchIf {
                condition,
                if_true,
                if_false,
            } => write!(f, "cond_br {condition}, {if_true}, {if_false}"),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{}(", block.id)?;
            if block.id == self.entry_block {
                write_list(f, &self.params)?;
            }
            writeln!(f, "):")?;
            for instr in &block.instructions {
                writeln!(f, "  {instr}")?;
            }
            writeln!(f, "  {}", block.terminator)?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}", self.name)?;
        if self.is_generic() {
            write!(f, "<{}>", self.generic_params.join(", "))?;
        }
        let mut attrs = Vec::new();
        if !self.performance.is_none() {
            attrs.push(format!("{:?}", self.performance));
        }
        if self.transparent {
            attrs.push("transparent".to_string());
        }
        match self.inline_strategy {
            InlineStrategy::Always => attrs.push("always_inline".to_string()),
            InlineStrategy::Never => attrs.push("noinline".to_string()),
            InlineStrategy::Default => {}
        }
        if self.global_init_once {
            attrs.push("global_init_once".to_string());
        }
        if !attrs.is_empty() {
            write!(f, " [{}]", attrs.join(", "))?;
        }
        match &self.body {
            Some(body) => {
                writeln!(f, " {{")?;
                write!(f, "{body}")?;
                writeln!(f, "}}")
            }
            None => writeln!(f, " <external>"),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, global) in self.global_ids().zip(&self.globals) {
            write!(f, "global {id} {}", global.name)?;
            if global.must_be_initialized_statically {
                write!(f, " [static_init]")?;
            }
            writeln!(f)?;
        }
        for (id, function) in self.func_ids().zip(&self.functions) {
            write!(f, "// {id}\n{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn prints_function_with_attributes() {
        let mut b = FunctionBuilder::new();
        b.alloc_global(GlobalId::new(0));
        let addr = b.global_addr(GlobalId::new(0));
        let v = b.call(FuncId::new(1), vec![]);
        b.store(v, addr);
        b.ret(None);
        let mut f = Function::new("initG");
        f.global_init_once = true;
        f.body = Some(b.finish());

        let text = f.to_string();
        assert!(text.starts_with("fn initG [global_init_once] {"));
        assert!(text.contains("  alloc_global @g0\n"));
        assert!(text.contains("  v1 = apply @f1()\n"));
        assert!(text.contains("  store v1 to v0\n"));
        assert!(text.contains("  return\n"));
    }

    #[test]
    fn prints_external_function() {
        let f = Function::new("puts");
        assert_eq!(f.to_string(), "fn puts <external>\n");
    }

    #[test]
    fn prints_generic_apply() {
        let apply = Apply {
            dest: Some(VarId(2)),
            callee: Callee::Direct(FuncId::new(4)),
            args: vec![VarId(0), VarId(1)],
            indirect_results: 1,
            substitutions: vec!["Int".to_string()],
            kind: ApplyKind::Coroutine,
        };
        assert_eq!(apply.to_string(), "v2 = begin_apply @f4<Int>(out v0, v1)");
    }
}
