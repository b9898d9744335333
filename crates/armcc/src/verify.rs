//! The `Validation` pass (spec §4.1, §8 properties 1-2): re-checks the
//! invariants the builder enforced at construction time, run at pipeline
//! boundaries so a bug in an earlier pass is caught before it reaches a
//! later one that assumes well-formed input (spec §7 "passes assume their
//! input obeys stated preconditions").

use crate::ir::{CastKind, Function, Module, Opcode, TypeCtx, Value};
use crate::result::{invalid_ir, CoreResult};

/// Validate every function in `module`. Declarations (no blocks) are
/// skipped; a function with blocks must have every block non-empty and
/// ending in exactly one terminator, and every checked instruction form
/// must satisfy its §4.1 operand-type contract.
pub fn validate(module: &Module) -> CoreResult<()> {
    let ctx = module.type_ctx();
    for (_, func) in module.functions_iter() {
        validate_function(ctx, func)?;
    }
    Ok(())
}

fn validate_function(ctx: TypeCtx<'_>, func: &Function) -> CoreResult<()> {
    if func.entry_block().is_none() {
        return Ok(());
    }

    for block in func.blocks_in_order() {
        let data = func.block(block);
        if data.is_empty() {
            return Err(invalid_ir(format!(
                "{}: block {:?} is empty (property 2)",
                func.name, block
            )));
        }
        let last = data.insts.len() - 1;
        for (i, &inst) in data.insts.iter().enumerate() {
            let is_term = func.inst(inst).is_terminator();
            if is_term != (i == last) {
                return Err(invalid_ir(format!(
                    "{}: block {:?} has a terminator at a non-final position, or its final \
                     instruction is not a terminator (property 2)",
                    func.name, block
                )));
            }
            check_contract(ctx, func, inst)?;
        }
    }
    Ok(())
}

fn check_contract(ctx: TypeCtx<'_>, func: &Function, inst: crate::ir::Inst) -> CoreResult<()> {
    let data = func.inst(inst);
    let ops = &data.operands;
    let ty = |v: Value| ctx.value_type(func, v);

    match data.opcode {
        Opcode::BinOp(op) => {
            if ty(ops[0]) != ty(ops[1]) || ty(ops[1]) != ty(ops[2]) {
                return Err(invalid_ir(format!("{op}: operand types disagree")));
            }
            if !ctx.types.is_integer(ty(ops[0])) {
                return Err(invalid_ir(format!("{op}: operands must be integers")));
            }
        }
        Opcode::Icmp(_) => {
            if ty(ops[0]) != ty(ops[1]) {
                return Err(invalid_ir("icmp: operand types disagree"));
            }
        }
        Opcode::Load => {
            if !ctx.types.is_pointer(ty(ops[0])) {
                return Err(invalid_ir("load: source is not pointer-typed"));
            }
        }
        Opcode::Store => {
            if !ctx.types.is_pointer(ty(ops[0])) {
                return Err(invalid_ir("store: destination is not pointer-typed"));
            }
        }
        Opcode::Lea => {
            if !ctx.types.is_pointer(ty(ops[0])) {
                return Err(invalid_ir("lea: base is not pointer-typed"));
            }
        }
        Opcode::Lfa => {
            if !ctx.types.is_pointer(ty(ops[0])) {
                return Err(invalid_ir("lfa: base is not pointer-typed"));
            }
        }
        Opcode::Cast(kind) => {
            let (from, to) = (ty(ops[0]), ty(ops[1]));
            let ok = match kind {
                CastKind::Zext | CastKind::Sext => ctx.types.is_integer(from) && ctx.types.is_integer(to),
                CastKind::PtrToInt => ctx.types.is_pointer(from) && ctx.types.is_integer(to),
                CastKind::IntToPtr => ctx.types.is_integer(from) && ctx.types.is_pointer(to),
            };
            if !ok {
                return Err(invalid_ir("cast: operand types do not match the cast kind"));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, FuncRef};

    #[test]
    fn rejects_non_terminal_terminator() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f: FuncRef = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |_ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            builder::ret(func, b, None);
            builder::ret(func, b, None);
        });
        assert!(validate(&m).is_err());
    }

    #[test]
    fn accepts_well_formed_function() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![m.types.i32]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |_ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let p = func.add_param(_ctx.types.i32, None);
            builder::ret(func, b, Some(p));
        });
        assert!(validate(&m).is_ok());
    }
}
