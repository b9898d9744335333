//! `GenericLowering` (spec §4.4): expands the three target-neutral
//! addressing/arithmetic forms that have no direct ARM encoding into
//! primitive integer ops before the matcher ever sees the function.
//!
//!   - `lea(base_type, p, idx, out)` → `ptrtoint p; imul idx,
//!     sizeof(base_type); iadd; inttoptr → out`.
//!   - `lfa(struct_type, p, field_i, out)` → same shape, with a
//!     precomputed constant offset instead of a multiply.
//!   - `irem lhs, rhs → result` → `idiv lhs, rhs → t0; imul t0, rhs →
//!     t1; isub lhs, t1 → result` (signed/unsigned division preserved).
//!
//! Each rewrite needs a freshly interned `sizeof`/offset constant, so
//! (like [`crate::opt::scp`]) this runs as a direct `Module`-level pass.

use smallvec::smallvec;

use crate::ir::{BinOp, CastKind, Function, FuncRef, Inst, InstructionData, Module, Opcode, Type, TypeCtx, TypeData, Value};
use crate::result::CoreResult;

pub fn run(module: &mut Module) -> CoreResult<()> {
    let refs: Vec<FuncRef> = module.functions().collect();
    for r in refs {
        while run_one(module, r) {}
    }
    Ok(())
}

enum Target {
    Lea {
        inst: Inst,
        base: Value,
        idx: Value,
        out: Value,
        base_type: Type,
    },
    Lfa {
        inst: Inst,
        base: Value,
        out: Value,
        offset: u32,
    },
    Irem {
        inst: Inst,
        op: BinOp,
        lhs: Value,
        rhs: Value,
        out: Value,
    },
}

fn run_one(module: &mut Module, r: FuncRef) -> bool {
    let target = {
        let ctx = module.type_ctx();
        let func = module.function(r);
        find_target(ctx, func)
    };
    let Some(target) = target else {
        return false;
    };

    match target {
        Target::Lea { inst, base, idx, out, base_type } => {
            let i32ty = module.types.i32;
            let size = module.types.size_of(base_type) as i64;
            let size_const = module.const_int(i32ty, size);
            module.with_function_mut(r, |ctx, func| rewrite_lea(ctx, func, inst, base, idx, out, size_const));
        }
        Target::Lfa { inst, base, out, offset } => {
            let i32ty = module.types.i32;
            let offset_const = module.const_int(i32ty, offset as i64);
            module.with_function_mut(r, |ctx, func| rewrite_lfa(ctx, func, inst, base, out, offset_const));
        }
        Target::Irem { inst, op, lhs, rhs, out } => {
            module.with_function_mut(r, |ctx, func| rewrite_irem(ctx, func, inst, op, lhs, rhs, out));
        }
    }
    true
}

fn find_target(ctx: TypeCtx<'_>, func: &Function) -> Option<Target> {
    func.instructions_in_order().find_map(|(_, inst)| {
        let data = func.inst(inst);
        match data.opcode {
            Opcode::Lea => {
                let base_type = data.extra.base_type.expect("lea must carry a base_type");
                Some(Target::Lea {
                    inst,
                    base: data.operands[0],
                    idx: data.operands[1],
                    out: data.operands[2],
                    base_type,
                })
            }
            Opcode::Lfa => {
                let struct_type = data.extra.struct_type.expect("lfa must carry a struct_type");
                let field_index = data.extra.field_index.expect("lfa must carry a field_index") as usize;
                let offset = match ctx.types.data(struct_type) {
                    TypeData::Struct { fields, .. } => {
                        fields[..field_index].iter().map(|&f| ctx.types.size_of(f)).sum()
                    }
                    _ => unreachable!("lfa's struct_type must name a struct"),
                };
                Some(Target::Lfa {
                    inst,
                    base: data.operands[0],
                    out: data.operands[1],
                    offset,
                })
            }
            Opcode::BinOp(op @ (BinOp::IRemS | BinOp::IRemU)) => Some(Target::Irem {
                inst,
                op,
                lhs: data.operands[0],
                rhs: data.operands[1],
                out: data.operands[2],
            }),
            _ => None,
        }
    })
}

fn rewrite_lea(ctx: TypeCtx<'_>, func: &mut Function, inst: Inst, base: Value, idx: Value, out: Value, size_const: Value) {
    let block = func.find_block_of(inst).expect("lea must live in some block");
    let i32ty = ctx.types.i32;

    let t0 = Value::VReg(func.create_vreg(i32ty, None));
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::Cast(CastKind::PtrToInt), smallvec![base, t0]),
    );
    let t1 = Value::VReg(func.create_vreg(i32ty, None));
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::BinOp(BinOp::IMul), smallvec![idx, size_const, t1]),
    );
    let t2 = Value::VReg(func.create_vreg(i32ty, None));
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::BinOp(BinOp::IAdd), smallvec![t0, t1, t2]),
    );
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::Cast(CastKind::IntToPtr), smallvec![t2, out]),
    );
    func.remove_inst(block, inst);
}

fn rewrite_lfa(ctx: TypeCtx<'_>, func: &mut Function, inst: Inst, base: Value, out: Value, offset_const: Value) {
    let block = func.find_block_of(inst).expect("lfa must live in some block");
    let i32ty = ctx.types.i32;

    let t0 = Value::VReg(func.create_vreg(i32ty, None));
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::Cast(CastKind::PtrToInt), smallvec![base, t0]),
    );
    let t1 = Value::VReg(func.create_vreg(i32ty, None));
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::BinOp(BinOp::IAdd), smallvec![t0, offset_const, t1]),
    );
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::Cast(CastKind::IntToPtr), smallvec![t1, out]),
    );
    func.remove_inst(block, inst);
}

fn rewrite_irem(ctx: TypeCtx<'_>, func: &mut Function, inst: Inst, op: BinOp, lhs: Value, rhs: Value, out: Value) {
    let block = func.find_block_of(inst).expect("irem must live in some block");
    let ty = ctx.value_type(func, lhs);
    let div_op = match op {
        BinOp::IRemS => BinOp::IDivS,
        BinOp::IRemU => BinOp::IDivU,
        _ => unreachable!("find_target only selects irem variants"),
    };

    let t0 = Value::VReg(func.create_vreg(ty, None));
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::BinOp(div_op), smallvec![lhs, rhs, t0]));
    let t1 = Value::VReg(func.create_vreg(ty, None));
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::BinOp(BinOp::IMul), smallvec![t0, rhs, t1]),
    );
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::BinOp(BinOp::ISub), smallvec![lhs, t1, out]),
    );
    func.remove_inst(block, inst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, CondCode, Module};

    #[test]
    fn lowers_lea_to_primitive_arithmetic() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let base = Value::VReg(func.create_vreg(ctx.types.ptr, None));
            let idx = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let addr = builder::lea(ctx, func, blk, base, idx, ctx.types.i32).unwrap();
            let loaded = builder::load(ctx, func, blk, addr, ctx.types.i32).unwrap();
            let _ = loaded;
            builder::ret(func, blk, None);
        });

        run(&mut m).unwrap();

        let func = m.function(f);
        assert!(func.instructions_in_order().all(|(_, i)| func.opcode(i) != Opcode::Lea));
    }

    #[test]
    fn lowers_irem_to_div_mul_sub() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let lhs = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let rhs = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let rem = builder::binop(ctx, func, blk, BinOp::IRemS, lhs, rhs).unwrap();
            builder::ret(func, blk, Some(rem));
        });

        run(&mut m).unwrap();

        let func = m.function(f);
        let opcodes: Vec<_> = func.instructions_in_order().map(|(_, i)| func.opcode(i)).collect();
        assert!(opcodes.contains(&Opcode::BinOp(BinOp::IDivS)));
        assert!(!opcodes.iter().any(|o| matches!(o, Opcode::BinOp(BinOp::IRemS))));
        let _ = CondCode::Eq;
    }
}
