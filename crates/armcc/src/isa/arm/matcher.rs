//! `MachineExpander` (spec §4.9): rewrites every surviving HLIR
//! instruction into one or more ARMv7 MIR instructions. One rewrite per
//! call, iterated to a fixed point, in the same collect-then-mutate
//! shape as [`crate::genlower`] and [`crate::opt::scp`].
//!
//! Standalone `icmp` and the unfused `cbr` fallback both need a fresh
//! `#0`/`#1` immediate interned as a `ConstantInt`, so — like those two
//! passes — this runs as a direct `Module`-level pass rather than a
//! `FunctionPass`.

use smallvec::smallvec;

use crate::ir::{BinOp, Block, CastKind, CondCode, Function, FuncRef, GlobalRef, Inst, InstructionData, Module, Opcode, TypeCtx, Value};
use crate::result::CoreResult;

pub fn run(module: &mut Module) -> CoreResult<()> {
    let refs: Vec<FuncRef> = module.functions().collect();
    for r in refs {
        while run_one(module, r) {}
    }
    Ok(())
}

enum Target {
    BinOp {
        inst: Inst,
        op: BinOp,
        lhs: Value,
        rhs: Value,
        dst: Value,
    },
    IcmpFused {
        icmp_inst: Inst,
        cbr_inst: Inst,
        cond: CondCode,
        lhs: Value,
        rhs: Value,
        then_blk: Block,
        else_blk: Block,
    },
    IcmpStandalone {
        inst: Inst,
        cond: CondCode,
        lhs: Value,
        rhs: Value,
        dst: Value,
    },
    CbrUnfused {
        inst: Inst,
        cond: Value,
        then_blk: Block,
        else_blk: Block,
    },
    Load {
        load_inst: Inst,
        ptr: Value,
        dst: Value,
        cast: Option<(Inst, CastKind)>,
    },
    Store {
        inst: Inst,
        ptr: Value,
        val: Value,
    },
    PtrToIntGlobal {
        inst: Inst,
        dst: Value,
        global: GlobalRef,
    },
    Mov {
        inst: Inst,
        dst: Value,
        src: Value,
    },
    Br {
        inst: Inst,
        target: Block,
    },
    Ret {
        inst: Inst,
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
        Target::BinOp { inst, op, lhs, rhs, dst } => {
            module.with_function_mut(r, |_ctx, func| rewrite_binop(func, inst, op, lhs, rhs, dst));
        }
        Target::IcmpFused { icmp_inst, cbr_inst, cond, lhs, rhs, then_blk, else_blk } => {
            module.with_function_mut(r, |_ctx, func| {
                rewrite_icmp_fused(func, icmp_inst, cbr_inst, cond, lhs, rhs, then_blk, else_blk)
            });
        }
        Target::IcmpStandalone { inst, cond, lhs, rhs, dst } => {
            let i32ty = module.types.i32;
            let zero = module.const_int(i32ty, 0);
            let one = module.const_int(i32ty, 1);
            module.with_function_mut(r, |_ctx, func| rewrite_icmp_standalone(func, inst, cond, lhs, rhs, dst, zero, one));
        }
        Target::CbrUnfused { inst, cond, then_blk, else_blk } => {
            let one = module.const_int(module.types.i32, 1);
            module.with_function_mut(r, |_ctx, func| rewrite_cbr_unfused(func, inst, cond, then_blk, else_blk, one));
        }
        Target::Load { load_inst, ptr, dst, cast } => {
            module.with_function_mut(r, |ctx, func| rewrite_load(ctx, func, load_inst, ptr, dst, cast));
        }
        Target::Store { inst, ptr, val } => {
            module.with_function_mut(r, |ctx, func| rewrite_store(ctx, func, inst, ptr, val));
        }
        Target::PtrToIntGlobal { inst, dst, global } => {
            module.with_function_mut(r, |_ctx, func| rewrite_ptrtoint_global(func, inst, dst, global));
        }
        Target::Mov { inst, dst, src } => {
            module.with_function_mut(r, |_ctx, func| rewrite_mov(func, inst, dst, src));
        }
        Target::Br { inst, target } => {
            module.with_function_mut(r, |_ctx, func| rewrite_br(func, inst, target));
        }
        Target::Ret { inst } => {
            module.with_function_mut(r, |_ctx, func| rewrite_ret(func, inst));
        }
    }
    true
}

fn find_target(ctx: TypeCtx<'_>, func: &Function) -> Option<Target> {
    let _ = ctx;
    func.instructions_in_order().find_map(|(_, inst)| {
        let data = func.inst(inst);
        match data.opcode {
            Opcode::BinOp(op) => Some(Target::BinOp {
                inst,
                op,
                lhs: data.operands[0],
                rhs: data.operands[1],
                dst: data.operands[2],
            }),
            Opcode::Icmp(cond) => {
                let lhs = data.operands[0];
                let rhs = data.operands[1];
                let dst = data.operands[2];
                match find_fused_cbr(func, dst) {
                    Some((cbr_inst, then_blk, else_blk)) => Some(Target::IcmpFused {
                        icmp_inst: inst,
                        cbr_inst,
                        cond,
                        lhs,
                        rhs,
                        then_blk,
                        else_blk,
                    }),
                    None => Some(Target::IcmpStandalone { inst, cond, lhs, rhs, dst }),
                }
            }
            Opcode::Cbr => {
                let (then_blk, else_blk) = cbr_targets(data);
                Some(Target::CbrUnfused {
                    inst,
                    cond: data.operands[0],
                    then_blk,
                    else_blk,
                })
            }
            Opcode::Load => {
                let ptr = data.operands[0];
                let dst = data.operands[1];
                let cast = find_fused_cast(func, dst);
                Some(Target::Load { load_inst: inst, ptr, dst, cast })
            }
            Opcode::Store => Some(Target::Store {
                inst,
                ptr: data.operands[0],
                val: data.operands[1],
            }),
            Opcode::Cast(CastKind::PtrToInt) if matches!(data.operands[0], Value::Global(_)) => {
                let global = match data.operands[0] {
                    Value::Global(g) => g,
                    _ => unreachable!("matched above"),
                };
                Some(Target::PtrToIntGlobal { inst, dst: data.operands[1], global })
            }
            Opcode::Cast(_) => Some(Target::Mov {
                inst,
                dst: data.operands[1],
                src: data.operands[0],
            }),
            Opcode::Set => Some(Target::Mov {
                inst,
                dst: data.operands[0],
                src: data.operands[1],
            }),
            Opcode::Br => {
                let target = match data.operands[0] {
                    Value::Block(b) => b,
                    _ => unreachable!("br's operand is always a block"),
                };
                Some(Target::Br { inst, target })
            }
            Opcode::Ret => Some(Target::Ret { inst }),
            _ => None,
        }
    })
}

fn cbr_targets(data: &InstructionData) -> (Block, Block) {
    let then_blk = match data.operands[1] {
        Value::Block(b) => b,
        _ => unreachable!("cbr's second operand is always a block"),
    };
    let else_blk = match data.operands[2] {
        Value::Block(b) => b,
        _ => unreachable!("cbr's third operand is always a block"),
    };
    (then_blk, else_blk)
}

fn find_fused_cbr(func: &Function, dst: Value) -> Option<(Inst, Block, Block)> {
    let uses = func.uses_of(dst);
    if uses.len() != 1 {
        return None;
    }
    let u = uses[0];
    if u.operand != 0 || func.opcode(u.inst) != Opcode::Cbr {
        return None;
    }
    let (then_blk, else_blk) = cbr_targets(func.inst(u.inst));
    Some((u.inst, then_blk, else_blk))
}

fn find_fused_cast(func: &Function, dst: Value) -> Option<(Inst, CastKind)> {
    let uses = func.uses_of(dst);
    if uses.len() != 1 {
        return None;
    }
    let u = uses[0];
    if u.operand != 0 {
        return None;
    }
    match func.opcode(u.inst) {
        Opcode::Cast(kind @ (CastKind::Zext | CastKind::Sext)) => Some((u.inst, kind)),
        _ => None,
    }
}

/// Pick the load/store mode for a value of the given bit width.
/// `sign`: `None` for store (no sign variant) or an unfused load
/// (default to the zero-extending mnemonic); `Some(true)` for a
/// fused `sext` consumer, `Some(false)` for a fused `zext` consumer.
fn load_mode(bits: u8, sign: Option<bool>) -> Opcode {
    match (bits, sign) {
        (8, Some(true)) => Opcode::Ldrsb,
        (8, _) => Opcode::Ldrb,
        (16, Some(true)) => Opcode::Ldrsh,
        (16, _) => Opcode::Ldrh,
        _ => Opcode::Ldr,
    }
}

fn store_mode(bits: u8) -> Opcode {
    match bits {
        8 => Opcode::Strb,
        16 => Opcode::Strh,
        _ => Opcode::Str,
    }
}

fn materialize_ptr(ctx: TypeCtx<'_>, func: &mut Function, block: Block, before: Inst, ptr: Value) -> Value {
    match ptr {
        Value::Global(g) => {
            let tmp = Value::VReg(func.create_vreg(ctx.types.ptr, None));
            func.insert_inst_before(
                block,
                before,
                InstructionData::new(Opcode::MovwGlobalLo16, smallvec![tmp, Value::Global(g)]),
            );
            func.insert_inst_before(
                block,
                before,
                InstructionData::new(Opcode::MovtGlobalHi16, smallvec![tmp, Value::Global(g)]),
            );
            tmp
        }
        other => other,
    }
}

fn rewrite_binop(func: &mut Function, inst: Inst, op: BinOp, lhs: Value, rhs: Value, dst: Value) {
    let block = func.find_block_of(inst).expect("binop must live in some block");
    let opcode = match op {
        BinOp::IAdd => Opcode::AddR32I32,
        BinOp::ISub => Opcode::SubR32I32,
        BinOp::IMul => Opcode::MulR32I32,
        BinOp::IDivS => Opcode::SdivR32I32,
        BinOp::IDivU => Opcode::UdivR32I32,
        BinOp::IRemS | BinOp::IRemU => unreachable!("genlower already rewrites irem away"),
    };
    func.insert_inst_before(block, inst, InstructionData::new(opcode, smallvec![dst, lhs, rhs]));
    func.remove_inst(block, inst);
}

#[allow(clippy::too_many_arguments)]
fn rewrite_icmp_fused(
    func: &mut Function,
    icmp_inst: Inst,
    cbr_inst: Inst,
    cond: CondCode,
    lhs: Value,
    rhs: Value,
    then_blk: Block,
    else_blk: Block,
) {
    let icmp_block = func.find_block_of(icmp_inst).expect("icmp must live in some block");
    func.insert_inst_before(icmp_block, icmp_inst, InstructionData::new(Opcode::Cmp, smallvec![lhs, rhs]));
    func.remove_inst(icmp_block, icmp_inst);

    let cbr_block = func.find_block_of(cbr_inst).expect("cbr must live in some block");
    func.insert_inst_before(
        cbr_block,
        cbr_inst,
        InstructionData::new(Opcode::Bcond(cond), smallvec![Value::Block(then_blk)]),
    );
    func.insert_inst_before(cbr_block, cbr_inst, InstructionData::new(Opcode::B, smallvec![Value::Block(else_blk)]));
    func.remove_inst(cbr_block, cbr_inst);
}

#[allow(clippy::too_many_arguments)]
fn rewrite_icmp_standalone(func: &mut Function, inst: Inst, cond: CondCode, lhs: Value, rhs: Value, dst: Value, zero: Value, one: Value) {
    let block = func.find_block_of(inst).expect("icmp must live in some block");
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::Cmp, smallvec![lhs, rhs]));
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::Movi, smallvec![dst, zero]));
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::MovCondI(cond), smallvec![dst, one]));
    func.remove_inst(block, inst);
}

fn rewrite_cbr_unfused(func: &mut Function, inst: Inst, cond: Value, then_blk: Block, else_blk: Block, one: Value) {
    let block = func.find_block_of(inst).expect("cbr must live in some block");
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::Cmpi, smallvec![cond, one]));
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::Bcond(CondCode::Sge), smallvec![Value::Block(then_blk)]),
    );
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::B, smallvec![Value::Block(else_blk)]));
    func.remove_inst(block, inst);
}

fn rewrite_load(ctx: TypeCtx<'_>, func: &mut Function, load_inst: Inst, ptr: Value, dst: Value, cast: Option<(Inst, CastKind)>) {
    let block = func.find_block_of(load_inst).expect("load must live in some block");
    let ptr_reg = materialize_ptr(ctx, func, block, load_inst, ptr);
    let narrow_ty = ctx.value_type(func, dst);
    let bits = ctx.types.bit_width(narrow_ty).unwrap_or(32);

    let (final_dst, opcode) = match cast {
        Some((cast_inst, kind)) => {
            let cast_block = func.find_block_of(cast_inst).expect("cast must live in some block");
            let cast_dst = func.operand(cast_inst, 1);
            let signed = matches!(kind, CastKind::Sext);
            func.remove_inst(cast_block, cast_inst);
            (cast_dst, load_mode(bits, Some(signed)))
        }
        None => (dst, load_mode(bits, None)),
    };

    func.insert_inst_before(block, load_inst, InstructionData::new(opcode, smallvec![final_dst, ptr_reg]));
    func.remove_inst(block, load_inst);
}

fn rewrite_store(ctx: TypeCtx<'_>, func: &mut Function, inst: Inst, ptr: Value, val: Value) {
    let block = func.find_block_of(inst).expect("store must live in some block");
    let ptr_reg = materialize_ptr(ctx, func, block, inst, ptr);
    let val_ty = ctx.value_type(func, val);
    let bits = ctx.types.bit_width(val_ty).unwrap_or(32);
    let opcode = store_mode(bits);
    func.insert_inst_before(block, inst, InstructionData::new(opcode, smallvec![ptr_reg, val]));
    func.remove_inst(block, inst);
}

fn rewrite_ptrtoint_global(func: &mut Function, inst: Inst, dst: Value, global: GlobalRef) {
    let block = func.find_block_of(inst).expect("ptrtoint must live in some block");
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::MovwGlobalLo16, smallvec![dst, Value::Global(global)]),
    );
    func.insert_inst_before(
        block,
        inst,
        InstructionData::new(Opcode::MovtGlobalHi16, smallvec![dst, Value::Global(global)]),
    );
    func.remove_inst(block, inst);
}

fn rewrite_mov(func: &mut Function, inst: Inst, dst: Value, src: Value) {
    let block = func.find_block_of(inst).expect("instruction must live in some block");
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::Mov, smallvec![dst, src]));
    func.remove_inst(block, inst);
}

fn rewrite_br(func: &mut Function, inst: Inst, target: Block) {
    let block = func.find_block_of(inst).expect("br must live in some block");
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::B, smallvec![Value::Block(target)]));
    func.remove_inst(block, inst);
}

fn rewrite_ret(func: &mut Function, inst: Inst) {
    let block = func.find_block_of(inst).expect("ret must live in some block");
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::MirRet, smallvec![]));
    func.remove_inst(block, inst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, GlobalData, Module};

    #[test]
    fn fuses_icmp_and_cbr_into_cmp_and_bcond() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let entry = func.create_block();
            let then_blk = func.create_block();
            let else_blk = func.create_block();
            func.append_block(entry);
            func.append_block(then_blk);
            func.append_block(else_blk);

            let a = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let b = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let cond = builder::icmp(ctx, func, entry, CondCode::Eq, a, b).unwrap();
            builder::cbr(ctx, func, entry, cond, then_blk, else_blk).unwrap();
            builder::ret(func, then_blk, None);
            builder::ret(func, else_blk, None);
        });

        run(&mut m).unwrap();

        let func = m.function(f);
        let opcodes: Vec<_> = func.instructions_in_order().map(|(_, i)| func.opcode(i)).collect();
        assert!(opcodes.iter().any(|o| matches!(o, Opcode::Cmp)));
        assert!(opcodes.iter().any(|o| matches!(o, Opcode::Bcond(CondCode::Eq))));
        assert!(!opcodes.iter().any(|o| matches!(o, Opcode::Icmp(_) | Opcode::Cbr)));
    }

    #[test]
    fn materialises_global_load_address() {
        let mut m = Module::new("t.c");
        let i32ty = m.types.i32;
        let zero = m.const_int(i32ty, 0);
        let g = m.declare_global(GlobalData { name: "g".into(), base_type: i32ty, init: Some(zero) });
        let sig = m.types.function(i32ty, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let loaded = builder::load(ctx, func, blk, Value::Global(g), ctx.types.i32).unwrap();
            builder::ret(func, blk, Some(loaded));
        });

        run(&mut m).unwrap();

        let func = m.function(f);
        let opcodes: Vec<_> = func.instructions_in_order().map(|(_, i)| func.opcode(i)).collect();
        assert!(opcodes.iter().any(|o| matches!(o, Opcode::MovwGlobalLo16)));
        assert!(opcodes.iter().any(|o| matches!(o, Opcode::MovtGlobalHi16)));
        assert!(opcodes.iter().any(|o| matches!(o, Opcode::Ldr)));
    }

    #[test]
    fn lowers_binop_to_register_form() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let a = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let b = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let sum = builder::binop(ctx, func, blk, BinOp::IAdd, a, b).unwrap();
            builder::ret(func, blk, Some(sum));
        });

        run(&mut m).unwrap();

        let func = m.function(f);
        assert!(func.instructions_in_order().any(|(_, i)| func.opcode(i) == Opcode::AddR32I32));
    }
}
