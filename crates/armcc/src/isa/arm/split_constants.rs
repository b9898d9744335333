//! `ArmSplitConstants` (spec §4.9): every 32-bit `ConstantInt` still
//! appearing as an instruction operand gets split into a `movw`/`movt`
//! pair writing a fresh vreg, and the operand is rewritten to that
//! vreg. By the time this runs the only such constants left are the
//! ones [`crate::isa::arm::matcher`] minted itself — `#0`/`#1` for an
//! unfused `icmp`, `#1` for an unfused `cbr` — since
//! [`crate::opt::constant_hoisting`] already cleared every constant
//! that existed before matching.
//!
//! Splitting only moves an existing constant's bits into two fresh
//! `Movwi`/`Movt` instructions ahead of its use; it needs no new
//! interning, so unlike the matcher this is a plain `FunctionPass`.

use smallvec::smallvec;

use crate::ir::{ConstData, Function, Inst, InstructionData, Opcode, TypeCtx, Value};
use crate::pass::{FunctionPass, PassRunInformation};
use crate::result::{CoreError, CoreResult};

pub struct ArmSplitConstants;

impl FunctionPass for ArmSplitConstants {
    fn name(&self) -> &'static str {
        "armsplitconstants"
    }

    fn run(&mut self, ctx: TypeCtx<'_>, func: &mut Function, _info: PassRunInformation) -> CoreResult<()> {
        while let Some((inst, op_idx, value)) = find_target(func) {
            split_one(ctx, func, inst, op_idx, value)?;
        }
        Ok(())
    }
}

fn find_target(func: &Function) -> Option<(Inst, usize, Value)> {
    func.instructions_in_order().find_map(|(_, inst)| {
        let data = func.inst(inst);
        data.operands
            .iter()
            .enumerate()
            .find(|(_, &v)| matches!(v, Value::Const(_)))
            .map(|(i, &v)| (inst, i, v))
    })
}

fn split_one(ctx: TypeCtx<'_>, func: &mut Function, inst: Inst, op_idx: usize, value: Value) -> CoreResult<()> {
    let Value::Const(c) = value else {
        unreachable!("find_target only returns Value::Const operands");
    };
    let data = ctx.const_data(c);
    let ConstData::Int { ty, bits } = *data else {
        return Err(CoreError::Unsupported("armsplitconstants: only integer constants can be split".into()));
    };
    if ctx.types.bit_width(ty) != Some(32) {
        return Err(CoreError::Unsupported(format!(
            "armsplitconstants: constant of type {} is not 32 bits wide",
            ctx.types.display(ty)
        )));
    }

    let block = func.find_block_of(inst).expect("instruction must live in some block");
    let tmp = Value::VReg(func.create_vreg(ty, None));

    let lo16 = bits & 0xffff;
    let hi16 = (bits >> 16) & 0xffff;

    let mut movwi = InstructionData::new(Opcode::Movwi, smallvec![tmp]);
    movwi.extra.imm = Some(lo16);
    func.insert_inst_before(block, inst, movwi);

    let mut movt = InstructionData::new(Opcode::Movt, smallvec![tmp]);
    movt.extra.imm = Some(hi16);
    func.insert_inst_before(block, inst, movt);

    func.set_operand(inst, op_idx, tmp);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, Function, Module, Opcode};

    #[test]
    fn splits_constant_operand_into_movwi_movt_pair() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        let i32ty = m.types.i32;
        let c = m.const_int(i32ty, 0x1234_5678);
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let dst = Value::VReg(func.create_vreg(i32ty, None));
            func.push_inst(blk, InstructionData::new(Opcode::Movi, smallvec![dst, c]));
            builder::ret(func, blk, None);

            let mut pass = ArmSplitConstants;
            pass.run(ctx, func, PassRunInformation::default()).unwrap();

            let opcodes: Vec<_> = func.instructions_in_order().map(|(_, i)| func.opcode(i)).collect();
            assert!(opcodes.iter().any(|o| matches!(o, Opcode::Movwi)));
            assert!(opcodes.iter().any(|o| matches!(o, Opcode::Movt)));
            assert!(!func.instructions_in_order().any(|(_, i)| {
                func.inst(i).operands.iter().any(|&v| matches!(v, Value::Const(_)))
            }));
        });
    }

    #[test]
    fn rejects_non_32_bit_constant() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        let i8ty = m.types.i8;
        let c = m.const_int(i8ty, 1);
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let dst = Value::VReg(func.create_vreg(i8ty, None));
            func.push_inst(blk, InstructionData::new(Opcode::Movi, smallvec![dst, c]));
            builder::ret(func, blk, None);

            let mut pass = ArmSplitConstants;
            let err = pass.run(ctx, func, PassRunInformation::default()).unwrap_err();
            assert!(matches!(err, CoreError::Unsupported(_)));
        });
    }
}
