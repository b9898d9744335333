//! `Dce` (spec §4.5): one pass over each function, deleting any
//! instruction whose write operand has zero reads and that has no
//! side effect. Unlike [`crate::opt::mem2reg`]/[`crate::opt::scp`] this
//! needs neither new types nor new constants, so it is a plain
//! [`crate::pass::FunctionPass`].

use crate::ir::{Function, Opcode, OperandFlag, TypeCtx, Value};
use crate::pass::{FunctionPass, PassRunInformation};
use crate::result::CoreResult;

pub struct Dce;

impl FunctionPass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, _ctx: TypeCtx<'_>, func: &mut Function, _info: PassRunInformation) -> CoreResult<()> {
        let dead: Vec<_> = func
            .instructions_in_order()
            .filter(|&(_, inst)| {
                let data = func.inst(inst);
                if data.has_side_effect() {
                    return false;
                }
                data.operands.iter().enumerate().any(|(i, &v)| {
                    data.operand_flags(i) == OperandFlag::Write && is_unread(func, v)
                })
            })
            .collect();

        for (block, inst) in dead {
            func.remove_inst(block, inst);
        }
        Ok(())
    }
}

fn is_unread(func: &Function, v: Value) -> bool {
    !matches!(v, Value::VReg(_)) || func.read_count(v) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, BinOp, Function, Module};

    #[test]
    fn removes_unread_binop_result() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let a = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let c = Value::VReg(func.create_vreg(ctx.types.i32, None));
            builder::binop(ctx, func, b, BinOp::IAdd, a, c).unwrap();
            builder::ret(func, b, None);

            let mut pass = Dce;
            pass.run(ctx, func, PassRunInformation::default()).unwrap();

            assert!(func
                .instructions_in_order()
                .all(|(_, i)| !matches!(func.opcode(i), Opcode::BinOp(_))));
        });
    }

    #[test]
    fn keeps_store_despite_no_result() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let p = Value::VReg(func.create_vreg(ctx.types.ptr, None));
            let v = Value::VReg(func.create_vreg(ctx.types.i32, None));
            builder::store(ctx, func, b, p, v).unwrap();
            builder::ret(func, b, None);

            let before = func.block(b).insts.len();
            let mut pass = Dce;
            pass.run(ctx, func, PassRunInformation::default()).unwrap();
            assert_eq!(func.block(b).insts.len(), before);
        });
    }
}
