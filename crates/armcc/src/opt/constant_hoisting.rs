//! `ConstantHoisting` (spec §4.5): replaces every `ConstantInt` read
//! operand with a load from a freshly generated read-only global, one
//! global per distinct `(type, value)`, named `ci<N>`.
//!
//! Declares new globals and interns their initialisers, so — like
//! [`crate::opt::scp`] and [`crate::opt::peephole`] — this runs as a
//! direct `Module`-level pass.

use std::collections::HashMap;

use smallvec::smallvec;

use crate::ir::value::ConstRef;
use crate::ir::{ConstData, Function, FuncRef, GlobalData, GlobalRef, Inst, InstructionData, Module, Opcode, OperandFlag, Type, TypeCtx, Value};
use crate::result::CoreResult;

pub fn run(module: &mut Module) -> CoreResult<()> {
    let refs: Vec<FuncRef> = module.functions().collect();
    let mut cache: HashMap<(Type, i64), GlobalRef> = HashMap::new();
    let mut next_id: u32 = 0;

    for r in refs {
        while hoist_one(module, r, &mut cache, &mut next_id) {}
    }
    Ok(())
}

fn hoist_one(module: &mut Module, r: FuncRef, cache: &mut HashMap<(Type, i64), GlobalRef>, next_id: &mut u32) -> bool {
    let target = {
        let ctx = module.type_ctx();
        let func = module.function(r);
        find_const_operand(ctx, func)
    };
    let Some((inst, index, ty, bits)) = target else {
        return false;
    };

    let global = *cache.entry((ty, bits)).or_insert_with_key(|&(ty, bits)| {
        let init = module.const_int(ty, bits);
        let name = format!("ci{}", *next_id);
        *next_id += 1;
        module.declare_global(GlobalData {
            name,
            base_type: ty,
            init: Some(init),
        })
    });

    module.with_function_mut(r, |_ctx, func| {
        let block = func.find_block_of(inst).expect("target instruction must live in some block");
        let loaded = func.create_vreg(ty, None);
        func.insert_inst_before(
            block,
            inst,
            InstructionData::new(Opcode::Load, smallvec![Value::Global(global), Value::VReg(loaded)]),
        );
        func.set_operand(inst, index, Value::VReg(loaded));
    });

    true
}

fn find_const_operand(ctx: TypeCtx<'_>, func: &Function) -> Option<(Inst, usize, Type, i64)> {
    func.instructions_in_order().find_map(|(_, inst)| {
        let data = func.inst(inst);
        data.operands.iter().enumerate().find_map(|(i, &op)| {
            if data.operand_flags(i) != OperandFlag::Read {
                return None;
            }
            match op {
                Value::Const(c) => const_int(ctx, c).map(|(ty, bits)| (inst, i, ty, bits)),
                _ => None,
            }
        })
    })
}

fn const_int(ctx: TypeCtx<'_>, c: ConstRef) -> Option<(Type, i64)> {
    match ctx.const_data(c) {
        ConstData::Int { ty, bits } => Some((*ty, *bits)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, BinOp, Function, Module};

    #[test]
    fn hoists_constant_operand_into_global_load() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        let five = m.const_int(m.types.i32, 5);
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let x = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let sum = builder::binop(ctx, func, blk, BinOp::IAdd, x, five).unwrap();
            builder::ret(func, blk, Some(sum));
        });

        run(&mut m).unwrap();

        assert_eq!(m.globals().count(), 1);
        let (_, g) = m.globals_iter().next().unwrap();
        assert_eq!(g.name, "ci0");

        let func = m.function(f);
        let has_const_operand = func.instructions_in_order().any(|(_, inst)| {
            func.inst(inst).operands.iter().any(|&op| matches!(op, Value::Const(_)))
        });
        assert!(!has_const_operand);
    }

    #[test]
    fn reuses_global_for_identical_constant() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        let five_a = m.const_int(m.types.i32, 5);
        let five_b = m.const_int(m.types.i32, 5);
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let a = builder::binop(ctx, func, blk, BinOp::IAdd, five_a, five_a).unwrap();
            let b = builder::binop(ctx, func, blk, BinOp::IAdd, five_b, a).unwrap();
            builder::ret(func, blk, Some(b));
        });

        run(&mut m).unwrap();
        assert_eq!(m.globals().count(), 1);
    }
}
