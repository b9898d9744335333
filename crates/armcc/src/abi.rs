//! `CConv` (spec §4.6): lowers the single surviving return value (after
//! `ReturnCombine` has guaranteed there's only one) to the platform ABI.
//!
//! If the function returns a value: every use of that value is replaced
//! with physical register `R0`, the `ret` is rewritten to carry no
//! value, and the function's type is rewritten to return `Void`.
//! Precondition: the return value fits in 4 bytes, or this fails with
//! `Unsupported` (spec §8 property 8).
//!
//! Rewriting the function's type interns a new `Function` type, which
//! needs a mutable `TypeInterner` — like [`crate::opt::scp`], this runs
//! as a direct `Module`-level pass rather than a `FunctionPass`.

use crate::ir::{Block, Function, FuncRef, Inst, Module, TypeData, Value};
use crate::isa::arm::registers;
use crate::result::{CoreError, CoreResult};

pub fn run(module: &mut Module) -> CoreResult<()> {
    let refs: Vec<FuncRef> = module.functions().collect();
    for r in refs {
        lower_one(module, r)?;
    }
    Ok(())
}

fn lower_one(module: &mut Module, r: FuncRef) -> CoreResult<()> {
    let ret_ty = match module.types.data(module.function(r).sig) {
        TypeData::Function { ret, .. } => *ret,
        _ => unreachable!("function signature must be a Function type"),
    };
    if matches!(module.types.data(ret_ty), TypeData::Void) {
        return Ok(());
    }

    let size = module.types.size_of(ret_ty);
    if size > 4 {
        return Err(CoreError::Unsupported(format!(
            "{}: return value of {size} bytes exceeds the 4-byte ABI limit",
            module.function(r).name
        )));
    }

    let ret_inst = find_ret(module.function(r));
    let params: Vec<_> = match module.types.data(module.function(r).sig) {
        TypeData::Function { params, .. } => params.clone(),
        _ => unreachable!(),
    };
    let void = module.types.void;
    let void_sig = module.types.function(void, params);

    module.with_function_mut(r, |_ctx, func| {
        if let Some((block, inst, value)) = ret_inst {
            for u in func.uses_of(value).to_vec() {
                func.set_operand(u.inst, u.operand as usize, Value::PReg(registers::R0));
            }
            func.remove_inst(block, inst);
            crate::ir::builder::ret(func, block, None);
        }
        func.sig = void_sig;
    });

    Ok(())
}

fn find_ret(func: &Function) -> Option<(Block, Inst, Value)> {
    func.instructions_in_order().find_map(|(block, inst)| {
        if func.opcode(inst) != crate::ir::Opcode::Ret {
            return None;
        }
        let data = func.inst(inst);
        data.operands.first().map(|&v| (block, inst, v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, Module, TypeData, Value};

    #[test]
    fn replaces_return_value_uses_with_r0() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let x = Value::VReg(func.create_vreg(ctx.types.i32, None));
            builder::ret(func, blk, Some(x));
        });

        run(&mut m).unwrap();

        let func = m.function(f);
        assert!(matches!(
            m.types.data(func.sig),
            TypeData::Function { ret, .. } if matches!(m.types.data(*ret), TypeData::Void)
        ));
        let ret_inst = func.instructions_in_order().find(|&(_, i)| func.opcode(i) == crate::ir::Opcode::Ret).unwrap().1;
        assert!(func.inst(ret_inst).operands.is_empty());
    }

    #[test]
    fn rejects_oversized_return_value() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i64, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let x = Value::VReg(func.create_vreg(ctx.types.i64, None));
            builder::ret(func, blk, Some(x));
        });

        let err = run(&mut m).unwrap_err();
        assert!(matches!(err, CoreError::Unsupported(_)));
    }

    #[test]
    fn void_function_is_left_untouched() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |_ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            builder::ret(func, blk, None);
        });

        run(&mut m).unwrap();
        assert_eq!(m.function(f).sig, sig);
    }
}
