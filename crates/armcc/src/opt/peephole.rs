//! `PeepholeGeneric` (spec §4.5): local, operand-literal peephole
//! rewrites run to a fixed point, independent of [`crate::opt::scp`]'s
//! dataflow lattice — `iadd`/`isub`/`imul` fold when *both* operands are
//! already `ConstantInt` literals, and `imul x, 1` / `imul 1, x`
//! collapses to a direct use of `x`.
//!
//! Folding produces a fresh interned constant, so — like `scp` — this
//! runs as a direct `Module`-level pass rather than a `FunctionPass`.

use smallvec::smallvec;

use crate::ir::value::ConstRef;
use crate::ir::{BinOp, ConstData, Function, FuncRef, Inst, InstructionData, Module, Opcode, Type, TypeCtx, Value};
use crate::result::CoreResult;

pub fn run(module: &mut Module) -> CoreResult<()> {
    let refs: Vec<FuncRef> = module.functions().collect();
    for r in refs {
        while run_one(module, r) {}
    }
    Ok(())
}

enum Target {
    Fold { inst: Inst, ty: Type, value: i64 },
    CollapseToOperand { inst: Inst, replacement: Value },
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
        Target::Fold { inst, ty, value } => {
            let folded = module.const_int(ty, value);
            module.with_function_mut(r, |_ctx, func| {
                replace_with_set(func, inst, folded);
            });
        }
        Target::CollapseToOperand { inst, replacement } => {
            module.with_function_mut(r, |_ctx, func| {
                let block = func.find_block_of(inst).expect("target instruction must live in some block");
                let dst = func.operand(inst, 2);
                for u in func.uses_of(dst).to_vec() {
                    func.set_operand(u.inst, u.operand as usize, replacement);
                }
                func.remove_inst(block, inst);
            });
        }
    }
    true
}

fn replace_with_set(func: &mut Function, inst: Inst, value: Value) {
    let block = func.find_block_of(inst).expect("target instruction must live in some block");
    let dst = func.operand(inst, 2);
    func.insert_inst_before(block, inst, InstructionData::new(Opcode::Set, smallvec![dst, value]));
    func.remove_inst(block, inst);
}

fn find_target(ctx: TypeCtx<'_>, func: &Function) -> Option<Target> {
    func.instructions_in_order().find_map(|(_, inst)| {
        let data = func.inst(inst);
        let Opcode::BinOp(op) = data.opcode else {
            return None;
        };
        let lhs = data.operands[0];
        let rhs = data.operands[1];

        if let (Some((ty, l)), Some((_, r))) = (literal_int(ctx, lhs), literal_int(ctx, rhs)) {
            if let Some(value) = fold(op, l, r) {
                return Some(Target::Fold { inst, ty, value });
            }
        }

        if op == BinOp::IMul {
            if is_literal_one(ctx, rhs) {
                return Some(Target::CollapseToOperand { inst, replacement: lhs });
            }
            if is_literal_one(ctx, lhs) {
                return Some(Target::CollapseToOperand { inst, replacement: rhs });
            }
        }

        None
    })
}

fn literal_int(ctx: TypeCtx<'_>, v: Value) -> Option<(Type, i64)> {
    match v {
        Value::Const(c) => const_int(ctx, c),
        _ => None,
    }
}

fn const_int(ctx: TypeCtx<'_>, c: ConstRef) -> Option<(Type, i64)> {
    match ctx.const_data(c) {
        ConstData::Int { ty, bits } => Some((*ty, *bits)),
        _ => None,
    }
}

fn is_literal_one(ctx: TypeCtx<'_>, v: Value) -> bool {
    matches!(literal_int(ctx, v), Some((_, 1)))
}

fn fold(op: BinOp, lhs: i64, rhs: i64) -> Option<i64> {
    match op {
        BinOp::IAdd => Some(lhs.wrapping_add(rhs)),
        BinOp::ISub => Some(lhs.wrapping_sub(rhs)),
        BinOp::IMul => Some(lhs.wrapping_mul(rhs)),
        BinOp::IDivS | BinOp::IDivU | BinOp::IRemS | BinOp::IRemU => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, Function, Module};

    #[test]
    fn folds_two_constant_operands() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        let a = m.const_int(m.types.i32, 2);
        let b = m.const_int(m.types.i32, 3);
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let sum = builder::binop(ctx, func, blk, BinOp::IAdd, a, b).unwrap();
            builder::ret(func, blk, Some(sum));
        });

        run(&mut m).unwrap();

        let func = m.function(f);
        assert!(func
            .instructions_in_order()
            .all(|(_, i)| !matches!(func.opcode(i), Opcode::BinOp(_))));
    }

    #[test]
    fn collapses_multiply_by_one() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        let one = m.const_int(m.types.i32, 1);
        m.with_function_mut(f, |ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            let x = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let product = builder::binop(ctx, func, blk, BinOp::IMul, x, one).unwrap();
            builder::ret(func, blk, Some(product));
        });

        run(&mut m).unwrap();

        let func = m.function(f);
        assert!(func
            .instructions_in_order()
            .all(|(_, i)| !matches!(func.opcode(i), Opcode::BinOp(_))));
    }
}
