//! `Mem2Reg` (spec §4.5): promotes a `stack_alloc` to a plain virtual
//! register when every use of it is a load or store through it and its
//! allocated type is scalar (integer or pointer). No φ-nodes: the fresh
//! register simply accumulates more than one `set` (spec's non-goal
//! excludes SSA form here), matching the source's memory-free rewrite of
//! trivially-promotable slots.

use smallvec::smallvec;

use crate::ir::{Function, InstructionData, Opcode, TypeCtx, Value};
use crate::pass::{FunctionPass, PassRunInformation};
use crate::result::CoreResult;

pub struct Mem2Reg;

impl FunctionPass for Mem2Reg {
    fn name(&self) -> &'static str {
        "mem2reg"
    }

    fn run(&mut self, ctx: TypeCtx<'_>, func: &mut Function, _info: PassRunInformation) -> CoreResult<()> {
        let candidates: Vec<_> = func
            .instructions_in_order()
            .filter_map(|(block, inst)| {
                let data = func.inst(inst);
                if data.opcode != Opcode::StackAlloc {
                    return None;
                }
                let allocated = data.extra.allocated_type?;
                if !(ctx.types.is_integer(allocated) || ctx.types.is_pointer(allocated)) {
                    return None;
                }
                let ptr_value = data.operands[0];
                is_promotable(func, ptr_value).then_some((block, inst, ptr_value, allocated))
            })
            .collect();

        for (block, inst, ptr_value, allocated) in candidates {
            promote(func, block, inst, ptr_value, allocated);
        }
        Ok(())
    }
}

fn is_promotable(func: &Function, ptr_value: Value) -> bool {
    func.uses_of(ptr_value).iter().all(|u| {
        u.operand == 0 && matches!(func.opcode(u.inst), Opcode::Load | Opcode::Store)
    })
}

fn promote(func: &mut Function, alloc_block: crate::ir::Block, alloc_inst: crate::ir::Inst, ptr_value: Value, allocated: crate::ir::Type) {
    let fresh = Value::VReg(func.create_vreg(allocated, None));
    let uses = func.uses_of(ptr_value).to_vec();

    for u in uses {
        let block = func.find_block_of(u.inst).expect("use site must be in some block");
        match func.opcode(u.inst) {
            Opcode::Load => {
                let loaded_dst = func.operand(u.inst, 1);
                for read in func.uses_of(loaded_dst).to_vec() {
                    func.set_operand(read.inst, read.operand as usize, fresh);
                }
                func.remove_inst(block, u.inst);
            }
            Opcode::Store => {
                let val = func.operand(u.inst, 1);
                func.insert_inst_before(
                    block,
                    u.inst,
                    InstructionData::new(Opcode::Set, smallvec![fresh, val]),
                );
                func.remove_inst(block, u.inst);
            }
            _ => unreachable!("is_promotable only admits Load/Store uses"),
        }
    }

    func.remove_inst(alloc_block, alloc_inst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, FuncRef, Module};

    #[test]
    fn promotes_scalar_alloc_with_only_load_store_uses() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f: FuncRef = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let slot = builder::stack_alloc(ctx, func, b, ctx.types.i32);
            let c = func.create_vreg(ctx.types.i32, None);
            let c_val = Value::VReg(c);
            func.push_inst(
                b,
                InstructionData::new(Opcode::Set, smallvec![c_val, Value::VReg(func.create_vreg(ctx.types.i32, None))]),
            );
            builder::store(ctx, func, b, slot, c_val).unwrap();
            let loaded = builder::load(ctx, func, b, slot, ctx.types.i32).unwrap();
            builder::ret(func, b, Some(loaded));

            let mut pass = Mem2Reg;
            pass.run(ctx, func, PassRunInformation::default()).unwrap();

            assert!(func
                .instructions_in_order()
                .all(|(_, i)| !matches!(func.opcode(i), Opcode::StackAlloc | Opcode::Load)));
        });
    }
}
