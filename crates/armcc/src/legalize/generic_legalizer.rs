//! `GenericLegalizer` (spec §4.3): expands a store of an aggregate
//! constant into elementwise `lea`/`lfa` + store chains, and hoists every
//! `stack_alloc` into the entry block. Both rules iterate to a fixed
//! point per function.

use smallvec::smallvec;

use crate::ir::{ConstData, FuncRef, InstExtra, InstructionData, Module, Opcode, TypeData, Value};
use crate::pass::PassRunInformation;
use crate::result::CoreResult;

pub fn run(module: &mut Module, _info: PassRunInformation) -> CoreResult<()> {
    let refs: Vec<FuncRef> = module.functions().collect();
    for r in refs {
        loop {
            let expanded = expand_one_aggregate_store(module, r);
            let hoisted = module.with_function_mut(r, |_ctx, func| hoist_stack_allocs(func));
            if !expanded && !hoisted {
                break;
            }
        }
    }
    Ok(())
}

/// Find and rewrite one `store` of a `ConstantArray`/`ConstantStruct`;
/// returns whether a rewrite happened so the caller can loop to a fixed
/// point.
fn expand_one_aggregate_store(module: &mut Module, r: FuncRef) -> bool {
    let target = {
        let func = module.function(r);
        func.instructions_in_order().find_map(|(block, inst)| {
            let data = func.inst(inst);
            if data.opcode != Opcode::Store {
                return None;
            }
            match data.operands[1] {
                Value::Array(c) | Value::Struct(c) => Some((block, inst, data.operands[0], data.operands[1], c)),
                _ => None,
            }
        })
    };
    let Some((block, inst, dst, val, const_ref)) = target else {
        return false;
    };
    let const_data = module.const_data(const_ref).clone();

    match (val, const_data) {
        (Value::Array(_), ConstData::Array { ty, elements }) => {
            let element_ty = match module.types.data(ty) {
                TypeData::Array { element, .. } => *element,
                _ => unreachable!("ConstData::Array always carries an Array type"),
            };
            let i32_ty = module.types.i32;
            for (idx, elem) in elements.into_iter().enumerate() {
                let index_val = module.const_int(i32_ty, idx as i64);
                let ptr_ty = module.types.ptr;
                module.with_function_mut(r, |_ctx, func| {
                    let tmp = func.create_vreg(ptr_ty, None);
                    let mut lea = InstructionData::new(
                        Opcode::Lea,
                        smallvec![dst, index_val, Value::VReg(tmp)],
                    );
                    lea.extra = InstExtra {
                        base_type: Some(element_ty),
                        ..InstExtra::default()
                    };
                    func.insert_inst_before(block, inst, lea);
                    func.insert_inst_before(
                        block,
                        inst,
                        InstructionData::new(Opcode::Store, smallvec![Value::VReg(tmp), elem]),
                    );
                });
            }
        }
        (Value::Struct(_), ConstData::Struct { ty, fields }) => {
            let ptr_ty = module.types.ptr;
            for (idx, field) in fields.into_iter().enumerate() {
                module.with_function_mut(r, |_ctx, func| {
                    let tmp = func.create_vreg(ptr_ty, None);
                    let mut lfa =
                        InstructionData::new(Opcode::Lfa, smallvec![dst, Value::VReg(tmp)]);
                    lfa.extra = InstExtra {
                        struct_type: Some(ty),
                        field_index: Some(idx as u32),
                        ..InstExtra::default()
                    };
                    func.insert_inst_before(block, inst, lfa);
                    func.insert_inst_before(
                        block,
                        inst,
                        InstructionData::new(Opcode::Store, smallvec![Value::VReg(tmp), field]),
                    );
                });
            }
        }
        _ => unreachable!("matched on the same Value tag as const_ref above"),
    }

    module.with_function_mut(r, |_ctx, func| func.remove_inst(block, inst));
    true
}

/// Move every `stack_alloc` not already in the entry block to the front
/// of the entry block. Returns whether anything moved.
fn hoist_stack_allocs(func: &mut crate::ir::Function) -> bool {
    let Some(entry) = func.entry_block() else {
        return false;
    };
    let mut moved = false;
    for block in func.blocks_in_order().collect::<Vec<_>>() {
        if block == entry {
            continue;
        }
        let allocs: Vec<_> = func
            .block(block)
            .insts
            .iter()
            .copied()
            .filter(|&i| func.inst(i).opcode == Opcode::StackAlloc)
            .collect();
        for inst in allocs {
            func.remove_inst(block, inst);
            let data = func.inst(inst).clone();
            func.prepend_inst(entry, data);
            moved = true;
        }
    }
    moved
}
