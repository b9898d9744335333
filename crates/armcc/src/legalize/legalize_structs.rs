//! `LegaliseStructs` (spec §4.3): rewrites a struct-typed load whose only
//! consumer is a store (a struct copy) into a per-field load/store chain
//! addressed with `lfa`, so later passes never see a struct-typed value
//! flowing through a register.

use smallvec::smallvec;

use crate::ir::{Function, InstExtra, InstructionData, Opcode, TypeCtx, TypeData, Value};
use crate::pass::{FunctionPass, PassRunInformation};
use crate::result::CoreResult;

pub struct LegaliseStructs;

impl FunctionPass for LegaliseStructs {
    fn name(&self) -> &'static str {
        "structslegal"
    }

    fn run(&mut self, ctx: TypeCtx<'_>, func: &mut Function, _info: PassRunInformation) -> CoreResult<()> {
        while rewrite_one(ctx, func) {}
        Ok(())
    }
}

fn rewrite_one(ctx: TypeCtx<'_>, func: &mut Function) -> bool {
    let target = func.instructions_in_order().find_map(|(block, inst)| {
        let data = func.inst(inst);
        if data.opcode != Opcode::Load {
            return None;
        }
        let src_ptr = data.operands[0];
        let loaded = data.operands[1];
        if !ctx.types.is_struct(ctx.value_type(func, loaded)) {
            return None;
        }
        let uses = func.uses_of(loaded);
        if uses.len() != 1 {
            return None;
        }
        let store_inst = uses[0].inst;
        let store_data = func.inst(store_inst);
        if store_data.opcode != Opcode::Store || store_data.operands[1] != loaded {
            return None;
        }
        Some((block, inst, store_inst, src_ptr, store_data.operands[0]))
    });
    let Some((block, load_inst, store_inst, src_ptr, dst_ptr)) = target else {
        return false;
    };

    let struct_ty = ctx.value_type(func, func.operand(load_inst, 1));
    let field_count = match ctx.types.data(struct_ty) {
        TypeData::Struct { fields, .. } => fields.len(),
        _ => unreachable!("checked is_struct above"),
    };
    let ptr_ty = ctx.types.ptr;

    for i in 0..field_count {
        let field_ty = match ctx.types.data(struct_ty) {
            TypeData::Struct { fields, .. } => fields[i],
            _ => unreachable!(),
        };

        let src_field_ptr = func.create_vreg(ptr_ty, None);
        let mut lfa_src = InstructionData::new(Opcode::Lfa, smallvec![src_ptr, Value::VReg(src_field_ptr)]);
        lfa_src.extra = InstExtra {
            struct_type: Some(struct_ty),
            field_index: Some(i as u32),
            ..InstExtra::default()
        };
        func.insert_inst_before(block, load_inst, lfa_src);

        let field_val = func.create_vreg(field_ty, None);
        func.insert_inst_before(
            block,
            load_inst,
            InstructionData::new(Opcode::Load, smallvec![Value::VReg(src_field_ptr), Value::VReg(field_val)]),
        );

        let dst_field_ptr = func.create_vreg(ptr_ty, None);
        let mut lfa_dst = InstructionData::new(Opcode::Lfa, smallvec![dst_ptr, Value::VReg(dst_field_ptr)]);
        lfa_dst.extra = InstExtra {
            struct_type: Some(struct_ty),
            field_index: Some(i as u32),
            ..InstExtra::default()
        };
        func.insert_inst_before(block, load_inst, lfa_dst);

        func.insert_inst_before(
            block,
            load_inst,
            InstructionData::new(Opcode::Store, smallvec![Value::VReg(dst_field_ptr), Value::VReg(field_val)]),
        );
    }

    func.remove_inst(block, store_inst);
    func.remove_inst(block, load_inst);
    true
}
