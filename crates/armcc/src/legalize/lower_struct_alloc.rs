//! `LowerStructStackAllocation` (spec §4.3): rewrites a `stack_alloc`
//! whose allocated type is a struct to allocate `Array(i8, sizeof(struct))`
//! instead — the frame only ever needs a byte extent for it, not its
//! field layout, once `LegaliseStructs` has turned every access into
//! `lfa`-addressed loads/stores.

use crate::ir::{FuncRef, Inst, Module, Opcode, Type};
use crate::result::CoreResult;

pub fn run(module: &mut Module) -> CoreResult<()> {
    let refs: Vec<FuncRef> = module.functions().collect();
    for r in refs {
        let targets: Vec<(Inst, Type)> = {
            let func = module.function(r);
            func.instructions_in_order()
                .filter_map(|(_, inst)| {
                    let data = func.inst(inst);
                    if data.opcode != Opcode::StackAlloc {
                        return None;
                    }
                    data.extra
                        .allocated_type
                        .filter(|&t| module.types.is_struct(t))
                        .map(|t| (inst, t))
                })
                .collect()
        };

        for (inst, struct_ty) in targets {
            let size = module.types.size_of(struct_ty) as u64;
            let i8_ty = module.types.i8;
            let array_ty = module.types.array(i8_ty, size);
            module.function_mut(r).inst_mut(inst).extra.allocated_type = Some(array_ty);
        }
    }
    Ok(())
}
