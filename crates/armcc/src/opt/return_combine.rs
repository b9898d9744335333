//! `ReturnCombine` (spec §4.6): rewrites every function to have exactly
//! one exit block, so later passes (`CConv`, then the matcher and
//! `LinearScan`'s epilogue) never need to reason about more than one
//! return site.
//!
//! Non-void: a pointer-typed `stack_alloc` for the return slot is
//! inserted at the head block; each `ret v` becomes `store v, slot; br
//! exit`, and the exit block is `load slot -> t; ret t`. Void: every
//! `ret` becomes `br exit`, and the exit block is a bare `ret`.
//!
//! Only reuses the function's existing return type — no new type is
//! interned — so this fits the read-only [`TypeCtx`] a [`FunctionPass`]
//! is given.

use smallvec::smallvec;

use crate::ir::{builder, Block, Function, Inst, InstExtra, InstructionData, Opcode, TypeCtx, TypeData, Value};
use crate::pass::{FunctionPass, PassRunInformation};
use crate::result::CoreResult;

pub struct ReturnCombine;

impl FunctionPass for ReturnCombine {
    fn name(&self) -> &'static str {
        "retcomb"
    }

    fn run(&mut self, ctx: TypeCtx<'_>, func: &mut Function, _info: PassRunInformation) -> CoreResult<()> {
        let Some(head) = func.entry_block() else {
            return Ok(());
        };

        let ret_insts: Vec<(Block, Inst)> = func
            .instructions_in_order()
            .filter(|&(_, inst)| func.opcode(inst) == Opcode::Ret)
            .collect();
        if ret_insts.is_empty() {
            return Ok(());
        }

        let ret_ty = match ctx.types.data(func.sig) {
            TypeData::Function { ret, .. } => *ret,
            _ => unreachable!("function signature must be a Function type"),
        };
        let is_void = matches!(ctx.types.data(ret_ty), TypeData::Void);

        let exit = func.create_block();

        if is_void {
            for (block, inst) in ret_insts {
                func.remove_inst(block, inst);
                builder::br(func, block, exit);
            }
            func.append_block(exit);
            builder::ret(func, exit, None);
        } else {
            let slot_vreg = func.create_vreg(ctx.types.ptr, None);
            let slot = Value::VReg(slot_vreg);
            let mut alloc = InstructionData::new(Opcode::StackAlloc, smallvec![slot]);
            alloc.extra = InstExtra {
                allocated_type: Some(ret_ty),
                ..InstExtra::default()
            };
            let head_term = func.block(head).terminator().expect("head block must already be terminated");
            func.insert_inst_before(head, head_term, alloc);

            for (block, inst) in ret_insts {
                let value = func.operand(inst, 0);
                func.remove_inst(block, inst);
                func.push_inst(block, InstructionData::new(Opcode::Store, smallvec![slot, value]));
                builder::br(func, block, exit);
            }

            func.append_block(exit);
            let loaded = builder::load(ctx, func, exit, slot, ret_ty)?;
            builder::ret(func, exit, Some(loaded));
        }

        Ok(())
    }
}
