//! Per-block `Defs`/`Uses` and the fixed-point `IN`/`OUT` sweep (spec
//! §4.7), written directly into each block's [`crate::ir::BlockData`].

use rustc_hash::FxHashSet;

use crate::flowgraph::ControlFlowGraph;
use crate::ir::{Block, CondCode, Function, OperandFlag, Value};

/// Recompute `defs`/`uses`/`live_in`/`live_out` for every block of
/// `func`. Idempotent: safe to call once right before building
/// intervals, with no other pass needing to keep it up to date in
/// between.
pub fn compute(func: &mut Function) {
    let blocks: Vec<Block> = func.blocks_in_order().collect();

    for &block in &blocks {
        let mut defs = FxHashSet::default();
        let mut uses = FxHashSet::default();
        for &inst in &func.block(block).insts {
            let data = func.inst(inst);
            for (i, &v) in data.operands.iter().enumerate() {
                let Value::VReg(vr) = v else { continue };
                match data.operand_flags(i) {
                    OperandFlag::Read => {
                        if !defs.contains(&vr) {
                            uses.insert(vr);
                        }
                    }
                    OperandFlag::Write => {
                        if !uses.contains(&vr) {
                            defs.insert(vr);
                        }
                    }
                    OperandFlag::None => {}
                }
            }
        }
        let bd = func.block_mut(block);
        bd.defs = defs;
        bd.uses = uses;
    }

    let cfg = ControlFlowGraph::with_function(func);
    let mut changed = true;
    while changed {
        changed = false;
        for &block in blocks.iter().rev() {
            let mut out: FxHashSet<_> = FxHashSet::default();
            for &succ in cfg.successors(block) {
                out.extend(func.block(succ).live_in.iter().copied());
            }
            let mut inn = func.block(block).uses.clone();
            let defs = &func.block(block).defs;
            for v in out.difference(defs) {
                inn.insert(*v);
            }
            let bd = func.block_mut(block);
            if bd.live_out != out {
                bd.live_out = out;
                changed = true;
            }
            if bd.live_in != inn {
                bd.live_in = inn;
                changed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, Function, Module};

    #[test]
    fn value_live_across_a_branch_is_live_out_of_entry_and_live_in_to_both_arms() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let entry = func.create_block();
            let then_blk = func.create_block();
            let else_blk = func.create_block();
            func.append_block(entry);
            func.append_block(then_blk);
            func.append_block(else_blk);

            let b = func.add_param(ctx.types.i32, None);
            let a = builder::icmp(ctx, func, entry, CondCode::Eq, b, b).unwrap();
            builder::cbr(ctx, func, entry, a, then_blk, else_blk).unwrap();
            builder::ret(func, then_blk, Some(b));
            builder::ret(func, else_blk, Some(b));

            compute(func);

            let Value::VReg(b_vreg) = b else { unreachable!() };
            assert!(func.block(entry).live_out.contains(&b_vreg));
            assert!(func.block(then_blk).live_in.contains(&b_vreg));
            assert!(func.block(else_blk).live_in.contains(&b_vreg));
            assert!(func.block(then_blk).live_out.is_empty());
        });
    }
}
