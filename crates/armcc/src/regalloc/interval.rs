//! `InstructionIndex` and per-virtual-register `Interval` construction
//! (spec §4.7), built from the `defs`/`uses`/`live_in`/`live_out` sets
//! [`crate::regalloc::liveness::compute`] leaves on each block.

use rustc_hash::FxHashMap;

use crate::ir::{Function, OperandFlag, Value, VReg};

/// A total, lexicographic order over instruction positions: block
/// position in program order, then instruction position within the
/// block (spec §4.7 "InstructionIndex(block, instr)").
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct InstructionIndex {
    pub block_pos: u32,
    pub inst_pos: u32,
}

#[derive(Clone, Debug)]
pub struct Interval {
    pub vreg: VReg,
    pub start: InstructionIndex,
    pub end: InstructionIndex,
}

fn raise(map: &mut FxHashMap<VReg, InstructionIndex>, vr: VReg, idx: InstructionIndex, keep_min: bool) {
    map.entry(vr)
        .and_modify(|existing| {
            if keep_min {
                if idx < *existing {
                    *existing = idx;
                }
            } else if idx > *existing {
                *existing = idx;
            }
        })
        .or_insert(idx);
}

/// Build one `Interval` per virtual register referenced anywhere in
/// `func`. Must run after [`crate::regalloc::liveness::compute`].
pub fn build(func: &Function) -> Vec<Interval> {
    let blocks: Vec<_> = func.blocks_in_order().collect();
    let mut starts: FxHashMap<VReg, InstructionIndex> = FxHashMap::default();
    let mut ends: FxHashMap<VReg, InstructionIndex> = FxHashMap::default();

    for (block_pos, &block) in blocks.iter().enumerate() {
        let bd = func.block(block);
        for (inst_pos, &inst) in bd.insts.iter().enumerate() {
            let idx = InstructionIndex {
                block_pos: block_pos as u32,
                inst_pos: inst_pos as u32,
            };
            let data = func.inst(inst);
            for (i, &v) in data.operands.iter().enumerate() {
                let Value::VReg(vr) = v else { continue };
                match data.operand_flags(i) {
                    OperandFlag::Write => raise(&mut starts, vr, idx, true),
                    OperandFlag::Read => raise(&mut ends, vr, idx, false),
                    OperandFlag::None => {}
                }
            }
        }

        let block_len = bd.insts.len() as u32;
        for &vr in &bd.live_in {
            raise(
                &mut starts,
                vr,
                InstructionIndex { block_pos: block_pos as u32, inst_pos: 0 },
                true,
            );
        }
        for &vr in &bd.live_out {
            raise(
                &mut ends,
                vr,
                InstructionIndex { block_pos: block_pos as u32, inst_pos: block_len },
                false,
            );
        }
    }

    for &p in &func.params {
        if let Value::VReg(vr) = p {
            raise(&mut starts, vr, InstructionIndex { block_pos: 0, inst_pos: 0 }, true);
        }
    }

    let mut vregs: Vec<VReg> = starts.keys().chain(ends.keys()).copied().collect();
    vregs.sort();
    vregs.dedup();

    vregs
        .into_iter()
        .map(|vr| {
            let start = starts.get(&vr).copied();
            let end = ends.get(&vr).copied();
            let start = start.or(end).expect("a referenced vreg has a start or an end");
            let end = end.unwrap_or(start);
            Interval { vreg: vr, start, end }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, BinOp, Function, Module, Value};
    use crate::regalloc::liveness;

    #[test]
    fn write_only_vreg_collapses_to_a_single_index() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let a = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let c = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let dead = builder::binop(ctx, func, b, BinOp::IAdd, a, c).unwrap();
            builder::ret(func, b, None);

            liveness::compute(func);
            let intervals = build(func);
            let Value::VReg(dead_vr) = dead else { unreachable!() };
            let iv = intervals.iter().find(|iv| iv.vreg == dead_vr).unwrap();
            assert_eq!(iv.start, iv.end);
        });
    }

    #[test]
    fn sequential_def_and_use_produce_a_local_interval() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let a = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let c = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let sum = builder::binop(ctx, func, b, BinOp::IAdd, a, c).unwrap();
            builder::ret(func, b, Some(sum));

            liveness::compute(func);
            let intervals = build(func);
            let Value::VReg(sum_vr) = sum else { unreachable!() };
            let iv = intervals.iter().find(|iv| iv.vreg == sum_vr).unwrap();
            assert!(iv.start < iv.end);
        });
    }
}
