//! A cursor for rewriting passes: walk instructions in program order with a
//! stable position, inserting or removing at the cursor without disturbing
//! the walk (the `FuncCursor` idiom, adapted to this crate's vector-backed
//! block layout rather than an intrusive linked list).

use crate::ir::{Block, Function, Inst, InstructionData};

/// Where a [`FuncCursor`] currently points.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CursorPosition {
    /// Not pointing anywhere; `next_inst` returns `None` until repositioned.
    Nowhere,
    /// At instruction index `1` within block `0`'s instruction vector. The
    /// index may equal the block's length, meaning "past the last
    /// instruction" (inserts append).
    At(Block, usize),
}

pub struct FuncCursor<'f> {
    pub func: &'f mut Function,
    pos: CursorPosition,
}

impl<'f> FuncCursor<'f> {
    pub fn new(func: &'f mut Function) -> Self {
        Self {
            func,
            pos: CursorPosition::Nowhere,
        }
    }

    pub fn position(&self) -> CursorPosition {
        self.pos
    }

    /// Position the cursor at the top of `block`.
    pub fn goto_top(&mut self, block: Block) -> &mut Self {
        self.pos = CursorPosition::At(block, 0);
        self
    }

    /// Position the cursor just past the last instruction of `block`, so
    /// `insert_inst` appends.
    pub fn goto_bottom(&mut self, block: Block) -> &mut Self {
        let len = self.func.block(block).insts.len();
        self.pos = CursorPosition::At(block, len);
        self
    }

    /// Position the cursor at `inst`, which must be in `block`.
    pub fn goto_inst(&mut self, block: Block, inst: Inst) -> &mut Self {
        let idx = self
            .func
            .block(block)
            .insts
            .iter()
            .position(|&i| i == inst)
            .expect("instruction not in block");
        self.pos = CursorPosition::At(block, idx);
        self
    }

    pub fn current_block(&self) -> Option<Block> {
        match self.pos {
            CursorPosition::At(b, _) => Some(b),
            CursorPosition::Nowhere => None,
        }
    }

    pub fn current_inst(&self) -> Option<Inst> {
        match self.pos {
            CursorPosition::At(b, i) => self.func.block(b).insts.get(i).copied(),
            CursorPosition::Nowhere => None,
        }
    }

    /// Advance to the next instruction in the same block, returning it.
    pub fn next_inst(&mut self) -> Option<Inst> {
        match self.pos {
            CursorPosition::At(b, i) => {
                let insts = &self.func.block(b).insts;
                if i < insts.len() {
                    let inst = insts[i];
                    self.pos = CursorPosition::At(b, i + 1);
                    Some(inst)
                } else {
                    None
                }
            }
            CursorPosition::Nowhere => None,
        }
    }

    /// Insert `data` at the cursor without moving it — a following
    /// `next_inst` still returns the instruction the cursor was pointing at
    /// before the insert.
    pub fn insert_inst(&mut self, data: InstructionData) -> Inst {
        match self.pos {
            CursorPosition::At(b, i) => match self.func.block(b).insts.get(i).copied() {
                Some(before) => self.func.insert_inst_before(b, before, data),
                None => self.func.push_inst(b, data),
            },
            CursorPosition::Nowhere => panic!("cursor not positioned"),
        }
    }

    /// Remove the instruction at the cursor, leaving the cursor pointing at
    /// the instruction that follows it (if any).
    pub fn remove_inst(&mut self) -> Inst {
        match self.pos {
            CursorPosition::At(b, i) => {
                let inst = self.func.block(b).insts[i];
                self.func.remove_inst(b, inst);
                inst
            }
            CursorPosition::Nowhere => panic!("no instruction under cursor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, Function, InstructionData, Module, Opcode, Value};
    use smallvec::smallvec;

    #[test]
    fn insert_at_top_does_not_skip_existing() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let a = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let c = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let result = Value::VReg(func.create_vreg(ctx.types.i32, None));
            func.push_inst(
                b,
                InstructionData::new(Opcode::BinOp(BinOp::IAdd), smallvec![a, c, result]),
            );

            let mut cur = FuncCursor::new(func);
            cur.goto_top(b);
            let inserted = cur.insert_inst(InstructionData::new(Opcode::Set, smallvec![a, c]));
            assert_eq!(cur.func.block(b).insts.len(), 2);
            assert_eq!(cur.func.block(b).insts[0], inserted);
        });
    }
}
