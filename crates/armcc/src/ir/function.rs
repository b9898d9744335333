//! Functions: a sequence of blocks, a parameter list, and the value/use
//! arenas instructions within them read and write (spec §3 "Function").

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use armcc_entity::PrimaryMap;

use crate::ir::block::BlockData;
use crate::ir::entities::{Block, Inst};
use crate::ir::instructions::{InstructionData, Opcode};
use crate::ir::types::Type;
use crate::ir::value::{Use, VReg, VRegData, Value};

/// A function body: block/instruction/virtual-register arenas plus the
/// use-lists tying them together. Blocks own their instructions; the
/// function owns its blocks (spec §3 "Ownership").
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub sig: Type,
    pub params: Vec<Value>,

    blocks: PrimaryMap<Block, BlockData>,
    /// Program order of blocks; the first entry is the entry block.
    block_order: Vec<Block>,
    insts: PrimaryMap<Inst, InstructionData>,
    vregs: PrimaryMap<VReg, VRegData>,
    uses: FxHashMap<Value, SmallVec<[Use; 4]>>,
}

impl Function {
    pub fn new(name: impl Into<String>, sig: Type) -> Self {
        Self {
            name: name.into(),
            sig,
            params: Vec::new(),
            blocks: PrimaryMap::new(),
            block_order: Vec::new(),
            insts: PrimaryMap::new(),
            vregs: PrimaryMap::new(),
            uses: FxHashMap::default(),
        }
    }

    // ---- virtual registers ----

    pub fn create_vreg(&mut self, ty: Type, name: Option<String>) -> VReg {
        self.vregs.push(VRegData { ty, name })
    }

    pub fn vreg_type(&self, v: VReg) -> Type {
        self.vregs[v].ty
    }

    pub fn vreg_data(&self, v: VReg) -> &VRegData {
        &self.vregs[v]
    }

    pub fn add_param(&mut self, ty: Type, name: Option<String>) -> Value {
        let v = self.create_vreg(ty, name);
        let val = Value::VReg(v);
        self.params.push(val);
        val
    }

    // ---- blocks ----

    pub fn create_block(&mut self) -> Block {
        self.blocks.push(BlockData::new())
    }

    /// Append `block` to the end of program order.
    pub fn append_block(&mut self, block: Block) {
        debug_assert!(!self.block_order.contains(&block));
        self.block_order.push(block);
    }

    /// Insert `block` at the front of program order (used by
    /// `GenericLegalizer` to move hoisted `stack_alloc`s into the entry
    /// block's containing position, and by `ReturnCombine` for the body
    /// head).
    pub fn insert_block_front(&mut self, block: Block) {
        debug_assert!(!self.block_order.contains(&block));
        self.block_order.insert(0, block);
    }

    pub fn entry_block(&self) -> Option<Block> {
        self.block_order.first().copied()
    }

    pub fn blocks_in_order(&self) -> impl Iterator<Item = Block> + '_ {
        self.block_order.iter().copied()
    }

    pub fn block(&self, b: Block) -> &BlockData {
        &self.blocks[b]
    }

    pub fn block_mut(&mut self, b: Block) -> &mut BlockData {
        &mut self.blocks[b]
    }

    /// Destroy `block`: it must be empty and unreferenced (spec §3
    /// lifecycle invariant, §4.1 `InvalidIR` on violation).
    pub fn destroy_block(&mut self, block: Block) -> Result<(), &'static str> {
        if !self.blocks[block].is_empty() {
            return Err("cannot destroy a non-empty block");
        }
        if self.uses_of(Value::Block(block)).iter().next().is_some() {
            return Err("cannot destroy a block that is still referenced");
        }
        self.block_order.retain(|&b| b != block);
        Ok(())
    }

    // ---- instructions ----

    fn record_operand_uses(&mut self, inst: Inst, operands: &[Value]) {
        for (i, &v) in operands.iter().enumerate() {
            self.uses
                .entry(v)
                .or_default()
                .push(Use { inst, operand: i as u16 });
        }
    }

    fn release_operand_uses(&mut self, inst: Inst, operands: &[Value]) {
        for (i, &v) in operands.iter().enumerate() {
            if let Some(list) = self.uses.get_mut(&v) {
                list.retain(|u| !(u.inst == inst && u.operand == i as u16));
            }
        }
    }

    /// Append a fully-built instruction to the end of `block`, wiring up
    /// use-lists for every operand.
    pub fn push_inst(&mut self, block: Block, data: InstructionData) -> Inst {
        let operands: SmallVec<[Value; 4]> = data.operands.clone();
        let inst = self.insts.push(data);
        self.record_operand_uses(inst, &operands);
        self.blocks[block].insts.push(inst);
        inst
    }

    /// Insert a fully-built instruction immediately before `before`
    /// within `block` (used for `lea`/`lfa` expansion and global-address
    /// materialisation, which must precede the instruction that
    /// consumes the temporary they produce).
    pub fn insert_inst_before(&mut self, block: Block, before: Inst, data: InstructionData) -> Inst {
        let operands: SmallVec<[Value; 4]> = data.operands.clone();
        let inst = self.insts.push(data);
        self.record_operand_uses(inst, &operands);
        let insts = &mut self.blocks[block].insts;
        let pos = insts.iter().position(|&i| i == before).expect("before not in block");
        insts.insert(pos, inst);
        inst
    }

    /// Prepend an instruction to the front of `block` (entry-block
    /// stack-alloc hoisting, spec §4.3).
    pub fn prepend_inst(&mut self, block: Block, data: InstructionData) -> Inst {
        let operands: SmallVec<[Value; 4]> = data.operands.clone();
        let inst = self.insts.push(data);
        self.record_operand_uses(inst, &operands);
        self.blocks[block].insts.insert(0, inst);
        inst
    }

    pub fn inst(&self, inst: Inst) -> &InstructionData {
        &self.insts[inst]
    }

    pub fn inst_mut(&mut self, inst: Inst) -> &mut InstructionData {
        &mut self.insts[inst]
    }

    pub fn operand(&self, inst: Inst, index: usize) -> Value {
        self.insts[inst].operands[index]
    }

    /// Replace operand `index` of `inst` with `new_value`, atomically
    /// moving the use-list entry (spec §3 lifecycle invariant).
    pub fn set_operand(&mut self, inst: Inst, index: usize, new_value: Value) {
        let old_value = self.insts[inst].operands[index];
        if let Some(list) = self.uses.get_mut(&old_value) {
            list.retain(|u| !(u.inst == inst && u.operand == index as u16));
        }
        self.insts[inst].operands[index] = new_value;
        self.uses
            .entry(new_value)
            .or_default()
            .push(Use { inst, operand: index as u16 });
    }

    /// Append a new read-only operand (used when legalisation rewrites
    /// fold new inputs, e.g. splitting a constant into a temp register).
    pub fn push_operand(&mut self, inst: Inst, value: Value) {
        let index = self.insts[inst].operands.len();
        self.insts[inst].operands.push(value);
        self.uses
            .entry(value)
            .or_default()
            .push(Use { inst, operand: index as u16 });
    }

    pub fn uses_of(&self, value: Value) -> &[Use] {
        self.uses.get(&value).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn read_count(&self, value: Value) -> usize {
        self.uses_of(value)
            .iter()
            .filter(|u| {
                !matches!(
                    self.insts[u.inst].operand_flags(u.operand as usize),
                    crate::ir::instructions::OperandFlag::Write
                )
            })
            .count()
    }

    /// Remove `inst` from its block, releasing every operand's use-list
    /// entry first (spec §3 lifecycle invariant).
    pub fn remove_inst(&mut self, block: Block, inst: Inst) {
        let operands: SmallVec<[Value; 4]> = self.insts[inst].operands.clone();
        self.release_operand_uses(inst, &operands);
        self.blocks[block].insts.retain(|&i| i != inst);
    }

    pub fn find_block_of(&self, inst: Inst) -> Option<Block> {
        self.block_order
            .iter()
            .copied()
            .find(|&b| self.blocks[b].insts.contains(&inst))
    }

    /// All instructions in program order, `(block, inst)` pairs.
    pub fn instructions_in_order(&self) -> impl Iterator<Item = (Block, Inst)> + '_ {
        self.block_order.iter().flat_map(move |&b| {
            self.blocks[b]
                .insts
                .iter()
                .map(move |&i| (b, i))
        })
    }

    pub fn is_void_return(&self, sig_ret_is_void: bool) -> bool {
        sig_ret_is_void
    }

    pub fn opcode(&self, inst: Inst) -> Opcode {
        self.insts[inst].opcode
    }
}
