//! Basic blocks: an intrusive sequence of instructions ending in one
//! terminator (spec §3 "BasicBlock").

use rustc_hash::FxHashSet;

use crate::ir::entities::Inst;
use crate::ir::value::VReg;

/// A basic block's instruction list and the liveness sets computed for
/// it by [`crate::regalloc::liveness`]. Owned by a `Function`'s block
/// arena; order within `insts` is program order, last entry (if any)
/// must be a terminator once the block is well-formed.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    pub insts: Vec<Inst>,
    pub live_in: FxHashSet<VReg>,
    pub live_out: FxHashSet<VReg>,
    /// Per-block `Defs`/`Uses`, computed once by the liveness forward sweep
    /// (spec §4.7) and then reused by the fixed-point iteration.
    pub defs: FxHashSet<VReg>,
    pub uses: FxHashSet<VReg>,
}

impl BlockData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn terminator(&self) -> Option<Inst> {
        self.insts.last().copied()
    }
}
