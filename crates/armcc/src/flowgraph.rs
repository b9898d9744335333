//! Control-flow graph derived from each block's terminator (spec §3
//! "BasicBlock" edges are implicit in `Br`/`Cbr`/`Ret`'s `Value::Block`
//! operands; this computes the explicit predecessor/successor view
//! `Liveness` and `LinearScan` need).

use armcc_entity::SecondaryMap;

use crate::ir::{Block, Function, Inst, Value};

/// One predecessor edge: the block it comes from and the terminator
/// instruction that branches into the block being queried.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BasicBlockEdge {
    pub block: Block,
    pub inst: Inst,
}

#[derive(Clone, Default)]
struct CfgNode {
    predecessors: Vec<BasicBlockEdge>,
    successors: Vec<Block>,
}

/// Predecessor/successor edges for every block in one function. Computed
/// eagerly from the function's current terminators; stale after the
/// function is edited until [`ControlFlowGraph::compute`] runs again.
pub struct ControlFlowGraph {
    data: SecondaryMap<Block, CfgNode>,
}

impl ControlFlowGraph {
    pub fn with_function(func: &Function) -> Self {
        let mut cfg = Self {
            data: SecondaryMap::new(),
        };
        cfg.compute(func);
        cfg
    }

    /// Recompute every edge from scratch.
    pub fn compute(&mut self, func: &Function) {
        self.data = SecondaryMap::new();
        for block in func.blocks_in_order() {
            if let Some(term) = func.block(block).terminator() {
                for target in Self::branch_targets(func, term) {
                    self.add_edge(block, term, target);
                }
            }
        }
    }

    fn branch_targets(func: &Function, inst: Inst) -> impl Iterator<Item = Block> + '_ {
        func.inst(inst).operands.iter().filter_map(|&v| match v {
            Value::Block(b) => Some(b),
            _ => None,
        })
    }

    fn add_edge(&mut self, from: Block, inst: Inst, to: Block) {
        self.data[from].successors.push(to);
        self.data[to].predecessors.push(BasicBlockEdge { block: from, inst });
    }

    pub fn predecessors(&self, block: Block) -> &[BasicBlockEdge] {
        &self.data[block].predecessors
    }

    pub fn successors(&self, block: Block) -> &[Block] {
        &self.data[block].successors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, Module};

    #[test]
    fn branch_and_fallthrough_edges() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));

        let (entry, then_blk, else_blk) = m.with_function_mut(f, |ctx, func| {
            let entry = func.create_block();
            let then_blk = func.create_block();
            let else_blk = func.create_block();
            func.append_block(entry);
            func.append_block(then_blk);
            func.append_block(else_blk);

            let cond = Value::VReg(func.create_vreg(ctx.types.i32, None));
            builder::cbr(ctx, func, entry, cond, then_blk, else_blk).unwrap();
            builder::ret(func, then_blk, None);
            builder::ret(func, else_blk, None);
            (entry, then_blk, else_blk)
        });

        let func = m.function(f);
        let cfg = ControlFlowGraph::with_function(func);
        assert_eq!(cfg.successors(entry), &[then_blk, else_blk]);
        assert_eq!(cfg.predecessors(then_blk).len(), 1);
        assert_eq!(cfg.predecessors(then_blk)[0].block, entry);
        assert!(cfg.successors(then_blk).is_empty());
    }
}
