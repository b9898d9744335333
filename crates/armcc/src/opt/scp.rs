//! `Scp`: Kildall's Simple Constant propagation (spec §4.5), after
//! Wegman & Zadeck. Per function, builds one dataflow node per
//! instruction — edges come from the real control-flow graph plus an
//! unconditional link from each node to the next in program order, the
//! same conservative over-approximation the algorithm this is grounded
//! on uses — and runs a lattice `{Top, Const(ty, bits), Bottom}` to a
//! fixed point before rewriting constant-valued reads and folding
//! constant-operand binops into `set`.
//!
//! Division/remainder folding is deliberately not attempted here (spec
//! §9 Open Question): only `iadd`/`isub`/`imul` are constant-folded.
//!
//! Needs to intern freshly-folded constants, so (like
//! [`crate::legalize::generic_legalizer`]) this runs as a direct
//! `Module`-level pass rather than a [`crate::pass::FunctionPass`].

use std::collections::{HashMap, HashSet, VecDeque};

use crate::flowgraph::ControlFlowGraph;
use crate::ir::value::VReg;
use crate::ir::{Block, BinOp, Function, FuncRef, Inst, Module, Opcode, OperandFlag, Type, TypeCtx, Value};
use crate::result::CoreResult;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Cell {
    Top,
    Const(Type, i64),
    Bottom,
}

fn meet(a: Cell, b: Cell) -> Cell {
    match b {
        Cell::Top => a,
        Cell::Bottom => Cell::Bottom,
        Cell::Const(..) => {
            if a == b {
                b
            } else {
                Cell::Bottom
            }
        }
    }
}

type VarMap = HashMap<VReg, Cell>;

fn get(map: &VarMap, var: VReg) -> Cell {
    map.get(&var).copied().unwrap_or(Cell::Top)
}

struct Node {
    inst: Inst,
    preds: Vec<usize>,
    succs: Vec<usize>,
    input: VarMap,
    output: VarMap,
}

pub fn run(module: &mut Module) -> CoreResult<()> {
    let refs: Vec<FuncRef> = module.functions().collect();
    for r in refs {
        run_one(module, r);
    }
    Ok(())
}

fn run_one(module: &mut Module, r: FuncRef) {
    let nodes = {
        let ctx = module.type_ctx();
        let func = module.function(r);
        if func.entry_block().is_none() {
            return;
        }
        analyse(ctx, func)
    };

    let mut binop_folds: Vec<(Inst, Type, i64)> = Vec::new();
    let mut operand_folds: Vec<(Inst, usize, Type, i64)> = Vec::new();

    {
        let func = module.function(r);
        for node in &nodes {
            let data = func.inst(node.inst);
            let mut whole_inst_folded = false;

            if let Opcode::BinOp(_) = data.opcode {
                if let Value::VReg(result) = data.operands[2] {
                    if let Cell::Const(ty, v) = get(&node.output, result) {
                        binop_folds.push((node.inst, ty, v));
                        whole_inst_folded = true;
                    }
                }
            }

            if whole_inst_folded {
                continue;
            }

            for (i, &op) in data.operands.iter().enumerate() {
                if data.operand_flags(i) != OperandFlag::Read {
                    continue;
                }
                if let Value::VReg(var) = op {
                    if let Cell::Const(ty, v) = get(&node.input, var) {
                        operand_folds.push((node.inst, i, ty, v));
                    }
                }
            }
        }
    }

    let mut const_values: HashMap<(Type, i64), Value> = HashMap::new();

    let binop_consts: Vec<(Inst, Value)> = binop_folds
        .into_iter()
        .map(|(inst, ty, v)| (inst, intern_const(module, &mut const_values, ty, v)))
        .collect();
    let operand_consts: Vec<(Inst, usize, Value)> = operand_folds
        .into_iter()
        .map(|(inst, idx, ty, v)| (inst, idx, intern_const(module, &mut const_values, ty, v)))
        .collect();

    module.with_function_mut(r, |_ctx, func| {
        for (inst, value) in binop_consts {
            let block = func.find_block_of(inst).expect("folded binop must live in some block");
            let result = func.operand(inst, 2);
            func.insert_inst_before(
                block,
                inst,
                crate::ir::InstructionData::new(Opcode::Set, smallvec::smallvec![result, value]),
            );
            func.remove_inst(block, inst);
        }
        for (inst, idx, value) in operand_consts {
            func.set_operand(inst, idx, value);
        }
    });
}

fn intern_const(module: &mut Module, cache: &mut HashMap<(Type, i64), Value>, ty: Type, bits: i64) -> Value {
    if let Some(&v) = cache.get(&(ty, bits)) {
        return v;
    }
    let v = module.const_int(ty, bits);
    cache.insert((ty, bits), v);
    v
}

fn analyse(ctx: TypeCtx<'_>, func: &Function) -> Vec<Node> {
    let cfg = ControlFlowGraph::with_function(func);

    let mut nodes: Vec<Node> = Vec::new();
    let mut block_bounds: HashMap<Block, (usize, usize)> = HashMap::new();

    for block in func.blocks_in_order() {
        let start = nodes.len();
        for &inst in &func.block(block).insts {
            nodes.push(Node {
                inst,
                preds: Vec::new(),
                succs: Vec::new(),
                input: VarMap::new(),
                output: VarMap::new(),
            });
        }
        block_bounds.insert(block, (start, nodes.len()));
    }

    for block in func.blocks_in_order() {
        let (start, _) = block_bounds[&block];
        for edge in cfg.predecessors(block) {
            let (_, pred_end) = block_bounds[&edge.block];
            nodes[start].preds.push(pred_end - 1);
        }
    }
    for i in 1..nodes.len() {
        nodes[i].preds.push(i - 1);
    }
    for i in 0..nodes.len() {
        let preds = nodes[i].preds.clone();
        for p in preds {
            nodes[p].succs.push(i);
        }
    }

    if let Some(first) = nodes.first_mut() {
        let mut all_vars: HashSet<VReg> = HashSet::new();
        for (_, inst) in func.instructions_in_order() {
            for &op in &func.inst(inst).operands {
                if let Value::VReg(v) = op {
                    all_vars.insert(v);
                }
            }
        }
        for v in all_vars {
            first.input.insert(v, Cell::Bottom);
        }
    }

    let mut worklist: VecDeque<usize> = (0..nodes.len()).collect();
    while let Some(i) = worklist.pop_front() {
        let new_input = compute_inputs(&nodes, i);
        if new_input != nodes[i].input {
            nodes[i].input = new_input;
            for s in nodes[i].succs.clone() {
                worklist.push_back(s);
            }
        }
        compute_output(ctx, func, &mut nodes, i);
    }

    nodes
}

fn compute_inputs(nodes: &[Node], i: usize) -> VarMap {
    let mut result = nodes[i].input.clone();
    let mut gathered: HashMap<VReg, Vec<Cell>> = HashMap::new();

    for &p in &nodes[i].preds {
        for (&var, &cell) in &nodes[p].output {
            gathered.entry(var).or_default().push(cell);
        }
    }

    for (var, cells) in gathered {
        let merged = cells.into_iter().reduce(meet).expect("non-empty by construction");
        result.insert(var, merged);
    }

    result
}

fn evaluate(node: &Node, ctx: TypeCtx<'_>, value: Value) -> Option<(Type, i64)> {
    match value {
        Value::Const(c) => match ctx.const_data(c) {
            crate::ir::ConstData::Int { ty, bits } => Some((*ty, *bits)),
            _ => None,
        },
        Value::VReg(var) => match get(&node.input, var) {
            Cell::Const(ty, v) => Some((ty, v)),
            _ => None,
        },
        _ => None,
    }
}

fn fold_binop(op: BinOp, lhs: i64, rhs: i64) -> Option<i64> {
    match op {
        BinOp::IAdd => Some(lhs.wrapping_add(rhs)),
        BinOp::ISub => Some(lhs.wrapping_sub(rhs)),
        BinOp::IMul => Some(lhs.wrapping_mul(rhs)),
        BinOp::IDivS | BinOp::IDivU | BinOp::IRemS | BinOp::IRemU => None,
    }
}

fn compute_output(ctx: TypeCtx<'_>, func: &Function, nodes: &mut [Node], i: usize) {
    let mut output = nodes[i].input.clone();
    let data = func.inst(nodes[i].inst).clone();

    match data.opcode {
        Opcode::Set => {
            if let Value::VReg(dst) = data.operands[0] {
                match evaluate(&nodes[i], ctx, data.operands[1]) {
                    Some((ty, v)) => {
                        output.insert(dst, Cell::Const(ty, v));
                    }
                    None => {
                        output.insert(dst, Cell::Bottom);
                    }
                }
            }
            nodes[i].output = output;
            return;
        }
        Opcode::BinOp(op) => {
            if let Value::VReg(dst) = data.operands[2] {
                let lhs = evaluate(&nodes[i], ctx, data.operands[0]);
                let rhs = evaluate(&nodes[i], ctx, data.operands[1]);
                let folded = match (lhs, rhs) {
                    (Some((ty, l)), Some((_, r))) => fold_binop(op, l, r).map(|v| Cell::Const(ty, v)),
                    _ => None,
                };
                output.insert(dst, folded.unwrap_or(Cell::Bottom));
            }
            nodes[i].output = output;
            return;
        }
        _ => {}
    }

    for (idx, &v) in data.operands.iter().enumerate() {
        if data.operand_flags(idx) == OperandFlag::Write {
            if let Value::VReg(dst) = v {
                output.insert(dst, Cell::Bottom);
            }
        }
    }
    nodes[i].output = output;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder, Function, Module};

    #[test]
    fn folds_constant_binop_chain() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.i32, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        let two_const = m.const_int(m.types.i32, 2);

        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let two = func.create_vreg(ctx.types.i32, None);
            func.push_inst(
                b,
                crate::ir::InstructionData::new(Opcode::Set, smallvec::smallvec![Value::VReg(two), two_const]),
            );
            let sum = builder::binop(ctx, func, b, BinOp::IAdd, Value::VReg(two), Value::VReg(two)).unwrap();
            builder::ret(func, b, Some(sum));
        });

        run(&mut m).unwrap();

        let func = m.function(f);
        let has_binop = func
            .instructions_in_order()
            .any(|(_, i)| matches!(func.opcode(i), Opcode::BinOp(_)));
        assert!(!has_binop);
    }
}
