//! `InstBuilder`-style instruction constructors.
//!
//! Each function here is one HLIR instruction form from spec §4.1: it
//! checks the form's operand-type contract, allocates the result
//! virtual register (if any), and appends a fully-wired instruction to
//! `block` via [`Function::push_inst`]. Violating a contract returns
//! [`CoreError::InvalidIr`] rather than panicking, so a malformed
//! front-end module is reported through the same error path as every
//! other pipeline stage (spec §7) instead of crashing the compiler.

use smallvec::smallvec;

use crate::ir::entities::{Block, Inst};
use crate::ir::function::Function;
use crate::ir::instructions::{BinOp, CastKind, CondCode, InstExtra, InstructionData, Opcode};
use crate::ir::module::TypeCtx;
use crate::ir::types::Type;
use crate::ir::value::{FuncRef, Value};
use crate::result::{invalid_ir, CoreResult};

fn require(cond: bool, detail: impl Into<String>) -> CoreResult<()> {
    if cond {
        Ok(())
    } else {
        Err(invalid_ir(detail))
    }
}

/// `result = iadd|isub|...(lhs, rhs)`. `lhs` and `rhs` must share an
/// integer type; the result vreg is created with that same type.
pub fn binop(
    ctx: TypeCtx<'_>,
    func: &mut Function,
    block: Block,
    op: BinOp,
    lhs: Value,
    rhs: Value,
) -> CoreResult<Value> {
    let lty = ctx.value_type(func, lhs);
    let rty = ctx.value_type(func, rhs);
    require(lty == rty, format!("{op}: operand types disagree"))?;
    require(ctx.types.is_integer(lty), format!("{op}: operands must be integers"))?;

    let result = Value::VReg(func.create_vreg(lty, None));
    func.push_inst(
        block,
        InstructionData::new(Opcode::BinOp(op), smallvec![lhs, rhs, result]),
    );
    Ok(result)
}

/// `result = icmp <cond>(lhs, rhs)`. Result is always `i32` (0 or 1),
/// matching the absence of a dedicated boolean type in this IR.
pub fn icmp(
    ctx: TypeCtx<'_>,
    func: &mut Function,
    block: Block,
    cond: CondCode,
    lhs: Value,
    rhs: Value,
) -> CoreResult<Value> {
    let lty = ctx.value_type(func, lhs);
    let rty = ctx.value_type(func, rhs);
    require(lty == rty, "icmp: operand types disagree")?;
    require(ctx.types.is_integer(lty), "icmp: operands must be integers")?;

    let result = Value::VReg(func.create_vreg(ctx.types.i32, None));
    func.push_inst(
        block,
        InstructionData::new(Opcode::Icmp(cond), smallvec![lhs, rhs, result]),
    );
    Ok(result)
}

/// `result = load <loaded_ty>(ptr)`. `ptr` must be `ptr`-typed.
pub fn load(
    ctx: TypeCtx<'_>,
    func: &mut Function,
    block: Block,
    ptr: Value,
    loaded_ty: Type,
) -> CoreResult<Value> {
    let pty = ctx.value_type(func, ptr);
    require(ctx.types.is_pointer(pty), "load: base operand must be a pointer")?;

    let result = Value::VReg(func.create_vreg(loaded_ty, None));
    func.push_inst(block, InstructionData::new(Opcode::Load, smallvec![ptr, result]));
    Ok(result)
}

/// `store(ptr, val)`. No result; `ptr` must be `ptr`-typed.
pub fn store(ctx: TypeCtx<'_>, func: &mut Function, block: Block, ptr: Value, val: Value) -> CoreResult<()> {
    let pty = ctx.value_type(func, ptr);
    require(ctx.types.is_pointer(pty), "store: base operand must be a pointer")?;

    func.push_inst(block, InstructionData::new(Opcode::Store, smallvec![ptr, val]));
    Ok(())
}

/// `result = stack_alloc <allocated_type>`. Result is `ptr`-typed; the
/// allocated type is kept in the side table for `LowerStructStackAllocation`
/// and the frame-size computation to read back later.
pub fn stack_alloc(ctx: TypeCtx<'_>, func: &mut Function, block: Block, allocated_type: Type) -> Value {
    let result = Value::VReg(func.create_vreg(ctx.types.ptr, None));
    let mut data = InstructionData::new(Opcode::StackAlloc, smallvec![result]);
    data.extra = InstExtra {
        allocated_type: Some(allocated_type),
        ..InstExtra::default()
    };
    func.push_inst(block, data);
    result
}

/// `result = lea <base_type>(base, index)`: `base + index * sizeof(base_type)`.
/// `base` must be `ptr`-typed, `index` an integer.
pub fn lea(
    ctx: TypeCtx<'_>,
    func: &mut Function,
    block: Block,
    base: Value,
    index: Value,
    base_type: Type,
) -> CoreResult<Value> {
    let bty = ctx.value_type(func, base);
    let ity = ctx.value_type(func, index);
    require(ctx.types.is_pointer(bty), "lea: base operand must be a pointer")?;
    require(ctx.types.is_integer(ity), "lea: index operand must be an integer")?;

    let result = Value::VReg(func.create_vreg(ctx.types.ptr, None));
    let mut data = InstructionData::new(Opcode::Lea, smallvec![base, index, result]);
    data.extra = InstExtra {
        base_type: Some(base_type),
        ..InstExtra::default()
    };
    func.push_inst(block, data);
    Ok(result)
}

/// `result = lfa <struct_type, field_index>(base)`: address of one field
/// of the struct `base` points to. `base` must be `ptr`-typed and
/// `field_index` must be in range for `struct_type`.
pub fn lfa(
    ctx: TypeCtx<'_>,
    func: &mut Function,
    block: Block,
    base: Value,
    struct_type: Type,
    field_index: u32,
) -> CoreResult<Value> {
    let bty = ctx.value_type(func, base);
    require(ctx.types.is_pointer(bty), "lfa: base operand must be a pointer")?;
    require(ctx.types.is_struct(struct_type), "lfa: struct_type must be a struct")?;
    let field_count = match ctx.types.data(struct_type) {
        crate::ir::types::TypeData::Struct { fields, .. } => fields.len(),
        _ => unreachable!("checked is_struct above"),
    };
    require(
        (field_index as usize) < field_count,
        format!("lfa: field index {field_index} out of range"),
    )?;

    let result = Value::VReg(func.create_vreg(ctx.types.ptr, None));
    let mut data = InstructionData::new(Opcode::Lfa, smallvec![base, result]);
    data.extra = InstExtra {
        struct_type: Some(struct_type),
        field_index: Some(field_index),
        ..InstExtra::default()
    };
    func.push_inst(block, data);
    Ok(result)
}

/// `cbr(cond, then_block, else_block)`. Terminator; `cond` must be an
/// integer (non-zero is taken).
pub fn cbr(
    ctx: TypeCtx<'_>,
    func: &mut Function,
    block: Block,
    cond: Value,
    then_block: Block,
    else_block: Block,
) -> CoreResult<Inst> {
    let cty = ctx.value_type(func, cond);
    require(ctx.types.is_integer(cty), "cbr: condition must be an integer")?;

    Ok(func.push_inst(
        block,
        InstructionData::new(
            Opcode::Cbr,
            smallvec![cond, Value::Block(then_block), Value::Block(else_block)],
        ),
    ))
}

/// `br(target)`. Unconditional terminator.
pub fn br(func: &mut Function, block: Block, target: Block) -> Inst {
    func.push_inst(block, InstructionData::new(Opcode::Br, smallvec![Value::Block(target)]))
}

/// `ret` / `ret(val)`. Terminator; `None` encodes a void return.
pub fn ret(func: &mut Function, block: Block, val: Option<Value>) -> Inst {
    let operands = match val {
        Some(v) => smallvec![v],
        None => smallvec![],
    };
    func.push_inst(block, InstructionData::new(Opcode::Ret, operands))
}

/// `result? = call <callee>(args...)`. `ret_ty` is `None` for a void
/// call; when present the result vreg is allocated with that type.
pub fn call(func: &mut Function, block: Block, callee: FuncRef, ret_ty: Option<Type>, args: &[Value]) -> Option<Value> {
    let mut operands = smallvec::SmallVec::<[Value; 4]>::new();
    operands.push(Value::Func(callee));
    let result = ret_ty.map(|ty| {
        let v = Value::VReg(func.create_vreg(ty, None));
        operands.push(v);
        v
    });
    operands.extend_from_slice(args);
    func.push_inst(block, InstructionData::new(Opcode::Call, operands));
    result
}

/// `result = set(val)`: single-assignment copy into a fresh vreg sharing
/// `val`'s type (used to give an existing value a new SSA name, e.g. when
/// `Mem2Reg` rewrites a load into a block-argument reference).
pub fn set(ctx: TypeCtx<'_>, func: &mut Function, block: Block, val: Value) -> Value {
    let ty = ctx.value_type(func, val);
    let result = Value::VReg(func.create_vreg(ty, None));
    func.push_inst(block, InstructionData::new(Opcode::Set, smallvec![result, val]));
    result
}

/// `result = cast <kind>(val)` to `to_ty`. `Zext`/`Sext` require an
/// integer source and widen to `to_ty`; `PtrToInt`/`IntToPtr` convert
/// between `ptr` and `i32`.
pub fn cast(
    ctx: TypeCtx<'_>,
    func: &mut Function,
    block: Block,
    kind: CastKind,
    val: Value,
    to_ty: Type,
) -> CoreResult<Value> {
    let from_ty = ctx.value_type(func, val);
    match kind {
        CastKind::Zext | CastKind::Sext => {
            require(ctx.types.is_integer(from_ty), "zext/sext: source must be an integer")?;
            require(ctx.types.is_integer(to_ty), "zext/sext: target must be an integer")?;
            let from_bits = ctx.types.bit_width(from_ty).unwrap_or(0);
            let to_bits = ctx.types.bit_width(to_ty).unwrap_or(0);
            require(to_bits >= from_bits, "zext/sext: target must not be narrower than source")?;
        }
        CastKind::PtrToInt => {
            require(ctx.types.is_pointer(from_ty), "ptrtoint: source must be a pointer")?;
            require(ctx.types.is_integer(to_ty), "ptrtoint: target must be an integer")?;
        }
        CastKind::IntToPtr => {
            require(ctx.types.is_integer(from_ty), "inttoptr: source must be an integer")?;
            require(ctx.types.is_pointer(to_ty), "inttoptr: target must be a pointer")?;
        }
    }

    let result = Value::VReg(func.create_vreg(to_ty, None));
    func.push_inst(block, InstructionData::new(Opcode::Cast(kind), smallvec![val, result]));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::module::Module;

    #[test]
    fn binop_rejects_mismatched_types() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let a = Value::VReg(func.create_vreg(ctx.types.i32, None));
            let c = Value::VReg(func.create_vreg(ctx.types.i64, None));
            let err = binop(ctx, func, b, BinOp::IAdd, a, c).unwrap_err();
            assert!(matches!(err, crate::result::CoreError::InvalidIr(_)));
        });
    }

    #[test]
    fn load_store_roundtrip_builds() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let p = Value::VReg(func.create_vreg(ctx.types.ptr, None));
            let loaded = load(ctx, func, b, p, ctx.types.i32).unwrap();
            store(ctx, func, b, p, loaded).unwrap();
            assert_eq!(func.block(b).insts.len(), 2);
        });
    }

    #[test]
    fn lfa_rejects_out_of_range_field() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        let struct_ty = m.types.named_struct("S", vec![m.types.i32]);
        m.with_function_mut(f, |ctx, func| {
            let b = func.create_block();
            func.append_block(b);
            let p = Value::VReg(func.create_vreg(ctx.types.ptr, None));
            let err = lfa(ctx, func, b, p, struct_ty, 5).unwrap_err();
            assert!(matches!(err, crate::result::CoreError::InvalidIr(_)));
        });
    }
}
