//! The human-readable text IR dump (spec §6 "Text IR format"), used by
//! `--emit-ir-post=<pass>` and by tests that want to assert on IR shape
//! without walking the arena by hand. Not a round-trip format — there is
//! no reader.

use std::fmt::Write as _;

use armcc_entity::EntityRef;

use crate::ir::{
    CastKind, ConstData, Function, GlobalData, InstructionData, Module, Opcode, TypeCtx, Value,
};

/// Render every struct, global and function in `module` (spec §6).
pub fn write_module(module: &Module) -> String {
    let ctx = module.type_ctx();
    let mut out = String::new();

    for r in module.globals() {
        write_global(&mut out, ctx, module.global(r));
    }
    if module.globals().next().is_some() {
        out.push('\n');
    }

    let funcs: Vec<_> = module.functions_iter().collect();
    for (i, (_, func)) in funcs.iter().enumerate() {
        write_function(&mut out, ctx, func);
        if i + 1 < funcs.len() {
            out.push('\n');
        }
    }

    out
}

fn write_global(out: &mut String, ctx: TypeCtx<'_>, g: &GlobalData) {
    let ty = ctx.types.display(g.base_type);
    match g.init {
        Some(init) => {
            let _ = writeln!(out, "@{}:ptr = global {} {}", g.name, ty, operand(ctx, None, init));
        }
        None => {
            let _ = writeln!(out, "@{}:ptr = global {}", g.name, ty);
        }
    }
}

fn write_function(out: &mut String, ctx: TypeCtx<'_>, func: &Function) {
    let params: Vec<String> = func
        .params
        .iter()
        .enumerate()
        .map(|(i, &p)| format!("v{i}:{}", ctx.types.display(ctx.value_type(func, p))))
        .collect();
    let ret = match ctx.types.data(func.sig) {
        crate::ir::TypeData::Function { ret, .. } => ctx.types.display(*ret),
        _ => "?".to_string(),
    };
    let _ = writeln!(out, "function {}({}): {} {{", func.name, params.join(", "), ret);

    for (slot, block) in func.blocks_in_order().enumerate() {
        let _ = writeln!(out, ".{slot}:");
        for &inst in &func.block(block).insts {
            let _ = writeln!(out, "  {}", instruction(ctx, func, func.inst(inst)));
        }
    }

    let _ = writeln!(out, "}}");
}

fn instruction(ctx: TypeCtx<'_>, func: &Function, data: &InstructionData) -> String {
    let ops: Vec<String> = data.operands.iter().map(|&v| operand(ctx, Some(func), v)).collect();
    match data.opcode {
        Opcode::BinOp(op) => format!("{op} {}", ops.join(", ")),
        Opcode::Icmp(cc) => format!("icmp.{} {}", cc.suffix(), ops.join(", ")),
        Opcode::Load => format!("load {}", ops.join(", ")),
        Opcode::Store => format!("store {}", ops.join(", ")),
        Opcode::StackAlloc => {
            let ty = data.extra.allocated_type.map(|t| ctx.types.display(t)).unwrap_or_default();
            format!("stack_alloc {ty} {}", ops.join(", "))
        }
        Opcode::Lea => {
            let ty = data.extra.base_type.map(|t| ctx.types.display(t)).unwrap_or_default();
            format!("lea {ty} {}", ops.join(", "))
        }
        Opcode::Lfa => {
            let ty = data.extra.struct_type.map(|t| ctx.types.display(t)).unwrap_or_default();
            let idx = data.extra.field_index.unwrap_or(0);
            format!("lfa {ty}.{idx} {}", ops.join(", "))
        }
        Opcode::Cbr => format!("cbr {}", ops.join(", ")),
        Opcode::Br => format!("br {}", ops.join(", ")),
        Opcode::Ret => format!("ret {}", ops.join(", ")),
        Opcode::Call => format!("call {}", ops.join(", ")),
        Opcode::Set => format!("set {}", ops.join(", ")),
        Opcode::Cast(kind) => format!("{} [{}]", cast_name(kind), ops.join(" -> ")),
        // MIR opcodes only ever show up after matching; the text dump
        // prints them with their assembly mnemonic for readability.
        _ => format!("{} {}", mir_mnemonic(data.opcode), ops.join(", ")),
    }
}

fn cast_name(kind: CastKind) -> &'static str {
    match kind {
        CastKind::Zext => "zext",
        CastKind::Sext => "sext",
        CastKind::PtrToInt => "ptrtoint",
        CastKind::IntToPtr => "inttoptr",
    }
}

fn mir_mnemonic(op: Opcode) -> &'static str {
    match op {
        Opcode::Mov => "mov",
        Opcode::Movwi => "movw",
        Opcode::Movt => "movt",
        Opcode::MovwGlobalLo16 => "movw_gl16",
        Opcode::MovtGlobalHi16 => "movt_gu16",
        Opcode::Ldr => "ldr",
        Opcode::Ldrb => "ldrb",
        Opcode::Ldrh => "ldrh",
        Opcode::Ldrsb => "ldrsb",
        Opcode::Ldrsh => "ldrsh",
        Opcode::Str => "str",
        Opcode::Strb => "strb",
        Opcode::Strh => "strh",
        Opcode::Cmp => "cmp",
        Opcode::Cmpi => "cmpi",
        Opcode::B => "b",
        Opcode::Bcond(cc) => match cc {
            crate::ir::CondCode::Eq => "beq",
            crate::ir::CondCode::Ne => "bne",
            crate::ir::CondCode::Slt => "blt",
            crate::ir::CondCode::Sle => "ble",
            crate::ir::CondCode::Sgt => "bgt",
            crate::ir::CondCode::Sge => "bge",
        },
        Opcode::MirRet => "ret",
        Opcode::AddR32I32 => "add",
        Opcode::SubR32I32 => "sub",
        Opcode::MulR32I32 => "mul",
        Opcode::SdivR32I32 => "sdiv",
        Opcode::UdivR32I32 => "udiv",
        Opcode::MovCondI(_) => "movcondi",
        Opcode::Movi => "movi",
        Opcode::LdrSpill => "ldr_spill",
        Opcode::StrSpill => "str_spill",
        _ => "?",
    }
}

fn operand(ctx: TypeCtx<'_>, func: Option<&Function>, v: Value) -> String {
    match v {
        Value::VReg(vr) => {
            let name = func.and_then(|f| f.vreg_data(vr).name.clone());
            match name {
                Some(n) => format!("%{n}"),
                None => format!("%{}", vr.index()),
            }
        }
        Value::PReg(r) => format!("{r}"),
        Value::Const(c) => {
            let ConstData::Int { ty, bits } = ctx.const_data(c) else {
                unreachable!("Value::Const always indexes a ConstData::Int");
            };
            format!("{bits}:{}", ctx.types.display(*ty))
        }
        Value::ByteArray(c) | Value::Array(c) | Value::Struct(c) => format!("const{}", c.index()),
        Value::Undef(_) => "undef".to_string(),
        Value::Global(g) => format!("@{}", g.index()),
        Value::Func(f) => format!("@{}", f.index()),
        Value::Block(b) => format!(".{}", b.index()),
    }
}
