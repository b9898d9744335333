//! Assembly emission (spec §4.10): walks the module one last time and
//! prints plain GNU-syntax ARMv7 text. By this point every function
//! carries only MIR opcodes and every operand is either a `PReg`, an
//! immediate, or a branch target — there is nothing left to pattern
//! match, only a mnemonic and its operands to print.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use armcc_entity::EntityRef;

use crate::ir::{ConstData, GlobalData, Module, Opcode, TypeData, Value};
use crate::isa::arm::registers;
use crate::result::{CoreError, CoreResult};

/// Pick the directive a global's base type (or, for a string byte
/// array, its contents) is emitted under (spec §10.5, `emit.cpp`'s
/// `GetAssemblyDirectiveForType`/`GetAssemblyDirectiveForValue`).
fn directive_for_type(module: &Module, ty: crate::ir::Type) -> &'static str {
    match module.types.data(ty) {
        TypeData::Pointer => "4byte",
        TypeData::Integer { bits: 8 } => "byte",
        TypeData::Integer { bits: 16 } => "2byte",
        TypeData::Integer { bits: 32 } => "4byte",
        TypeData::Integer { bits: 64 } => "8byte",
        TypeData::Array { element, .. } => directive_for_type(module, *element),
        _ => unreachable!("no assembly directive for a type with no in-memory representation"),
    }
}

/// Print one global-initialiser value. `ByteArray` always stands for a
/// string literal (spec §10.5): the front end materialises every string
/// as `Array(i8, N+1)` with an explicit trailing NUL already present in
/// `bytes`, so it's printed as-is rather than appended again.
fn emit_data_directive(out: &mut String, module: &Module, v: Value) {
    match v {
        Value::Const(c) => {
            let ConstData::Int { ty, bits } = module.const_data(c) else {
                unreachable!("Value::Const always indexes ConstData::Int");
            };
            out.push_str(&format!("\t.{} {}\n", directive_for_type(module, *ty), bits));
        }
        Value::ByteArray(c) => {
            let ConstData::ByteArray { bytes, .. } = module.const_data(c) else {
                unreachable!("Value::ByteArray always indexes ConstData::ByteArray");
            };
            out.push_str("\t.ascii \"");
            for &b in bytes {
                if b.is_ascii_graphic() || b == b' ' {
                    out.push(b as char);
                } else {
                    out.push_str(&format!("\\{b:x}"));
                }
            }
            out.push_str("\"\n");
        }
        Value::Array(c) => {
            let ConstData::Array { elements, .. } = module.const_data(c) else {
                unreachable!("Value::Array always indexes ConstData::Array");
            };
            for &elem in elements {
                emit_data_directive(out, module, elem);
            }
        }
        Value::Struct(c) => {
            let ConstData::Struct { fields, .. } = module.const_data(c) else {
                unreachable!("Value::Struct always indexes ConstData::Struct");
            };
            for &field in fields {
                emit_data_directive(out, module, field);
            }
        }
        Value::Global(g) => {
            out.push_str(&format!("\t.4byte {}\n", module.global(g).name));
        }
        _ => unreachable!("global initialiser is always a scalar/array/struct constant or a global address"),
    }
}

/// Render `module` as GNU-syntax ARMv7 assembly.
pub fn write_assembly(module: &Module) -> String {
    let mut out = String::new();

    out.push_str(".section .data\n");
    for g in module.globals() {
        let data = module.global(g);
        out.push_str(&format!("{}:\n", data.name));
        match data.init {
            Some(init) => emit_data_directive(&mut out, module, init),
            None => {
                out.push_str(&format!("\t.space {}\n", module.types.size_of(data.base_type)));
            }
        }
    }

    out.push_str(".text\n");
    for (_, func) in module.functions_iter() {
        if func.entry_block().is_none() {
            out.push_str(&format!(".globl {}\n", func.name));
            continue;
        }

        out.push_str(&format!(".globl {}\n{}:\n", func.name, func.name));
        out.push_str(&format!(
            "\tpush {{{}}}\n",
            registers::CALLEE_SAVED_FRAME.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
        ));
        out.push_str("\tmov r11, sp\n");

        for (slot, block) in func.blocks_in_order().enumerate() {
            out.push_str(&format!(".bb{slot}:\n"));
            for &inst in &func.block(block).insts {
                emit_instruction(&mut out, module, func.inst(inst));
            }
        }
    }

    out
}

fn emit_instruction(out: &mut String, module: &Module, data: &crate::ir::InstructionData) {
    match data.opcode {
        Opcode::MirRet => {
            out.push_str("\tmov sp, r11\n");
            out.push_str(&format!(
                "\tpop {{{}}}\n",
                registers::CALLEE_SAVED_FRAME.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
            ));
            out.push_str("\tbx lr\n");
            return;
        }
        Opcode::B => {
            out.push_str(&format!("\tb {}\n", block_label(data.operands[0])));
            return;
        }
        Opcode::Bcond(cc) => {
            out.push_str(&format!("\tb{} {}\n", cc.suffix(), block_label(data.operands[0])));
            return;
        }
        Opcode::MovwGlobalLo16 => {
            out.push_str(&format!(
                "\tmovw {}, :lower16:{}\n",
                reg_operand(data.operands[0]),
                global_name(module, data.operands[1])
            ));
            return;
        }
        Opcode::MovtGlobalHi16 => {
            out.push_str(&format!(
                "\tmovt {}, :upper16:{}\n",
                reg_operand(data.operands[0]),
                global_name(module, data.operands[1])
            ));
            return;
        }
        _ => {}
    }

    let mnemonic = mnemonic(data.opcode);
    let mut ops: Vec<String> = data.operands.iter().map(|&v| reg_operand(v)).collect();
    if let Some(imm) = data.extra.imm {
        match data.opcode {
            Opcode::LdrSpill | Opcode::StrSpill => {
                ops = vec!["r9".to_string(), format!("[sp, #{imm}]")];
            }
            Opcode::Movwi | Opcode::Movt | Opcode::Movi | Opcode::MovCondI(_) | Opcode::Cmpi => {
                ops.push(format!("#{imm}"));
            }
            Opcode::AddR32I32 | Opcode::SubR32I32 if ops.len() == 2 => {
                ops.push(format!("#{imm}"));
            }
            _ => {}
        }
    }
    out.push_str(&format!("\t{mnemonic} {}\n", ops.join(", ")));
}

fn block_label(v: Value) -> String {
    match v {
        Value::Block(b) => format!(".bb{}", b.index()),
        _ => unreachable!("branch target is always a block"),
    }
}

fn global_name(module: &Module, v: Value) -> String {
    match v {
        Value::Global(g) => module.global(g).name.clone(),
        _ => unreachable!("global address operand is always Value::Global"),
    }
}

fn reg_operand(v: Value) -> String {
    match v {
        Value::PReg(r) => r.to_string(),
        other => unreachable!("MIR register operand {other:?} has no ARM register rendering"),
    }
}

fn mnemonic(op: Opcode) -> &'static str {
    match op {
        Opcode::Mov => "mov",
        Opcode::Movwi => "movw",
        Opcode::Movt => "movt",
        Opcode::Ldr => "ldr",
        Opcode::Ldrb => "ldrb",
        Opcode::Ldrh => "ldrh",
        Opcode::Ldrsb => "ldrsb",
        Opcode::Ldrsh => "ldrsh",
        Opcode::Str => "str",
        Opcode::Strb => "strb",
        Opcode::Strh => "strh",
        Opcode::Cmp | Opcode::Cmpi => "cmp",
        Opcode::AddR32I32 => "add",
        Opcode::SubR32I32 => "sub",
        Opcode::MulR32I32 => "mul",
        Opcode::SdivR32I32 => "sdiv",
        Opcode::UdivR32I32 => "udiv",
        Opcode::MovCondI(cc) => match cc {
            crate::ir::CondCode::Eq => "moveq",
            crate::ir::CondCode::Ne => "movne",
            crate::ir::CondCode::Slt => "movlt",
            crate::ir::CondCode::Sle => "movle",
            crate::ir::CondCode::Sgt => "movgt",
            crate::ir::CondCode::Sge => "movge",
        },
        Opcode::Movi => "mov",
        Opcode::LdrSpill => "ldr",
        Opcode::StrSpill => "str",
        _ => unreachable!("opcode {op:?} has a bespoke printer and never reaches the generic mnemonic table"),
    }
}

/// Write `module`'s assembly to `path`, or to standard output if `path`
/// is `-` (spec §4.10).
pub fn emit_to_path(module: &Module, path: &Path) -> CoreResult<()> {
    let text = write_assembly(module);
    if path.as_os_str() == "-" {
        io::stdout().write_all(text.as_bytes()).map_err(|source| CoreError::BadIo { path: path.to_path_buf(), source })?;
        return Ok(());
    }
    let mut file = File::create(path).map_err(|source| CoreError::BadIo { path: path.to_path_buf(), source })?;
    file.write_all(text.as_bytes()).map_err(|source| CoreError::BadIo { path: path.to_path_buf(), source })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Value};

    #[test]
    fn emits_prologue_and_epilogue_around_a_bare_return() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |_ctx, func| {
            let blk = func.create_block();
            func.append_block(blk);
            func.push_inst(blk, crate::ir::InstructionData::new(Opcode::MirRet, smallvec::smallvec![]));
        });

        let asm = write_assembly(&m);
        assert!(asm.contains(".globl f\nf:\n"));
        assert!(asm.contains("push {r4, r5, r6, r7, r8, r10, r11, lr}"));
        assert!(asm.contains("bx lr"));
    }

    #[test]
    fn emits_space_directive_for_uninitialised_global() {
        let mut m = Module::new("t.c");
        let i32ty = m.types.i32;
        m.declare_global(GlobalData { name: "counter".into(), base_type: i32ty, init: None });
        let asm = write_assembly(&m);
        assert!(asm.contains("counter:\n\t.space 4\n"));
    }

    #[test]
    fn emits_ascii_directive_for_string_global() {
        let mut m = Module::new("t.c");
        let i8ty = m.types.i8;
        let arr_ty = m.types.array(i8ty, 4);
        let s = m.const_byte_array(arr_ty, b"hi\0\0".to_vec());
        m.declare_global(GlobalData { name: "msg".into(), base_type: arr_ty, init: Some(s) });
        let asm = write_assembly(&m);
        assert!(asm.contains(".ascii \"hi"));
    }

    #[test]
    fn branch_targets_print_as_block_labels() {
        let mut m = Module::new("t.c");
        let sig = m.types.function(m.types.void, vec![]);
        let f = m.declare_function(Function::new("f", sig));
        m.with_function_mut(f, |_ctx, func| {
            let entry = func.create_block();
            let target = func.create_block();
            func.append_block(entry);
            func.append_block(target);
            func.push_inst(entry, crate::ir::InstructionData::new(Opcode::B, smallvec::smallvec![Value::Block(target)]));
            func.push_inst(target, crate::ir::InstructionData::new(Opcode::MirRet, smallvec::smallvec![]));
        });

        let asm = write_assembly(&m);
        assert!(asm.contains("b .bb1"));
    }
}
