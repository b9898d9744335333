//! Instructions: opcode plus operand vector plus per-index flags (spec §3/§4.1).
//!
//! HLIR and MIR opcodes live in the same enum but are never legal to mix
//! within one function at the same time: HLIR is legalised/lowered away
//! entirely before [`crate::isa::arm::matcher`] introduces any MIR
//! opcode (spec §2's fixed pipeline order enforces this).

use smallvec::SmallVec;
use std::fmt;

use crate::ir::types::Type;
use crate::ir::value::Value;
use crate::ir::Block;

/// Binary arithmetic kind for [`Opcode::BinOp`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BinOp {
    IAdd,
    ISub,
    IMul,
    IDivS,
    IDivU,
    IRemS,
    IRemU,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::IAdd => "iadd",
            BinOp::ISub => "isub",
            BinOp::IMul => "imul",
            BinOp::IDivS => "idivs",
            BinOp::IDivU => "idivu",
            BinOp::IRemS => "irems",
            BinOp::IRemU => "iremu",
        };
        write!(f, "{s}")
    }
}

/// Integer comparison condition, shared between HLIR `icmp` and the MIR
/// `cmp`/`b<cond>` family the matcher produces from it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CondCode {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CondCode {
    /// The ARM branch-suffix mnemonic, e.g. `beq`.
    pub fn suffix(self) -> &'static str {
        match self {
            CondCode::Eq => "eq",
            CondCode::Ne => "ne",
            CondCode::Slt => "lt",
            CondCode::Sle => "le",
            CondCode::Sgt => "gt",
            CondCode::Sge => "ge",
        }
    }

    pub fn negate(self) -> CondCode {
        match self {
            CondCode::Eq => CondCode::Ne,
            CondCode::Ne => CondCode::Eq,
            CondCode::Slt => CondCode::Sge,
            CondCode::Sle => CondCode::Sgt,
            CondCode::Sgt => CondCode::Sle,
            CondCode::Sge => CondCode::Slt,
        }
    }
}

/// Zero/sign-extend and pointer/integer reinterpretation casts.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CastKind {
    Zext,
    Sext,
    PtrToInt,
    IntToPtr,
}

/// The opcode of an [`InstructionData`]. HLIR opcodes are target-neutral;
/// MIR opcodes name one ARMv7 instruction (or, for `MovwMovt`, a fixed
/// two-instruction idiom materialising a 32-bit constant/address) each.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Opcode {
    // ---- HLIR ----
    BinOp(BinOp),
    Icmp(CondCode),
    Load,
    Store,
    StackAlloc,
    /// load-effective-address: `base_type` lives in `InstructionData::base_type`.
    Lea,
    /// load-field-address: `struct_type`/`field_index` live in the side table.
    Lfa,
    Cbr,
    Br,
    Ret,
    Call,
    /// SSA-style single assignment into a virtual register.
    Set,
    Cast(CastKind),

    // ---- MIR (ARMv7) ----
    /// `mov dst, src` — plain register-to-register copy, the lowering of
    /// a residual HLIR `set` and of `ptrtoint`/`inttoptr` on a non-global
    /// value (a pointer and an `i32` share the same register class).
    Mov,
    /// `movw dst, #lo16` — the low half of a plain (non-global) 32-bit
    /// constant; the immediate lives in `InstExtra::imm`.
    Movwi,
    /// `movt dst, #hi16` — the high half, pairs with `Movwi` or with
    /// `MovwGlobalLo16` depending on what's being materialised.
    Movt,
    /// Materialise a 32-bit global address: `movw_gl16` + `movt_gu16` pair
    /// folded into one MIR op for the purposes of this IR (the printer
    /// still emits both lines, spec §4.9).
    MovwGlobalLo16,
    MovtGlobalHi16,
    Ldr,
    Ldrb,
    Ldrh,
    Ldrsb,
    Ldrsh,
    Str,
    Strb,
    Strh,
    Cmp,
    Cmpi,
    B,
    Bcond(CondCode),
    MirRet,
    /// `add`: two shapes share this opcode. Three operands `[dst, lhs,
    /// rhs]` is the register-register form the matcher emits for HLIR
    /// `iadd`. Two operands `[dst, src]` plus `InstExtra::imm` is the
    /// register-immediate form `LinearScan` emits, for both the
    /// stack-pointer-adjustment idiom (`add sp, sp, #size`, `dst == src
    /// == sp`) and spill-slot address computation (`add r9, sp,
    /// #offset`, `dst != src`).
    AddR32I32,
    /// `sub`, same two shapes as `AddR32I32`.
    SubR32I32,
    /// `mul dst, lhs, rhs` — register-register form only.
    MulR32I32,
    /// `sdiv dst, lhs, rhs` — register-register form only.
    SdivR32I32,
    /// `udiv dst, lhs, rhs` — register-register form only.
    UdivR32I32,
    /// `movi`/`movweqi`-style: move an immediate into `dst` predicated on
    /// a condition (used by unfused `icmp` lowering, spec §4.9).
    MovCondI(CondCode),
    Movi,
    /// `ldr r9, [sp, #off]` — reload a spilled virtual register into the
    /// reserved scratch register `r9` ahead of the instruction that
    /// reads it. `InstExtra::imm` carries the stack-slot offset.
    LdrSpill,
    /// `str r9, [sp, #off]` — spill `r9` to its stack slot right after
    /// the instruction that defined it.
    StrSpill,
}

/// Read/write classification of one operand index, used by liveness and
/// def/use analysis (spec §3 "Instruction").
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum OperandFlag {
    Read,
    Write,
    None,
}

/// Extra per-opcode data that doesn't fit the uniform operand vector:
/// the allocated type of a `stack_alloc`, the base type of a `lea`, and
/// the struct type/field index of an `lfa`. Kept out-of-line in a side
/// table (spec Design Notes) rather than as enum-variant fields so every
/// `InstructionData` has the same shape.
#[derive(Clone, Debug, Default)]
pub struct InstExtra {
    pub allocated_type: Option<Type>,
    pub base_type: Option<Type>,
    pub struct_type: Option<Type>,
    pub field_index: Option<u32>,
    /// A raw target-level immediate: `movw`/`movt`/`movi` halves, the
    /// `#1` of `cmpi`, the frame size of `AddR32I32`/`SubR32I32`'s
    /// stack-pointer adjustment. Not an interned `ConstantInt` — these
    /// are ABI/encoding literals the matcher and register allocator
    /// mint directly, never subject to `ConstantHoisting` (which has
    /// already run by the time any of these opcodes exist).
    pub imm: Option<i64>,
}

/// An instruction: opcode, operand vector, a debug comment, and extra
/// side-table data. The parent-block back-pointer lives on the owning
/// `Function`'s layout rather than here (spec's `BasicBlock` "intrusive
/// sequence"), since the instruction itself is stored *in* the block's
/// arena slot.
#[derive(Clone, Debug)]
pub struct InstructionData {
    pub opcode: Opcode,
    pub operands: SmallVec<[Value; 4]>,
    pub comment: Option<String>,
    pub extra: InstExtra,
}

impl InstructionData {
    pub fn new(opcode: Opcode, operands: SmallVec<[Value; 4]>) -> Self {
        Self {
            opcode,
            operands,
            comment: None,
            extra: InstExtra::default(),
        }
    }

    /// True if this instruction can end a basic block (spec §8 property 2).
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.opcode,
            Opcode::Br | Opcode::Cbr | Opcode::Ret | Opcode::B | Opcode::Bcond(_) | Opcode::MirRet
        )
    }

    /// Does this opcode have a side effect that DCE must never remove
    /// regardless of whether its result (if any) is read? Stores, calls
    /// and terminators qualify; `stack_alloc` does not — an unread,
    /// unstored-through slot is exactly as dead as any other unread
    /// write, so DCE's ordinary use-count check is left to decide it.
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self.opcode,
            Opcode::Store
                | Opcode::Call
                | Opcode::Br
                | Opcode::Cbr
                | Opcode::Ret
                | Opcode::B
                | Opcode::Bcond(_)
                | Opcode::MirRet
                | Opcode::StrSpill
        )
    }

    /// Per-operand read/write flags (spec §4.1 table). `call`'s shape is
    /// `[callee, ret?, params...]`; the first is always read, the
    /// (optional) second is the write slot, the rest are reads.
    pub fn operand_flags(&self, index: usize) -> OperandFlag {
        use Opcode::*;
        match self.opcode {
            BinOp(_) => match index {
                0 | 1 => OperandFlag::Read,
                2 => OperandFlag::Write,
                _ => OperandFlag::None,
            },
            Icmp(_) => match index {
                0 | 1 => OperandFlag::Read,
                2 => OperandFlag::Write,
                _ => OperandFlag::None,
            },
            Load => match index {
                0 => OperandFlag::Read,
                1 => OperandFlag::Write,
                _ => OperandFlag::None,
            },
            Store => match index {
                0 | 1 => OperandFlag::Read,
                _ => OperandFlag::None,
            },
            StackAlloc => match index {
                0 => OperandFlag::Write,
                _ => OperandFlag::None,
            },
            Lea => match index {
                0 | 1 => OperandFlag::Read,
                2 => OperandFlag::Write,
                _ => OperandFlag::None,
            },
            Lfa => match index {
                0 => OperandFlag::Read,
                1 => OperandFlag::Write,
                _ => OperandFlag::None,
            },
            Cbr => OperandFlag::Read,
            Br => OperandFlag::Read,
            Ret => OperandFlag::Read,
            Call => {
                if index == 0 {
                    OperandFlag::Read
                } else if index == 1 {
                    OperandFlag::Write
                } else {
                    OperandFlag::Read
                }
            }
            Set => match index {
                0 => OperandFlag::Write,
                1 => OperandFlag::Read,
                _ => OperandFlag::None,
            },
            Cast(_) => match index {
                0 => OperandFlag::Read,
                1 => OperandFlag::Write,
                _ => OperandFlag::None,
            },
            // MIR: dst is operand 0 (when present), the rest are sources.
            Mov | Movt | MovwGlobalLo16 | MovtGlobalHi16 | Movwi | Movi | MovCondI(_) => match index {
                0 => OperandFlag::Write,
                _ => OperandFlag::Read,
            },
            Ldr | Ldrb | Ldrh | Ldrsb | Ldrsh => match index {
                0 => OperandFlag::Write,
                _ => OperandFlag::Read,
            },
            Str | Strb | Strh => OperandFlag::Read,
            Cmp | Cmpi => OperandFlag::Read,
            B | Bcond(_) => OperandFlag::Read,
            MirRet => OperandFlag::Read,
            AddR32I32 | SubR32I32 | MulR32I32 | SdivR32I32 | UdivR32I32 => match index {
                0 => OperandFlag::Write,
                _ => OperandFlag::Read,
            },
            LdrSpill => OperandFlag::Write,
            StrSpill => OperandFlag::Read,
        }
    }
}

/// A basic block's branch target, wrapping the block so it can be used
/// as an ordinary `Value` operand (spec §3 `BlockBranchTarget`).
pub fn block_operand(b: Block) -> Value {
    Value::Block(b)
}
