//! The in-memory IR: types, values, instructions, blocks, functions, and
//! the module that owns them all (spec §3).

pub mod block;
pub mod builder;
pub mod entities;
pub mod function;
pub mod instructions;
pub mod module;
pub mod types;
pub mod value;

pub use block::BlockData;
pub use entities::{Block, Inst};
pub use function::Function;
pub use instructions::{
    block_operand, BinOp, CastKind, CondCode, InstExtra, InstructionData, Opcode, OperandFlag,
};
pub use module::{GlobalData, Module, TypeCtx};
pub use types::{Type, TypeData, TypeInterner};
pub use value::{
    ConstData, ConstRef, FuncRef, GlobalRef, PReg, UndefRef, Use, VReg, VRegData, VRegTable, Value,
};
