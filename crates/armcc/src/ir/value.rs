//! Values: everything that can appear as an instruction operand (spec §3 "Value").
//!
//! A [`Value`] is a small `Copy` key, not a pointer: virtual/physical
//! registers index into per-function/process-wide tables, constants and
//! globals index into per-module interned tables. Use-lists (spec's
//! "every value exposes `uses()`") are kept alongside each owning arena
//! rather than inside the `Value` itself, so `Value` stays cheap to pass
//! around and compare.

use armcc_entity::{entity_impl, PrimaryMap};
use std::fmt;

use crate::ir::types::Type;
use crate::ir::{Block, Inst};

/// A virtual register: a fresh, un-interned SSA-ish name, local to one
/// [`crate::ir::Function`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VReg(u32);
entity_impl!(VReg, "v");

/// A physical ARM register (`r0`..`r15`). Interned: the same id always
/// maps to the same [`PReg`], drawn from the process-wide register table
/// (spec §5: "the physical-register table...process-global, initialised
/// once at start-up").
///
/// Wraps `u8`, not `u32` like every other entity here (only 16 registers
/// ever exist), so it implements `EntityRef` by hand rather than through
/// `entity_impl!`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PReg(u8);

impl PReg {
    pub const fn new(id: u8) -> Self {
        debug_assert!(id < 16);
        PReg(id)
    }

    pub fn id(self) -> u8 {
        self.0
    }
}

impl armcc_entity::EntityRef for PReg {
    fn new(index: usize) -> Self {
        PReg::new(index as u8)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Display for PReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A reference to an interned `ConstantInt`, unique per `(Type, value)`
/// (spec §8 property 3).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstRef(u32);
entity_impl!(ConstRef, "c");

/// A reference to an interned `UndefValue`, unique per `Type`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UndefRef(u32);
entity_impl!(UndefRef, "undef");

/// A reference to a module-level global variable.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalRef(u32);
entity_impl!(GlobalRef, "g");

/// A reference to a module-level function (used when a `call` or
/// `ptrtoint`-of-function-address needs a value operand).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncRef(u32);
entity_impl!(FuncRef, "fn");

/// Any of the value variants the spec's Value ADT names, stored as a
/// compact `Copy` key into the appropriate arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    VReg(VReg),
    PReg(PReg),
    Const(ConstRef),
    ByteArray(ConstRef),
    Array(ConstRef),
    Struct(ConstRef),
    Undef(UndefRef),
    Global(GlobalRef),
    Func(FuncRef),
    /// A `BlockBranchTarget`: wraps a basic block so branch instructions
    /// can reference it as an ordinary operand.
    Block(Block),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::VReg(v) => write!(f, "{v:?}"),
            Value::PReg(r) => write!(f, "{r:?}"),
            Value::Const(c) | Value::ByteArray(c) | Value::Array(c) | Value::Struct(c) => {
                write!(f, "{c:?}")
            }
            Value::Undef(u) => write!(f, "{u:?}"),
            Value::Global(g) => write!(f, "{g:?}"),
            Value::Func(fr) => write!(f, "{fr:?}"),
            Value::Block(b) => write!(f, ".{b:?}"),
        }
    }
}

/// Data behind a [`VReg`]: its type and an optional debug name.
#[derive(Clone, Debug)]
pub struct VRegData {
    pub ty: Type,
    pub name: Option<String>,
}

/// Data behind a [`ConstRef`]. `ConstantByteArray`/`ConstantArray`/
/// `ConstantStruct` share the ref-space (tag carried by `Value`) since
/// they're all "aggregate or scalar constant with a type", but their
/// payloads differ.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstData {
    Int { ty: Type, bits: i64 },
    ByteArray { ty: Type, bytes: Vec<u8> },
    Array { ty: Type, elements: Vec<Value> },
    Struct { ty: Type, fields: Vec<Value> },
}

impl ConstData {
    pub fn ty(&self) -> Type {
        match self {
            ConstData::Int { ty, .. }
            | ConstData::ByteArray { ty, .. }
            | ConstData::Array { ty, .. }
            | ConstData::Struct { ty, .. } => *ty,
        }
    }
}

/// A use of a value: the instruction and operand index that reads it
/// (spec §3 "Use"). Maintained automatically by
/// [`crate::ir::function::Function::set_operand`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Use {
    pub inst: Inst,
    pub operand: u16,
}

/// Per-function arena of virtual register data, paired with its own
/// `next id` bookkeeping via `PrimaryMap::push`.
pub type VRegTable = PrimaryMap<VReg, VRegData>;
