//! Entity indices for instructions and basic blocks.
//!
//! Split out from `instructions.rs`/`block.rs` so both (and `value.rs`,
//! which needs `Inst`/`Block` for `Use`/`Value::Block`) can depend on
//! these tiny `Copy` index types without a module cycle.

use armcc_entity::entity_impl;

/// An instruction, indexing into a `Function`'s instruction arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "i");

/// A basic block, indexing into a `Function`'s block arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "bb");
