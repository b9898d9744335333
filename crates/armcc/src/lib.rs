//! Ahead-of-time compiler back end: lowers a fully-typed, SSA-style IR
//! into ARMv7 textual assembly through a fixed pipeline of legalisation,
//! optimisation, instruction selection and linear-scan register
//! allocation.
//!
//! This crate is a library only — it has no front end and no CLI. A
//! caller builds a [`ir::Module`] (directly, or through
//! [`ir::builder`]), hands it to [`pass::run_pipeline`], then prints the
//! result with [`emit::write_assembly`]/[`emit::emit_to_path`].

pub mod abi;
pub mod cursor;
pub mod emit;
pub mod flowgraph;
pub mod genlower;
pub mod ir;
pub mod isa;
pub mod legalize;
pub mod opt;
pub mod pass;
pub mod regalloc;
pub mod result;
pub mod verify;
pub mod write;

pub use crate::ir::{Function, Module};
pub use crate::pass::{run_pipeline, PipelineOptions};
pub use crate::result::{CoreError, CoreResult};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
