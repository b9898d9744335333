//! ARMv7 target backend: physical registers, instruction selection, and
//! constant splitting (spec §4.9, §5).

pub mod matcher;
pub mod registers;
pub mod split_constants;
