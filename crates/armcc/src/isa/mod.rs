//! Target-specific lowering: everything downstream of `CConv` that
//! knows it is generating ARMv7 (spec §4.9, §4.10).

pub mod arm;
