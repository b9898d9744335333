//! Optimisation passes that run between legalisation and ABI lowering
//! (spec §4.5, §4.6).

pub mod constant_hoisting;
pub mod dce;
pub mod mem2reg;
pub mod peephole;
pub mod return_combine;
pub mod scp;
