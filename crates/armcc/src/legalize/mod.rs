//! Legalisation: rewrite HLIR so every later pass can assume a narrower,
//! simpler input (spec §4.3).

pub mod generic_legalizer;
pub mod legalize_structs;
pub mod lower_struct_alloc;
