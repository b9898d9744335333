//! Liveness, interval construction, and the linear-scan allocator (spec
//! §4.7, §4.8) that assigns every virtual register a physical register
//! or a stack slot.

pub mod interval;
pub mod liveness;
pub mod linear_scan;
