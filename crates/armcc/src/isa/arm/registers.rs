//! The ARMv7 physical register file and the fixed allocatable pool
//! (spec §5: "the physical-register table...process-global, initialised
//! once at start-up").
//!
//! Pool composition is an Open Question the spec leaves to the
//! implementation (spec §9): callers in the corpus this was modelled on
//! assume callee-saved only, so the pool here is the five callee-saved
//! registers `r4`-`r8`. `r0`-`r3` stay reserved for argument/return
//! passing (`CConv` targets `r0` directly), `r9` is left unused, `r10`/
//! `r11`/`sp`/`lr`/`pc` are frame/control registers the emitter's
//! prologue already names explicitly.

use crate::ir::PReg;

pub const R0: PReg = PReg::new(0);
pub const R1: PReg = PReg::new(1);
pub const R2: PReg = PReg::new(2);
pub const R3: PReg = PReg::new(3);
pub const R4: PReg = PReg::new(4);
pub const R5: PReg = PReg::new(5);
pub const R6: PReg = PReg::new(6);
pub const R7: PReg = PReg::new(7);
pub const R8: PReg = PReg::new(8);
pub const R9: PReg = PReg::new(9);
pub const R10: PReg = PReg::new(10);
pub const R11: PReg = PReg::new(11);
pub const SP: PReg = PReg::new(13);
pub const LR: PReg = PReg::new(14);
pub const PC: PReg = PReg::new(15);

/// The pool `LinearScan` draws from, in allocation-preference order.
pub const ALLOCATABLE: [PReg; 5] = [R4, R5, R6, R7, R8];

/// Registers the prologue pushes and the epilogue pops (spec §4.10),
/// regardless of whether `LinearScan` actually used all of them this
/// function — a fixed frame shape keeps the emitter simple.
pub const CALLEE_SAVED_FRAME: [PReg; 8] = [R4, R5, R6, R7, R8, R10, R11, LR];
