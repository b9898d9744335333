//! Core error kinds (spec §7).
//!
//! `FrontendError` is deliberately absent: the front end that builds
//! HLIR is out of scope (spec §1), and by the time a `Module` reaches
//! this crate it is assumed to satisfy the front-end contract (spec
//! §6). What's left for `CoreError` to name is everything the core
//! itself can observe going wrong.

use std::path::PathBuf;

/// Where in the IR a [`CoreError::InvalidIr`] was raised, for error
/// messages that point at a specific instruction.
#[derive(Clone, Debug, Default)]
pub struct IrLocation {
    pub function: Option<String>,
    pub block: Option<String>,
    pub detail: String,
}

impl std::fmt::Display for IrLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.function, &self.block) {
            (Some(func), Some(block)) => write!(f, "{func}/{block}: {}", self.detail),
            (Some(func), None) => write!(f, "{func}: {}", self.detail),
            _ => write!(f, "{}", self.detail),
        }
    }
}

/// The core's fatal error kinds (spec §7): an invariant violation, a
/// deliberately-rejected construct, or an I/O failure opening the
/// assembly output file.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// An IR invariant (operand type match, terminator presence,
    /// use-list consistency, ...) was violated. Unrecoverable: the
    /// pipeline stops at the pass boundary that detected it.
    #[error("invalid IR: {0}")]
    InvalidIr(IrLocation),

    /// A construct the core deliberately rejects: a return value larger
    /// than 4 bytes reaching `CConv`, a non-32-bit constant reaching
    /// `ArmSplitConstants`, or a machine mode the matcher doesn't
    /// recognise.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// Failed to open the assembly output file.
    #[error("failed to open output file {path}: {source}")]
    BadIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Build an `InvalidIr` error with just a detail message (the common
/// case; callers that have function/block context can fill those fields
/// in afterwards).
pub fn invalid_ir(detail: impl Into<String>) -> CoreError {
    CoreError::InvalidIr(IrLocation {
        function: None,
        block: None,
        detail: detail.into(),
    })
}
