//! Typed error hierarchy for the accelerator driver.
//!
//! Uses `thiserror` for library-grade errors.  Application code should wrap
//! these in `anyhow::Result` at call sites.
//!
//! Every variant maps to a stable integer code via [`HalError::error_code`]
//! for structured telemetry without string parsing.  All variants are fatal
//! for the frame that raised them; conditions the driver recovers from
//! (unknown marking opcodes, unknown descriptor tags, hardware status error
//! bits after a successful poll) are logged, not raised.

use crate::types::PixelFormat;

/// All errors originating from the encode-accelerator driver.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    // ── Format contracts ─────────────────────────────────────────────
    #[error("pixel format {format:?} has no hardware mapping")]
    UnsupportedFormat { format: PixelFormat },

    // ── Device transport ─────────────────────────────────────────────
    #[error("device {stage} failed: {reason}")]
    Dispatch {
        stage: &'static str,
        reason: String,
    },

    // ── Buffers ──────────────────────────────────────────────────────
    #[error("hardware buffer allocation of {size} bytes failed: {reason}")]
    Alloc { size: usize, reason: String },

    // ── Session state ────────────────────────────────────────────────
    #[error("no {0} syntax received before register synthesis")]
    MissingSyntax(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HalError {
    /// Stable integer error code for structured telemetry.
    ///
    /// Codes are grouped by category:
    /// - 1xx: format contracts
    /// - 2xx: device transport
    /// - 3xx: buffers
    /// - 4xx: session state
    pub fn error_code(&self) -> u32 {
        match self {
            Self::UnsupportedFormat { .. } => 100,
            Self::Dispatch { .. } => 200,
            Self::Alloc { .. } => 300,
            Self::MissingSyntax(_) => 400,
            Self::InvalidConfig(_) => 401,
        }
    }

    /// Shorthand for a transport failure at a named stage.
    pub fn dispatch(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Dispatch {
            stage,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the driver crates.
pub type Result<T> = std::result::Result<T, HalError>;
