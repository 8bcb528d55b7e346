// In: src/error.rs

//! This module defines the single, unified error type for the entire cctf library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! All variants are non-retryable structural errors: they indicate programmer or
//! data-corruption faults, never transient conditions. There is no partial-success
//! mode anywhere in the crate; callers must treat any failure as terminal for the
//! record being processed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CctfError {
    // =========================================================================
    // === Layout-stage errors
    // =========================================================================
    /// The flat-region size computed from the counters does not fit the
    /// addressable size type.
    #[error("flat layout size overflows the addressable range: {0}")]
    LayoutOverflow(String),

    /// A caller-provided buffer is shorter than the layout requires.
    #[error("buffer too small: layout needs {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    // =========================================================================
    // === Codec-stage errors
    // =========================================================================
    /// The container carries a version tag this build does not recognize.
    /// Unknown tags are a hard failure, never a best-effort decode.
    #[error("unsupported container version tag: {0:#06x}")]
    UnsupportedVersion(u16),

    /// A coded stream cannot be decoded to the length implied by its counters,
    /// or its framing/frequency table is inconsistent.
    #[error("corrupt coded stream: {0}")]
    CorruptStream(String),

    /// The layout derived during decode disagrees with the counters the
    /// container declares.
    #[error("counter mismatch: {0}")]
    CounterMismatch(String),

    // =========================================================================
    // === Kernel & ambient errors
    // =========================================================================
    #[error("bitpack encoding error: value {0} exceeds bit width {1}")]
    BitpackEncode(u64, u8),

    /// An error from a safe byte-casting operation failing.
    #[error("byte slice casting error: {0}")]
    PodCast(String),

    #[error("no such entry in store: {0}")]
    EntryNotFound(String),

    #[error("internal logic error (this is a bug): {0}")]
    Internal(String),
}

// Manual `From` impl is needed as bytemuck::PodCastError doesn't impl Error.
impl From<bytemuck::PodCastError> for CctfError {
    fn from(err: bytemuck::PodCastError) -> Self {
        CctfError::PodCast(err.to_string())
    }
}
