//! Compiler-wide error type, following the error-enum-plus-`?` style the
//! teacher crates use (`cranelift-wasm::environ::WasmError`,
//! `cranelift-codegen::CodegenError`) rather than the source's
//! exception-and-longjmp pattern (`spec.md` §9, "Exception-style
//! failure").

use thiserror::Error;

/// The three failure categories of `spec.md` §7 (`SPEC_FULL.md` §4.7):
/// invalid input, resource exhaustion, and an internal invariant
/// violation promoted from a `debug_assert!` that would otherwise abort
/// the process in a debug build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Invalid IL: operand-stack underflow, an out-of-range branch
    /// target, an opcode used in a context that violates the type
    /// system, or an unsupported constant. Maps to `BADCODE`.
    #[error("invalid IL at offset {il_offset}: {reason}")]
    BadCode { il_offset: u32, reason: String },

    /// The method-data or arena allocator refused a request. Propagated
    /// immediately and unwinds the whole compilation.
    #[error("allocator refused request: {0}")]
    OutOfMemory(String),

    /// A compiler invariant was violated — a bug in this crate, not in
    /// the input IL. Reserved for callers that want to promote a
    /// `debug_assert!`-style check to a recoverable error at an API
    /// boundary instead of aborting the process.
    #[error("internal compiler invariant violated: {0}")]
    Internal(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    pub fn bad_code(il_offset: u32, reason: impl Into<String>) -> CompileError {
        CompileError::BadCode {
            il_offset,
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> CompileError {
        CompileError::Internal(reason.into())
    }
}
