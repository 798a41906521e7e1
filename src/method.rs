//! Input and output method descriptors (`spec.md` §3 "Method object",
//! §6 "Emitter output contract").

use crate::comp_hnd::{MethodHandle, SigInfo};
use crate::types::InterpType;

/// The EE's `MethodInfo`: IL code, max stack, signatures for args/locals,
/// EH clause count. The core reads this once, at the start of
/// `compile_method`, and never mutates it.
#[derive(Clone, Debug)]
pub struct MethodInfo {
    pub handle: MethodHandle,
    pub il_code: Vec<u8>,
    pub max_stack: u32,
    pub sig: SigInfo,
    pub locals: Vec<LocalInfo>,
    pub eh_clause_count: u32,
    /// True for a value-type instance method: the prologue synthesises a
    /// `ByRef`-typed `this` instead of an `O`-typed one (`spec.md`
    /// §4.1.1).
    pub this_is_byref: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct LocalInfo {
    pub interp_type: InterpType,
    pub class_handle: Option<crate::var::ClassHandle>,
    pub size: u32,
}

/// The artifact surviving compilation (`spec.md` §3 "Method object").
/// Allocated conceptually from the "method data" allocator; in this
/// crate that is simply ownership transfer to the caller of
/// `compile_method` — nothing here borrows from the `Compiler` arena.
#[derive(Debug)]
pub struct InterpMethod {
    pub handle: MethodHandle,
    pub total_vars_stack_size: u32,
    /// Deduplicated runtime handles referenced from the emitted stream,
    /// indexed by the `i32` data-item indices embedded in instructions.
    pub data_items: Vec<u64>,
    /// The emitted, relocated int32 instruction stream (`spec.md` §6).
    pub code: Vec<i32>,
}
