//! `CompHnd`: the EE callback surface the core treats as an oracle
//! (`spec.md` §1, §6). Modelled the same way the teacher crate models
//! its own host boundary — `cranelift-wasm`'s `environ::FuncEnvironment`
//! trait, implemented for real by a host and, for tests, by a
//! `dummy`-feature in-memory stand-in (`environ::dummy::DummyEnvironment`
//! in the teacher).

use crate::types::InterpType;
use crate::var::ClassHandle;

pub type MethodHandle = u64;

/// `getMethodSig`: number of args, `hasThis`, per-arg type, return type.
#[derive(Clone, Debug)]
pub struct SigInfo {
    pub has_this: bool,
    pub args: Vec<ArgInfo>,
    pub return_type: InterpType,
    pub return_class: Option<ClassHandle>,
}

#[derive(Copy, Clone, Debug)]
pub struct ArgInfo {
    pub interp_type: InterpType,
    pub class_handle: Option<ClassHandle>,
    /// Only meaningful when `interp_type == Vt`.
    pub size: u32,
}

/// `getEHinfo`: one exception-handling clause's boundaries. The core
/// only uses this to seed block discovery (`spec.md` §4.1.2); clause
/// classification and handler islanding are out of scope (`spec.md` §1).
#[derive(Copy, Clone, Debug)]
pub struct EhClause {
    pub try_offset: u32,
    pub try_length: u32,
    pub handler_offset: u32,
    pub handler_length: u32,
    pub filter_offset: Option<u32>,
}

/// `resolveToken`'s resolved-kind discriminant.
#[derive(Copy, Clone, Debug)]
pub enum ResolvedToken {
    Method(MethodHandle),
    Class(ClassHandle),
    Field { class: ClassHandle, offset: u32 },
}

/// The EE callback surface consumed by the core (`spec.md` §6).
pub trait CompHnd {
    fn resolve_token(&self, method_token: u32) -> crate::error::CompileResult<ResolvedToken>;
    fn method_sig(&self, method: MethodHandle) -> crate::error::CompileResult<SigInfo>;
    fn class_size(&self, class: ClassHandle) -> u32;
    fn class_alignment(&self, class: ClassHandle) -> u32;
    fn method_class(&self, method: MethodHandle) -> ClassHandle;
    fn is_value_class(&self, class: ClassHandle) -> bool;
    fn eh_info(&self, method: MethodHandle, clause_index: u32) -> Option<EhClause>;

    /// Requests the final code block from the runtime. The core never
    /// calls this directly; it is invoked by the caller once the
    /// `InterpMethod` is built, per `spec.md` §6.
    fn alloc_mem(&self, size_bytes: usize) -> crate::error::CompileResult<*mut u8>;
}

pub mod dummy {
    //! An in-memory `CompHnd` for tests and examples, standing in for a
    //! real host the way `cranelift-wasm::environ::dummy::
    //! DummyEnvironment` stands in for a real wasm embedder.

    use std::collections::HashMap;

    use super::*;
    use crate::error::{CompileError, CompileResult};

    #[derive(Default)]
    pub struct DummyCompHnd {
        pub methods: HashMap<u32, MethodHandle>,
        pub sigs: HashMap<MethodHandle, SigInfo>,
        pub class_sizes: HashMap<ClassHandle, (u32, u32)>,
        pub value_classes: std::collections::HashSet<ClassHandle>,
        pub eh_clauses: HashMap<(MethodHandle, u32), EhClause>,
    }

    impl DummyCompHnd {
        pub fn new() -> DummyCompHnd {
            DummyCompHnd::default()
        }

        pub fn add_method(&mut self, token: u32, handle: MethodHandle, sig: SigInfo) {
            self.methods.insert(token, handle);
            self.sigs.insert(handle, sig);
        }
    }

    impl CompHnd for DummyCompHnd {
        fn resolve_token(&self, method_token: u32) -> CompileResult<ResolvedToken> {
            self.methods
                .get(&method_token)
                .map(|&h| ResolvedToken::Method(h))
                .ok_or_else(|| CompileError::bad_code(0, format!("unresolvable token {method_token}")))
        }

        fn method_sig(&self, method: MethodHandle) -> CompileResult<SigInfo> {
            self.sigs
                .get(&method)
                .cloned()
                .ok_or_else(|| CompileError::bad_code(0, format!("unknown method handle {method}")))
        }

        fn class_size(&self, class: ClassHandle) -> u32 {
            self.class_sizes.get(&class).map(|&(s, _)| s).unwrap_or(0)
        }

        fn class_alignment(&self, class: ClassHandle) -> u32 {
            self.class_sizes.get(&class).map(|&(_, a)| a).unwrap_or(8)
        }

        fn method_class(&self, _method: MethodHandle) -> ClassHandle {
            0
        }

        fn is_value_class(&self, class: ClassHandle) -> bool {
            self.value_classes.contains(&class)
        }

        fn eh_info(&self, method: MethodHandle, clause_index: u32) -> Option<EhClause> {
            self.eh_clauses.get(&(method, clause_index)).copied()
        }

        fn alloc_mem(&self, size_bytes: usize) -> CompileResult<*mut u8> {
            let mut buf = vec![0u8; size_bytes].into_boxed_slice();
            let ptr = buf.as_mut_ptr();
            std::mem::forget(buf);
            Ok(ptr)
        }
    }
}
