//! A method-at-a-time compiler lowering managed bytecode into a linear
//! interpreter instruction stream (`spec.md` §1). The pipeline mirrors
//! the phase structure of `compiler.cpp`'s `CompileMethod`: allocate the
//! variable table, discover block boundaries, import every block into IR
//! while reconciling join-point stack shape, prune anything left
//! unreachable, then allocate frame offsets and linearise into the final
//! code stream.
//!
//! This crate never inspects its own output — interpreting the emitted
//! stream, resolving relocations into a real executable mapping, and
//! method-set-driven diagnostics are all the embedder's job (`spec.md`
//! §1 "Non-goals", `SPEC_FULL.md` §4.9).

pub mod cfg;
pub mod comp_hnd;
pub mod compiler;
pub mod config;
pub mod data_items;
pub mod emitter;
pub mod entities;
pub mod error;
pub mod il;
pub mod importer;
pub mod ins;
pub mod method;
pub mod stack;
pub mod types;
pub mod var;

use comp_hnd::CompHnd;
use compiler::Compiler;
use error::CompileResult;
use method::{InterpMethod, MethodInfo};

/// The crate's single entry point (`spec.md` §1): compiles one method
/// body into an `InterpMethod`, or fails with a `CompileError` if the IL
/// is invalid or the `CompHnd` oracle refuses a request.
///
/// `compile_method` allocates an independent `Compiler` arena per call
/// (`spec.md` §5) and never retains state between calls; two concurrent
/// calls with distinct `MethodInfo`/`CompHnd` pairs never interact.
pub fn compile_method(method: &MethodInfo, comp_hnd: &dyn CompHnd) -> CompileResult<InterpMethod> {
    let mut c = Compiler::new(method, comp_hnd);

    importer::create_vars(&mut c)?;
    importer::discover_blocks(&mut c)?;
    importer::import(&mut c)?;

    emitter::build_method(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use comp_hnd::dummy::DummyCompHnd;
    use comp_hnd::{ArgInfo, SigInfo};
    use types::InterpType;

    fn sig(args: Vec<InterpType>, return_type: InterpType) -> SigInfo {
        SigInfo {
            has_this: false,
            args: args
                .into_iter()
                .map(|t| ArgInfo { interp_type: t, class_handle: None, size: 0 })
                .collect(),
            return_type,
            return_class: None,
        }
    }

    fn method(code: Vec<u8>, s: SigInfo) -> MethodInfo {
        MethodInfo {
            handle: 1,
            il_code: code,
            max_stack: 8,
            sig: s,
            locals: vec![],
            eh_clause_count: 0,
            this_is_byref: false,
        }
    }

    /// Scenario 1 (`spec.md` §8): an empty void method just returns.
    #[test]
    fn empty_void_method_compiles_to_a_single_ret() {
        let code = vec![0x2e]; // ret
        let m = method(code, sig(vec![], InterpType::Void));
        let hnd = DummyCompHnd::new();
        let result = compile_method(&m, &hnd).unwrap();
        assert_eq!(result.code, vec![ins::IntOp::RetVoid as i32]);
    }

    /// Scenario 2: identity on a single int argument (`ldarg.0; ret`).
    #[test]
    fn identity_on_int_argument() {
        let mut code = vec![0x02, 0x00, 0x00]; // ldarg 0
        code.push(0x2e); // ret
        let m = method(code, sig(vec![InterpType::I4], InterpType::I4));
        let hnd = DummyCompHnd::new();
        let result = compile_method(&m, &hnd).unwrap();
        // Mov4(argOffset -> tempOffset), RetI4(tempOffset)
        assert_eq!(result.code.len(), 1 + 2 + 1 + 1);
        assert_eq!(result.code[0], ins::IntOp::Mov4 as i32);
    }

    /// Scenario 3: add two int args and return their sum.
    #[test]
    fn add_two_args() {
        let mut code = Vec::new();
        code.push(0x02); // ldarg 0
        code.extend_from_slice(&0u16.to_le_bytes());
        code.push(0x02); // ldarg 1
        code.extend_from_slice(&1u16.to_le_bytes());
        code.push(0x06); // add
        code.push(0x2e); // ret
        let m = method(code, sig(vec![InterpType::I4, InterpType::I4], InterpType::I4));
        let hnd = DummyCompHnd::new();
        let result = compile_method(&m, &hnd).unwrap();
        assert!(result.code.contains(&(ins::IntOp::AddI4 as i32)));
        assert!(result.code.contains(&(ins::IntOp::RetI4 as i32)));
    }

    /// Scenario 4: a forward conditional branch with two returns.
    #[test]
    fn forward_conditional_branch() {
        let mut code = vec![0x02, 0x00, 0x00]; // 0: ldarg 0
        code.push(0x17); // 3: brtrue -> 14
        code.extend_from_slice(&14u32.to_le_bytes());
        code.push(0x01); // 8: ldc.i4.0
        code.extend_from_slice(&0u32.to_le_bytes());
        code.push(0x2e); // 13: ret
        code.push(0x01); // 14: ldc.i4.1
        code.extend_from_slice(&1u32.to_le_bytes());
        code.push(0x2e); // 19: ret
        let m = method(code, sig(vec![InterpType::I4], InterpType::I4));
        let hnd = DummyCompHnd::new();
        let result = compile_method(&m, &hnd).unwrap();
        assert!(result.code.contains(&(ins::IntOp::BrTrueI4 as i32)));
        // No unresolved relocation slot should remain.
        assert!(!result.code.iter().any(|&w| w == emitter::UNPATCHED_SENTINEL));
    }

    /// Scenario 5: a back-edge while loop (decrement to zero).
    #[test]
    fn back_edge_loop_decrements_to_zero() {
        // 0: ldarg 0           (len 3)
        // 3: brfalse -> 25     (len 5)
        // 8: ldarg 0           (len 3)
        // 11: ldc.i4 1         (len 5)
        // 16: sub              (len 1)
        // 17: starg 0          (len 3)
        // 20: br -> 0          (len 5)
        // 25: ret (void)       (len 1)
        let mut code = vec![0x02, 0x00, 0x00];
        code.push(0x18); // brfalse -> 25
        code.extend_from_slice(&25u32.to_le_bytes());
        code.push(0x02); // ldarg 0
        code.extend_from_slice(&0u16.to_le_bytes());
        code.push(0x01); // ldc.i4 1
        code.extend_from_slice(&1i32.to_le_bytes());
        code.push(0x07); // sub
        code.push(0x03); // starg 0
        code.extend_from_slice(&0u16.to_le_bytes());
        code.push(0x16); // br -> 0
        code.extend_from_slice(&0u32.to_le_bytes());
        code.push(0x2e); // 25: ret (void)
        let m = method(code, sig(vec![InterpType::I4], InterpType::Void));
        let hnd = DummyCompHnd::new();
        let result = compile_method(&m, &hnd).unwrap();
        assert!(result.code.contains(&(ins::IntOp::SubI4 as i32)));
        assert!(result.code.contains(&(ins::IntOp::BrFalseI4 as i32)));
    }

    /// Scenario 6: a switch with three cases and an implicit default
    /// fall-through. Byte layout: ldarg.0 (0..3); switch/3 targets
    /// (3..20, targets at 26/32/38); default case at the fall-through
    /// offset 20; each case is `ldc.i4.N; ret`.
    #[test]
    fn switch_with_three_cases() {
        let mut code = vec![0x02, 0x00, 0x00]; // 0: ldarg 0
        code.push(0x22); // 3: switch
        code.extend_from_slice(&3u32.to_le_bytes());
        code.extend_from_slice(&26u32.to_le_bytes());
        code.extend_from_slice(&32u32.to_le_bytes());
        code.extend_from_slice(&38u32.to_le_bytes());
        // 20: default
        code.push(0x01);
        code.extend_from_slice(&0i32.to_le_bytes());
        code.push(0x2e); // 25: ret
        // 26: case 0
        code.push(0x01);
        code.extend_from_slice(&1i32.to_le_bytes());
        code.push(0x2e); // 31: ret
        // 32: case 1
        code.push(0x01);
        code.extend_from_slice(&2i32.to_le_bytes());
        code.push(0x2e); // 37: ret
        // 38: case 2
        code.push(0x01);
        code.extend_from_slice(&3i32.to_le_bytes());
        code.push(0x2e); // 43: ret
        assert_eq!(code.len(), 44);

        let m = method(code, sig(vec![InterpType::I4], InterpType::I4));
        let hnd = DummyCompHnd::new();
        let result = compile_method(&m, &hnd).unwrap();
        assert!(result.code.contains(&(ins::IntOp::Switch as i32)));
        assert!(!result.code.iter().any(|&w| w == emitter::UNPATCHED_SENTINEL));
    }
}
