//! Integration tests exercising `compile_method` end to end against the
//! six worked scenarios and the cross-cutting invariants, using the
//! in-memory `DummyCompHnd` the way the teacher's wasm test suite drives
//! `cranelift-wasm` through `DummyEnvironment`.

use interp_compiler::comp_hnd::dummy::DummyCompHnd;
use interp_compiler::comp_hnd::{ArgInfo, SigInfo};
use interp_compiler::emitter::UNPATCHED_SENTINEL;
use interp_compiler::ins::IntOp;
use interp_compiler::method::MethodInfo;
use interp_compiler::types::InterpType;
use interp_compiler::{compile_method, config};

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

#[test]
fn empty_void_method() {
    let m = method(vec![0x2e], sig(vec![], InterpType::Void));
    let hnd = DummyCompHnd::new();
    let result = compile_method(&m, &hnd).unwrap();
    assert_eq!(result.code, vec![IntOp::RetVoid as i32]);
    assert_eq!(result.total_vars_stack_size, 0);
}

#[test]
fn identity_on_int_arg() {
    let mut code = vec![0x02, 0x00, 0x00];
    code.push(0x2e);
    let m = method(code, sig(vec![InterpType::I4], InterpType::I4));
    let hnd = DummyCompHnd::new();
    let result = compile_method(&m, &hnd).unwrap();
    assert!(result.code.contains(&(IntOp::Mov4 as i32)));
    assert!(result.code.contains(&(IntOp::RetI4 as i32)));
}

#[test]
fn add_two_int_args() {
    let mut code = Vec::new();
    code.push(0x02);
    code.extend_from_slice(&0u16.to_le_bytes());
    code.push(0x02);
    code.extend_from_slice(&1u16.to_le_bytes());
    code.push(0x06); // add
    code.push(0x2e);
    let m = method(code, sig(vec![InterpType::I4, InterpType::I4], InterpType::I4));
    let hnd = DummyCompHnd::new();
    let result = compile_method(&m, &hnd).unwrap();
    assert!(result.code.contains(&(IntOp::AddI4 as i32)));
}

#[test]
fn forward_conditional_branch_no_residual_sentinel() {
    let mut code = vec![0x02, 0x00, 0x00];
    code.push(0x17); // brtrue -> 14
    code.extend_from_slice(&14u32.to_le_bytes());
    code.push(0x01); // ldc.i4.0
    code.extend_from_slice(&0i32.to_le_bytes());
    code.push(0x2e); // ret
    code.push(0x01); // ldc.i4.1
    code.extend_from_slice(&1i32.to_le_bytes());
    code.push(0x2e); // ret
    let m = method(code, sig(vec![InterpType::I4], InterpType::I4));
    let hnd = DummyCompHnd::new();
    let result = compile_method(&m, &hnd).unwrap();
    assert!(result.code.contains(&(IntOp::BrTrueI4 as i32)));
    assert!(!result.code.iter().any(|&w| w == UNPATCHED_SENTINEL));
}

#[test]
fn back_edge_while_loop_decrements_arg_to_zero() {
    let mut code = vec![0x02, 0x00, 0x00]; // 0: ldarg 0
    code.push(0x18); // 3: brfalse -> 25
    code.extend_from_slice(&25u32.to_le_bytes());
    code.push(0x02); // 8: ldarg 0
    code.extend_from_slice(&0u16.to_le_bytes());
    code.push(0x01); // 11: ldc.i4 1
    code.extend_from_slice(&1i32.to_le_bytes());
    code.push(0x07); // 16: sub
    code.push(0x03); // 17: starg 0
    code.extend_from_slice(&0u16.to_le_bytes());
    code.push(0x16); // 20: br -> 0
    code.extend_from_slice(&0u32.to_le_bytes());
    code.push(0x2e); // 25: ret
    let m = method(code, sig(vec![InterpType::I4], InterpType::Void));
    let hnd = DummyCompHnd::new();
    let result = compile_method(&m, &hnd).unwrap();
    assert!(result.code.contains(&(IntOp::SubI4 as i32)));
    assert!(result.code.contains(&(IntOp::BrFalseI4 as i32)));
    assert!(!result.code.iter().any(|&w| w == UNPATCHED_SENTINEL));
}

#[test]
fn switch_with_three_cases_and_default() {
    let mut code = vec![0x02, 0x00, 0x00]; // 0: ldarg 0
    code.push(0x22); // 3: switch
    code.extend_from_slice(&3u32.to_le_bytes());
    code.extend_from_slice(&26u32.to_le_bytes());
    code.extend_from_slice(&32u32.to_le_bytes());
    code.extend_from_slice(&38u32.to_le_bytes());
    code.push(0x01); // 20: default: ldc.i4.0
    code.extend_from_slice(&0i32.to_le_bytes());
    code.push(0x2e); // 25: ret
    code.push(0x01); // 26: case 0
    code.extend_from_slice(&1i32.to_le_bytes());
    code.push(0x2e); // 31: ret
    code.push(0x01); // 32: case 1
    code.extend_from_slice(&2i32.to_le_bytes());
    code.push(0x2e); // 37: ret
    code.push(0x01); // 38: case 2
    code.extend_from_slice(&3i32.to_le_bytes());
    code.push(0x2e); // 43: ret
    assert_eq!(code.len(), 44);

    let m = method(code, sig(vec![InterpType::I4], InterpType::I4));
    let hnd = DummyCompHnd::new();
    let result = compile_method(&m, &hnd).unwrap();
    assert!(result.code.contains(&(IntOp::Switch as i32)));
    assert!(!result.code.iter().any(|&w| w == UNPATCHED_SENTINEL));
}

/// `spec.md` §8: stack underflow is always reported as `BadCode`, never
/// a panic.
#[test]
fn stack_underflow_is_reported_as_bad_code_not_a_panic() {
    let code = vec![0x2e]; // ret, but return type is non-void: nothing was pushed
    let m = method(code, sig(vec![], InterpType::I4));
    let hnd = DummyCompHnd::new();
    assert!(compile_method(&m, &hnd).is_err());
}

/// `spec.md` §8: an out-of-range branch target is rejected before import
/// even starts.
#[test]
fn branch_past_end_of_code_is_rejected() {
    let mut code = vec![0x16];
    code.extend_from_slice(&1000u32.to_le_bytes());
    let m = method(code, sig(vec![], InterpType::Void));
    let hnd = DummyCompHnd::new();
    assert!(compile_method(&m, &hnd).is_err());
}

/// Ambient configuration is parsed independently of compilation and
/// never consulted by `compile_method` (`SPEC_FULL.md` §4.9).
#[test]
fn method_set_pattern_matches_independently_of_compilation() {
    let set = config::MethodSet::parse("MyAsm!MyClass:DoThing Get*");
    assert!(set.contains("MyAsm", "MyClass", "DoThing"));
    assert!(set.contains("OtherAsm", "OtherClass", "GetFoo"));
    assert!(!set.contains("MyAsm", "MyClass", "DoOtherThing"));
}
