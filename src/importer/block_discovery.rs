//! `DiscoverBlocks` (`spec.md` §4.1.2): a forward scan over the IL that
//! registers every branch/switch target, fall-through point, and EH
//! clause boundary as a block start, via `Cfg::get_bb`'s lazy allocation.

use crate::comp_hnd::CompHnd;
use crate::compiler::Compiler;
use crate::error::CompileResult;
use crate::il::{decode_one, IlOp};

pub fn discover_blocks(c: &mut Compiler<'_>) -> CompileResult<()> {
    // Block 0 always starts a block, even with no incoming edges yet.
    c.cfg.get_bb(0);

    let code = c.method.il_code.clone();
    let len = code.len() as u32;
    let mut offset = 0u32;

    while offset < len {
        let (op, op_len) = decode_one(&code, offset)?;
        let next = offset + op_len;

        match &op {
            IlOp::Br { target } | IlOp::Leave { target } => {
                check_target(*target, len, offset)?;
                c.cfg.get_bb(*target);
                if next < len {
                    c.cfg.get_bb(next);
                }
            }
            IlOp::BrCond { target, .. } | IlOp::BrCmp { target, .. } => {
                check_target(*target, len, offset)?;
                c.cfg.get_bb(*target);
                if next < len {
                    c.cfg.get_bb(next);
                }
            }
            IlOp::Switch { targets } => {
                for &t in targets {
                    check_target(t, len, offset)?;
                    c.cfg.get_bb(t);
                }
                if next < len {
                    c.cfg.get_bb(next);
                }
            }
            IlOp::Throw | IlOp::Endfinally | IlOp::Rethrow => {
                if next < len {
                    c.cfg.get_bb(next);
                }
            }
            _ => {}
        }

        offset = next;
    }

    discover_eh_block_starts(c)?;
    Ok(())
}

fn check_target(target: u32, code_len: u32, at: u32) -> CompileResult<()> {
    if target >= code_len {
        return Err(crate::error::CompileError::bad_code(
            at,
            format!("branch target {target} is at or beyond code length {code_len}"),
        ));
    }
    Ok(())
}

/// EH clauses' `try`, `handler`, and (for filter clauses) `filter`
/// offsets are block starts (`spec.md` §4.1.2).
fn discover_eh_block_starts(c: &mut Compiler<'_>) -> CompileResult<()> {
    for clause_index in 0..c.method.eh_clause_count {
        if let Some(clause) = c.comp_hnd.eh_info(c.method.handle, clause_index) {
            c.cfg.get_bb(clause.try_offset);
            c.cfg.get_bb(clause.handler_offset);
            if let Some(filter_offset) = clause.filter_offset {
                c.cfg.get_bb(filter_offset);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp_hnd::dummy::DummyCompHnd;
    use crate::comp_hnd::SigInfo;
    use crate::method::MethodInfo;
    use crate::types::InterpType;

    fn method_with_code(code: Vec<u8>) -> MethodInfo {
        MethodInfo {
            handle: 1,
            il_code: code,
            max_stack: 8,
            sig: SigInfo {
                has_this: false,
                args: vec![],
                return_type: InterpType::Void,
                return_class: None,
            },
            locals: vec![],
            eh_clause_count: 0,
            this_is_byref: false,
        }
    }

    #[test]
    fn forward_conditional_branch_creates_three_blocks() {
        // Mirrors spec.md §8 scenario 4's shape (ldarg.0; brtrue.s L;
        // ldc.i4.0; ret; L: ldc.i4.1; ret), re-encoded with this crate's
        // wider opcode lengths: offsets 0 (entry), 8 (fall-through of
        // the branch), 14 (the branch target L).
        let mut code = vec![0x02, 0x00, 0x00]; // 0: ldarg 0            (len 3)
        code.push(0x17); // 3: brtrue -> 14
        code.extend_from_slice(&14u32.to_le_bytes());
        code.push(0x01); // 8: ldc.i4.0            (len 5)
        code.extend_from_slice(&0u32.to_le_bytes());
        code.push(0x2e); // 13: ret
        code.push(0x01); // 14: ldc.i4.1           (len 5)
        code.extend_from_slice(&1u32.to_le_bytes());
        code.push(0x2e); // 19: ret

        let method = method_with_code(code);
        let hnd = DummyCompHnd::new();
        let mut c = Compiler::new(&method, &hnd);
        discover_blocks(&mut c).unwrap();
        assert!(c.cfg.lookup(0).is_some());
        assert!(c.cfg.lookup(8).is_some());
        assert!(c.cfg.lookup(14).is_some());
        assert_eq!(c.cfg.len(), 3);
    }

    #[test]
    fn rejects_branch_past_end_of_code() {
        let mut code = vec![0x16]; // br
        code.extend_from_slice(&1000u32.to_le_bytes());
        let method = method_with_code(code);
        let hnd = DummyCompHnd::new();
        let mut c = Compiler::new(&method, &hnd);
        assert!(discover_blocks(&mut c).is_err());
    }
}
