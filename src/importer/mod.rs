//! The IL importer / IR builder (`spec.md` §4.1), modelled on the
//! single-pass translation loop in the teacher's
//! `cranelift-wasm/src/code_translator.rs` and `module_translator.rs`:
//! walk the block list, maintain an abstract value stack, lower each
//! opcode into one or more IR instructions, and reconcile stack shape at
//! join points.

mod block_discovery;
mod coerce;
mod opcodes;

use crate::cfg::EmitState;
use crate::compiler::{align_up, Compiler, STACK_SLOT_SIZE};
use crate::entities::{BlockId, VarId};
use crate::error::{CompileError, CompileResult};
use crate::stack::StackInfo;
use crate::types::InterpType;

pub use block_discovery::discover_blocks;

/// `CreateVars` (`spec.md` §4.1.1): walks arguments first (including a
/// synthetic `this`), then IL locals, assigning each a precomputed,
/// bump-aligned stack offset.
pub fn create_vars(c: &mut Compiler<'_>) -> CompileResult<()> {
    let mut offset = 0u32;

    if c.method.sig.has_this {
        let this_type = if c.method.this_is_byref {
            InterpType::ByRef
        } else {
            InterpType::O
        };
        let size = this_type.size_bytes().max(1);
        offset = align_up(offset, STACK_SLOT_SIZE);
        c.vars.create_il_global(this_type, None, size, offset as i32);
        offset += align_up(size, STACK_SLOT_SIZE);
    }

    for arg in &c.method.sig.args {
        let size = if arg.interp_type == InterpType::Vt {
            arg.size
        } else {
            arg.interp_type.size_bytes()
        };
        offset = align_up(offset, STACK_SLOT_SIZE);
        c.vars
            .create_il_global(arg.interp_type, arg.class_handle, size, offset as i32);
        offset += align_up(size.max(1), STACK_SLOT_SIZE);
    }

    for local in &c.method.locals {
        let size = if local.interp_type == InterpType::Vt {
            local.size
        } else {
            local.interp_type.size_bytes()
        };
        offset = align_up(offset, STACK_SLOT_SIZE);
        c.vars
            .create_il_global(local.interp_type, local.class_handle, size, offset as i32);
        offset += align_up(size.max(1), STACK_SLOT_SIZE);
    }

    c.total_vars_stack_size = align_up(offset, STACK_SLOT_SIZE);
    Ok(())
}

/// Index of the IL-global var (arg or local) for a given IL-variable
/// slot number, i.e. `ldarg.N`/`ldloc.N`'s `N`. Arguments occupy the
/// prefix of the table (after an optional synthetic `this`), locals
/// follow.
fn il_global_var(c: &Compiler<'_>, is_arg: bool, index: u16) -> CompileResult<VarId> {
    let this_offset = if c.method.sig.has_this { 1 } else { 0 };
    let base = if is_arg {
        this_offset
    } else {
        this_offset + c.method.sig.args.len()
    };
    let raw = base + index as usize;
    if raw >= c.vars.len() {
        return Err(CompileError::bad_code(0, format!("IL variable index {index} out of range")));
    }
    Ok(VarId::new(raw))
}

/// `Import/Build IR`: the main import loop (`spec.md` §4.1.4). Visits
/// every block; a block reached only via a not-yet-visited forward
/// branch is deferred, and a second pass runs if any block was deferred
/// but at least one block was emitted this pass. Convergence is
/// guaranteed because each pass monotonically emits more blocks.
pub fn import(c: &mut Compiler<'_>) -> CompileResult<()> {
    let entry = c
        .cfg
        .first_block()
        .ok_or_else(|| CompileError::bad_code(0, "method has no blocks"))?;

    loop {
        let mut emitted_this_pass = false;
        let mut deferred_any = false;

        let blocks: Vec<BlockId> = c.cfg.layout_order().collect();
        for block in blocks {
            match c.cfg.get(block).emit_state {
                EmitState::Emitted => continue,
                EmitState::Emitting => continue,
                EmitState::NotEmitted => {}
            }

            if block != entry && !c.cfg.get(block).is_visited() {
                deferred_any = true;
                continue;
            }

            import_block(c, block)?;
            emitted_this_pass = true;
        }

        if !deferred_any {
            break;
        }
        if !emitted_this_pass {
            // No progress: every remaining NotEmitted block is
            // unreachable. Leave them NotEmitted for pruning.
            break;
        }
    }

    c.cfg.unlink_unreachable_blocks();
    Ok(())
}

fn import_block(c: &mut Compiler<'_>, block: BlockId) -> CompileResult<()> {
    c.cfg.get_mut(block).emit_state = EmitState::Emitting;
    c.import_state.cur_block = Some(block);
    c.import_state.link_to_next = true;

    if block == c.cfg.first_block().unwrap() && !c.cfg.get(block).is_visited() {
        c.cfg.get_mut(block).stack_height = 0;
    }
    let snapshot = c.cfg.get(block).stack_state.clone();
    c.import_state.eval_stack.set_from(&snapshot);

    log::trace!("importing block at il_offset={}", c.cfg.get(block).il_offset);

    let start = c.cfg.get(block).il_offset;
    let end = next_block_boundary(c, block);

    let mut offset = start;
    let code = c.method.il_code.clone();
    while offset < end {
        if let Some(err) = c.import_state.invalid.take() {
            return Err(err);
        }
        let (op, len) = crate::il::decode_one(&code, offset)?;
        opcodes::import_one(c, &op, offset)?;
        if let Some(err) = c.import_state.invalid.take() {
            return Err(err);
        }
        offset += len;
    }

    c.cfg.get_mut(block).emit_state = EmitState::Emitted;

    if c.import_state.link_to_next {
        if let Some(next) = c.cfg.get(block).next_in_layout {
            link_fall_through(c, block, next)?;
        }
    }

    Ok(())
}

/// The IL offset at which the next allocated block starts, used to
/// bound one block's import scan. Relies on `discover_blocks` having
/// already created every block that can start mid-stream.
fn next_block_boundary(c: &Compiler<'_>, block: BlockId) -> u32 {
    match c.cfg.get(block).next_in_layout {
        Some(next) => c.cfg.get(next).il_offset,
        None => c.method.il_code.len() as u32,
    }
}

fn link_fall_through(c: &mut Compiler<'_>, from: BlockId, to: BlockId) -> CompileResult<()> {
    c.cfg.link(from, to);
    emit_bb_end_var_moves(c, from, to)
}

/// `EmitBranch`: links `from -> to`, emits the typed join-point moves,
/// and records the target on a just-created branch instruction.
pub(crate) fn emit_branch(c: &mut Compiler<'_>, from: BlockId, to: BlockId) -> CompileResult<()> {
    c.cfg.link(from, to);
    emit_bb_end_var_moves(c, from, to)
}

/// `EmitBBEndVarMoves` (`spec.md` §4.1.6): emits typed moves from the
/// current stack's vars to the target block's stack vars, so that when
/// the target executes it sees live values regardless of which
/// predecessor was taken. If the target has no recorded stack state
/// yet, the current snapshot is copied verbatim as its entry state (no
/// moves are needed: the target's vars and this path's vars are, for
/// this first reach, literally the same indices). Otherwise each slot's
/// value is moved into the target's already-established var and
/// `MergeStackTypeInfo` reconciles the remaining metadata.
fn emit_bb_end_var_moves(c: &mut Compiler<'_>, from: BlockId, to: BlockId) -> CompileResult<()> {
    let snapshot: Vec<StackInfo> = c.import_state.eval_stack.as_slice().to_vec();

    if !c.cfg.get(to).is_visited() {
        let b = c.cfg.get_mut(to);
        b.stack_height = snapshot.len() as i32;
        b.stack_state = snapshot;
        return Ok(());
    }

    merge_stack_type_info(c, from, to, &snapshot)
}

/// `MergeStackTypeInfo`: for each slot, move the incoming value into the
/// target's already-established var if they differ, then check that the
/// stack types agree (the branch emitter guarantees the var indices then
/// agree too, since both now refer to the target's var); class handles
/// that disagree are downgraded to `None`. A type mismatch at a join is
/// invalid code (`spec.md` §4.1.6).
fn merge_stack_type_info(
    c: &mut Compiler<'_>,
    from: BlockId,
    to: BlockId,
    incoming: &[StackInfo],
) -> CompileResult<()> {
    let il_offset = c.cfg.get(from).il_offset;
    let existing_len = c.cfg.get(to).stack_state.len();
    if incoming.len() != existing_len {
        return Err(CompileError::bad_code(
            il_offset,
            "operand stack height mismatch at join point",
        ));
    }

    for i in 0..existing_len {
        let existing = c.cfg.get(to).stack_state[i];
        let inc = incoming[i];
        if existing.stack_type != inc.stack_type {
            return Err(CompileError::bad_code(
                il_offset,
                "stack type mismatch at join point",
            ));
        }
        if inc.var_index != existing.var_index {
            let target_type = c.vars.get(existing.var_index).interp_type;
            let sign_extend = target_type.is_signed() && target_type.is_narrow_integer();
            let mov = crate::var::mov_for_type(target_type, sign_extend);
            emit_move(c, from, il_offset, mov, inc.var_index, existing.var_index);
        }
        if existing.class_handle != inc.class_handle {
            c.cfg.get_mut(to).stack_state[i].class_handle = None;
        }
    }
    Ok(())
}

/// Appends the concrete `IntOp` for a `MoveOp` family member to `block`.
pub(crate) fn emit_move(
    c: &mut Compiler<'_>,
    block: BlockId,
    il_offset: u32,
    mov: crate::var::MoveOp,
    src: VarId,
    dst: VarId,
) {
    use crate::ins::IntOp;
    use crate::var::MoveOp;
    let opcode = match mov {
        MoveOp::MovI1 => IntOp::MovI1,
        MoveOp::MovU1 => IntOp::MovU1,
        MoveOp::MovI2 => IntOp::MovI2,
        MoveOp::MovU2 => IntOp::MovU2,
        MoveOp::Mov4 => IntOp::Mov4,
        MoveOp::Mov8 => IntOp::Mov8,
        MoveOp::MovP => IntOp::MovP,
        MoveOp::MovVt => IntOp::MovVt,
    };
    let id = c.add_ins(block, opcode, il_offset);
    let ins = c.ins.get_mut(id);
    ins.s_vars.push(src);
    ins.d_var = Some(dst);
    if matches!(mov, MoveOp::MovVt) {
        let size = c.vars.get(dst).size;
        ins.data.push(size as i32);
    }
}

pub(crate) use il_global_var as lookup_il_global;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp_hnd::dummy::DummyCompHnd;
    use crate::comp_hnd::SigInfo;
    use crate::method::MethodInfo;

    #[test]
    fn create_vars_aligns_arg_offsets() {
        let method = MethodInfo {
            handle: 1,
            il_code: vec![0x2e],
            max_stack: 0,
            sig: SigInfo {
                has_this: false,
                args: vec![crate::comp_hnd::ArgInfo {
                    interp_type: InterpType::I4,
                    class_handle: None,
                    size: 0,
                }],
                return_type: InterpType::Void,
                return_class: None,
            },
            locals: vec![],
            eh_clause_count: 0,
            this_is_byref: false,
        };
        let hnd = DummyCompHnd::new();
        let mut c = Compiler::new(&method, &hnd);
        create_vars(&mut c).unwrap();
        assert_eq!(c.vars.len(), 1);
        assert_eq!(c.vars.get(VarId::new(0)).offset, 0);
        assert_eq!(c.total_vars_stack_size, STACK_SLOT_SIZE);
    }
}
