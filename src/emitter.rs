//! Linearisation and relocation (`spec.md` §4.5): walks the CFG in layout
//! order, assigns each var its final frame offset, computes each
//! instruction's native size, flattens the instruction graph into a flat
//! `Vec<i32>` stream, and patches every branch/switch target in a second
//! pass once every block's `native_offset` is known. Mirrors the
//! offset-computation/relaxation shape of the teacher's
//! `cranelift-codegen/src/binemit/relaxation.rs`, generalised from
//! "shrink branches that turned out short" to "patch displacements that
//! could only be known after every block had a final offset".

use crate::cfg::Cfg;
use crate::compiler::{align_up, Compiler, STACK_SLOT_SIZE};
use crate::entities::BlockId;
use crate::error::{CompileError, CompileResult};
use crate::ins::{IntOp, InsInfo};

/// Sentinel written into a not-yet-patched relocation slot; any value
/// still equal to this after the patch pass is a bug in the emitter,
/// never an expected runtime state (`spec.md` §4.5.4).
pub const UNPATCHED_SENTINEL: i32 = 0xdead_beef_u32 as i32;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RelocKind {
    /// A single `i32` operand holding the relative instruction-stream
    /// displacement from just past this instruction to the target block.
    LongBranch,
    /// A `Switch`'s target table: one displacement word per case.
    Switch,
}

/// A deferred patch into the flattened `code` stream, resolved once
/// every block's `native_offset` is final (`spec.md` §4.5.4).
#[derive(Clone, Debug)]
pub struct Relocation {
    pub kind: RelocKind,
    /// Index into `code` of the first word to patch.
    pub stream_offset: usize,
    /// For `Switch`, the number of consecutive words to patch (one per
    /// case); `1` for `LongBranch`.
    pub count: usize,
    pub target_blocks: Vec<BlockId>,
    /// The `native_offset` of the branch instruction that owns this
    /// relocation (`brBaseOffset` in the grounding source). Used as the
    /// displacement anchor for `LongBranch`; `Switch` anchors each case to
    /// that case's own slot position instead, computed directly in
    /// `resolve_relocations`, so this field is unused for `Switch`.
    pub anchor_offset: i32,
}

/// `AllocateVarOffsets` (`spec.md` §4.5.1): IL-global vars already carry
/// their offset from `create_vars`; this assigns offsets to every
/// temporary introduced during import, continuing the bump allocator,
/// then reserves a trailing call-argument area sized to the widest call
/// site seen.
pub fn allocate_var_offsets(c: &mut Compiler<'_>) {
    let mut offset = c.total_vars_stack_size;

    let ids: Vec<_> = c.vars.iter().map(|(id, _)| id).collect();
    for id in ids {
        if c.vars.get(id).has_offset() {
            continue;
        }
        let size = c.vars.get(id).slot_size().max(1);
        offset = align_up(offset, STACK_SLOT_SIZE);
        c.vars.get_mut(id).offset = offset as i32;
        offset += align_up(size, STACK_SLOT_SIZE);
    }

    c.param_area_offset = align_up(offset, STACK_SLOT_SIZE);

    let mut max_call_args_bytes = 0u32;
    for block in c.cfg.layout_order().collect::<Vec<_>>() {
        let mut cur = c.cfg.get(block).first_ins;
        while let Some(id) = cur {
            if let InsInfo::Call(call) = &c.ins.get(id).info {
                let bytes: u32 = call
                    .args
                    .iter()
                    .map(|&v| align_up(c.vars.get(v).slot_size().max(1), STACK_SLOT_SIZE))
                    .sum();
                max_call_args_bytes = max_call_args_bytes.max(bytes);
            }
            cur = c.ins.next(id);
        }
    }

    c.total_vars_stack_size = align_up(c.param_area_offset + max_call_args_bytes, STACK_SLOT_SIZE);
}

/// Native code size, in `i32` words, of one instruction, per `spec.md`
/// §4.5.2/§4.5.3: opcode word + one word per source var (call args
/// expand through `ForEachInsSVar`) + one word for a dest var (if any) +
/// the instruction's `data` words + target-displacement words for
/// branch/switch.
pub fn ins_size_words(ins: &crate::ins::Ins) -> usize {
    let mut words = 1; // opcode
    let mut s_var_count = 0usize;
    ins.for_each_s_var(|_| s_var_count += 1);
    words += s_var_count;
    if ins.d_var.is_some() {
        words += 1;
    }
    words += ins.data.len();
    words += match &ins.info {
        InsInfo::None => 0,
        InsInfo::Branch(_) => 1,
        InsInfo::Switch(targets) => targets.len(),
        InsInfo::Call(_) => 0,
    };
    words
}

/// `ComputeCodeSize` (`spec.md` §4.5.2): walks every live block in
/// layout order, summing instruction sizes, while also stamping each
/// block's `native_offset` and each instruction's `native_offset` as a
/// side effect — both are needed by the linearisation pass that follows,
/// and recomputing them there would just repeat this walk.
/// An unconditional `BR` whose target is the block laid out immediately
/// after its own (`spec.md` §4.1.5, §4.5.3 case 2): control would fall
/// through there anyway, so the branch contributes nothing to the code
/// stream. Mirrors `EmitCodeIns`'s `ins->info.pTargetBB ==
/// m_pCBB->pNextBB` check; `compute_code_size` and `emit_one` must agree
/// on this or native offsets downstream of an elided branch would drift.
fn br_elided_by_fallthrough(cfg: &Cfg, block: BlockId, ins: &crate::ins::Ins) -> bool {
    ins.opcode == IntOp::Br
        && matches!(&ins.info, InsInfo::Branch(target) if Some(*target) == cfg.get(block).next_in_layout)
}

pub fn compute_code_size(c: &mut Compiler<'_>) -> u32 {
    let mut offset = 0u32;
    for block in c.cfg.layout_order().collect::<Vec<_>>() {
        c.cfg.get_mut(block).native_offset = offset as i32;
        let mut cur = c.cfg.get(block).first_ins;
        while let Some(id) = cur {
            let ins = c.ins.get(id);
            let size = if br_elided_by_fallthrough(&c.cfg, block, ins) {
                0
            } else {
                ins_size_words(ins)
            };
            c.ins.get_mut(id).native_offset = offset as i32;
            offset += size as u32;
            cur = c.ins.next(id);
        }
    }
    offset
}

/// `EmitAndRelocate` (`spec.md` §4.5.3/§4.5.4): linearises every live
/// block's instruction list into `code`, recording a `Relocation` for
/// every branch/switch target (written as `UNPATCHED_SENTINEL` the first
/// time round), then patches every relocation now that every block's
/// `native_offset` is known.
pub fn emit_and_relocate(c: &mut Compiler<'_>) -> CompileResult<Vec<i32>> {
    let total_words = compute_code_size(c) as usize;
    let mut code = Vec::with_capacity(total_words);
    let mut relocations = Vec::new();

    for block in c.cfg.layout_order().collect::<Vec<_>>() {
        let mut cur = c.cfg.get(block).first_ins;
        while let Some(id) = cur {
            emit_one(c, block, id, &mut code, &mut relocations);
            cur = c.ins.next(id);
        }
    }

    resolve_relocations(&c.cfg, &mut code, &relocations)?;

    debug_assert!(
        !code.iter().any(|&w| w == UNPATCHED_SENTINEL),
        "a relocation slot was left unpatched"
    );

    c.relocations = relocations;

    Ok(code)
}

fn emit_one(c: &Compiler<'_>, block: BlockId, id: crate::entities::InsId, code: &mut Vec<i32>, relocations: &mut Vec<Relocation>) {
    let ins = c.ins.get(id);
    if br_elided_by_fallthrough(&c.cfg, block, ins) {
        return;
    }

    code.push(opcode_word(ins.opcode));

    ins.for_each_s_var(|v| code.push(c.vars.get(v).offset));
    if let Some(d) = ins.d_var {
        code.push(c.vars.get(d).offset);
    }
    code.extend(ins.data.iter().copied());

    match &ins.info {
        InsInfo::None | InsInfo::Call(_) => {}
        InsInfo::Branch(target) => {
            relocations.push(Relocation {
                kind: RelocKind::LongBranch,
                stream_offset: code.len(),
                count: 1,
                target_blocks: vec![*target],
                anchor_offset: ins.native_offset,
            });
            code.push(UNPATCHED_SENTINEL);
        }
        InsInfo::Switch(targets) => {
            relocations.push(Relocation {
                kind: RelocKind::Switch,
                stream_offset: code.len(),
                count: targets.len(),
                target_blocks: targets.clone(),
                anchor_offset: ins.native_offset,
            });
            code.extend(std::iter::repeat(UNPATCHED_SENTINEL).take(targets.len()));
        }
    }
}

fn opcode_word(op: IntOp) -> i32 {
    op as i32
}

/// Patches every recorded relocation slot with the displacement from its
/// anchor to the target block's `native_offset` (`spec.md` §4.5.4,
/// "Relative displacement invariant"). The anchor differs by kind,
/// mirroring `PatchRelocations`/`EmitCodeIns` in the grounding source: a
/// `LongBranch` anchors to the branch instruction's own `native_offset`
/// (recorded at emit time, since source-var words emitted before the
/// patch slot would otherwise throw off a slot-relative anchor); a
/// `Switch` case anchors to that case's own slot, which is exactly
/// `stream[o] + o == T.native_offset` (`spec.md` §8).
fn resolve_relocations(cfg: &Cfg, code: &mut [i32], relocations: &[Relocation]) -> CompileResult<()> {
    for reloc in relocations {
        for (i, &target) in reloc.target_blocks.iter().enumerate() {
            let slot = reloc.stream_offset + i;
            let target_offset = cfg.get(target).native_offset;
            if target_offset < 0 {
                return Err(CompileError::bad_code(
                    cfg.get(target).il_offset,
                    "relocation target block was never emitted",
                ));
            }
            let anchor = match reloc.kind {
                RelocKind::LongBranch => reloc.anchor_offset,
                RelocKind::Switch => slot as i32,
            };
            let displacement = target_offset - anchor;
            code[slot] = displacement;
        }
    }
    Ok(())
}

/// Builds the final `InterpMethod` from a finished `Compiler` (`spec.md`
/// §4.5.5): var-offset allocation, size computation, linearisation, and
/// handing ownership of the data-item table to the caller.
pub fn build_method(mut c: Compiler<'_>) -> CompileResult<crate::method::InterpMethod> {
    allocate_var_offsets(&mut c);
    let code = emit_and_relocate(&mut c)?;
    Ok(crate::method::InterpMethod {
        handle: c.method.handle,
        total_vars_stack_size: c.total_vars_stack_size,
        data_items: c.data_items.into_vec(),
        code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp_hnd::dummy::DummyCompHnd;
    use crate::comp_hnd::SigInfo;
    use crate::method::MethodInfo;
    use crate::types::InterpType;

    fn method_with_code(code: Vec<u8>, return_type: InterpType) -> MethodInfo {
        MethodInfo {
            handle: 1,
            il_code: code,
            max_stack: 8,
            sig: SigInfo {
                has_this: false,
                args: vec![],
                return_type,
                return_class: None,
            },
            locals: vec![],
            eh_clause_count: 0,
            this_is_byref: false,
        }
    }

    #[test]
    fn long_branch_displacement_anchors_to_branch_native_offset() {
        let method = method_with_code(vec![0x2e], InterpType::Void);
        let hnd = DummyCompHnd::new();
        let mut c = Compiler::new(&method, &hnd);

        let b0 = c.cfg.get_bb(0);
        let b1 = c.cfg.get_bb(100);
        c.cfg.get_mut(b0).emit_state = crate::cfg::EmitState::Emitted;
        c.cfg.get_mut(b1).emit_state = crate::cfg::EmitState::Emitted;

        let cond_var = c.vars.create_var(InterpType::I4, None, 4);
        let ldc = c.add_ins(b0, IntOp::LdcI4, 0);
        c.ins.get_mut(ldc).data.push(1);
        c.ins.get_mut(ldc).d_var = Some(cond_var);

        let br = c.add_ins(b0, IntOp::BrTrueI4, 3);
        c.ins.get_mut(br).s_vars.push(cond_var);
        c.ins.get_mut(br).info = InsInfo::Branch(b1);

        c.add_ins(b1, IntOp::RetVoid, 10);

        let code = emit_and_relocate(&mut c).unwrap();

        // LdcI4 is 3 words (opcode + data + dvar), so the branch's own
        // native_offset is 3; it is itself 3 words (opcode + svar +
        // target), so b1 starts at native_offset 6.
        let br_native_offset = c.ins.get(br).native_offset;
        let b1_native_offset = c.cfg.get(b1).native_offset;
        assert_eq!(br_native_offset, 3);
        assert_eq!(b1_native_offset, 6);

        let reloc = c.relocations.iter().find(|r| r.kind == RelocKind::LongBranch).unwrap();
        let displacement = code[reloc.stream_offset];
        assert_eq!(displacement, b1_native_offset - br_native_offset);
    }

    #[test]
    fn unconditional_br_to_next_block_is_elided() {
        let method = method_with_code(vec![0x2e], InterpType::Void);
        let hnd = DummyCompHnd::new();
        let mut c = Compiler::new(&method, &hnd);

        let b0 = c.cfg.get_bb(0);
        let b1 = c.cfg.get_bb(100);
        c.cfg.get_mut(b0).emit_state = crate::cfg::EmitState::Emitted;
        c.cfg.get_mut(b1).emit_state = crate::cfg::EmitState::Emitted;

        let br = c.add_ins(b0, IntOp::Br, 0);
        c.ins.get_mut(br).info = InsInfo::Branch(b1);
        c.add_ins(b1, IntOp::RetVoid, 10);

        let code = emit_and_relocate(&mut c).unwrap();

        assert_eq!(c.cfg.get(b1).native_offset, 0);
        assert_eq!(code, vec![IntOp::RetVoid as i32]);
    }

    #[test]
    fn code_size_matches_emitted_stream_length() {
        // ldc.i4 42; ret
        let mut code = vec![0x01];
        code.extend_from_slice(&42i32.to_le_bytes());
        code.push(0x2e);
        let method = method_with_code(code, InterpType::I4);
        let hnd = DummyCompHnd::new();
        let mut c = Compiler::new(&method, &hnd);
        crate::importer::discover_blocks(&mut c).unwrap();
        crate::importer::import(&mut c).unwrap();
        let computed = compute_code_size(&mut c);
        let emitted = emit_and_relocate(&mut c).unwrap();
        assert_eq!(computed as usize, emitted.len());
        assert!(!emitted.iter().any(|&w| w == UNPATCHED_SENTINEL));
    }
}
