//! Per-opcode lowering (`spec.md` §4.1.5): the core of `ImportBasicBlock`.
//! Each arm pops/pushes the abstract evaluation stack and appends one or
//! more `Ins` records to the current block, exactly mirroring the opcode
//! dispatch shape of `code_translator.rs`'s giant `match` over wasm
//! opcodes (push1/pop1 helpers and all), but over this crate's IL set.

use crate::compiler::Compiler;
use crate::entities::{BlockId, VarId};
use crate::error::{CompileError, CompileResult};
use crate::il::{Cond, ConvTarget, IlOp};
use crate::ins::{CallInfo, InsFlags, InsInfo, IntOp};
use crate::stack::StackInfo;
use crate::types::{self, ArithKind, InterpType, StackType};
use crate::var::ClassHandle;

use super::{emit_branch, lookup_il_global};

/// Lowers one decoded opcode at `il_offset` into the current block.
pub fn import_one(c: &mut Compiler<'_>, op: &IlOp, il_offset: u32) -> CompileResult<()> {
    match op {
        IlOp::Nop => Ok(()),

        IlOp::LdcI4(v) => {
            let dst = push_new(c, StackType::I4, None);
            let ins = new_ins(c, IntOp::LdcI4, il_offset);
            let ins = c.ins.get_mut(ins);
            ins.data.push(*v);
            ins.d_var = Some(dst.var_index);
            Ok(())
        }

        IlOp::LdArg(idx) => lower_load(c, true, *idx, il_offset),
        IlOp::LdLoc(idx) => lower_load(c, false, *idx, il_offset),
        IlOp::StArg(idx) => lower_store(c, true, *idx, il_offset),
        IlOp::StLoc(idx) => lower_store(c, false, *idx, il_offset),

        IlOp::Add => lower_arith(c, ArithKind::Add, il_offset),
        IlOp::Sub => lower_arith(c, ArithKind::Sub, il_offset),
        IlOp::Mul => lower_arith(c, ArithKind::Mul, il_offset),
        IlOp::And => lower_bitwise(c, BitwiseOp::And, il_offset),
        IlOp::Or => lower_bitwise(c, BitwiseOp::Or, il_offset),
        IlOp::Xor => lower_bitwise(c, BitwiseOp::Xor, il_offset),
        IlOp::Shl => lower_shift(c, ShiftOp::Shl, il_offset),
        IlOp::Shr => lower_shift(c, ShiftOp::Shr, il_offset),
        IlOp::ShrUn => lower_shift(c, ShiftOp::ShrUn, il_offset),
        IlOp::Neg => lower_neg(c, il_offset),
        IlOp::Not => lower_not(c, il_offset),

        IlOp::Ceq => lower_compare(c, Cond::Eq, false, il_offset),
        IlOp::Cgt => lower_compare(c, Cond::Gt, false, il_offset),
        IlOp::CgtUn => lower_compare(c, Cond::Gt, true, il_offset),
        IlOp::Clt => lower_compare(c, Cond::Lt, false, il_offset),
        IlOp::CltUn => lower_compare(c, Cond::Lt, true, il_offset),

        IlOp::Br { target } => {
            let cur = cur_block(c);
            let tgt = target_block(c, *target, il_offset)?;
            let ins = new_ins(c, IntOp::Br, il_offset);
            c.ins.get_mut(ins).info = InsInfo::Branch(tgt);
            emit_branch(c, cur, tgt)?;
            c.import_state.link_to_next = false;
            Ok(())
        }

        IlOp::BrCond { target, branch_if_true } => {
            let cond = c.import_state.eval_stack.pop(il_offset)?;
            let opcode = match (cond.stack_type, branch_if_true) {
                (StackType::I4, true) => IntOp::BrTrueI4,
                (StackType::I4, false) => IntOp::BrFalseI4,
                (StackType::I8, true) => IntOp::BrTrueI8,
                (StackType::I8, false) => IntOp::BrFalseI8,
                _ => return Err(CompileError::bad_code(il_offset, "brtrue/brfalse needs an integer operand")),
            };
            // A branch whose encoded target is its own fall-through point
            // (zero displacement) is elided to a NOP rather than emitted
            // (`spec.md` §4.1.5). The operand has already been popped and
            // the opcode already chosen/validated above, matching
            // `EmitOneArgBranch`'s order of operations.
            if *target == il_offset + op.encoded_len() {
                new_ins(c, IntOp::Nop, il_offset);
                return Ok(());
            }
            let cur = cur_block(c);
            let tgt = target_block(c, *target, il_offset)?;
            let ins = new_ins(c, opcode, il_offset);
            let ins = c.ins.get_mut(ins);
            ins.s_vars.push(cond.var_index);
            ins.info = InsInfo::Branch(tgt);
            emit_branch(c, cur, tgt)
        }

        IlOp::BrCmp { target, cond, unsigned } => {
            let rhs = c.import_state.eval_stack.pop(il_offset)?;
            let lhs = c.import_state.eval_stack.pop(il_offset)?;
            let family_type = compare_family_type(lhs.stack_type, rhs.stack_type, il_offset)?;
            let opcode = branch_compare_opcode(*cond, family_type, il_offset)?;
            if *target == il_offset + op.encoded_len() {
                new_ins(c, IntOp::Nop, il_offset);
                return Ok(());
            }
            let cur = cur_block(c);
            let tgt = target_block(c, *target, il_offset)?;
            let ins = new_ins(c, opcode, il_offset);
            let ins = c.ins.get_mut(ins);
            ins.s_vars.push(lhs.var_index);
            ins.s_vars.push(rhs.var_index);
            ins.info = InsInfo::Branch(tgt);
            if *unsigned {
                ins.flags |= InsFlags::UNSIGNED;
            }
            emit_branch(c, cur, tgt)
        }

        IlOp::Switch { targets } => {
            let selector = c.import_state.eval_stack.pop(il_offset)?;
            if selector.stack_type != StackType::I4 {
                return Err(CompileError::bad_code(il_offset, "switch needs an I4 selector"));
            }
            let cur = cur_block(c);
            let mut target_blocks = Vec::with_capacity(targets.len());
            for &t in targets {
                target_blocks.push(target_block(c, t, il_offset)?);
            }
            let ins = new_ins(c, IntOp::Switch, il_offset);
            let ins = c.ins.get_mut(ins);
            ins.s_vars.push(selector.var_index);
            ins.info = InsInfo::Switch(target_blocks.clone());
            for tgt in target_blocks {
                emit_branch(c, cur, tgt)?;
            }
            Ok(())
        }

        IlOp::Conv(target) => lower_conv(c, *target, il_offset),

        IlOp::Call { method_token } => lower_call(c, *method_token, il_offset),

        IlOp::Ret => lower_ret(c, il_offset),

        IlOp::Throw => {
            let exn = c.import_state.eval_stack.pop(il_offset)?;
            let ins = new_ins(c, IntOp::Throw, il_offset);
            c.ins.get_mut(ins).s_vars.push(exn.var_index);
            c.import_state.link_to_next = false;
            Ok(())
        }
        IlOp::Rethrow => {
            new_ins(c, IntOp::Throw, il_offset);
            c.import_state.link_to_next = false;
            Ok(())
        }
        IlOp::Endfinally => {
            c.import_state.link_to_next = false;
            Ok(())
        }
        IlOp::Leave { target } => {
            let cur = cur_block(c);
            let tgt = target_block(c, *target, il_offset)?;
            c.import_state.eval_stack.clear();
            let ins = new_ins(c, IntOp::Br, il_offset);
            c.ins.get_mut(ins).info = InsInfo::Branch(tgt);
            emit_branch(c, cur, tgt)?;
            c.import_state.link_to_next = false;
            Ok(())
        }
    }
}

fn cur_block(c: &Compiler<'_>) -> BlockId {
    c.import_state.cur_block.expect("import_one called outside block import")
}

fn new_ins(c: &mut Compiler<'_>, opcode: IntOp, il_offset: u32) -> crate::entities::InsId {
    let block = cur_block(c);
    c.add_ins(block, opcode, il_offset)
}

fn target_block(c: &mut Compiler<'_>, il_target: u32, il_offset: u32) -> CompileResult<BlockId> {
    c.cfg
        .lookup(il_target)
        .ok_or_else(|| CompileError::bad_code(il_offset, format!("branch target {il_target} is not a discovered block start")))
}

fn push_new(c: &mut Compiler<'_>, stack_type: StackType, class_handle: Option<ClassHandle>) -> StackInfo {
    let interp_type = InterpType::from_stack_type_default(stack_type);
    let size = if interp_type == InterpType::Vt { 0 } else { interp_type.size_bytes() };
    let var_index = c.vars.create_var(interp_type, class_handle, size);
    let info = StackInfo { stack_type, class_handle, var_index };
    c.import_state.eval_stack.push(info);
    info
}

fn lower_load(c: &mut Compiler<'_>, is_arg: bool, index: u16, il_offset: u32) -> CompileResult<()> {
    let src = lookup_il_global(c, is_arg, index)?;
    let src_type = c.vars.get(src).interp_type;
    let class_handle = c.vars.get(src).class_handle;
    let stack_type = src_type.to_stack_type();
    let dst_info = push_new(c, stack_type, class_handle);
    let sign_extend = src_type.is_signed() && src_type.is_narrow_integer();
    let mov = crate::var::mov_for_type(src_type, sign_extend);
    let block = cur_block(c);
    super::emit_move(c, block, il_offset, mov, src, dst_info.var_index);
    Ok(())
}

fn lower_store(c: &mut Compiler<'_>, is_arg: bool, index: u16, il_offset: u32) -> CompileResult<()> {
    let value = c.import_state.eval_stack.pop(il_offset)?;
    let dst = lookup_il_global(c, is_arg, index)?;
    let dst_type = c.vars.get(dst).interp_type;
    let sign_extend = dst_type.is_signed() && dst_type.is_narrow_integer();
    let mov = crate::var::mov_for_type(dst_type, sign_extend);
    let block = cur_block(c);
    super::emit_move(c, block, il_offset, mov, value.var_index, dst);
    Ok(())
}

/// Selects the concrete opcode for an arithmetic result type. A `Mp`
/// result (pointer arithmetic) reuses the pointer-width integer opcode
/// family rather than needing its own `IntOp` variants, exactly as the
/// grounding source's `EmitBinaryArithmeticOp` normalises `StackTypeMP`
/// to `StackTypeI` only for this opcode-family lookup, while the pushed
/// value itself keeps its `Mp` stack type.
fn arith_opcode(op: ArithKind, t: StackType, il_offset: u32) -> CompileResult<IntOp> {
    use StackType::*;
    let t = if t == Mp { StackType::I } else { t };
    Ok(match (op, t) {
        (ArithKind::Add, I4) => IntOp::AddI4,
        (ArithKind::Add, I8) => IntOp::AddI8,
        (ArithKind::Add, R4) => IntOp::AddR4,
        (ArithKind::Add, R8) => IntOp::AddR8,
        (ArithKind::Sub, I4) => IntOp::SubI4,
        (ArithKind::Sub, I8) => IntOp::SubI8,
        (ArithKind::Sub, R4) => IntOp::SubR4,
        (ArithKind::Sub, R8) => IntOp::SubR8,
        (ArithKind::Mul, I4) => IntOp::MulI4,
        (ArithKind::Mul, I8) => IntOp::MulI8,
        (ArithKind::Mul, R4) => IntOp::MulR4,
        (ArithKind::Mul, R8) => IntOp::MulR8,
        _ => return Err(CompileError::bad_code(il_offset, "arithmetic operator used on an unsupported operand type")),
    })
}

fn lower_arith(c: &mut Compiler<'_>, op: ArithKind, il_offset: u32) -> CompileResult<()> {
    let rhs = c.import_state.eval_stack.pop(il_offset)?;
    let lhs = c.import_state.eval_stack.pop(il_offset)?;
    let result_type = types::binop_result_type(op, lhs.stack_type, rhs.stack_type)
        .ok_or_else(|| CompileError::bad_code(il_offset, "arithmetic operand types do not unify"))?;
    let opcode = arith_opcode(op, result_type, il_offset)?;
    let dst = push_new(c, result_type, None);
    let ins = new_ins(c, opcode, il_offset);
    let ins = c.ins.get_mut(ins);
    ins.s_vars.push(lhs.var_index);
    ins.s_vars.push(rhs.var_index);
    ins.d_var = Some(dst.var_index);
    Ok(())
}

enum BitwiseOp {
    And,
    Or,
    Xor,
}

fn lower_bitwise(c: &mut Compiler<'_>, op: BitwiseOp, il_offset: u32) -> CompileResult<()> {
    let rhs = c.import_state.eval_stack.pop(il_offset)?;
    let lhs = c.import_state.eval_stack.pop(il_offset)?;
    let result_type = types::bitwise_operand_type(lhs.stack_type, rhs.stack_type)
        .filter(|t| matches!(t, StackType::I4 | StackType::I8))
        .ok_or_else(|| CompileError::bad_code(il_offset, "bitwise operator needs integer operands"))?;
    let opcode = match (&op, result_type) {
        (BitwiseOp::And, StackType::I4) => IntOp::AndI4,
        (BitwiseOp::And, StackType::I8) => IntOp::AndI8,
        (BitwiseOp::Or, StackType::I4) => IntOp::OrI4,
        (BitwiseOp::Or, StackType::I8) => IntOp::OrI8,
        (BitwiseOp::Xor, StackType::I4) => IntOp::XorI4,
        (BitwiseOp::Xor, StackType::I8) => IntOp::XorI8,
        _ => unreachable!("filtered to I4/I8 above"),
    };
    let dst = push_new(c, result_type, None);
    let ins = new_ins(c, opcode, il_offset);
    let ins = c.ins.get_mut(ins);
    ins.s_vars.push(lhs.var_index);
    ins.s_vars.push(rhs.var_index);
    ins.d_var = Some(dst.var_index);
    Ok(())
}

enum ShiftOp {
    Shl,
    Shr,
    ShrUn,
}

fn lower_shift(c: &mut Compiler<'_>, op: ShiftOp, il_offset: u32) -> CompileResult<()> {
    let amount = c.import_state.eval_stack.pop(il_offset)?;
    let value = c.import_state.eval_stack.pop(il_offset)?;
    if !matches!(amount.stack_type, StackType::I4 | StackType::I8) {
        return Err(CompileError::bad_code(il_offset, "shift amount must be an integer"));
    }
    let opcode = match (&op, value.stack_type) {
        (ShiftOp::Shl, StackType::I4) => IntOp::ShlI4,
        (ShiftOp::Shl, StackType::I8) => IntOp::ShlI8,
        (ShiftOp::Shr, StackType::I4) => IntOp::ShrI4,
        (ShiftOp::Shr, StackType::I8) => IntOp::ShrI8,
        (ShiftOp::ShrUn, StackType::I4) => IntOp::ShrUnI4,
        (ShiftOp::ShrUn, StackType::I8) => IntOp::ShrUnI8,
        _ => return Err(CompileError::bad_code(il_offset, "shift value must be an integer")),
    };
    let dst = push_new(c, value.stack_type, None);
    let ins = new_ins(c, opcode, il_offset);
    let ins = c.ins.get_mut(ins);
    ins.s_vars.push(value.var_index);
    ins.s_vars.push(amount.var_index);
    ins.d_var = Some(dst.var_index);
    Ok(())
}

fn lower_neg(c: &mut Compiler<'_>, il_offset: u32) -> CompileResult<()> {
    let value = c.import_state.eval_stack.pop(il_offset)?;
    let opcode = match value.stack_type {
        StackType::I4 => IntOp::NegI4,
        StackType::I8 => IntOp::NegI8,
        StackType::R4 => IntOp::NegR4,
        StackType::R8 => IntOp::NegR8,
        _ => return Err(CompileError::bad_code(il_offset, "neg needs a numeric operand")),
    };
    let dst = push_new(c, value.stack_type, None);
    let ins = new_ins(c, opcode, il_offset);
    let ins = c.ins.get_mut(ins);
    ins.s_vars.push(value.var_index);
    ins.d_var = Some(dst.var_index);
    Ok(())
}

fn lower_not(c: &mut Compiler<'_>, il_offset: u32) -> CompileResult<()> {
    let value = c.import_state.eval_stack.pop(il_offset)?;
    let opcode = match value.stack_type {
        StackType::I4 => IntOp::NotI4,
        StackType::I8 => IntOp::NotI8,
        _ => return Err(CompileError::bad_code(il_offset, "not needs an integer operand")),
    };
    let dst = push_new(c, value.stack_type, None);
    let ins = new_ins(c, opcode, il_offset);
    let ins = c.ins.get_mut(ins);
    ins.s_vars.push(value.var_index);
    ins.d_var = Some(dst.var_index);
    Ok(())
}

/// Collapses `O`/managed-pointer/function-pointer stack types onto the
/// pointer-width integer family before a compare opcode lookup, since
/// this opcode set only carries I4/I8/R4/R8 compare variants (`spec.md`
/// §4.1.5, "align float widths" generalised to every non-numeric type).
fn compare_family_type(lhs: StackType, rhs: StackType, il_offset: u32) -> CompileResult<StackType> {
    let normalize = |t: StackType| match t {
        StackType::O | StackType::Mp | StackType::F => StackType::I,
        other => other,
    };
    let (lhs, rhs) = (normalize(lhs), normalize(rhs));
    types::compare_dominant_type(lhs, rhs)
        .map(normalize)
        .ok_or_else(|| CompileError::bad_code(il_offset, "comparison operand types do not unify"))
}

fn compare_opcode(cond: Cond, unsigned: bool, t: StackType, il_offset: u32) -> CompileResult<IntOp> {
    use StackType::*;
    Ok(match (cond, unsigned, t) {
        (Cond::Eq, _, I4) => IntOp::CeqI4,
        (Cond::Eq, _, I8) => IntOp::CeqI8,
        (Cond::Eq, _, R4) => IntOp::CeqR4,
        (Cond::Eq, _, R8) => IntOp::CeqR8,
        (Cond::Gt, false, I4) => IntOp::CgtI4,
        (Cond::Gt, false, I8) => IntOp::CgtI8,
        (Cond::Gt, false, R4) => IntOp::CgtR4,
        (Cond::Gt, false, R8) => IntOp::CgtR8,
        (Cond::Gt, true, I4) => IntOp::CgtUnI4,
        (Cond::Gt, true, I8) => IntOp::CgtUnI8,
        (Cond::Gt, true, R4) => IntOp::CgtUnR4,
        (Cond::Gt, true, R8) => IntOp::CgtUnR8,
        (Cond::Lt, false, I4) => IntOp::CltI4,
        (Cond::Lt, false, I8) => IntOp::CltI8,
        (Cond::Lt, false, R4) => IntOp::CltR4,
        (Cond::Lt, false, R8) => IntOp::CltR8,
        (Cond::Lt, true, I4) => IntOp::CltUnI4,
        (Cond::Lt, true, I8) => IntOp::CltUnI8,
        (Cond::Lt, true, R4) => IntOp::CltUnR4,
        (Cond::Lt, true, R8) => IntOp::CltUnR8,
        // Ge/Le are synthesised by the branch-compare family (§4.1.5
        // note: "le/ge fold to lt/gt with swapped operands" is left to a
        // future peephole; as a plain compare they have no dedicated
        // opcode, so reject rather than silently mis-lower.
        (Cond::Ge, ..) | (Cond::Le, ..) => {
            return Err(CompileError::bad_code(il_offset, "ge/le are only supported as branch conditions"))
        }
    })
}

fn lower_compare(c: &mut Compiler<'_>, cond: Cond, unsigned: bool, il_offset: u32) -> CompileResult<()> {
    let rhs = c.import_state.eval_stack.pop(il_offset)?;
    let lhs = c.import_state.eval_stack.pop(il_offset)?;
    let family_type = compare_family_type(lhs.stack_type, rhs.stack_type, il_offset)?;
    let opcode = compare_opcode(cond, unsigned, family_type, il_offset)?;
    let dst = push_new(c, StackType::I4, None);
    let ins = new_ins(c, opcode, il_offset);
    let ins = c.ins.get_mut(ins);
    ins.s_vars.push(lhs.var_index);
    ins.s_vars.push(rhs.var_index);
    ins.d_var = Some(dst.var_index);
    Ok(())
}

fn branch_compare_opcode(cond: Cond, t: StackType, il_offset: u32) -> CompileResult<IntOp> {
    use StackType::*;
    Ok(match (cond, t) {
        (Cond::Eq, I4) => IntOp::BeqI4,
        (Cond::Eq, I8) => IntOp::BeqI8,
        (Cond::Eq, R4) => IntOp::BeqR4,
        (Cond::Eq, R8) => IntOp::BeqR8,
        (Cond::Ge, I4) => IntOp::BgeI4,
        (Cond::Ge, I8) => IntOp::BgeI8,
        (Cond::Ge, R4) => IntOp::BgeR4,
        (Cond::Ge, R8) => IntOp::BgeR8,
        (Cond::Gt, I4) => IntOp::BgtI4,
        (Cond::Gt, I8) => IntOp::BgtI8,
        (Cond::Gt, R4) => IntOp::BgtR4,
        (Cond::Gt, R8) => IntOp::BgtR8,
        (Cond::Le, I4) => IntOp::BleI4,
        (Cond::Le, I8) => IntOp::BleI8,
        (Cond::Le, R4) => IntOp::BleR4,
        (Cond::Le, R8) => IntOp::BleR8,
        (Cond::Lt, I4) => IntOp::BltI4,
        (Cond::Lt, I8) => IntOp::BltI8,
        (Cond::Lt, R4) => IntOp::BltR4,
        (Cond::Lt, R8) => IntOp::BltR8,
        _ => return Err(CompileError::bad_code(il_offset, "unsupported branch-compare operand type")),
    })
}

fn lower_conv(c: &mut Compiler<'_>, target: ConvTarget, il_offset: u32) -> CompileResult<()> {
    let value = c.import_state.eval_stack.pop(il_offset)?;
    match super::coerce::select_conversion(value.stack_type, target) {
        None => {
            // Identity conversion: push the same value back unchanged.
            c.import_state.eval_stack.push(value);
        }
        Some(conv_op) => {
            let target_interp = target.to_interp_type();
            let dst = push_new(c, target_interp.to_stack_type(), None);
            let ins = new_ins(c, IntOp::Conv, il_offset);
            let ins = c.ins.get_mut(ins);
            ins.s_vars.push(value.var_index);
            ins.d_var = Some(dst.var_index);
            ins.data.push(conv_op_tag(conv_op));
        }
    }
    Ok(())
}

/// Encodes a `ConvOp` as the `i32` tag stored in `Ins::data[0]`, read back
/// by the emitter/interpreter loop to pick the concrete converter
/// (`spec.md` §4.5.3 describes `data` as opaque per-opcode payload).
fn conv_op_tag(op: super::coerce::ConvOp) -> i32 {
    use super::coerce::ConvOp::*;
    match op {
        Identity => 0,
        I4ToI8 => 1,
        I4ToU8 => 2,
        I8ToI4 => 3,
        I4ToR4 => 4,
        I4ToR8 => 5,
        I8ToR4 => 6,
        I8ToR8 => 7,
        R4ToI4 => 8,
        R4ToI8 => 9,
        R4ToR8 => 10,
        R8ToI4 => 11,
        R8ToI8 => 12,
        R8ToR4 => 13,
        Narrow(t) => 100 + t as i32,
        I8ToNarrow(t) => 200 + t as i32,
        R4ToNarrow(t) => 300 + t as i32,
        R8ToNarrow(t) => 400 + t as i32,
    }
}

fn lower_call(c: &mut Compiler<'_>, method_token: u32, il_offset: u32) -> CompileResult<()> {
    let resolved = c.comp_hnd.resolve_token(method_token)?;
    let handle = match resolved {
        crate::comp_hnd::ResolvedToken::Method(h) => h,
        _ => return Err(CompileError::bad_code(il_offset, "call token does not resolve to a method")),
    };
    let sig = c.comp_hnd.method_sig(handle)?;

    let arg_count = sig.args.len() + if sig.has_this { 1 } else { 0 };
    let mut args: Vec<VarId> = Vec::with_capacity(arg_count);
    for _ in 0..arg_count {
        args.push(c.import_state.eval_stack.pop(il_offset)?.var_index);
    }
    args.reverse();

    let target_data_item = Some(c.data_items.intern(handle));
    let call_info = CallInfo { args, target_data_item, call_offset: 0 };

    let ins = new_ins(c, IntOp::Call, il_offset);
    {
        let ins = c.ins.get_mut(ins);
        ins.flags |= InsFlags::CALL;
        ins.s_vars.push(crate::ins::call_args_svar());
        ins.info = InsInfo::Call(call_info);
    }

    // Even a void callee still gets a destination var (`SPEC_FULL.md`
    // §9): the emitter never needs a sentinel "no destination"
    // representation, since a void call's var is simply popped again as
    // a throwaway immediately after the call is lowered.
    let dst_stack_type = if sig.return_type == InterpType::Void {
        StackType::I4
    } else {
        sig.return_type.to_stack_type()
    };
    let dst = push_new(c, dst_stack_type, sig.return_class);
    c.ins.get_mut(ins).d_var = Some(dst.var_index);
    if sig.return_type == InterpType::Void {
        c.import_state.eval_stack.pop(il_offset)?;
    }
    Ok(())
}

fn lower_ret(c: &mut Compiler<'_>, il_offset: u32) -> CompileResult<()> {
    let return_type = c.method.sig.return_type;
    let opcode_and_var = if return_type == InterpType::Void {
        None
    } else {
        let value = c.import_state.eval_stack.pop(il_offset)?;
        let opcode = match return_type {
            InterpType::I1 | InterpType::U1 | InterpType::I2 | InterpType::U2 | InterpType::I4 => IntOp::RetI4,
            InterpType::I8 => IntOp::RetI8,
            InterpType::R4 => IntOp::RetR4,
            InterpType::R8 => IntOp::RetR8,
            InterpType::O => IntOp::RetO,
            InterpType::ByRef => IntOp::RetByRef,
            InterpType::Vt => IntOp::RetVt,
            InterpType::Void => unreachable!("handled above"),
        };
        Some((opcode, value.var_index))
    };

    let opcode = opcode_and_var.map(|(op, _)| op).unwrap_or(IntOp::RetVoid);
    let ins = new_ins(c, opcode, il_offset);
    if let Some((_, var)) = opcode_and_var {
        c.ins.get_mut(ins).s_vars.push(var);
    }
    c.import_state.link_to_next = false;
    Ok(())
}
