//! A concrete IL opcode set standing in for the host's bytecode
//! (`SPEC_FULL.md` §4.6). `spec.md` describes the lowering rules for
//! these opcodes in §4.1.5 but leaves the input instruction set to the
//! host; this module supplies one directly modelled on the CIL-like
//! surface `spec.md` names there and on `ImportBasicBlock`'s opcode
//! dispatch in `compiler.cpp`.
//!
//! Each `IlOp` carries its own decoded operands; `decode_one` is the
//! "precomputed length/format table" of `spec.md` §4.1.2; it is the only
//! place that knows how many bytes an encoded instruction occupies.

use crate::error::{CompileError, CompileResult};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Cond {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConvTarget {
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IlOp {
    Nop,

    LdcI4(i32),

    LdArg(u16),
    StArg(u16),
    LdLoc(u16),
    StLoc(u16),

    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    ShrUn,
    Neg,
    Not,

    Ceq,
    Cgt,
    CgtUn,
    Clt,
    CltUn,

    /// Unconditional branch; `target` is an IL offset.
    Br { target: u32 },
    /// `brtrue`/`brfalse`: pops one value, compares against zero.
    BrCond { target: u32, branch_if_true: bool },
    /// Two-operand conditional branch (`beq`, `bge`, ...).
    BrCmp { target: u32, cond: Cond, unsigned: bool },

    /// `switch`: `targets[selector]` if in range, otherwise fall through.
    Switch { targets: Vec<u32> },

    Conv(ConvTarget),

    /// Resolves `method_token` via the EE and lowers a call.
    Call { method_token: u32 },

    Ret,

    Throw,
    Rethrow,
    Endfinally,
    /// `leave`: like `br` but also clears the evaluation stack and never
    /// participates in EH-island construction in this core (reserved).
    Leave { target: u32 },
}

impl IlOp {
    /// Encoded length in bytes, mirroring `spec.md` §4.1.2's
    /// "precomputed length/format table". Kept separate from decoding so
    /// block discovery can run a pure forward scan without materialising
    /// full `IlOp` values for instructions it only needs to skip.
    pub fn encoded_len(&self) -> u32 {
        match self {
            IlOp::Nop | IlOp::Add | IlOp::Sub | IlOp::Mul | IlOp::And | IlOp::Or | IlOp::Xor
            | IlOp::Shl | IlOp::Shr | IlOp::ShrUn | IlOp::Neg | IlOp::Not | IlOp::Ceq
            | IlOp::Cgt | IlOp::CgtUn | IlOp::Clt | IlOp::CltUn | IlOp::Ret | IlOp::Throw
            | IlOp::Rethrow | IlOp::Endfinally => 1,
            IlOp::LdcI4(_) => 5,
            IlOp::LdArg(_) | IlOp::StArg(_) | IlOp::LdLoc(_) | IlOp::StLoc(_) => 3,
            IlOp::Br { .. } | IlOp::Leave { .. } => 5,
            IlOp::BrCond { .. } => 5,
            IlOp::BrCmp { .. } => 5,
            IlOp::Switch { targets } => 5 + 4 * targets.len() as u32,
            IlOp::Conv(_) => 2,
            IlOp::Call { .. } => 5,
        }
    }
}

/// Decodes one `IlOp` starting at `offset` in `code`, returning the op
/// and its encoded length. A target offset at or beyond `code.len()` is
/// a hard decode failure (`spec.md` §4.1.2).
pub fn decode_one(code: &[u8], offset: u32) -> CompileResult<(IlOp, u32)> {
    let at = offset as usize;
    if at >= code.len() {
        return Err(CompileError::bad_code(offset, "IL pointer past end of method body"));
    }
    let read_u32 = |pos: usize| -> CompileResult<u32> {
        let bytes = code
            .get(pos..pos + 4)
            .ok_or_else(|| CompileError::bad_code(offset, "truncated instruction operand"))?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    };
    let read_u16 = |pos: usize| -> CompileResult<u16> {
        let bytes = code
            .get(pos..pos + 2)
            .ok_or_else(|| CompileError::bad_code(offset, "truncated instruction operand"))?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    };

    let tag = code[at];
    let (op, len) = match tag {
        0x00 => (IlOp::Nop, 1),
        0x01 => (IlOp::LdcI4(read_u32(at + 1)? as i32), 5),
        0x02 => (IlOp::LdArg(read_u16(at + 1)?), 3),
        0x03 => (IlOp::StArg(read_u16(at + 1)?), 3),
        0x04 => (IlOp::LdLoc(read_u16(at + 1)?), 3),
        0x05 => (IlOp::StLoc(read_u16(at + 1)?), 3),
        0x06 => (IlOp::Add, 1),
        0x07 => (IlOp::Sub, 1),
        0x08 => (IlOp::Mul, 1),
        0x09 => (IlOp::And, 1),
        0x0a => (IlOp::Or, 1),
        0x0b => (IlOp::Xor, 1),
        0x0c => (IlOp::Shl, 1),
        0x0d => (IlOp::Shr, 1),
        0x0e => (IlOp::ShrUn, 1),
        0x0f => (IlOp::Neg, 1),
        0x10 => (IlOp::Not, 1),
        0x11 => (IlOp::Ceq, 1),
        0x12 => (IlOp::Cgt, 1),
        0x13 => (IlOp::CgtUn, 1),
        0x14 => (IlOp::Clt, 1),
        0x15 => (IlOp::CltUn, 1),
        0x16 => (IlOp::Br { target: read_u32(at + 1)? }, 5),
        0x17 => (IlOp::BrCond { target: read_u32(at + 1)?, branch_if_true: true }, 5),
        0x18 => (IlOp::BrCond { target: read_u32(at + 1)?, branch_if_true: false }, 5),
        0x19 => (IlOp::BrCmp { target: read_u32(at + 1)?, cond: Cond::Eq, unsigned: false }, 5),
        0x1a => (IlOp::BrCmp { target: read_u32(at + 1)?, cond: Cond::Ge, unsigned: false }, 5),
        0x1b => (IlOp::BrCmp { target: read_u32(at + 1)?, cond: Cond::Gt, unsigned: false }, 5),
        0x1c => (IlOp::BrCmp { target: read_u32(at + 1)?, cond: Cond::Le, unsigned: false }, 5),
        0x1d => (IlOp::BrCmp { target: read_u32(at + 1)?, cond: Cond::Lt, unsigned: false }, 5),
        0x1e => (IlOp::BrCmp { target: read_u32(at + 1)?, cond: Cond::Ge, unsigned: true }, 5),
        0x1f => (IlOp::BrCmp { target: read_u32(at + 1)?, cond: Cond::Gt, unsigned: true }, 5),
        0x20 => (IlOp::BrCmp { target: read_u32(at + 1)?, cond: Cond::Le, unsigned: true }, 5),
        0x21 => (IlOp::BrCmp { target: read_u32(at + 1)?, cond: Cond::Lt, unsigned: true }, 5),
        0x22 => {
            let n = read_u32(at + 1)? as usize;
            let mut targets = Vec::with_capacity(n);
            for i in 0..n {
                targets.push(read_u32(at + 5 + i * 4)?);
            }
            let len = 5 + 4 * n as u32;
            (IlOp::Switch { targets }, len)
        }
        0x23 => (IlOp::Conv(ConvTarget::I1), 2),
        0x24 => (IlOp::Conv(ConvTarget::U1), 2),
        0x25 => (IlOp::Conv(ConvTarget::I2), 2),
        0x26 => (IlOp::Conv(ConvTarget::U2), 2),
        0x27 => (IlOp::Conv(ConvTarget::I4), 2),
        0x28 => (IlOp::Conv(ConvTarget::U4), 2),
        0x29 => (IlOp::Conv(ConvTarget::I8), 2),
        0x2a => (IlOp::Conv(ConvTarget::U8), 2),
        0x2b => (IlOp::Conv(ConvTarget::R4), 2),
        0x2c => (IlOp::Conv(ConvTarget::R8), 2),
        0x2d => (IlOp::Call { method_token: read_u32(at + 1)? }, 5),
        0x2e => (IlOp::Ret, 1),
        0x2f => (IlOp::Throw, 1),
        0x30 => (IlOp::Rethrow, 1),
        0x31 => (IlOp::Endfinally, 1),
        0x32 => (IlOp::Leave { target: read_u32(at + 1)? }, 5),
        other => {
            return Err(CompileError::bad_code(offset, format!("unsupported opcode tag 0x{:02x}", other)))
        }
    };
    Ok((op, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ret_as_single_byte() {
        let code = [0x2e];
        let (op, len) = decode_one(&code, 0).unwrap();
        assert_eq!(op, IlOp::Ret);
        assert_eq!(len, 1);
    }

    #[test]
    fn decodes_ldc_i4_with_operand() {
        let code = [0x01, 0x2a, 0x00, 0x00, 0x00];
        let (op, len) = decode_one(&code, 0).unwrap();
        assert_eq!(op, IlOp::LdcI4(42));
        assert_eq!(len, 5);
    }

    #[test]
    fn rejects_offset_past_end() {
        let code = [0x2e];
        assert!(decode_one(&code, 1).is_err());
    }

    #[test]
    fn rejects_unknown_tag() {
        let code = [0xff];
        assert!(decode_one(&code, 0).is_err());
    }
}
