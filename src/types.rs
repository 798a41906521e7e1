//! The two parallel type lattices described in `spec.md` §3: `StackType`
//! (importer-only) and `InterpType` (persisted into the emitted stream).
//!
//! Keeping the mapping between them in exactly one place (this module) is
//! the single-source-of-truth requirement from the spec; nothing else in
//! the crate is allowed to hand-roll a `StackType <-> InterpType`
//! conversion.

/// Evaluation-stack type, tracked only while importing. `I` is aliased to
/// `I4` or `I8` depending on target pointer width, matching CIL's
/// `native int` semantics.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StackType {
    I4,
    I8,
    R4,
    R8,
    /// Object reference.
    O,
    /// Value type, tracked by size and class handle.
    Vt,
    /// Managed pointer (by-ref).
    Mp,
    /// Function pointer.
    F,
}

impl StackType {
    /// `StackTypeI` in the source: aliases to the pointer-sized integer
    /// stack type for the target.
    #[cfg(target_pointer_width = "64")]
    pub const I: StackType = StackType::I8;
    #[cfg(not(target_pointer_width = "64"))]
    pub const I: StackType = StackType::I4;

    pub fn is_integer(self) -> bool {
        matches!(self, StackType::I4 | StackType::I8)
    }

    pub fn is_float(self) -> bool {
        matches!(self, StackType::R4 | StackType::R8)
    }
}

/// Type persisted into the emitted instruction stream and into `Var`.
/// Narrow integer types exist here but collapse to `I4` on the
/// evaluation stack (CIL semantics): loading a `U1` local pushes an `I4`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InterpType {
    I1,
    U1,
    I2,
    U2,
    I4,
    I8,
    R4,
    R8,
    O,
    Vt,
    ByRef,
    Void,
}

impl InterpType {
    /// `InterpTypeI` alias, as for `StackType::I`.
    #[cfg(target_pointer_width = "64")]
    pub const I: InterpType = InterpType::I8;
    #[cfg(not(target_pointer_width = "64"))]
    pub const I: InterpType = InterpType::I4;

    /// Maps an `InterpType` to the `StackType` it collapses to when
    /// pushed onto the evaluation stack. This is the single source of
    /// truth for that direction of the mapping.
    pub fn to_stack_type(self) -> StackType {
        match self {
            InterpType::I1 | InterpType::U1 | InterpType::I2 | InterpType::U2 | InterpType::I4 => {
                StackType::I4
            }
            InterpType::I8 => StackType::I8,
            InterpType::R4 => StackType::R4,
            InterpType::R8 => StackType::R8,
            InterpType::O => StackType::O,
            InterpType::Vt => StackType::Vt,
            InterpType::ByRef => StackType::Mp,
            InterpType::Void => unreachable!("void has no stack representation"),
        }
    }

    /// The inverse default: the natural `InterpType` for a given
    /// `StackType`, used when materialising a fresh var for a pushed
    /// value that has no narrower declared type (e.g. an arithmetic
    /// result).
    pub fn from_stack_type_default(st: StackType) -> InterpType {
        match st {
            StackType::I4 => InterpType::I4,
            StackType::I8 => InterpType::I8,
            StackType::R4 => InterpType::R4,
            StackType::R8 => InterpType::R8,
            StackType::O => InterpType::O,
            StackType::Vt => InterpType::Vt,
            StackType::Mp => InterpType::ByRef,
            StackType::F => InterpType::I,
        }
    }

    /// Size in bytes of a single value of this type, used for move
    /// opcode selection and (for `Vt`) by the caller, which must supply
    /// the actual class size separately since `Vt` has no fixed size.
    pub fn size_bytes(self) -> u32 {
        match self {
            InterpType::I1 | InterpType::U1 => 1,
            InterpType::I2 | InterpType::U2 => 2,
            InterpType::I4 => 4,
            InterpType::I8 => 8,
            InterpType::R4 => 4,
            InterpType::R8 => 8,
            InterpType::O | InterpType::ByRef => std::mem::size_of::<usize>() as u32,
            InterpType::Vt => 0, // caller must use Var::size
            InterpType::Void => 0,
        }
    }

    pub fn is_narrow_integer(self) -> bool {
        matches!(
            self,
            InterpType::I1 | InterpType::U1 | InterpType::I2 | InterpType::U2
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(self, InterpType::I1 | InterpType::I2 | InterpType::I4 | InterpType::I8)
    }
}

/// Which arithmetic operator a `binop_result_type` query is for. MP
/// (managed-pointer) legality is operator-specific (`spec.md` §4.1.5), so
/// the result-type lookup cannot be answered from the operand types alone.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ArithKind {
    Add,
    Sub,
    Mul,
}

/// The type-unification half of `binop_result_type` shared by every
/// operator: plain same-kind widening, with no MP involvement.
fn numeric_widen(lhs: StackType, rhs: StackType) -> Option<StackType> {
    use StackType::*;
    match (lhs, rhs) {
        (I4, I4) => Some(I4),
        (I4, I8) | (I8, I4) | (I8, I8) => Some(I8),
        (R4, R4) => Some(R4),
        (R4, R8) | (R8, R4) | (R8, R8) => Some(R8),
        _ => None,
    }
}

/// Result-type classification for a binary arithmetic operator pair,
/// implementing the widening rules of `spec.md` §4.1.5 ("Arithmetic
/// binary"): I4/I8 widen to I8 on a 64-bit lowering path, R4/R8 widen to
/// R8. MP arithmetic is restricted and depends on which operator is being
/// applied: `Add` accepts `MP+I`/`MP+I4` (and the symmetric `I+MP`) but
/// rejects `MP+MP`; `Sub` additionally accepts `MP-MP` (yielding a plain
/// integer, the pointer difference) but only when the pointer is the left
/// operand; `Mul` accepts no MP combination at all. Every other MP
/// pairing is invalid code, not a silent integer fallback.
pub fn binop_result_type(op: ArithKind, lhs: StackType, rhs: StackType) -> Option<StackType> {
    if let Some(t) = numeric_widen(lhs, rhs) {
        return Some(t);
    }
    use StackType::*;
    match (op, lhs, rhs) {
        (ArithKind::Add, Mp, I4) | (ArithKind::Add, Mp, I8) => Some(Mp),
        (ArithKind::Add, I4, Mp) | (ArithKind::Add, I8, Mp) => Some(Mp),
        (ArithKind::Sub, Mp, I4) | (ArithKind::Sub, Mp, I8) => Some(Mp),
        (ArithKind::Sub, Mp, Mp) => Some(I),
        _ => None,
    }
}

/// The type-unification half shared by bitwise/logical operators, which
/// have no MP-specific legality at all (`spec.md` §4.1.5): any MP operand
/// is rejected by the caller's own `StackType::I4 | StackType::I8` filter.
pub fn bitwise_operand_type(lhs: StackType, rhs: StackType) -> Option<StackType> {
    numeric_widen(lhs, rhs)
}

/// Compare-opcode width alignment: if one side is R4 and the other R8,
/// both are treated as R8 ("align float widths"). Returns the dominant
/// type used to select the compare opcode variant.
pub fn compare_dominant_type(lhs: StackType, rhs: StackType) -> Option<StackType> {
    use StackType::*;
    match (lhs, rhs) {
        (R4, R4) => Some(R4),
        (R4, R8) | (R8, R4) | (R8, R8) => Some(R8),
        (I4, I4) => Some(I4),
        (I4, I8) | (I8, I4) | (I8, I8) => Some(I8),
        (O, O) => Some(O),
        (Mp, Mp) | (Mp, I) | (I, Mp) => Some(I),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_types_collapse_to_i4_on_push() {
        for t in [InterpType::I1, InterpType::U1, InterpType::I2, InterpType::U2, InterpType::I4] {
            assert_eq!(t.to_stack_type(), StackType::I4);
        }
    }

    #[test]
    fn binop_widens_to_i8_and_r8() {
        assert_eq!(binop_result_type(ArithKind::Add, StackType::I4, StackType::I8), Some(StackType::I8));
        assert_eq!(binop_result_type(ArithKind::Add, StackType::R4, StackType::R8), Some(StackType::R8));
        assert_eq!(binop_result_type(ArithKind::Add, StackType::O, StackType::O), None);
    }

    #[test]
    fn mp_arithmetic_is_restricted_per_operator() {
        // MP+I/I4 is valid (symmetric), MP+MP is not.
        assert_eq!(binop_result_type(ArithKind::Add, StackType::Mp, StackType::I4), Some(StackType::Mp));
        assert_eq!(binop_result_type(ArithKind::Add, StackType::I4, StackType::Mp), Some(StackType::Mp));
        assert_eq!(binop_result_type(ArithKind::Add, StackType::Mp, StackType::Mp), None);

        // MP-I/I4 stays a pointer, MP-MP yields a pointer-width integer,
        // but only with the pointer on the left.
        assert_eq!(binop_result_type(ArithKind::Sub, StackType::Mp, StackType::I4), Some(StackType::Mp));
        assert_eq!(binop_result_type(ArithKind::Sub, StackType::Mp, StackType::Mp), Some(StackType::I));
        assert_eq!(binop_result_type(ArithKind::Sub, StackType::I4, StackType::Mp), None);

        // Mul never accepts an MP operand.
        assert_eq!(binop_result_type(ArithKind::Mul, StackType::Mp, StackType::I4), None);
        assert_eq!(binop_result_type(ArithKind::Mul, StackType::Mp, StackType::Mp), None);
    }
}
