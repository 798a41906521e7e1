//! Conversion lowering (`spec.md` §4.1.5, "Conversion"): a small table
//! keyed by `(source stack type, target InterpType, signed/unsigned,
//! pointer width)` selecting the concrete conversion opcode. Identity
//! conversions emit nothing.

use crate::il::ConvTarget;
use crate::types::{InterpType, StackType};

/// A concrete conversion opcode. Float<->int conversions always go
/// through a dedicated converter, never through a plain move.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConvOp {
    /// No-op: the identity conversion.
    Identity,
    I4ToI8,
    I4ToU8,
    I8ToI4,
    I4ToR4,
    I4ToR8,
    I8ToR4,
    I8ToR8,
    R4ToI4,
    R4ToI8,
    R4ToR8,
    R8ToI4,
    R8ToI8,
    R8ToR4,
    /// Narrowing to a narrower integer `InterpType`; `target` records the
    /// InterpType the value is truncated to. The grounding source gives
    /// each narrow target four opcode variants, one per source stack
    /// type (`EmitConv`'s `CEE_CONV_I1`/`U1`/`I2`/`U2` cases each switch
    /// on the source type); these four variants mirror that split rather
    /// than collapsing every source onto one "narrow" tag.
    Narrow(InterpType),
    I8ToNarrow(InterpType),
    R4ToNarrow(InterpType),
    R8ToNarrow(InterpType),
}

impl ConvTarget {
    pub fn to_interp_type(self) -> InterpType {
        match self {
            ConvTarget::I1 => InterpType::I1,
            ConvTarget::U1 => InterpType::U1,
            ConvTarget::I2 => InterpType::I2,
            ConvTarget::U2 => InterpType::U2,
            ConvTarget::I4 | ConvTarget::U4 => InterpType::I4,
            ConvTarget::I8 | ConvTarget::U8 => InterpType::I8,
            ConvTarget::R4 => InterpType::R4,
            ConvTarget::R8 => InterpType::R8,
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, ConvTarget::U1 | ConvTarget::U2 | ConvTarget::U4 | ConvTarget::U8)
    }
}

/// Selects the conversion opcode for `source -> target`. Returns `None`
/// for an identity conversion (nothing to emit).
pub fn select_conversion(source: StackType, target: ConvTarget) -> Option<ConvOp> {
    let target_interp = target.to_interp_type();

    match (source, target_interp) {
        (StackType::I4, InterpType::I4) => None,
        (StackType::I8, InterpType::I8) => None,
        (StackType::R4, InterpType::R4) => None,
        (StackType::R8, InterpType::R8) => None,

        (StackType::I4, InterpType::I8) => {
            Some(if target.is_unsigned() { ConvOp::I4ToU8 } else { ConvOp::I4ToI8 })
        }
        (StackType::I8, InterpType::I4) => Some(ConvOp::I8ToI4),

        (StackType::I4, InterpType::R4) => Some(ConvOp::I4ToR4),
        (StackType::I4, InterpType::R8) => Some(ConvOp::I4ToR8),
        (StackType::I8, InterpType::R4) => Some(ConvOp::I8ToR4),
        (StackType::I8, InterpType::R8) => Some(ConvOp::I8ToR8),

        (StackType::R4, InterpType::I4) => Some(ConvOp::R4ToI4),
        (StackType::R4, InterpType::I8) => Some(ConvOp::R4ToI8),
        (StackType::R4, InterpType::R8) => Some(ConvOp::R4ToR8),
        (StackType::R8, InterpType::I4) => Some(ConvOp::R8ToI4),
        (StackType::R8, InterpType::I8) => Some(ConvOp::R8ToI8),
        (StackType::R8, InterpType::R4) => Some(ConvOp::R8ToR4),

        (StackType::I4, narrow) if narrow.is_narrow_integer() => Some(ConvOp::Narrow(narrow)),
        (StackType::I8, narrow) if narrow.is_narrow_integer() => Some(ConvOp::I8ToNarrow(narrow)),
        (StackType::R4, narrow) if narrow.is_narrow_integer() => Some(ConvOp::R4ToNarrow(narrow)),
        (StackType::R8, narrow) if narrow.is_narrow_integer() => Some(ConvOp::R8ToNarrow(narrow)),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_conversion_emits_nothing() {
        assert_eq!(select_conversion(StackType::I4, ConvTarget::I4), None);
        assert_eq!(select_conversion(StackType::R8, ConvTarget::R8), None);
    }

    #[test]
    fn float_to_int_always_goes_through_dedicated_converter() {
        assert_eq!(select_conversion(StackType::R4, ConvTarget::I4), Some(ConvOp::R4ToI4));
        assert_eq!(select_conversion(StackType::R8, ConvTarget::I8), Some(ConvOp::R8ToI8));
    }

    #[test]
    fn narrowing_conversion_keeps_target_type() {
        assert_eq!(
            select_conversion(StackType::I4, ConvTarget::U1),
            Some(ConvOp::Narrow(InterpType::U1))
        );
    }

    #[test]
    fn narrowing_from_wider_sources_uses_the_matching_converter() {
        assert_eq!(
            select_conversion(StackType::I8, ConvTarget::I1),
            Some(ConvOp::I8ToNarrow(InterpType::I1))
        );
        assert_eq!(
            select_conversion(StackType::R4, ConvTarget::U2),
            Some(ConvOp::R4ToNarrow(InterpType::U2))
        );
        assert_eq!(
            select_conversion(StackType::R8, ConvTarget::I2),
            Some(ConvOp::R8ToNarrow(InterpType::I2))
        );
    }
}
