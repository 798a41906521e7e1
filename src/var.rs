//! The virtual variable table (`spec.md` §4.3).

use cranelift_entity::PrimaryMap;

use crate::entities::VarId;
use crate::types::InterpType;

/// Opaque handle to a class/layout description, supplied by the `CompHnd`
/// oracle. The core never inspects its contents.
pub type ClassHandle = u64;

pub const NO_OFFSET: i32 = -1;

/// A virtual variable, `spec.md` §3 "Virtual variable (`Var`)".
#[derive(Clone, Debug)]
pub struct Var {
    pub interp_type: InterpType,
    pub class_handle: Option<ClassHandle>,
    /// Size in bytes; only meaningful when `interp_type == Vt`.
    pub size: u32,
    /// Byte offset into the frame; `NO_OFFSET` until assigned (§4.5.1).
    pub offset: i32,
    /// Dedicated slot for a whole-method-lifetime variable (IL args/locals).
    pub global: bool,
    /// True for the arg/local prologue vars, as opposed to evaluation-
    /// stack temporaries.
    pub il_global: bool,
    /// Reserved for a later indirection-counting pass; never read by the
    /// core itself.
    pub indirects: u32,
    pub live_start: Option<u32>,
    pub live_end: Option<u32>,
}

impl Var {
    fn new(interp_type: InterpType, class_handle: Option<ClassHandle>, size: u32) -> Var {
        Var {
            interp_type,
            class_handle,
            size,
            offset: NO_OFFSET,
            global: false,
            il_global: false,
            indirects: 0,
            live_start: None,
            live_end: None,
        }
    }

    pub fn has_offset(&self) -> bool {
        self.offset != NO_OFFSET
    }

    /// Size used for stack-slot alignment purposes: the declared size
    /// for value types, otherwise the type's natural size.
    pub fn slot_size(&self) -> u32 {
        if self.interp_type == InterpType::Vt {
            self.size
        } else {
            self.interp_type.size_bytes()
        }
    }
}

/// Owns every `Var` created during one compilation. Variables never move
/// (indices are stable) but the backing storage may reallocate, matching
/// `spec.md` §4.3's lifecycle note.
#[derive(Default)]
pub struct Vars {
    table: PrimaryMap<VarId, Var>,
}

impl Vars {
    pub fn new() -> Vars {
        Vars {
            table: PrimaryMap::new(),
        }
    }

    /// `CreateVar`: appends a fresh, non-global, offset-less variable.
    pub fn create_var(
        &mut self,
        interp_type: InterpType,
        class_handle: Option<ClassHandle>,
        size: u32,
    ) -> VarId {
        self.table.push(Var::new(interp_type, class_handle, size))
    }

    /// Creates an IL argument/local var with a precomputed global stack
    /// offset, used only by the variable prologue (`spec.md` §4.1.1).
    pub fn create_il_global(
        &mut self,
        interp_type: InterpType,
        class_handle: Option<ClassHandle>,
        size: u32,
        offset: i32,
    ) -> VarId {
        let id = self.table.push(Var::new(interp_type, class_handle, size));
        let v = &mut self.table[id];
        v.global = true;
        v.il_global = true;
        v.offset = offset;
        id
    }

    pub fn get(&self, id: VarId) -> &Var {
        &self.table[id]
    }

    pub fn get_mut(&mut self, id: VarId) -> &mut Var {
        &mut self.table[id]
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Var)> {
        self.table.iter()
    }
}

/// A move-opcode family: `MovForType` (`spec.md` §4.3) returns one of
/// these identifying which concrete `IntOp` the emitter should use to
/// move a value of the given type between two stack slots.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MoveOp {
    /// Narrow integer, sign-extending 1-byte load.
    MovI1,
    /// Narrow integer, zero-extending 1-byte load.
    MovU1,
    MovI2,
    MovU2,
    Mov4,
    Mov8,
    MovP,
    /// Value-type move; carries the size as an extra operand.
    MovVt,
}

/// `MovForType(interpType, signExtend)`, `spec.md` §4.3: narrow integers
/// have two variants (sign-extending and plain 4-byte load), 4/8/pointer/
/// VT are single opcodes.
pub fn mov_for_type(interp_type: InterpType, sign_extend: bool) -> MoveOp {
    match interp_type {
        InterpType::I1 => {
            if sign_extend {
                MoveOp::MovI1
            } else {
                MoveOp::Mov4
            }
        }
        InterpType::U1 => {
            if sign_extend {
                MoveOp::MovU1
            } else {
                MoveOp::Mov4
            }
        }
        InterpType::I2 => {
            if sign_extend {
                MoveOp::MovI2
            } else {
                MoveOp::Mov4
            }
        }
        InterpType::U2 => {
            if sign_extend {
                MoveOp::MovU2
            } else {
                MoveOp::Mov4
            }
        }
        InterpType::I4 | InterpType::R4 => MoveOp::Mov4,
        InterpType::I8 | InterpType::R8 => MoveOp::Mov8,
        InterpType::O | InterpType::ByRef => MoveOp::MovP,
        InterpType::Vt => MoveOp::MovVt,
        InterpType::Void => unreachable!("no move opcode for void"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_var_assigns_stable_growing_indices() {
        let mut vars = Vars::new();
        let a = vars.create_var(InterpType::I4, None, 0);
        let b = vars.create_var(InterpType::I8, None, 0);
        assert_ne!(a, b);
        assert_eq!(vars.get(a).interp_type, InterpType::I4);
        assert_eq!(vars.get(b).interp_type, InterpType::I8);
        assert!(!vars.get(a).has_offset());
    }

    #[test]
    fn move_op_size_matches_interp_type_size() {
        for (t, expect) in [
            (InterpType::I1, 1),
            (InterpType::U2, 2),
            (InterpType::I4, 4),
            (InterpType::I8, 8),
        ] {
            let mov = mov_for_type(t, true);
            let size = match mov {
                MoveOp::MovI1 | MoveOp::MovU1 => 1,
                MoveOp::MovI2 | MoveOp::MovU2 => 2,
                MoveOp::Mov4 => 4,
                MoveOp::Mov8 => 8,
                MoveOp::MovP => std::mem::size_of::<usize>() as u32,
                MoveOp::MovVt => 0,
            };
            assert_eq!(size, expect, "{:?}", t);
        }
    }
}
