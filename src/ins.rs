//! The IR instruction pool (`spec.md` §4.4): an arena of `Ins` records
//! forming, per block, an intrusive doubly-linked list through `InsId`
//! indices rather than pointers (see `entities.rs`).

use cranelift_entity::{EntityRef, PrimaryMap};
use smallvec::SmallVec;

use crate::entities::{BlockId, InsId, VarId};

/// Opcode numbers for the emitted `IntOp` stream. The arithmetic/compare/
/// conversion families are laid out so that `(op as u32) + (result_type
/// as u32 - InterpType::I4 as u32)` lands on the type-specialised
/// variant, exactly as `spec.md` §4.1.5 describes ("the opcode tables
/// are laid out so that `OP_XX_I4, _I8, _R4, _R8` are consecutive").
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum IntOp {
    Nop = 0,

    LdcI4,

    MovI1,
    MovU1,
    MovI2,
    MovU2,
    Mov4,
    Mov8,
    MovP,
    MovVt,

    AddI4,
    AddI8,
    AddR4,
    AddR8,
    SubI4,
    SubI8,
    SubR4,
    SubR8,
    MulI4,
    MulI8,
    MulR4,
    MulR8,
    AndI4,
    AndI8,
    OrI4,
    OrI8,
    XorI4,
    XorI8,

    ShlI4,
    ShlI8,
    ShrI4,
    ShrI8,
    ShrUnI4,
    ShrUnI8,

    NegI4,
    NegI8,
    NegR4,
    NegR8,
    NotI4,
    NotI8,

    CeqI4,
    CeqI8,
    CeqR4,
    CeqR8,
    CgtI4,
    CgtI8,
    CgtR4,
    CgtR8,
    CgtUnI4,
    CgtUnI8,
    CgtUnR4,
    CgtUnR8,
    CltI4,
    CltI8,
    CltR4,
    CltR8,
    CltUnI4,
    CltUnI8,
    CltUnR4,
    CltUnR8,

    Br,
    BrFalseI4,
    BrFalseI8,
    BrTrueI4,
    BrTrueI8,
    BeqI4,
    BeqI8,
    BeqR4,
    BeqR8,
    BgeI4,
    BgeI8,
    BgeR4,
    BgeR8,
    BgtI4,
    BgtI8,
    BgtR4,
    BgtR8,
    BleI4,
    BleI8,
    BleR4,
    BleR8,
    BltI4,
    BltI8,
    BltR4,
    BltR8,

    Switch,

    Conv,

    Call,

    RetI4,
    RetI8,
    RetR4,
    RetR8,
    RetO,
    RetVt,
    RetByRef,
    RetVoid,

    Throw,
}

bitflags::bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct InsFlags: u8 {
        const CALL = 0b0000_0001;
        /// Set on a two-operand compare branch lowered from an unsigned
        /// `BrCmp` (`spec.md` §4.1.5): this opcode set has no dedicated
        /// `BgeUn`/`BgtUn`/... family, so the flag carries the distinction
        /// the emitter's interpreter loop needs at dispatch time.
        const UNSIGNED = 0b0000_0010;
    }
}

/// Tagged union for the per-instruction `info` field (`spec.md` §3):
/// a branch target, an ordered list of switch targets, or a call's
/// argument-var/target-method description.
#[derive(Clone, Debug)]
pub enum InsInfo {
    None,
    Branch(BlockId),
    Switch(Vec<BlockId>),
    Call(CallInfo),
}

/// `CallInfo` (`spec.md` §3): the null-terminated list of argument-var
/// indices is represented directly as a `Vec` — Rust has no need for the
/// sentinel-terminated array the source uses, but `ForEachInsSVar`
/// (`spec.md` §4.4) is preserved as a named iteration helper so call
/// sites read the same way.
#[derive(Clone, Debug, Default)]
pub struct CallInfo {
    pub args: Vec<VarId>,
    /// Index into the data-item table of the resolved target method
    /// handle. `None` for indirect/virtual calls resolved at a later
    /// pass not modelled by this core.
    pub target_data_item: Option<u32>,
    /// Byte offset of this call's argument-area within the per-call
    /// argument block, assigned by the emitter (`spec.md` §4.5.1).
    pub call_offset: i32,
}

/// Sentinel recognised by `ForEachInsSVar`: when `s_vars[0]` equals this,
/// the real source list lives in `info`'s `CallInfo::args` rather than in
/// a fixed-size `sVars` slot (`spec.md` §3, "CALL_ARGS_SVAR").
pub fn call_args_svar() -> VarId {
    VarId::new(u32::MAX as usize)
}

/// One IR instruction (`spec.md` §3, `Ins`).
#[derive(Clone, Debug)]
pub struct Ins {
    pub opcode: IntOp,
    pub il_offset: u32,
    /// Set by the emitter during linearisation (`spec.md` §4.5.2).
    pub native_offset: i32,
    pub flags: InsFlags,
    pub s_vars: SmallVec<[VarId; 3]>,
    pub d_var: Option<VarId>,
    pub data: SmallVec<[i32; 2]>,
    pub info: InsInfo,

    prev: Option<InsId>,
    next: Option<InsId>,
}

impl Ins {
    fn new(opcode: IntOp, il_offset: u32) -> Ins {
        Ins {
            opcode,
            il_offset,
            native_offset: -1,
            flags: InsFlags::empty(),
            s_vars: SmallVec::new(),
            d_var: None,
            data: SmallVec::new(),
            info: InsInfo::None,
            prev: None,
            next: None,
        }
    }

    pub fn is_nop(&self) -> bool {
        self.opcode == IntOp::Nop
    }

    /// `ForEachInsSVar`: iterates source-var slots, transparently
    /// expanding the call-args sentinel into the underlying argument
    /// list (`spec.md` §4.4).
    pub fn for_each_s_var(&self, mut f: impl FnMut(VarId)) {
        for &sv in &self.s_vars {
            if sv == call_args_svar() {
                if let InsInfo::Call(ci) = &self.info {
                    for &arg in &ci.args {
                        f(arg);
                    }
                }
            } else {
                f(sv);
            }
        }
    }
}

/// Arena owning every `Ins` allocated during one compilation, plus the
/// intrusive per-block doubly-linked list threaded through `prev`/`next`.
#[derive(Default)]
pub struct InsPool {
    table: PrimaryMap<InsId, Ins>,
}

impl InsPool {
    pub fn new() -> InsPool {
        InsPool {
            table: PrimaryMap::new(),
        }
    }

    pub fn get(&self, id: InsId) -> &Ins {
        &self.table[id]
    }

    pub fn get_mut(&mut self, id: InsId) -> &mut Ins {
        &mut self.table[id]
    }

    fn alloc(&mut self, opcode: IntOp, il_offset: u32) -> InsId {
        self.table.push(Ins::new(opcode, il_offset))
    }

    /// `AddIns`: appends a freshly allocated instruction to the end of
    /// `block`'s list, updating head/tail.
    pub fn add_ins(&mut self, head: &mut Option<InsId>, tail: &mut Option<InsId>, opcode: IntOp, il_offset: u32) -> InsId {
        let id = self.alloc(opcode, il_offset);
        match *tail {
            Some(prev_tail) => {
                self.table[prev_tail].next = Some(id);
                self.table[id].prev = Some(prev_tail);
            }
            None => {
                *head = Some(id);
            }
        }
        *tail = Some(id);
        id
    }

    /// `InsertInsBB`: inserts `new_ins` immediately after `after` in the
    /// list (used by join-point move insertion, §4.1.6).
    pub fn insert_after(&mut self, tail: &mut Option<InsId>, after: InsId, opcode: IntOp, il_offset: u32) -> InsId {
        let id = self.alloc(opcode, il_offset);
        let old_next = self.table[after].next;
        self.table[after].next = Some(id);
        self.table[id].prev = Some(after);
        self.table[id].next = old_next;
        match old_next {
            Some(n) => self.table[n].prev = Some(id),
            None => *tail = Some(id),
        }
        id
    }

    /// `ClearIns`: rewrite an instruction to `NOP` in place. Link
    /// pointers remain valid so outer loops over the list are not
    /// perturbed (`spec.md` §3).
    pub fn clear_ins(&mut self, id: InsId) {
        let ins = &mut self.table[id];
        ins.opcode = IntOp::Nop;
        ins.s_vars.clear();
        ins.d_var = None;
        ins.data.clear();
        ins.info = InsInfo::None;
    }

    pub fn next(&self, id: InsId) -> Option<InsId> {
        self.table[id].next
    }

    pub fn prev(&self, id: InsId) -> Option<InsId> {
        self.table[id].prev
    }

    /// `NextRealIns`: skip forward over `NOP`s.
    pub fn next_real(&self, mut id: InsId) -> Option<InsId> {
        while let Some(n) = self.table[id].next {
            if !self.table[n].is_nop() {
                return Some(n);
            }
            id = n;
        }
        None
    }

    /// `FirstRealIns`: the first non-`NOP` instruction starting at
    /// `head`, inclusive.
    pub fn first_real(&self, head: Option<InsId>) -> Option<InsId> {
        let mut cur = head;
        while let Some(id) = cur {
            if !self.table[id].is_nop() {
                return Some(id);
            }
            cur = self.table[id].next;
        }
        None
    }

    /// Iterates every instruction (including `NOP`s) of a block's list
    /// from `head` to `tail`, in layout order.
    pub fn iter_block(&self, head: Option<InsId>) -> BlockInsIter<'_> {
        BlockInsIter { pool: self, cur: head }
    }
}

pub struct BlockInsIter<'a> {
    pool: &'a InsPool,
    cur: Option<InsId>,
}

impl<'a> Iterator for BlockInsIter<'a> {
    type Item = InsId;
    fn next(&mut self) -> Option<InsId> {
        let cur = self.cur?;
        self.cur = self.pool.table[cur].next;
        Some(cur)
    }
}
