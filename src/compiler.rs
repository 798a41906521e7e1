//! `Compiler`: the per-compilation arena tying together the CFG, the var
//! table and the instruction pool (`spec.md` §5 "Concurrency & resource
//! model" — one compiler per in-flight compilation, destroyed as a unit
//! when the compilation ends).

use crate::cfg::Cfg;
use crate::comp_hnd::CompHnd;
use crate::data_items::DataItems;
use crate::entities::{BlockId, InsId};
use crate::ins::InsPool;
use crate::method::MethodInfo;
use crate::stack::EvalStack;
use crate::var::Vars;

/// Importer-local mutable state threaded through block import
/// (`spec.md` §4.1.4): which block is currently being emitted, the
/// evaluation stack, the sticky invalid-code flag, and `linkBBlocks`.
pub struct ImportState {
    pub eval_stack: EvalStack,
    pub cur_block: Option<BlockId>,
    pub link_to_next: bool,
    /// `spec.md` §9: a single sticky flag rather than threading a
    /// `Result` through every opcode decoder; the per-block loop checks
    /// it once per iteration.
    pub invalid: Option<crate::error::CompileError>,
}

impl ImportState {
    fn new() -> ImportState {
        ImportState {
            eval_stack: EvalStack::new(),
            cur_block: None,
            link_to_next: true,
            invalid: None,
        }
    }
}

pub struct Compiler<'a> {
    pub method: &'a MethodInfo,
    pub comp_hnd: &'a dyn CompHnd,
    pub cfg: Cfg,
    pub vars: Vars,
    pub ins: InsPool,
    pub data_items: DataItems,
    pub import_state: ImportState,
    /// Running offset bump-allocator used by the prologue and, later, by
    /// `allocate_var_offsets` (`spec.md` §4.1.1, §4.5.1).
    pub total_vars_stack_size: u32,
    /// Byte offset where the reserved call-argument area begins;
    /// assigned once offset allocation finishes (`spec.md` §4.5.1).
    pub param_area_offset: u32,
    pub relocations: Vec<crate::emitter::Relocation>,
}

/// Stack-slot size in bytes: all var offsets are multiples of this
/// (`spec.md` GLOSSARY "Stack slot").
pub const STACK_SLOT_SIZE: u32 = 8;

pub fn align_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

impl<'a> Compiler<'a> {
    pub fn new(method: &'a MethodInfo, comp_hnd: &'a dyn CompHnd) -> Compiler<'a> {
        Compiler {
            method,
            comp_hnd,
            cfg: Cfg::new(),
            vars: Vars::new(),
            ins: InsPool::new(),
            data_items: DataItems::new(),
            import_state: ImportState::new(),
            total_vars_stack_size: 0,
            param_area_offset: 0,
            relocations: Vec::new(),
        }
    }

    pub fn add_ins(&mut self, block: BlockId, opcode: crate::ins::IntOp, il_offset: u32) -> InsId {
        let mut head = self.cfg.get(block).first_ins;
        let mut tail = self.cfg.get(block).last_ins;
        let id = self.ins.add_ins(&mut head, &mut tail, opcode, il_offset);
        let b = self.cfg.get_mut(block);
        b.first_ins = head;
        b.last_ins = tail;
        id
    }

    pub fn insert_after(&mut self, block: BlockId, after: InsId, opcode: crate::ins::IntOp, il_offset: u32) -> InsId {
        let mut tail = self.cfg.get(block).last_ins;
        let id = self.ins.insert_after(&mut tail, after, opcode, il_offset);
        self.cfg.get_mut(block).last_ins = tail;
        id
    }
}
