//! Opaque entity references into the per-compilation arenas.
//!
//! Blocks, variables and instructions are never touched through raw
//! pointers: each lives in a `PrimaryMap` owned by the `Compiler` and is
//! referenced everywhere else by one of these small `Copy` index types,
//! following the same pattern the teacher crate uses for `Ebb`/`Value`/
//! `Inst` (see `cranelift-codegen/src/ir/entities.rs`). The arena owns,
//! everyone else borrows an index.

use cranelift_entity::entity_impl;

/// A virtual variable in the `Vars` table (`spec.md` §4.3).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct VarId(u32);
entity_impl!(VarId, "var");

/// A basic block in the CFG (`spec.md` §4.2).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");

/// An IR instruction in the instruction pool (`spec.md` §4.4).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct InsId(u32);
entity_impl!(InsId, "ins");
