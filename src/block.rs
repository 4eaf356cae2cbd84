//! Blocks and quotation.
//!
//! A block is a tagged cell: attributes in the header word, then the
//! opcode list. The bytecode parser composes these constructors; the
//! evaluator's quotation operator is `quote`.

use crate::context::Context;
use crate::error::{Result, RtError};
use crate::value::{BlockAttrs, ObjTag, Tag, Value, OPVAL_LAZYKF};

impl Context {
    /// Push a block with an empty opcode list and no attributes.
    pub fn intro_block(&mut self) -> Result<()> {
        let block = self.alloc_cell(Tag::Obj, ObjTag::Block as u32, Value::UNIT_INR.raw())?;
        self.push_owned(block)
    }

    /// Add attributes to the block atop the stack.
    pub fn block_attrib(&mut self, attrs: BlockAttrs) -> Result<()> {
        let cell = self.stack_cell()?;
        let v = Value(self.arena().word(cell));
        if v.is_smallint() || v.tag() != Tag::Obj || v.addr() == 0 {
            return Err(RtError::TypeError);
        }
        let otag = self.arena().word(v.addr());
        if ObjTag::of(otag) != Some(ObjTag::Block) {
            return Err(RtError::TypeError);
        }
        self.arena().set_word(v.addr(), otag | attrs.bits());
        Ok(())
    }

    /// Quote the value atop the stack: `v` becomes the block `[v]` holding
    /// it as a single operand.
    ///
    /// The quoted value keeps its substructural obligations lazily: the
    /// opval carries the deferred-check bit, so an affine or relevant
    /// value inside still fails copy or drop.
    pub fn quote(&mut self) -> Result<()> {
        let cell = self.stack_cell()?;
        let v = Value(self.arena().word(cell));
        let opval = self.alloc_cell(Tag::Obj, ObjTag::Opval as u32 | OPVAL_LAZYKF, v.raw())?;
        let ops = match self.alloc_cell(Tag::PairL, opval.raw(), Value::UNIT_INR.raw()) {
            Ok(ops) => ops,
            Err(e) => {
                self.free_cell(opval.addr());
                return Err(e);
            }
        };
        let block = match self.alloc_cell(Tag::Obj, ObjTag::Block as u32, ops.raw()) {
            Ok(block) => block,
            Err(e) => {
                self.free_cell(ops.addr());
                self.free_cell(opval.addr());
                return Err(e);
            }
        };
        self.arena().set_word(cell, block.raw());
        Ok(())
    }
}
