//! Sum wrapping, unwrapping, distribution, and factoring.
//!
//! Sums are cheap: wrapping a pair just re-tags its pointer, wrapping a
//! deep sum shifts two more direction bits into its tag word, and only the
//! general case allocates a deep-sum cell. A cell holds up to twelve
//! directions before chaining.

use crate::consts::WORD_SIZE;
use crate::context::Context;
use crate::error::{Result, RtError};
use crate::value::{ObjTag, SumTag, Tag, Value, DEEPSUM_INL, DEEPSUM_INR};

fn dir_bits(tag: SumTag) -> u32 {
    match tag {
        SumTag::InL => DEEPSUM_INL,
        SumTag::InR => DEEPSUM_INR,
    }
}

/// Wrap a value in one sum layer.
pub(crate) fn wrap_sum_value(cx: &mut Context, tag: SumTag, v: Value) -> Result<Value> {
    if !v.is_smallint() {
        if v.tag() == Tag::Pair {
            // re-tag the pair pointer; covers unit at address zero
            let ptag = match tag {
                SumTag::InL => Tag::PairL,
                SumTag::InR => Tag::PairR,
            };
            return Ok(Value::tagged(ptag, v.addr()));
        }
        if v.tag() == Tag::Obj && v.addr() != 0 {
            let otag = cx.arena().word(v.addr());
            // two free direction bits remain while the tag is below 1<<30
            if ObjTag::of(otag) == Some(ObjTag::DeepSum) && otag < (1 << 30) {
                let dirs = ((otag >> 8) << 2) | dir_bits(tag);
                cx.arena()
                    .set_word(v.addr(), (dirs << 8) | ObjTag::DeepSum as u32);
                return Ok(v);
            }
        }
    }
    cx.alloc_cell(
        Tag::Obj,
        (dir_bits(tag) << 8) | ObjTag::DeepSum as u32,
        v.raw(),
    )
}

/// Unwrap one sum layer, returning the direction and the inner value. An
/// exhausted deep-sum cell is popped back to the value it contains.
pub(crate) fn unwrap_sum_value(cx: &mut Context, v: Value) -> Result<(SumTag, Value)> {
    if v.is_smallint() {
        return Err(RtError::TypeError);
    }
    match v.tag() {
        Tag::PairL => Ok((SumTag::InL, Value::tagged(Tag::Pair, v.addr()))),
        Tag::PairR => Ok((SumTag::InR, Value::tagged(Tag::Pair, v.addr()))),
        Tag::Obj if v.addr() != 0 => {
            let addr = v.addr();
            let (otag, inner) = cx.arena().cell(addr);
            match ObjTag::of(otag) {
                Some(ObjTag::DeepSum) => {
                    let dirs = otag >> 8;
                    let tag = if dirs & 3 == DEEPSUM_INR {
                        SumTag::InR
                    } else {
                        SumTag::InL
                    };
                    let rest = dirs >> 2;
                    if rest == 0 {
                        cx.free_cell(addr);
                        Ok((tag, Value(inner)))
                    } else {
                        cx.arena()
                            .set_word(addr, (rest << 8) | ObjTag::DeepSum as u32);
                        Ok((tag, v))
                    }
                }
                Some(ObjTag::Array) | Some(ObjTag::Binary) | Some(ObjTag::Text) => {
                    Err(RtError::Impl)
                }
                _ => Err(RtError::TypeError),
            }
        }
        _ => Err(RtError::TypeError),
    }
}

impl Context {
    /// Wrap the value atop the stack in one sum layer.
    pub fn wrap_sum(&mut self, tag: SumTag) -> Result<()> {
        let cell = self.stack_cell()?;
        let v = Value(self.arena().word(cell));
        let wrapped = wrap_sum_value(self, tag, v)?;
        self.arena().set_word(cell, wrapped.raw());
        Ok(())
    }

    /// Unwrap one sum layer from the value atop the stack, reporting its
    /// direction.
    pub fn unwrap_sum(&mut self) -> Result<SumTag> {
        let cell = self.stack_cell()?;
        let v = Value(self.arena().word(cell));
        let (tag, inner) = unwrap_sum_value(self, v)?;
        self.arena().set_word(cell, inner.raw());
        Ok(tag)
    }

    /// `(a, (L b | R b, e)) → (L (a,b) | R (a,b), e)`.
    ///
    /// Pure pointer manipulation; never allocates.
    pub fn sum_distrib(&mut self) -> Result<()> {
        let c1 = self.stack_cell()?;
        let (_, rest) = self.arena().cell(c1);
        let c2 = Value(rest).pair_cell().ok_or(RtError::TypeError)?;
        let s = Value(self.arena().word(c2));
        let (dir, inner) = unwrap_sum_value(self, s)?;
        let ptag = match dir {
            SumTag::InL => Tag::PairL,
            SumTag::InR => Tag::PairR,
        };
        self.arena().set_word(c1 + WORD_SIZE, inner.raw());
        self.arena().set_word(c2, Value::tagged(ptag, c1).raw());
        self.set_root(Value::tagged(Tag::Pair, c2));
        Ok(())
    }

    /// `(L (a,b) | R (a,b), e) → (a, (L b | R b, e))` — the exact inverse
    /// of [`Context::sum_distrib`].
    pub fn sum_factor(&mut self) -> Result<()> {
        let c1 = self.stack_cell()?;
        let (s, e) = self.arena().cell(c1);
        let s = Value(s);
        // the payload one unwrap down must be a pair
        let pair_inside = if s.is_smallint() {
            false
        } else {
            match s.tag() {
                Tag::PairL | Tag::PairR => s.addr() != 0,
                Tag::Obj if s.addr() != 0 => {
                    let (otag, inner) = self.arena().cell(s.addr());
                    match ObjTag::of(otag) {
                        Some(ObjTag::DeepSum) => {
                            (otag >> 10) == 0 && Value(inner).pair_cell().is_some()
                        }
                        Some(ObjTag::Array) | Some(ObjTag::Binary) | Some(ObjTag::Text) => {
                            return Err(RtError::Impl)
                        }
                        _ => false,
                    }
                }
                _ => false,
            }
        };
        if !pair_inside {
            return Err(RtError::TypeError);
        }
        let (dir, pair) = unwrap_sum_value(self, s)?;
        let cp = pair.addr();
        let (a, b) = self.arena().cell(cp);
        let wb = wrap_sum_value(self, dir, Value(b))?;
        self.arena().set_cell(cp, wb.raw(), e);
        self.arena()
            .set_cell(c1, a, Value::tagged(Tag::Pair, cp).raw());
        self.set_root(Value::tagged(Tag::Pair, c1));
        Ok(())
    }
}
