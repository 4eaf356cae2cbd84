//! Structural copy and drop.
//!
//! Both walks keep their pending work in a list allocated inside the value
//! arena itself, never on the host call stack. Copy tasks are destination
//! slots still holding uncopied source words; a two-cell stride form covers
//! a whole freshly allocated spine with one task. Drop reuses the cells it
//! is about to free as its own work list.

use crate::consts::{CELL_SIZE, WORD_SIZE};
use crate::context::Context;
use crate::error::{Result, RtError};
use crate::value::{
    bignum_digits, block_affine, block_relevant, seal_len, Addr, ObjTag, Tag, Value,
    OPVAL_LAZYKF,
};

// Pop the next destination slot off the copy work list.
fn next_slot(cx: &mut Context, list: &mut Value) -> Option<Addr> {
    let addr = list.addr();
    if addr == 0 {
        return None;
    }
    match list.tag() {
        Tag::PairL => {
            let (slot, next) = cx.arena().cell(addr);
            *list = Value(next);
            cx.free_cell(addr);
            Some(slot)
        }
        Tag::Obj => {
            // stride task: (slot, step, count, next)
            let slot = cx.arena().word(addr);
            let step = cx.arena().word(addr + WORD_SIZE);
            let count = cx.arena().word(addr + 2 * WORD_SIZE) - 1;
            cx.arena().set_word(addr, slot + step);
            cx.arena().set_word(addr + 2 * WORD_SIZE, count);
            if count == 0 {
                *list = Value(cx.arena().word(addr + 3 * WORD_SIZE));
                cx.free(2 * CELL_SIZE, addr);
            }
            Some(slot)
        }
        _ => panic!("copy work list corrupted"),
    }
}

fn push_slot(cx: &mut Context, list: &mut Value, slot: Addr) -> Result<()> {
    *list = cx.alloc_cell(Tag::PairL, slot, list.raw())?;
    Ok(())
}

fn push_stride(
    cx: &mut Context,
    list: &mut Value,
    slot: Addr,
    step: u32,
    count: u32,
) -> Result<()> {
    if count == 1 {
        return push_slot(cx, list, slot);
    }
    *list = cx.alloc_dcell(slot, step, count, list.raw())?;
    Ok(())
}

// Cells in the right spine of a list or stack, following the second word
// of each pair until it stops being a pair reference.
fn spine_length(cx: &Context, mut v: Value) -> u32 {
    let mut count = 0;
    while !v.is_smallint() && v.tag() != Tag::Obj && v.addr() != 0 {
        v = Value(cx.arena().word(v.addr() + WORD_SIZE));
        count += 1;
    }
    count
}

/// Deep-copy the value stored at `first_slot`, in place.
///
/// The slot already holds the source word; shallow words are left alone and
/// everything else is replaced by a fresh copy. With `copy_aff` false, an
/// affine block fails the walk with [`RtError::TypeError`]; quoted values
/// without the lazy-check bit are copied with the check suppressed.
///
/// On failure every destination slot not yet copied is rewritten to unit,
/// so the partial copy shares nothing with the source and can be dropped
/// like any other value.
pub(crate) fn copy_value(cx: &mut Context, first_slot: Addr, copy_aff: bool) -> Result<()> {
    let mut list = Value::UNIT_INR;
    let mut slot = first_slot;
    loop {
        match copy_step(cx, &mut list, slot, copy_aff) {
            Ok(Some(next)) => slot = next,
            Ok(None) => match next_slot(cx, &mut list) {
                Some(next) => slot = next,
                None => break,
            },
            Err(e) => {
                cx.arena().set_word(slot, Value::UNIT.raw());
                while let Some(pending) = next_slot(cx, &mut list) {
                    cx.arena().set_word(pending, Value::UNIT.raw());
                }
                return Err(e);
            }
        }
    }
    debug_assert_eq!(list, Value::UNIT_INR);
    Ok(())
}

// Copy the one source word at `slot`; `Some` descends into the returned
// destination slot, `None` moves on to the next pending task.
fn copy_step(
    cx: &mut Context,
    list: &mut Value,
    slot: Addr,
    copy_aff: bool,
) -> Result<Option<Addr>> {
    let v0 = Value(cx.arena().word(slot));
    if v0.is_shallow() {
        return Ok(None);
    }
    if v0.tag() != Tag::Obj {
        // A pair: copy the whole right spine as one block, scheduling a
        // single stride task for the element slots. This is the common
        // list/stack case.
        let tag = v0.tag();
        let addr = v0.addr();
        let tail = Value(cx.arena().word(addr + WORD_SIZE));
        let cells = 1 + spine_length(cx, tail);
        let spine = cx.alloc(cells * CELL_SIZE)?;
        if let Err(e) = push_stride(cx, list, spine, CELL_SIZE, cells) {
            cx.free(cells * CELL_SIZE, spine);
            return Err(e);
        }
        cx.arena().set_word(slot, Value::tagged(tag, spine).raw());

        let mut src = addr;
        let mut dst = spine;
        for _ in 1..cells {
            let (w0, w1) = cx.arena().cell(src);
            let link = Value(w1);
            let next = dst + CELL_SIZE;
            cx.arena()
                .set_cell(dst, w0, Value::tagged(link.tag(), next).raw());
            src = link.addr();
            dst = next;
        }
        let (w0, w1) = cx.arena().cell(src);
        cx.arena().set_cell(dst, w0, w1);
        return Ok(Some(dst + WORD_SIZE));
    }
    let addr = v0.addr();
    let (otag, inner) = cx.arena().cell(addr);
    match ObjTag::of(otag) {
        Some(ObjTag::DeepSum) | Some(ObjTag::SealSm) => {
            let copy = cx.alloc_cell(Tag::Obj, otag, inner)?;
            cx.arena().set_word(slot, copy.raw());
            Ok(Some(copy.addr() + WORD_SIZE))
        }
        Some(ObjTag::Block) => {
            if block_affine(otag) && !copy_aff {
                return Err(RtError::TypeError);
            }
            let copy = cx.alloc_cell(Tag::Obj, otag, inner)?;
            cx.arena().set_word(slot, copy.raw());
            Ok(Some(copy.addr() + WORD_SIZE))
        }
        Some(ObjTag::Opval) => {
            if otag & OPVAL_LAZYKF != 0 || copy_aff {
                // propagate the pending substructural check inward
                let copy = cx.alloc_cell(Tag::Obj, otag, inner)?;
                cx.arena().set_word(slot, copy.raw());
                Ok(Some(copy.addr() + WORD_SIZE))
            } else {
                // quoted value: copy with affine checks suppressed
                copy_value(cx, slot, true)?;
                Ok(None)
            }
        }
        Some(ObjTag::Bignum) => {
            let len = WORD_SIZE * (1 + bignum_digits(otag));
            let copy = cx.alloc(len)?;
            cx.arena().copy_words(addr, copy, len);
            cx.arena()
                .set_word(slot, Value::tagged(Tag::Obj, copy).raw());
            Ok(None)
        }
        Some(ObjTag::Seal) => {
            let len = CELL_SIZE + seal_len(otag);
            let copy = cx.alloc(len)?;
            cx.arena().copy_words(addr, copy, len);
            cx.arena()
                .set_word(slot, Value::tagged(Tag::Obj, copy).raw());
            Ok(Some(copy + WORD_SIZE))
        }
        Some(ObjTag::Array)
        | Some(ObjTag::Binary)
        | Some(ObjTag::Text)
        | Some(ObjTag::Stowage) => Err(RtError::Impl),
        None => panic!("copy: unrecognized object tag {otag:#x}"),
    }
}

/// Destroy a value, returning every reachable cell to the free lists.
///
/// With `drop_rel` false, a relevant block fails the walk with
/// [`RtError::TypeError`]. A refusal at the root mutates nothing; a refusal
/// mid-walk strands the cells already deferred until the context is
/// destroyed, but never leaves a freed cell reachable. Quoted values
/// without the lazy-check bit are dropped with the check suppressed.
pub(crate) fn drop_value(cx: &mut Context, v: Value, drop_rel: bool) -> Result<()> {
    let mut list = Value::UNIT_INR;
    let mut v = v;
    loop {
        if v.is_shallow() {
            if list == Value::UNIT_INR {
                return Ok(());
            }
            let addr = list.addr();
            match list.tag() {
                Tag::PairL => {
                    let (w0, w1) = cx.arena().cell(addr);
                    v = Value(w0);
                    list = Value(w1);
                    cx.free_cell(addr);
                }
                _ => panic!("drop work list corrupted"),
            }
            continue;
        }
        let addr = v.addr();
        match v.tag() {
            Tag::Pair | Tag::PairL | Tag::PairR => {
                // walk the spine, deferring the elements; the cell itself
                // becomes the work-list node and is freed when popped
                let tail = cx.arena().word(addr + WORD_SIZE);
                cx.arena().set_word(addr + WORD_SIZE, list.raw());
                list = Value::tagged(Tag::PairL, addr);
                v = Value(tail);
            }
            Tag::Obj => {
                let (otag, inner) = cx.arena().cell(addr);
                match ObjTag::of(otag) {
                    Some(ObjTag::DeepSum) | Some(ObjTag::SealSm) => {
                        cx.free_cell(addr);
                        v = Value(inner);
                    }
                    Some(ObjTag::Block) => {
                        if block_relevant(otag) && !drop_rel {
                            return Err(RtError::TypeError);
                        }
                        cx.free_cell(addr);
                        v = Value(inner);
                    }
                    Some(ObjTag::Opval) => {
                        if otag & OPVAL_LAZYKF != 0 || drop_rel {
                            cx.free_cell(addr);
                            v = Value(inner);
                        } else {
                            drop_value(cx, v, true)?;
                            v = Value::UNIT;
                        }
                    }
                    Some(ObjTag::Bignum) => {
                        cx.free(WORD_SIZE * (1 + bignum_digits(otag)), addr);
                        v = Value::UNIT;
                    }
                    Some(ObjTag::Seal) => {
                        cx.free(CELL_SIZE + seal_len(otag), addr);
                        v = Value(inner);
                    }
                    Some(ObjTag::Array)
                    | Some(ObjTag::Binary)
                    | Some(ObjTag::Text)
                    | Some(ObjTag::Stowage) => return Err(RtError::Impl),
                    None => panic!("drop: unrecognized object tag {otag:#x}"),
                }
            }
        }
    }
}
