//! Arena storage and size-segregated free lists.
//!
//! Every context group owns one fixed-size arena. Free space is tracked in
//! per-thread free-list tables plus one shared table behind the group
//! mutex: sixteen exact-size "quick fit" lists spaced by the cell size,
//! then ten "first fit" lists whose upper bound doubles each step. Freeing
//! never coalesces; coalescing happens on demand when the shared pool comes
//! under pressure.

use std::sync::atomic::{AtomicU32, Ordering::Relaxed};

use crate::consts::{
    CELL_SIZE, FL_COUNT, FL_QUICK_FIT, PAGE_SIZE, QUICK_FIT_MAX, WORD_SIZE,
};
use crate::value::Addr;

/// Round a size up to whole cells.
pub(crate) fn cell_buff(sz: u32) -> u32 {
    (sz + (CELL_SIZE - 1)) & !(CELL_SIZE - 1)
}

/// Round a size up to whole pages.
pub(crate) fn page_buff(sz: u32) -> u32 {
    (sz + (PAGE_SIZE - 1)) & !(PAGE_SIZE - 1)
}

/// Contiguous word storage of one context group.
///
/// Words are relaxed atomics so sibling contexts on different threads can
/// operate on disjoint cells of the same arena in safe code. Ownership of
/// cells only moves between threads through the mutex-guarded shared free
/// pool, which provides the necessary ordering.
pub(crate) struct Arena {
    words: Box<[AtomicU32]>,
}

impl Arena {
    pub(crate) fn new(size: u32) -> Arena {
        debug_assert_eq!(size % CELL_SIZE, 0);
        let words = (0..size / WORD_SIZE).map(|_| AtomicU32::new(0)).collect();
        Arena { words }
    }

    pub(crate) fn size(&self) -> u32 {
        self.words.len() as u32 * WORD_SIZE
    }

    #[inline]
    pub(crate) fn word(&self, addr: Addr) -> u32 {
        self.words[(addr / WORD_SIZE) as usize].load(Relaxed)
    }

    #[inline]
    pub(crate) fn set_word(&self, addr: Addr, w: u32) {
        self.words[(addr / WORD_SIZE) as usize].store(w, Relaxed);
    }

    pub(crate) fn cell(&self, addr: Addr) -> (u32, u32) {
        (self.word(addr), self.word(addr + WORD_SIZE))
    }

    pub(crate) fn set_cell(&self, addr: Addr, w0: u32, w1: u32) {
        self.set_word(addr, w0);
        self.set_word(addr + WORD_SIZE, w1);
    }

    /// Copy `len` bytes between cell-aligned regions, rounding up to whole
    /// words (both regions are allocated with cell granularity).
    pub(crate) fn copy_words(&self, src: Addr, dst: Addr, len: u32) {
        let words = (len + WORD_SIZE - 1) / WORD_SIZE;
        for i in 0..words {
            self.set_word(dst + i * WORD_SIZE, self.word(src + i * WORD_SIZE));
        }
    }

    /// Read `len` bytes starting at a word-aligned address.
    pub(crate) fn read_bytes(&self, addr: Addr, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        for i in 0..len as u32 {
            let w = self.word(addr + (i / WORD_SIZE) * WORD_SIZE);
            out.push((w >> (8 * (i % WORD_SIZE))) as u8);
        }
        out
    }

    /// Write bytes starting at a word-aligned address, zero-padding the
    /// final word.
    pub(crate) fn write_bytes(&self, addr: Addr, bytes: &[u8]) {
        for (i, chunk) in bytes.chunks(WORD_SIZE as usize).enumerate() {
            let mut w = 0u32;
            for (j, &b) in chunk.iter().enumerate() {
                w |= u32::from(b) << (8 * j);
            }
            self.set_word(addr + i as u32 * WORD_SIZE, w);
        }
    }
}

/// One size class: a stack of free blocks, with a tail pointer so lists can
/// be spliced in O(1). Free blocks store `(size, next)` in their first cell.
#[derive(Debug, Clone, Copy, Default)]
struct ClassList {
    head: Addr,
    tail: Addr,
}

/// Size-segregated free lists.
#[derive(Debug, Default)]
pub(crate) struct FreeLists {
    free_bytes: u32,
    frag_count: u32,
    classes: [ClassList; FL_COUNT],
}

/// Class index of a cell-buffered size.
fn size_class(szb: u32) -> usize {
    debug_assert!(szb > 0 && szb % CELL_SIZE == 0);
    if szb <= QUICK_FIT_MAX {
        ((szb - 1) / CELL_SIZE) as usize
    } else {
        let mut class = FL_QUICK_FIT;
        let mut bound = QUICK_FIT_MAX * 2;
        while class + 1 < FL_COUNT && szb > bound {
            class += 1;
            bound *= 2;
        }
        class
    }
}

impl FreeLists {
    pub(crate) fn free_bytes(&self) -> u32 {
        self.free_bytes
    }

    /// Take a block of exactly `szb` bytes, or `None` when the table cannot
    /// satisfy the request. Quick-fit classes pop their head; otherwise the
    /// first-fit lists are scanned and the remainder of an oversized block
    /// is split back into the table.
    pub(crate) fn alloc(&mut self, arena: &Arena, szb: u32) -> Option<Addr> {
        let sc = size_class(szb);
        if sc < FL_QUICK_FIT {
            let head = self.classes[sc].head;
            if head != 0 {
                let (bsz, next) = arena.cell(head);
                debug_assert_eq!(bsz, szb);
                self.classes[sc].head = next;
                if next == 0 {
                    self.classes[sc].tail = 0;
                }
                self.free_bytes -= szb;
                self.frag_count -= 1;
                return Some(head);
            }
        }
        for ci in sc.max(FL_QUICK_FIT)..FL_COUNT {
            let mut prev: Addr = 0;
            let mut cur = self.classes[ci].head;
            while cur != 0 {
                let (bsz, next) = arena.cell(cur);
                if bsz >= szb {
                    if prev == 0 {
                        self.classes[ci].head = next;
                    } else {
                        arena.set_word(prev + WORD_SIZE, next);
                    }
                    if next == 0 {
                        self.classes[ci].tail = prev;
                    }
                    self.free_bytes -= bsz;
                    self.frag_count -= 1;
                    let rem = bsz - szb;
                    if rem > 0 {
                        self.free(arena, rem, cur + szb);
                    }
                    return Some(cur);
                }
                prev = cur;
                cur = next;
            }
        }
        None
    }

    /// Push a block onto the head of its class list. No coalescing.
    pub(crate) fn free(&mut self, arena: &Arena, szb: u32, addr: Addr) {
        debug_assert_ne!(addr, 0);
        let cls = &mut self.classes[size_class(szb)];
        arena.set_cell(addr, szb, cls.head);
        if cls.head == 0 {
            cls.tail = addr;
        }
        cls.head = addr;
        self.free_bytes += szb;
        self.frag_count += 1;
    }

    /// Splice every block of `self` into `dst`, leaving `self` empty.
    pub(crate) fn merge_into(&mut self, arena: &Arena, dst: &mut FreeLists) {
        for (src, out) in self.classes.iter_mut().zip(dst.classes.iter_mut()) {
            if src.head == 0 {
                continue;
            }
            if out.head == 0 {
                *out = *src;
            } else {
                arena.set_word(src.tail + WORD_SIZE, out.head);
                out.head = src.head;
            }
            *src = ClassList::default();
        }
        dst.free_bytes += self.free_bytes;
        dst.frag_count += self.frag_count;
        self.free_bytes = 0;
        self.frag_count = 0;
    }

    /// Sort all blocks by address and merge adjacent runs. Lists come out
    /// address-ordered, which keeps later allocations compact.
    pub(crate) fn coalesce(&mut self, arena: &Arena) {
        let mut blocks = Vec::with_capacity(self.frag_count as usize);
        for cls in &self.classes {
            let mut cur = cls.head;
            while cur != 0 {
                let (sz, next) = arena.cell(cur);
                blocks.push((cur, sz));
                cur = next;
            }
        }
        blocks.sort_unstable_by_key(|&(addr, _)| addr);

        let before = self.frag_count;
        *self = FreeLists::default();
        let mut run: Option<(Addr, u32)> = None;
        for (addr, sz) in blocks {
            run = match run {
                Some((ra, rsz)) if ra + rsz == addr => Some((ra, rsz + sz)),
                Some((ra, rsz)) => {
                    self.push_ordered(arena, rsz, ra);
                    Some((addr, sz))
                }
                None => Some((addr, sz)),
            };
        }
        if let Some((ra, rsz)) = run {
            self.push_ordered(arena, rsz, ra);
        }
        tracing::trace!(before, after = self.frag_count, "coalesced free lists");
    }

    // Append at the tail, preserving address order within the class.
    fn push_ordered(&mut self, arena: &Arena, szb: u32, addr: Addr) {
        let cls = &mut self.classes[size_class(szb)];
        arena.set_cell(addr, szb, 0);
        if cls.head == 0 {
            cls.head = addr;
        } else {
            arena.set_word(cls.tail + WORD_SIZE, addr);
        }
        cls.tail = addr;
        self.free_bytes += szb;
        self.frag_count += 1;
    }
}
