//! Execution contexts, context groups, and the cell allocator.
//!
//! A [`Context`] is single-threaded: it owns a root value (the implicit
//! stack every primitive operates on), local free lists, and byte counters.
//! Contexts created by [`Context::fork`] form a *group* sharing one arena
//! and one mutex-guarded free pool; an [`Environment`] tracks the live
//! groups and would host the stowage backend.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::consts::{CELL_SIZE, CX_MAX_SIZE, CX_MIN_SIZE};
use crate::copy;
use crate::error::{Result, RtError};
use crate::memory::{cell_buff, page_buff, Arena, FreeLists};
use crate::value::{Addr, ObjTag, Tag, ValType, Value};

/// Shared root of the runtime: a registry of live context groups.
#[derive(Clone, Default)]
pub struct Environment {
    inner: Arc<EnvInner>,
}

#[derive(Default)]
struct EnvInner {
    groups: Mutex<Vec<Weak<ContextGroup>>>,
    groups_created: AtomicU64,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Environment {
        Environment::default()
    }

    /// Create a context backed by a fresh arena of `size` bytes.
    ///
    /// `size` is rounded up to whole pages and must lie within
    /// [`CX_MIN_SIZE`]`..=`[`CX_MAX_SIZE`].
    pub fn create_context(&self, size: u32) -> Result<Context> {
        if !(CX_MIN_SIZE..=CX_MAX_SIZE).contains(&size) {
            return Err(RtError::Inval);
        }
        let size = page_buff(size);
        let arena = Arena::new(size);
        let mut shared = FreeLists::default();
        // The first cell stays out of circulation so that address zero can
        // stand for unit and void.
        shared.free(&arena, size - CELL_SIZE, CELL_SIZE);
        let group = Arc::new(ContextGroup {
            arena,
            shared: Mutex::new(shared),
            env: self.clone(),
        });
        self.registry().push(Arc::downgrade(&group));
        self.inner.groups_created.fetch_add(1, Relaxed);
        tracing::debug!(size, "created context group");
        Ok(Context::empty(group))
    }

    /// Number of live context groups.
    pub fn context_groups(&self) -> usize {
        let mut groups = self.registry();
        groups.retain(|g| g.upgrade().is_some());
        groups.len()
    }

    /// Total number of context groups ever created in this environment.
    pub fn groups_created(&self) -> u64 {
        self.inner.groups_created.load(Relaxed)
    }

    fn registry(&self) -> MutexGuard<'_, Vec<Weak<ContextGroup>>> {
        self.inner
            .groups
            .lock()
            .expect("environment registry mutex poisoned")
    }
}

/// State shared by every context of a group: the arena and the free pool.
pub(crate) struct ContextGroup {
    arena: Arena,
    shared: Mutex<FreeLists>,
    env: Environment,
}

impl Drop for ContextGroup {
    fn drop(&mut self) {
        self.env.registry().retain(|g| g.upgrade().is_some());
        tracing::debug!(size = self.arena.size(), "destroyed context group");
    }
}

/// Allocation counters of one context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Bytes handed out by the allocator, after cell rounding.
    pub bytes_allocated: u64,
    /// Bytes returned to the free lists.
    pub bytes_freed: u64,
}

impl MemoryStats {
    /// Bytes currently held by values allocated through this context.
    pub fn live_bytes(&self) -> u64 {
        self.bytes_allocated - self.bytes_freed
    }
}

/// A single-threaded execution context over a shared arena.
///
/// All primitive operations work on the context's implicit value stack;
/// "the top" is the first component of the root value. Operations consume
/// their inputs only on success unless documented otherwise; on
/// [`RtError::CxFull`] the stack may hold a partial construction that the
/// caller should drop.
pub struct Context {
    group: Arc<ContextGroup>,
    fl: FreeLists,
    val: Value,
    stats: MemoryStats,
}

impl Context {
    fn empty(group: Arc<ContextGroup>) -> Context {
        Context {
            group,
            fl: FreeLists::default(),
            val: Value::UNIT,
            stats: MemoryStats::default(),
        }
    }

    /// Create a sibling context sharing this context's arena and free pool.
    ///
    /// The sibling starts with an empty stack and empty local free lists;
    /// it may be moved to another thread.
    pub fn fork(&self) -> Context {
        tracing::debug!("forked context");
        Context::empty(Arc::clone(&self.group))
    }

    /// Allocation counters for this context.
    pub fn memory_stats(&self) -> MemoryStats {
        self.stats
    }

    pub(crate) fn arena(&self) -> &Arena {
        &self.group.arena
    }

    pub(crate) fn set_root(&mut self, v: Value) {
        self.val = v;
    }

    /* allocation layer */

    /// Allocate `size` bytes (rounded up to whole cells) inside the arena.
    ///
    /// Falls back to the group's shared pool when the local free lists run
    /// dry; fails with [`RtError::CxFull`] when the arena is exhausted.
    pub fn alloc(&mut self, size: u32) -> Result<Addr> {
        let szb = cell_buff(size);
        if let Some(addr) = self.fl.alloc(&self.group.arena, szb) {
            self.stats.bytes_allocated += u64::from(szb);
            return Ok(addr);
        }
        self.acquire_shared(page_buff(szb));
        match self.fl.alloc(&self.group.arena, szb) {
            Some(addr) => {
                self.stats.bytes_allocated += u64::from(szb);
                Ok(addr)
            }
            None => Err(RtError::CxFull),
        }
    }

    // Pull memory from the group pool. The strategy favors short
    // computations: take a block directly when one is available, otherwise
    // merge this thread's lists into the pool, coalesce, and retry; as a
    // last resort take the whole pool.
    fn acquire_shared(&mut self, szb: u32) {
        let arena = &self.group.arena;
        let mut shared = self
            .group
            .shared
            .lock()
            .expect("shared free pool mutex poisoned");
        if let Some(block) = shared.alloc(arena, szb) {
            self.fl.free(arena, szb, block);
            return;
        }
        tracing::trace!(
            want = szb,
            shared_free = shared.free_bytes(),
            "shared pool pressure, merging free lists"
        );
        self.fl.merge_into(arena, &mut shared);
        shared.coalesce(arena);
        if let Some(block) = shared.alloc(arena, szb) {
            self.fl.free(arena, szb, block);
        } else {
            shared.merge_into(arena, &mut self.fl);
        }
    }

    /// Return `size` bytes at `addr` to the local free lists.
    pub fn free(&mut self, size: u32, addr: Addr) {
        let szb = cell_buff(size);
        self.fl.free(&self.group.arena, szb, addr);
        self.stats.bytes_freed += u64::from(szb);
    }

    /// Resize the allocation at `addr` from `size0` to `size1` bytes,
    /// returning its possibly new address.
    ///
    /// Shrinking frees the tail in place; growth always allocates fresh
    /// storage, copies, and frees the original, which keeps the cost
    /// predictable.
    pub fn realloc(&mut self, size0: u32, addr: Addr, size1: u32) -> Result<Addr> {
        let sz0 = cell_buff(size0);
        let szf = cell_buff(size1);
        if szf == sz0 {
            Ok(addr)
        } else if szf < sz0 {
            self.free(sz0 - szf, addr + szf);
            Ok(addr)
        } else {
            let dst = self.alloc(szf)?;
            self.group.arena.copy_words(addr, dst, sz0);
            self.free(sz0, addr);
            Ok(dst)
        }
    }

    pub(crate) fn alloc_cell(&mut self, tag: Tag, w0: u32, w1: u32) -> Result<Value> {
        let addr = self.alloc(CELL_SIZE)?;
        self.group.arena.set_cell(addr, w0, w1);
        Ok(Value::tagged(tag, addr))
    }

    pub(crate) fn alloc_dcell(&mut self, w0: u32, w1: u32, w2: u32, w3: u32) -> Result<Value> {
        let addr = self.alloc(2 * CELL_SIZE)?;
        self.group.arena.set_cell(addr, w0, w1);
        self.group.arena.set_cell(addr + CELL_SIZE, w2, w3);
        Ok(Value::tagged(Tag::Obj, addr))
    }

    pub(crate) fn free_cell(&mut self, addr: Addr) {
        self.free(CELL_SIZE, addr);
    }

    /* stack layer */

    // The root must be a pair (top * rest); its cell address.
    pub(crate) fn stack_cell(&self) -> Result<Addr> {
        self.val.pair_cell().ok_or(RtError::TypeError)
    }

    pub(crate) fn top(&self) -> Result<Value> {
        Ok(Value(self.group.arena.word(self.stack_cell()?)))
    }

    pub(crate) fn push(&mut self, v: Value) -> Result<()> {
        self.val = self.alloc_cell(Tag::Pair, v.raw(), self.val.raw())?;
        Ok(())
    }

    // Push a value the context already owns; dropped on failure so the
    // stack is never left unaware of it.
    pub(crate) fn push_owned(&mut self, v: Value) -> Result<()> {
        if let Err(e) = self.push(v) {
            let _ = copy::drop_value(self, v, true);
            return Err(e);
        }
        Ok(())
    }

    /// Push the unit value.
    pub fn intro_unit(&mut self) -> Result<()> {
        self.push(Value::UNIT)
    }

    /// Remove a unit value from the top of the stack.
    pub fn elim_unit(&mut self) -> Result<()> {
        let cell = self.stack_cell()?;
        let (w0, w1) = self.group.arena.cell(cell);
        if Value(w0) != Value::UNIT {
            return Err(RtError::TypeError);
        }
        self.val = Value(w1);
        self.free_cell(cell);
        Ok(())
    }

    /// `(a,(b,c)) → ((a,b),c)`, by pointer rewiring only.
    pub fn assocl(&mut self) -> Result<()> {
        let c1 = self.stack_cell()?;
        let (a, rest) = self.group.arena.cell(c1);
        let c2 = Value(rest).pair_cell().ok_or(RtError::TypeError)?;
        let (b, c) = self.group.arena.cell(c2);
        self.group.arena.set_cell(c1, a, b);
        self.group
            .arena
            .set_cell(c2, Value::tagged(Tag::Pair, c1).raw(), c);
        self.val = Value::tagged(Tag::Pair, c2);
        Ok(())
    }

    /// `((a,b),c) → (a,(b,c))`, by pointer rewiring only.
    pub fn assocr(&mut self) -> Result<()> {
        let c2 = self.stack_cell()?;
        let (ab, c) = self.group.arena.cell(c2);
        let c1 = Value(ab).pair_cell().ok_or(RtError::TypeError)?;
        let (a, b) = self.group.arena.cell(c1);
        self.group
            .arena
            .set_cell(c1, a, Value::tagged(Tag::Pair, c2).raw());
        self.group.arena.set_cell(c2, b, c);
        self.val = Value::tagged(Tag::Pair, c1);
        Ok(())
    }

    /// Swap the two values atop the stack: `(a,(b,c)) → (b,(a,c))`.
    pub fn wswap(&mut self) -> Result<()> {
        let c1 = self.stack_cell()?;
        let (a, rest) = self.group.arena.cell(c1);
        let c2 = Value(rest).pair_cell().ok_or(RtError::TypeError)?;
        let b = self.group.arena.word(c2);
        self.group.arena.set_word(c1, b);
        self.group.arena.set_word(c2, a);
        Ok(())
    }

    /// Duplicate the value atop the stack: `(a,e) → (a,(a,e))`.
    ///
    /// Fails with [`RtError::TypeError`] when the value contains an affine
    /// block outside a quotation.
    pub fn copy(&mut self) -> Result<()> {
        let src = self.top()?;
        let cell = self.alloc_cell(Tag::Pair, src.raw(), self.val.raw())?;
        self.val = cell;
        copy::copy_value(self, cell.addr(), false)
    }

    /// Discard the value atop the stack, recovering its storage.
    ///
    /// Fails with [`RtError::TypeError`] when the value contains a relevant
    /// block outside a quotation; a refusal at the top leaves the stack
    /// unchanged, a refusal mid-structure leaves the partially destroyed
    /// value in place. (Named `drop_top` because `Context` implements
    /// [`Drop`].)
    pub fn drop_top(&mut self) -> Result<()> {
        let cell = self.stack_cell()?;
        let (w0, w1) = self.group.arena.cell(cell);
        copy::drop_value(self, Value(w0), false)?;
        self.val = Value(w1);
        self.free_cell(cell);
        Ok(())
    }

    /// Classify the value atop the stack without consuming anything.
    pub fn peek_type(&self) -> Result<ValType> {
        let v = self.top()?;
        if v.is_smallint() {
            return Ok(ValType::Integer);
        }
        let addr = v.addr();
        match v.tag() {
            Tag::Pair if addr == 0 => Ok(ValType::Unit),
            Tag::Pair => Ok(ValType::Product),
            Tag::PairL | Tag::PairR => Ok(ValType::Sum),
            Tag::Obj if addr == 0 => Ok(ValType::Pending),
            Tag::Obj => match ObjTag::of(self.group.arena.word(addr)) {
                Some(ObjTag::Bignum) => Ok(ValType::Integer),
                Some(ObjTag::DeepSum)
                | Some(ObjTag::Array)
                | Some(ObjTag::Binary)
                | Some(ObjTag::Text) => Ok(ValType::Sum),
                Some(ObjTag::Block) => Ok(ValType::Block),
                Some(ObjTag::Seal) | Some(ObjTag::SealSm) => Ok(ValType::Sealed),
                Some(ObjTag::Stowage) => Ok(ValType::Stowed),
                Some(ObjTag::Opval) | None => Err(RtError::Inval),
            },
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // Reclaim the root wholesale (relevant values included), then hand
        // the local free lists back to the group pool.
        let root = std::mem::replace(&mut self.val, Value::UNIT);
        let _ = copy::drop_value(self, root, true);
        let mut shared = self
            .group
            .shared
            .lock()
            .expect("shared free pool mutex poisoned");
        self.fl.merge_into(&self.group.arena, &mut shared);
        tracing::debug!(
            bytes_allocated = self.stats.bytes_allocated,
            bytes_freed = self.stats.bytes_freed,
            "destroyed context"
        );
    }
}
