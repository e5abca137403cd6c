//! The allocator surface: `init`/`malloc`/`realloc`/`free` plus the
//! introspection the test harness needs. Composes `coalesce`, `split`, and
//! a [`FreeTree`] back-end the way the teacher's `HeapZone` composes
//! `Node::merge` and list surgery behind `alloc`/`dealloc` — except here
//! the whole thing is a plain value, `Heap<V>`, rather than a `&'static`
//! singleton; `global.rs` layers that convenience on top for callers that
//! want one process-wide instance.

use core::cmp;
use core::ptr;

use log::{debug, trace};

use crate::block::BlockPtr;
use crate::coalesce;
use crate::consts::{roundup, ALIGN, MAX_REQUEST_SIZE, WORD_SIZE};
use crate::split::split_alloc;
use crate::tree::FreeTree;

/// Outcome of one `heap_diff` slot comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Ok,
    Err,
    /// The segment has more blocks than `len` covered.
    HeapContinues,
    /// The segment ended before `len` blocks were reached.
    OutOfBounds,
}

/// What a test expects to find at one block position.
#[derive(Debug, Clone, Copy)]
pub struct Expected {
    /// `None` expects a free block; `Some(addr)` expects an allocated block
    /// whose client pointer equals `addr`.
    pub address: Option<usize>,
    /// `None` is the `payload_bytes == NA` wildcard: skip the size check.
    pub payload_bytes: Option<usize>,
}

/// What `heap_diff` found at one block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actual {
    pub client_addr: Option<usize>,
    pub payload_bytes: Option<usize>,
    pub status: DiffStatus,
}

const BLANK_ACTUAL: Actual = Actual {
    client_addr: None,
    payload_bytes: None,
    status: DiffStatus::OutOfBounds,
};

/// A dynamic-storage allocator over one contiguous segment, generic over
/// the free-tree back-end (`VariantA`/`B`/`C`/`D`).
#[derive(Default)]
pub struct Heap<V: FreeTree> {
    tree: V,
    pub(crate) client_start: usize,
    pub(crate) client_end: usize,
}

impl<V: FreeTree> Heap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn tree(&self) -> &V {
        &self.tree
    }

    pub(crate) fn segment_bytes(&self) -> usize {
        self.client_end + WORD_SIZE - self.client_start
    }

    /// Rounds `start`/`size` down to alignment, lays out the trailing
    /// one-word sentinel, and seeds the tree with a single free block
    /// covering the rest. Returns `false` (and touches nothing) if the
    /// rounded size can't even hold one free-block record.
    pub fn init(&mut self, start: usize, size: usize) -> bool {
        let rounded = size & !(ALIGN - 1);
        if rounded < crate::consts::MIN_BLOCK_SIZE {
            debug!(
                "heap init rejected: {size} bytes rounds to {rounded}, below MIN_BLOCK_SIZE"
            );
            return false;
        }

        let sentinel = unsafe { BlockPtr::from_addr(start + rounded - WORD_SIZE) };
        sentinel.init_free_node(0, false);
        sentinel.set_allocated(true);

        let free_block = unsafe { BlockPtr::from_addr(start) };
        let payload = rounded - 2 * WORD_SIZE;
        free_block.init_free_node(payload, true);

        self.tree = V::default();
        self.client_start = start;
        self.client_end = sentinel.addr();
        self.tree.insert(free_block);

        debug!("heap init: {payload} usable bytes, 1 free block");
        true
    }

    /// Returns null on a zero or over-cap request, or on exhaustion.
    pub fn malloc(&mut self, n: usize) -> *mut u8 {
        if n == 0 || n > MAX_REQUEST_SIZE {
            debug!("malloc({n}) rejected: zero or over MAX_REQUEST_SIZE");
            return ptr::null_mut();
        }
        let request = roundup(n, ALIGN);
        let Some(block) = self.tree.best_fit(request) else {
            debug!("malloc({n}) failed: no free block >= {request}");
            return ptr::null_mut();
        };
        let allocated = split_alloc(&mut self.tree, block, request);
        trace!(
            "malloc({n}) -> block@{:#x}, size {}",
            allocated.addr(),
            allocated.size()
        );
        allocated.client_space() as *mut u8
    }

    /// `old == null` behaves like `malloc`; `n == 0` behaves like `free`
    /// and returns null. On exhaustion during a relocate, `old` is left
    /// untouched and null is returned.
    pub fn realloc(&mut self, old: *mut u8, n: usize) -> *mut u8 {
        if old.is_null() {
            return self.malloc(n);
        }
        if n == 0 {
            self.free(old);
            return ptr::null_mut();
        }
        if n > MAX_REQUEST_SIZE {
            debug!("realloc({:#x}, {n}) rejected: over MAX_REQUEST_SIZE", old as usize);
            return ptr::null_mut();
        }

        let block = unsafe { BlockPtr::block_of(old as usize) };
        let old_payload = block.size();
        let request = roundup(n, ALIGN);
        let rpt = coalesce::report(block);
        let available = rpt.merged_size(block);

        if available >= request {
            let current = coalesce::apply(&mut self.tree, block, rpt);
            if current != block {
                // The left neighbor was absorbed; `current` starts earlier
                // than `old` did. The regions overlap, so this is a move,
                // not a copy.
                unsafe {
                    ptr::copy(old as *const u8, current.client_space() as *mut u8, old_payload);
                }
            }
            let result = split_alloc(&mut self.tree, current, request);
            trace!(
                "realloc({:#x}, {n}) grew in place -> block@{:#x}",
                old as usize,
                result.addr()
            );
            result.client_space() as *mut u8
        } else {
            let new_ptr = self.malloc(n);
            if new_ptr.is_null() {
                debug!("realloc({:#x}, {n}) failed: old retained", old as usize);
                return ptr::null_mut();
            }
            let copy_len = cmp::min(old_payload, request);
            unsafe {
                ptr::copy_nonoverlapping(old as *const u8, new_ptr, copy_len);
            }
            let merged = coalesce::apply(&mut self.tree, block, rpt);
            merged.init_free_node(merged.size(), merged.is_left_allocated());
            merged.right_neighbor().set_left_allocated(false);
            self.tree.insert(merged);
            trace!(
                "realloc({:#x}, {n}) relocated -> {:#x}",
                old as usize,
                new_ptr as usize
            );
            new_ptr
        }
    }

    /// Null is a no-op.
    pub fn free(&mut self, p: *mut u8) {
        if p.is_null() {
            return;
        }
        let block = unsafe { BlockPtr::block_of(p as usize) };
        let rpt = coalesce::report(block);
        let merged = coalesce::apply(&mut self.tree, block, rpt);
        merged.init_free_node(merged.size(), merged.is_left_allocated());
        merged.right_neighbor().set_left_allocated(false);
        self.tree.insert(merged);
        trace!("free({:#x}): merged block size {}", p as usize, merged.size());
    }

    /// `roundup(n, ALIGN)`, exposed so callers can predict what `malloc`
    /// will actually hand out.
    pub fn heap_align(n: usize) -> usize {
        roundup(n, ALIGN)
    }

    /// Linear walk summing sizes of every currently-free block.
    pub fn heap_capacity(&self) -> usize {
        let mut total = 0;
        let mut cur = unsafe { BlockPtr::from_addr(self.client_start) };
        while cur.addr() != self.client_end {
            if !cur.is_allocated() {
                total += cur.size();
            }
            cur = cur.right_neighbor();
        }
        total
    }

    /// The tree's cached free-entry count, `O(1)`.
    pub fn get_free_total(&self) -> usize {
        self.tree.total()
    }

    /// Walks the segment left to right for `len` blocks, comparing each
    /// against `expected[i]` and writing the outcome into `actual[i]`.
    ///
    /// If the segment ends before `len` blocks are reached, the remaining
    /// entries get `OutOfBounds`. If the segment has more blocks than
    /// `len` covers, `actual[len - 1]` is overwritten with
    /// `HeapContinues` — the documented resolution of the indexing
    /// ambiguity between writing `actual[len - 1]` and the out-of-bounds
    /// `actual[len]` some source variants use (see `DESIGN.md`).
    pub fn heap_diff(&self, expected: &[Expected], actual: &mut [Actual], len: usize) {
        debug_assert!(expected.len() >= len && actual.len() >= len);
        if len == 0 {
            return;
        }
        let mut cur = Some(unsafe { BlockPtr::from_addr(self.client_start) });
        for slot in actual.iter_mut().take(len) {
            *slot = BLANK_ACTUAL;
        }

        for i in 0..len {
            match cur {
                Some(block) if block.addr() != self.client_end => {
                    let exp = expected[i];
                    let client_addr = block.is_allocated().then(|| block.client_space());
                    let status = Self::diff_status(exp, client_addr, block.size());
                    actual[i] = Actual {
                        client_addr,
                        payload_bytes: Some(block.size()),
                        status,
                    };
                    cur = Some(block.right_neighbor());
                }
                _ => {
                    actual[i] = Actual {
                        client_addr: None,
                        payload_bytes: None,
                        status: DiffStatus::OutOfBounds,
                    };
                    cur = None;
                }
            }
        }

        if let Some(block) = cur {
            if block.addr() != self.client_end {
                actual[len - 1].status = DiffStatus::HeapContinues;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn fmt_segment(&self) -> std::string::String {
        use std::fmt::Write;
        let mut out = std::string::String::new();
        let mut cur = unsafe { BlockPtr::from_addr(self.client_start) };
        loop {
            let tag = if cur.is_allocated() { "A" } else { "F" };
            let _ = write!(out, "[{:#x} size={} {}] ", cur.addr(), cur.size(), tag);
            if cur.addr() == self.client_end {
                break;
            }
            cur = cur.right_neighbor();
        }
        out
    }

    #[cfg(test)]
    pub(crate) fn fmt_tree(&self) -> std::string::String {
        let mut out = std::string::String::new();
        fmt_tree_node(&self.tree, self.tree.root(), 0, &mut out);
        out
    }

    fn diff_status(exp: Expected, client_addr: Option<usize>, size: usize) -> DiffStatus {
        match (exp.address, client_addr) {
            (None, Some(_)) => return DiffStatus::Err,
            (Some(_), None) => return DiffStatus::Err,
            (Some(expected_addr), Some(actual_addr)) if expected_addr != actual_addr => {
                return DiffStatus::Err
            }
            _ => {}
        }
        match exp.payload_bytes {
            None => DiffStatus::Ok,
            Some(expected_size) if expected_size != size => DiffStatus::Err,
            Some(_) => DiffStatus::Ok,
        }
    }
}

/// Grounded on the teacher's `Debug` impls for `HeapZone`/`Node`: a plain
/// indented text dump, not the visual tree-drawing this crate's spec
/// leaves out of scope.
#[cfg(test)]
fn fmt_tree_node<V: FreeTree>(
    tree: &V,
    node: Option<BlockPtr>,
    depth: usize,
    out: &mut std::string::String,
) {
    use std::fmt::Write;
    if let Some(n) = node {
        let _ = writeln!(
            out,
            "{:indent$}{:#x} size={} {:?}",
            "",
            n.addr(),
            n.size(),
            tree.color(n),
            indent = depth * 2
        );
        fmt_tree_node(tree, tree.left(n), depth + 1, out);
        fmt_tree_node(tree, tree.right(n), depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::validate_heap;
    use crate::tree::VariantA;
    use std::alloc::{alloc, dealloc, Layout};

    struct Segment {
        ptr: *mut u8,
        layout: Layout,
    }

    impl Segment {
        fn new(size: usize) -> Self {
            let layout = Layout::from_size_align(size, 8).unwrap();
            let ptr = unsafe { alloc(layout) };
            Segment { ptr, layout }
        }
    }

    impl Drop for Segment {
        fn drop(&mut self) {
            unsafe { dealloc(self.ptr, self.layout) }
        }
    }

    #[test]
    fn malloc_then_free_round_trips_to_a_single_free_block() {
        let segment = Segment::new(1024);
        let mut heap = Heap::<VariantA>::new();
        assert!(heap.init(segment.ptr as usize, 1024));
        assert_eq!(heap.get_free_total(), 1);

        let p = heap.malloc(16);
        assert!(!p.is_null());
        assert_eq!(heap.heap_capacity(), 984);
        assert!(validate_heap(&heap));

        heap.free(p);
        assert_eq!(heap.get_free_total(), 1);
        assert_eq!(heap.heap_capacity(), 1008);
        assert!(validate_heap(&heap));
    }

    #[test]
    fn realloc_of_null_behaves_like_malloc() {
        let segment = Segment::new(1024);
        let mut heap = Heap::<VariantA>::new();
        heap.init(segment.ptr as usize, 1024);

        let p = heap.realloc(ptr::null_mut(), 16);
        assert!(!p.is_null());
        assert!(validate_heap(&heap));
    }

    #[test]
    fn realloc_to_zero_frees_and_returns_null() {
        let segment = Segment::new(1024);
        let mut heap = Heap::<VariantA>::new();
        heap.init(segment.ptr as usize, 1024);

        let p = heap.malloc(16);
        let result = heap.realloc(p, 0);
        assert!(result.is_null());
        assert_eq!(heap.get_free_total(), 1);
        assert!(validate_heap(&heap));
    }

    #[test]
    fn heap_diff_flags_size_and_occupancy_mismatches() {
        let segment = Segment::new(1024);
        let mut heap = Heap::<VariantA>::new();
        heap.init(segment.ptr as usize, 1024);
        let p = heap.malloc(16);

        let block = unsafe { BlockPtr::block_of(p as usize) };
        let expected = [
            Expected { address: Some(block.client_space()), payload_bytes: Some(16) },
            Expected { address: None, payload_bytes: None },
        ];
        let mut actual = [BLANK_ACTUAL; 2];
        heap.heap_diff(&expected, &mut actual, 2);
        assert_eq!(actual[0].status, DiffStatus::Ok);
        assert_eq!(actual[1].status, DiffStatus::Ok);

        let wrong_size = [
            Expected { address: Some(block.client_space()), payload_bytes: Some(999) },
        ];
        let mut actual2 = [BLANK_ACTUAL; 1];
        heap.heap_diff(&wrong_size, &mut actual2, 1);
        assert_eq!(actual2[0].status, DiffStatus::Err);
    }

    #[test]
    fn heap_diff_marks_trailing_entries_out_of_bounds_or_continuing() {
        let segment = Segment::new(1024);
        let mut heap = Heap::<VariantA>::new();
        heap.init(segment.ptr as usize, 1024);

        // Only one real block exists; asking for 3 entries runs past it.
        let expected = [
            Expected { address: None, payload_bytes: None },
            Expected { address: None, payload_bytes: None },
            Expected { address: None, payload_bytes: None },
        ];
        let mut actual = [BLANK_ACTUAL; 3];
        heap.heap_diff(&expected, &mut actual, 3);
        assert_eq!(actual[0].status, DiffStatus::Ok);
        assert_eq!(actual[1].status, DiffStatus::OutOfBounds);
        assert_eq!(actual[2].status, DiffStatus::OutOfBounds);

        // Asking for fewer entries than exist marks the last one as
        // continuing rather than silently dropping the rest of the
        // segment.
        heap.malloc(16);
        let mut actual_short = [BLANK_ACTUAL; 1];
        heap.heap_diff(&expected[..1], &mut actual_short, 1);
        assert_eq!(actual_short[0].status, DiffStatus::HeapContinues);
    }

    #[test]
    fn dumpers_render_every_block() {
        let segment = Segment::new(1024);
        let mut heap = Heap::<VariantA>::new();
        heap.init(segment.ptr as usize, 1024);
        heap.malloc(16);

        let dump = heap.fmt_segment();
        assert!(dump.contains("size=16 A"));
        assert!(dump.contains("size=0 A")); // sentinel
        // Only the remainder is free, so the tree has exactly one node.
        assert!(!heap.fmt_tree().is_empty());
    }
}
