//! End-to-end scenarios over a real, independently-allocated segment,
//! parameterized over all four tree variants so one assertion body proves
//! the property for A, B, C, and D alike. `validate_heap` runs after every
//! mutating call in every scenario, the way the emballoc/talc-style
//! `std`-backed allocator tests in the retrieval pack lean on their own
//! invariant checker rather than trusting the operation under test.

use std::alloc::{alloc, dealloc, Layout};

use rbheap::{validate_heap, FreeTree, Heap, VariantA, VariantB, VariantC, VariantD};

const SEGMENT_SIZE: usize = 1024;
const WORD: usize = 8;

struct Segment {
    ptr: *mut u8,
    layout: Layout,
}

impl Segment {
    fn new(size: usize) -> Self {
        let layout = Layout::from_size_align(size, WORD).unwrap();
        let ptr = unsafe { alloc(layout) };
        Segment { ptr, layout }
    }

    fn start(&self) -> usize {
        self.ptr as usize
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) }
    }
}

macro_rules! for_each_variant {
    ($f:ident) => {
        $f::<VariantA>();
        $f::<VariantB>();
        $f::<VariantC>();
        $f::<VariantD>();
    };
}

fn fresh_heap<V: FreeTree>(segment: &Segment) -> Heap<V> {
    let mut heap = Heap::<V>::new();
    assert!(heap.init(segment.start(), SEGMENT_SIZE));
    assert!(validate_heap(&heap));
    heap
}

/// S1. Init then allocate 16, then free it.
///
/// The literal spec text's post-free figure ("1000 bytes") doesn't square
/// with L4 (`heap_size - 2*word_size == 1024 - 16 == 1008`) or with the
/// same section's own pre-free arithmetic (`1024 - 8 - 8 - 16 - 8 ==
/// 984`, carried through unmodified here) — split-then-immediately-merge
/// of the only allocation necessarily reconstitutes the original single
/// free block exactly. `1008` is what's asserted; see `DESIGN.md`.
#[test]
fn s1_init_then_allocate_and_free() {
    fn run<V: FreeTree>() {
        let segment = Segment::new(SEGMENT_SIZE);
        let mut heap = fresh_heap::<V>(&segment);
        assert_eq!(heap.get_free_total(), 1);

        assert_eq!(Heap::<V>::heap_align(16), 16);
        let p = heap.malloc(16);
        assert!(!p.is_null());
        assert!(validate_heap(&heap));
        assert_eq!(heap.get_free_total(), 1);
        assert_eq!(heap.heap_capacity(), 984);

        heap.free(p);
        assert!(validate_heap(&heap));
        assert_eq!(heap.get_free_total(), 1);
        assert_eq!(heap.heap_capacity(), 1008);
    }
    for_each_variant!(run);
}

/// S2. Coalesce with right free: freeing `b` absorbs both its free left
/// neighbor (`a`) and its free right neighbor (the tail remainder),
/// fully reconstituting the original single free block (corrected to
/// 1008 bytes for the same reason as S1).
#[test]
fn s2_coalesce_with_right_free() {
    fn run<V: FreeTree>() {
        let segment = Segment::new(SEGMENT_SIZE);
        let mut heap = fresh_heap::<V>(&segment);

        let a = heap.malloc(16);
        let b = heap.malloc(16);
        assert!(!a.is_null() && !b.is_null());
        assert!(validate_heap(&heap));

        heap.free(a);
        assert!(validate_heap(&heap));
        assert_eq!(heap.get_free_total(), 2);

        heap.free(b);
        assert!(validate_heap(&heap));
        assert_eq!(heap.get_free_total(), 1);
        assert_eq!(heap.heap_capacity(), 1008);
    }
    for_each_variant!(run);
}

/// S3. Coalesce with left free: freeing `b` then `a` merges them into one
/// 40-byte free block while `c` stays allocated between it and the tail
/// remainder, so two disjoint free regions remain — not one. The spec
/// text's "free total = 1" doesn't fit "`c` is still allocated" (an
/// allocated block separates the two free regions), but its total free
/// byte count (40 + 936 = 976) checks out exactly and is asserted here;
/// see `DESIGN.md`.
#[test]
fn s3_coalesce_with_left_free() {
    fn run<V: FreeTree>() {
        let segment = Segment::new(SEGMENT_SIZE);
        let mut heap = fresh_heap::<V>(&segment);

        let a = heap.malloc(16);
        let b = heap.malloc(16);
        let c = heap.malloc(16);
        assert!(!a.is_null() && !b.is_null() && !c.is_null());

        heap.free(b);
        assert!(validate_heap(&heap));
        heap.free(a);
        assert!(validate_heap(&heap));

        assert_eq!(heap.get_free_total(), 2);
        assert_eq!(heap.heap_capacity(), 976);

        // c is still live: a fresh 16-byte request must not reuse its
        // address, and must instead come out of one of the two free
        // regions just created.
        let d = heap.malloc(16);
        assert!(!d.is_null());
        assert_ne!(d, c);
        assert!(validate_heap(&heap));
    }
    for_each_variant!(run);
}

/// S4. Best-fit tie-break: building on S3's shape with one extra
/// allocation (`d`) to separate `c` from the tail remainder — otherwise
/// freeing `c` would coalesce with that remainder and never produce a
/// second bare 16-byte free block, which the spec's own "two 16-byte
/// free blocks" precondition requires. With that separator in place,
/// freeing `a` and `c` genuinely leaves two same-sized, non-adjacent
/// free blocks, and a subsequent `malloc(16)` must return one of them.
#[test]
fn s4_best_fit_tie_break() {
    fn run<V: FreeTree>() {
        let segment = Segment::new(SEGMENT_SIZE);
        let mut heap = fresh_heap::<V>(&segment);

        let a = heap.malloc(16);
        let b = heap.malloc(32);
        let c = heap.malloc(16);
        let d = heap.malloc(16);
        assert!(!a.is_null() && !b.is_null() && !c.is_null() && !d.is_null());

        heap.free(a);
        heap.free(c);
        assert!(validate_heap(&heap));
        assert_eq!(heap.get_free_total(), 3);

        let taken = heap.malloc(16);
        assert!(!taken.is_null());
        assert!(taken == a || taken == c);
        assert!(validate_heap(&heap));
        assert_eq!(heap.get_free_total(), 2);
    }
    for_each_variant!(run);
}

/// S5. Realloc grow in place: growing into a free right neighbor keeps
/// the same address and never moves the payload.
#[test]
fn s5_realloc_grows_in_place() {
    fn run<V: FreeTree>() {
        let segment = Segment::new(SEGMENT_SIZE);
        let mut heap = fresh_heap::<V>(&segment);

        let a = heap.malloc(16);
        let b = heap.malloc(16);
        assert!(!a.is_null() && !b.is_null());
        heap.free(b);
        assert!(validate_heap(&heap));

        unsafe { a.write(0xAB) };
        let grown = heap.realloc(a, 24);
        assert_eq!(grown, a);
        assert_eq!(unsafe { grown.read() }, 0xAB);
        assert!(validate_heap(&heap));
        assert_eq!(heap.get_free_total(), 1);
        assert_eq!(heap.heap_capacity(), 976);
    }
    for_each_variant!(run);
}

/// S6. Realloc relocate: with no free neighbor to grow into, `realloc`
/// moves the payload to a fresh block and preserves its leading bytes.
#[test]
fn s6_realloc_relocates() {
    fn run<V: FreeTree>() {
        let segment = Segment::new(SEGMENT_SIZE);
        let mut heap = fresh_heap::<V>(&segment);

        let a = heap.malloc(16);
        let b = heap.malloc(16);
        assert!(!a.is_null() && !b.is_null());

        let watermark: [u8; 16] = std::array::from_fn(|i| i as u8 + 1);
        unsafe { std::ptr::copy_nonoverlapping(watermark.as_ptr(), a, 16) };

        let moved = heap.realloc(a, 100);
        assert!(!moved.is_null());
        assert_ne!(moved, a);
        let observed = unsafe { std::slice::from_raw_parts(moved, 16) };
        assert_eq!(observed, &watermark);
        assert!(validate_heap(&heap));
    }
    for_each_variant!(run);
}

/// S7. Reject over-cap: an over-cap request changes nothing.
#[test]
fn s7_rejects_over_cap_request() {
    fn run<V: FreeTree>() {
        let segment = Segment::new(SEGMENT_SIZE);
        let mut heap = fresh_heap::<V>(&segment);

        let before_total = heap.get_free_total();
        let before_capacity = heap.heap_capacity();

        let p = heap.malloc((1usize << 30) + 1);
        assert!(p.is_null());
        assert_eq!(heap.get_free_total(), before_total);
        assert_eq!(heap.heap_capacity(), before_capacity);
        assert!(validate_heap(&heap));
    }
    for_each_variant!(run);
}
