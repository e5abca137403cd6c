//! An optional process-wide singleton, for callers who want one heap
//! rather than threading a `Heap<V>` value through their own code.
//!
//! Mirrors `kernel/src/mem/heap_allocator/mod.rs`'s `static HEAP: Once<T>`
//! plus a `pub fn heap()` accessor; the kernel's version locks internally
//! per-call via `IMutex`; here `spin::Mutex` plays that role since this
//! crate has no interrupt-masking primitive of its own to reach for.

use spin::{Mutex, Once};

use crate::tree::FreeTree;
use crate::Heap;

static HEAP: Once<Mutex<HeapSlot>> = Once::new();

/// Type-erases which `FreeTree` the global heap was initialized with, so
/// `GlobalHeap` doesn't need to be generic (a `static` can't carry a type
/// parameter a caller picks later).
enum HeapSlot {
    A(Heap<crate::tree::VariantA>),
    B(Heap<crate::tree::VariantB>),
    C(Heap<crate::tree::VariantC>),
    D(Heap<crate::tree::VariantD>),
}

/// Which back-end `init_global` should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    A,
    B,
    C,
    D,
}

/// Initializes the global heap over `[start, start + size)`. Returns
/// `false` (matching `Heap::init`) if the segment is too small.
///
/// # Panics
/// Panics if the global heap has already been initialized.
pub fn init_global(variant: Variant, start: usize, size: usize) -> bool {
    let mut ok = true;
    HEAP.call_once(|| {
        let slot = match variant {
            Variant::A => {
                let mut h = Heap::<crate::tree::VariantA>::new();
                ok = h.init(start, size);
                HeapSlot::A(h)
            }
            Variant::B => {
                let mut h = Heap::<crate::tree::VariantB>::new();
                ok = h.init(start, size);
                HeapSlot::B(h)
            }
            Variant::C => {
                let mut h = Heap::<crate::tree::VariantC>::new();
                ok = h.init(start, size);
                HeapSlot::C(h)
            }
            Variant::D => {
                let mut h = Heap::<crate::tree::VariantD>::new();
                ok = h.init(start, size);
                HeapSlot::D(h)
            }
        };
        slot
    });
    ok
}

/// Routes a call through the global heap's locked slot, whichever variant
/// it was initialized with.
///
/// # Panics
/// Panics if `init_global` hasn't run yet.
fn with_global<R>(f: impl FnOnce(&mut dyn GlobalOps) -> R) -> R {
    let slot = HEAP.get().expect("global heap not yet initialized");
    let mut guard = slot.lock();
    match &mut *guard {
        HeapSlot::A(h) => f(h),
        HeapSlot::B(h) => f(h),
        HeapSlot::C(h) => f(h),
        HeapSlot::D(h) => f(h),
    }
}

/// The subset of `Heap<V>`'s surface the global wrapper forwards. Lets
/// `with_global` stay generic over which variant is actually live without
/// matching on it more than once per call.
trait GlobalOps {
    fn malloc(&mut self, n: usize) -> *mut u8;
    fn realloc(&mut self, old: *mut u8, n: usize) -> *mut u8;
    fn free(&mut self, p: *mut u8);
    fn heap_capacity(&self) -> usize;
    fn get_free_total(&self) -> usize;
}

impl<V: FreeTree> GlobalOps for Heap<V> {
    fn malloc(&mut self, n: usize) -> *mut u8 {
        Heap::malloc(self, n)
    }
    fn realloc(&mut self, old: *mut u8, n: usize) -> *mut u8 {
        Heap::realloc(self, old, n)
    }
    fn free(&mut self, p: *mut u8) {
        Heap::free(self, p)
    }
    fn heap_capacity(&self) -> usize {
        Heap::heap_capacity(self)
    }
    fn get_free_total(&self) -> usize {
        Heap::get_free_total(self)
    }
}

pub fn malloc(n: usize) -> *mut u8 {
    with_global(|h| h.malloc(n))
}

pub fn realloc(old: *mut u8, n: usize) -> *mut u8 {
    with_global(|h| h.realloc(old, n))
}

pub fn free(p: *mut u8) {
    with_global(|h| h.free(p))
}

pub fn heap_capacity() -> usize {
    with_global(|h| h.heap_capacity())
}

pub fn get_free_total() -> usize {
    with_global(|h| h.get_free_total())
}
