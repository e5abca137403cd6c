//! Free-tree back-ends: the size-keyed balanced search tree that supports
//! best-fit selection, insertion on free, and deletion on allocate/coalesce.
//!
//! Three interchangeable variants implement [`FreeTree`]; `Heap<V>` (see
//! `crate::heap`) is generic over the choice, matching the design note that
//! asks for the tree to sit behind a trait so tests can swap back-ends.
//!
//! The CLRS sentinel (a statically black, size-1 node serving as every nil
//! child, the root's parent, and — in C/D — each duplicate list's tail) is
//! represented by `Option<BlockPtr>::None` throughout. That single
//! representation plays all three roles unambiguously: there is exactly one
//! meaning, "no real node here," regardless of which field is read.

mod rb_stack;
mod variant_a;
mod variant_b;
mod variant_c;
mod variant_d;

pub use variant_a::VariantA;
pub use variant_b::VariantB;
pub use variant_c::VariantC;
pub use variant_d::VariantD;

use crate::block::{BlockPtr, Color};

/// Common contract every free-tree back-end implements.
///
/// `insert`/`remove_node`/`best_fit` are the only operations the allocator
/// surface calls. The rest (`root`/`left`/`right`/`color`/`parent`/
/// `for_each_duplicate`) exist purely for `crate::check`'s structural audit
/// and for tests; production code never needs them.
pub trait FreeTree: Default {
    /// True for A and B, which store an explicit parent field on every tree
    /// node. Neither C nor D can afford that field and also fit
    /// `links[2]` + `list_head` inside `MIN_BLOCK_SIZE`, so both rebuild an
    /// ancestor-path stack on every mutating call instead. They differ only
    /// in whether a duplicate-list entry *also* caches its tree node's
    /// parent: C does (O(1) promotion on free-of-head), D never does.
    const HAS_PARENT_POINTERS: bool;

    /// True for the duplicate-list variants (C/D), which keep one tree node
    /// per distinct size with extra free blocks of that size threaded
    /// through a per-size list instead of appearing as separate tree nodes.
    const HAS_DUPLICATE_LISTS: bool;

    /// True when left-subtree-sizes-strictly-less, right-strictly-greater
    /// is enforced (C/D, which hoist duplicates into lists). False when
    /// ties are broken by inserting to the right, admitting duplicate sizes
    /// as distinct tree nodes (A/B).
    const STRICT_ORDERING: bool;

    /// Number of free blocks this tree currently accounts for (one per
    /// node for A/B, one per node *and* one per list entry for C/D).
    fn total(&self) -> usize;

    /// `block`'s header size must already be set and it must not currently
    /// be in the tree.
    fn insert(&mut self, block: BlockPtr);

    /// `block` must currently be tracked by this tree (as a node, or — for
    /// C/D — anywhere in a duplicate list).
    fn remove_node(&mut self, block: BlockPtr);

    /// Removes and returns the free block whose size is the smallest
    /// `>= key`, or `None` if no block is that large.
    fn best_fit(&mut self, key: usize) -> Option<BlockPtr>;

    // --- introspection, for `crate::check` and tests only --------------

    fn root(&self) -> Option<BlockPtr>;
    fn left(&self, node: BlockPtr) -> Option<BlockPtr>;
    fn right(&self, node: BlockPtr) -> Option<BlockPtr>;
    fn color(&self, node: BlockPtr) -> Color;

    /// Only meaningful when `HAS_PARENT_POINTERS`; returns `None` for C and
    /// D (always, even at the root) since neither stores a parent field on
    /// a tree node.
    fn parent(&self, node: BlockPtr) -> Option<BlockPtr>;

    /// Calls `f` once per *extra* free block sharing `node`'s size (not
    /// including `node` itself). Always empty unless `HAS_DUPLICATE_LISTS`.
    fn for_each_duplicate(&self, node: BlockPtr, f: &mut dyn FnMut(BlockPtr));

    /// For C only: the parent-pointer cache written on the first entry of
    /// a duplicate list (used to audit P7). `None` for A/B/D.
    fn duplicate_cached_parent(&self, _dup: BlockPtr) -> Option<Option<BlockPtr>> {
        None
    }
}
