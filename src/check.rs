//! Structural invariant audit over a live [`Heap`], independent of the
//! allocator's own bookkeeping. Walks the segment linearly and the free
//! tree recursively, cross-checking one against the other, the way
//! `kernel/src/mem/heap_allocator/mod.rs`'s debug assertions check a freed
//! block's neighbors without trusting the allocator code being audited.

use log::error;

use crate::block::{BlockPtr, Color};
use crate::consts::WORD_SIZE;
use crate::error::Violation;
use crate::heap::Heap;
use crate::tree::FreeTree;

/// Runs every check and logs the first violation found, if any.
pub fn validate_heap<V: FreeTree>(heap: &Heap<V>) -> bool {
    match check(heap) {
        Ok(()) => true,
        Err(v) => {
            error!("validate_heap: {v}");
            #[cfg(test)]
            error!("segment: {}\ntree: {}", heap.fmt_segment(), heap.fmt_tree());
            false
        }
    }
}

/// Same as [`validate_heap`] but returns the violation instead of logging
/// it, for tests that want to assert on which invariant broke.
pub fn check<V: FreeTree>(heap: &Heap<V>) -> Result<(), Violation> {
    let walk = walk_segment(heap)?;
    if walk.total_bytes != heap.segment_bytes() {
        return Err(Violation::SegmentConservation);
    }

    let stats = walk_tree(heap.tree())?;
    if stats.count != heap.tree().total() || stats.count != walk.free_count {
        return Err(Violation::FreeTallyMismatch);
    }
    if stats.free_bytes != walk.free_bytes {
        return Err(Violation::FreeByteMismatch);
    }

    Ok(())
}

struct SegmentWalk {
    total_bytes: usize,
    free_count: usize,
    free_bytes: usize,
}

/// Linear left-to-right pass over every block, including the sentinel.
/// Checks I2-I5 as it goes; I1 (byte conservation) is checked by the
/// caller once the full sum is known.
fn walk_segment<V: FreeTree>(heap: &Heap<V>) -> Result<SegmentWalk, Violation> {
    let mut cur = unsafe { BlockPtr::from_addr(heap.client_start) };
    if !cur.is_left_allocated() {
        return Err(Violation::FirstBlockMisflagged);
    }

    let mut total_bytes = 0;
    let mut free_count = 0;
    let mut free_bytes = 0;

    loop {
        let size = cur.size();
        total_bytes += size + WORD_SIZE;

        if cur.addr() == heap.client_end {
            if size != 0 || !cur.is_allocated() {
                return Err(Violation::SentinelCorrupt);
            }
            break;
        }

        if !cur.is_allocated() {
            free_count += 1;
            free_bytes += size + WORD_SIZE;
            if cur.header() != unsafe { (cur.footer_addr() as *const u64).read() } {
                return Err(Violation::FooterMismatch);
            }
        }

        let next = cur.right_neighbor();
        if next.is_left_allocated() != cur.is_allocated() {
            return Err(Violation::NeighborAgreement);
        }
        cur = next;
    }

    Ok(SegmentWalk {
        total_bytes,
        free_count,
        free_bytes,
    })
}

struct TreeWalk {
    count: usize,
    free_bytes: usize,
}

/// Recursive structural audit of the tree: ordering (I9/P5), parent
/// back-pointers (P6), duplicate-list hygiene (P7), and red-black balance
/// (I8/P4, checked by two independently-shaped recursions so a bug in one
/// wouldn't also be baked into the other).
fn walk_tree<V: FreeTree>(tree: &V) -> Result<TreeWalk, Violation> {
    let root = tree.root();
    if let Some(r) = root {
        if tree.color(r) != Color::Black {
            return Err(Violation::RedBlackBalance);
        }
    }

    black_height_bottom_up(tree, root)?;
    let mut leaf_height = None;
    black_height_root_to_leaf(tree, root, 0, &mut leaf_height)?;

    let mut count = 0;
    let mut free_bytes = 0;
    walk_node(tree, root, None, None, None, &mut count, &mut free_bytes)?;

    Ok(TreeWalk { count, free_bytes })
}

/// Post-order: computes each subtree's black-height bottom-up, rejecting
/// any red node with a red child or unequal child black-heights on the
/// way.
fn black_height_bottom_up<V: FreeTree>(
    tree: &V,
    node: Option<BlockPtr>,
) -> Result<usize, Violation> {
    let Some(n) = node else { return Ok(0) };

    if tree.color(n) == Color::Red {
        let left_red = tree.left(n).is_some_and(|c| tree.color(c) == Color::Red);
        let right_red = tree.right(n).is_some_and(|c| tree.color(c) == Color::Red);
        if left_red || right_red {
            return Err(Violation::RedBlackBalance);
        }
    }

    let left_bh = black_height_bottom_up(tree, tree.left(n))?;
    let right_bh = black_height_bottom_up(tree, tree.right(n))?;
    if left_bh != right_bh {
        return Err(Violation::RedBlackBalance);
    }
    Ok(left_bh + usize::from(tree.color(n) == Color::Black))
}

/// Pre-order: accumulates the black count along each root-to-leaf path and
/// compares every path against the first one reached. A structurally
/// different bug (e.g. a miscounted leaf) than `black_height_bottom_up`
/// would need to produce, so the two together catch more than either
/// alone.
fn black_height_root_to_leaf<V: FreeTree>(
    tree: &V,
    node: Option<BlockPtr>,
    acc: usize,
    expected: &mut Option<usize>,
) -> Result<(), Violation> {
    match node {
        None => match *expected {
            None => {
                *expected = Some(acc);
                Ok(())
            }
            Some(e) if e == acc => Ok(()),
            Some(_) => Err(Violation::RedBlackBalance),
        },
        Some(n) => {
            let next = acc + usize::from(tree.color(n) == Color::Black);
            black_height_root_to_leaf(tree, tree.left(n), next, expected)?;
            black_height_root_to_leaf(tree, tree.right(n), next, expected)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn walk_node<V: FreeTree>(
    tree: &V,
    node: Option<BlockPtr>,
    parent: Option<BlockPtr>,
    lo: Option<usize>,
    hi: Option<usize>,
    count: &mut usize,
    free_bytes: &mut usize,
) -> Result<(), Violation> {
    let Some(n) = node else { return Ok(()) };
    let size = n.size();

    let lo_ok = match lo {
        Some(lo) if V::STRICT_ORDERING => size > lo,
        Some(lo) => size >= lo,
        None => true,
    };
    let hi_ok = match hi {
        Some(hi) if V::STRICT_ORDERING => size < hi,
        Some(hi) => size <= hi,
        None => true,
    };
    if !lo_ok || !hi_ok {
        return Err(Violation::OrderingViolation);
    }

    if V::HAS_PARENT_POINTERS && tree.parent(n) != parent {
        return Err(Violation::ParentBackPointer);
    }

    *count += 1;
    *free_bytes += size + WORD_SIZE;

    if V::HAS_DUPLICATE_LISTS {
        audit_duplicates(tree, n, parent, count, free_bytes)?;
    }

    walk_node(tree, tree.left(n), Some(n), lo, Some(size), count, free_bytes)?;
    walk_node(tree, tree.right(n), Some(n), Some(size), hi, count, free_bytes)
}

/// Checks that every duplicate shares its tree node's size, and — where a
/// variant maintains a parent cache at all — that the cache, when present,
/// is correct (the first entry's points at the real parent; every later
/// entry's is absent). A variant that never maintains the cache (D) has
/// nothing to check here: absence alone isn't a violation, only an
/// incorrect *presence* is.
fn audit_duplicates<V: FreeTree>(
    tree: &V,
    node: BlockPtr,
    parent: Option<BlockPtr>,
    count: &mut usize,
    free_bytes: &mut usize,
) -> Result<(), Violation> {
    let size = node.size();
    let mut violation = None;
    let mut first = true;
    tree.for_each_duplicate(node, &mut |dup| {
        if violation.is_some() {
            return;
        }
        if dup.size() != size {
            violation = Some(Violation::OrderingViolation);
            return;
        }
        *count += 1;
        *free_bytes += dup.size() + WORD_SIZE;

        match tree.duplicate_cached_parent(dup) {
            None => {}
            Some(cached) if first && cached != parent => {
                violation = Some(Violation::DuplicateListHygiene);
            }
            Some(_) if !first => {
                violation = Some(Violation::DuplicateListHygiene);
            }
            Some(_) => {}
        }
        first = false;
    });
    match violation {
        Some(v) => Err(v),
        None => Ok(()),
    }
}
