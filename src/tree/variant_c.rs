//! Variant C: red-black tree keyed by size, duplicates of an already-present
//! size threaded through a per-node doubly-linked list instead of becoming
//! their own tree nodes. The tree node itself carries no parent field
//! (`MIN_BLOCK_SIZE` leaves no room for `parent` *and* `links[2]` *and*
//! `list_head`); instead the first entry of a nonempty duplicate list
//! caches that parent, so freeing the head of an occupied slot can promote
//! the next duplicate into the tree without a root-to-node search.

use crate::block::BlockPtr;
use crate::tree::rb_stack::RbStack;
use super::FreeTree;

fn list_head(n: BlockPtr) -> Option<BlockPtr> {
    n.read_opt(2)
}

fn set_list_head(n: BlockPtr, v: Option<BlockPtr>) {
    n.write_opt(2, v)
}

fn dup_prev(n: BlockPtr) -> Option<BlockPtr> {
    n.read_opt(0)
}

fn set_dup_prev(n: BlockPtr, v: Option<BlockPtr>) {
    n.write_opt(0, v)
}

fn dup_next(n: BlockPtr) -> Option<BlockPtr> {
    n.read_opt(1)
}

fn set_dup_next(n: BlockPtr, v: Option<BlockPtr>) {
    n.write_opt(1, v)
}

/// Field 2 on a duplicate-list entry: `0` = no cache recorded, `1` = cached
/// parent is the root (`None`), anything else = the parent's address. Two
/// states plain `Option<BlockPtr>` can't tell apart on its own: "not cached"
/// and "cached, and the tree node is the root".
fn dup_parent_cache(n: BlockPtr) -> Option<Option<BlockPtr>> {
    match n.read_field(2) {
        0 => None,
        1 => Some(None),
        addr => Some(Some(unsafe { BlockPtr::from_addr(addr) })),
    }
}

fn set_dup_parent_cache(n: BlockPtr, v: Option<Option<BlockPtr>>) {
    let raw = match v {
        None => 0,
        Some(None) => 1,
        Some(Some(b)) => b.addr(),
    };
    n.write_field(2, raw);
}

#[derive(Default)]
pub struct VariantC {
    core: RbStack,
    total: usize,
}

impl VariantC {
    /// The cache is a fast-path hint, not load-bearing for correctness:
    /// `rb_stack`'s rotations know nothing about duplicate lists and so
    /// never patch it in place, only `insert`/`remove_node` here do. Every
    /// use is checked against the live tree before being trusted.
    fn parent_points_to(&self, parent: Option<BlockPtr>, node: BlockPtr) -> bool {
        match parent {
            None => self.core.root() == Some(node),
            Some(p) => self.core.left(p) == Some(node) || self.core.right(p) == Some(node),
        }
    }

    fn resolve_parent(&self, node: BlockPtr, cached: Option<Option<BlockPtr>>) -> Option<BlockPtr> {
        if let Some(p) = cached {
            if self.parent_points_to(p, node) {
                return p;
            }
        }
        self.core.find_parent(node)
    }

    /// O(1): uses `target`'s own prev/next, touching the tree node only
    /// when `target` is the list head (to rewrite `list_head`).
    fn splice_duplicate(&mut self, node: BlockPtr, target: BlockPtr) {
        let prev = dup_prev(target);
        let next = dup_next(target);
        match prev {
            None => {
                let parent = self.resolve_parent(node, dup_parent_cache(target));
                set_list_head(node, next);
                if let Some(n) = next {
                    set_dup_parent_cache(n, Some(parent));
                }
            }
            Some(p) => set_dup_next(p, next),
        }
        if let Some(n) = next {
            set_dup_prev(n, prev);
        }
    }
}

impl FreeTree for VariantC {
    const HAS_PARENT_POINTERS: bool = false;
    const HAS_DUPLICATE_LISTS: bool = true;
    const STRICT_ORDERING: bool = true;

    fn total(&self) -> usize {
        self.total
    }

    fn insert(&mut self, block: BlockPtr) {
        let key = block.size();
        match self.core.find_best_fit(key).filter(|n| n.size() == key) {
            Some(existing) => {
                let old_head = list_head(existing);
                set_dup_prev(block, None);
                set_dup_next(block, old_head);
                match old_head {
                    None => {
                        let parent = self.resolve_parent(existing, None);
                        set_dup_parent_cache(block, Some(parent));
                    }
                    Some(h) => {
                        set_dup_prev(h, Some(block));
                        set_dup_parent_cache(block, dup_parent_cache(h));
                        set_dup_parent_cache(h, None);
                    }
                }
                set_list_head(existing, Some(block));
            }
            None => {
                set_list_head(block, None);
                self.core.insert(block);
            }
        }
        self.total += 1;
    }

    fn remove_node(&mut self, block: BlockPtr) {
        let key = block.size();
        let node = self
            .core
            .find_best_fit(key)
            .filter(|n| n.size() == key)
            .expect("remove_node: no tree slot for this size");

        if node == block {
            match list_head(node) {
                None => self.core.remove(node),
                Some(head) => {
                    let parent = self.resolve_parent(node, dup_parent_cache(head));
                    let rest = dup_next(head);
                    self.core.replace_node(node, head, parent);
                    set_list_head(head, rest);
                    if let Some(new_head) = rest {
                        set_dup_prev(new_head, None);
                        set_dup_parent_cache(new_head, Some(parent));
                    }
                    if let Some(l) = self.core.left(head) {
                        if let Some(lh) = list_head(l) {
                            set_dup_parent_cache(lh, Some(Some(head)));
                        }
                    }
                    if let Some(r) = self.core.right(head) {
                        if let Some(rh) = list_head(r) {
                            set_dup_parent_cache(rh, Some(Some(head)));
                        }
                    }
                }
            }
        } else {
            self.splice_duplicate(node, block);
        }
        self.total -= 1;
    }

    fn best_fit(&mut self, key: usize) -> Option<BlockPtr> {
        let node = self.core.find_best_fit(key)?;
        let result = match list_head(node) {
            Some(head) => {
                let rest = dup_next(head);
                set_list_head(node, rest);
                if let Some(new_head) = rest {
                    set_dup_prev(new_head, None);
                    if let Some(cached) = dup_parent_cache(head) {
                        set_dup_parent_cache(new_head, Some(cached));
                    }
                }
                head
            }
            None => {
                self.core.remove(node);
                node
            }
        };
        self.total -= 1;
        Some(result)
    }

    fn root(&self) -> Option<BlockPtr> {
        self.core.root()
    }

    fn left(&self, node: BlockPtr) -> Option<BlockPtr> {
        self.core.left(node)
    }

    fn right(&self, node: BlockPtr) -> Option<BlockPtr> {
        self.core.right(node)
    }

    fn color(&self, node: BlockPtr) -> crate::block::Color {
        node.color()
    }

    fn parent(&self, _node: BlockPtr) -> Option<BlockPtr> {
        None
    }

    fn for_each_duplicate(&self, node: BlockPtr, f: &mut dyn FnMut(BlockPtr)) {
        let is_tree_node = self
            .core
            .find_best_fit(node.size())
            .is_some_and(|n| n == node);
        if !is_tree_node {
            return;
        }
        let mut cur = list_head(node);
        while let Some(c) = cur {
            f(c);
            cur = dup_next(c);
        }
    }

    fn duplicate_cached_parent(&self, dup: BlockPtr) -> Option<Option<BlockPtr>> {
        dup_parent_cache(dup)
    }
}
