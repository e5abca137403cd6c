//! Variant D: same shape as C (red-black tree keyed by size, duplicates in
//! a per-node list) but its duplicate entries drop the parent cache
//! entirely — one word narrower than C's `prev, next, parent_or_null` — so
//! every promotion re-derives the tree node's parent with a fresh
//! root-to-node walk instead of trusting a cached value. Freeing the head
//! of an occupied slot costs `O(log n)` here against C's amortized `O(1)`.

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

#[derive(Default)]
pub struct VariantD {
    core: RbStack,
    total: usize,
}

impl VariantD {
    /// O(1): symmetric to `VariantC::splice_duplicate`, minus any cache to
    /// maintain.
    fn splice_duplicate(&mut self, node: BlockPtr, target: BlockPtr) {
        let prev = dup_prev(target);
        let next = dup_next(target);
        match prev {
            None => set_list_head(node, next),
            Some(p) => set_dup_next(p, next),
        }
        if let Some(n) = next {
            set_dup_prev(n, prev);
        }
    }
}

impl FreeTree for VariantD {
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
                if let Some(h) = old_head {
                    set_dup_prev(h, Some(block));
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
                    let parent = self.core.find_parent(node);
                    let rest = dup_next(head);
                    self.core.replace_node(node, head, parent);
                    set_list_head(head, rest);
                    if let Some(new_head) = rest {
                        set_dup_prev(new_head, None);
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
}
