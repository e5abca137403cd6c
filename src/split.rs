//! Carves an allocation out of a free block, the other half of the tag
//! surgery `coalesce` undoes on free.

use crate::block::BlockPtr;
use crate::consts::MIN_BLOCK_SIZE;
use crate::tree::FreeTree;

/// Marks `block` allocated at `needed` bytes of payload. If the leftover
/// tail is large enough to stand on its own (`>= MIN_BLOCK_SIZE`), it's
/// carved off as a fresh free block and handed to `tree`; otherwise the
/// whole block goes to the caller and the slack becomes internal
/// fragmentation, same tradeoff as `Node::resize`'s `Remove` case in the
/// teacher's linked-list allocator.
///
/// `block` must not currently be tracked by `tree`, and `block.size() >=
/// needed` must already hold.
pub fn split_alloc<V: FreeTree>(tree: &mut V, block: BlockPtr, needed: usize) -> BlockPtr {
    debug_assert!(block.size() >= needed, "split_alloc: block too small");
    let left_allocated = block.is_left_allocated();

    if block.size() >= needed + MIN_BLOCK_SIZE {
        let remainder_payload = block.size() - needed - crate::consts::WORD_SIZE;
        block.set_size(needed);
        block.set_allocated(true);
        block.set_left_allocated(left_allocated);

        let remainder = block.right_neighbor();
        remainder.init_free_node(remainder_payload, true);
        remainder.right_neighbor().set_left_allocated(false);
        tree.insert(remainder);
    } else {
        block.set_allocated(true);
        block.right_neighbor().set_left_allocated(true);
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::WORD_SIZE;
    use crate::tree::VariantA;
    use std::alloc::{alloc, dealloc, Layout};

    struct Buf {
        ptr: *mut u8,
        layout: Layout,
    }

    impl Buf {
        fn new(size: usize) -> Self {
            let layout = Layout::from_size_align(size, 8).unwrap();
            let ptr = unsafe { alloc(layout) };
            Buf { ptr, layout }
        }

        fn block(&self, offset: usize) -> BlockPtr {
            unsafe { BlockPtr::from_addr(self.ptr as usize + offset) }
        }
    }

    impl Drop for Buf {
        fn drop(&mut self) {
            unsafe { dealloc(self.ptr, self.layout) }
        }
    }

    #[test]
    fn splits_off_a_remainder_when_large_enough() {
        let buf = Buf::new(256);
        let block = buf.block(0);
        block.init_free_node(200, true);
        let sentinel = block.right_neighbor();
        sentinel.init_free_node(0, false);
        sentinel.set_allocated(true);

        let mut tree = VariantA::default();
        let allocated = split_alloc(&mut tree, block, 32);

        assert_eq!(allocated, block);
        assert_eq!(allocated.size(), 32);
        assert!(allocated.is_allocated());

        let remainder = allocated.right_neighbor();
        assert_eq!(remainder.size(), 200 - 32 - WORD_SIZE);
        assert!(!remainder.is_allocated());
        assert!(remainder.is_left_allocated());
        assert_eq!(tree.total(), 1);
        assert!(!remainder.right_neighbor().is_left_allocated());
    }

    #[test]
    fn keeps_whole_block_when_remainder_too_small() {
        let buf = Buf::new(128);
        let block = buf.block(0);
        block.init_free_node(40, true);
        let sentinel = block.right_neighbor();
        sentinel.init_free_node(0, false);
        sentinel.set_allocated(true);

        let mut tree = VariantA::default();
        let allocated = split_alloc(&mut tree, block, 32);

        assert_eq!(allocated.size(), 40);
        assert!(allocated.is_allocated());
        assert_eq!(tree.total(), 0);
        assert!(allocated.right_neighbor().is_left_allocated());
    }
}
