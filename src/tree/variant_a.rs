//! Variant A: the classical CLRS red-black tree, parent pointer, no
//! duplicate-list splicing. Blocks of equal size become separate tree nodes;
//! ties during descent go right, so lookups and deletes still terminate in
//! `O(log N)`.

use crate::block::{BlockPtr, Color};
use super::FreeTree;

fn color_opt(n: Option<BlockPtr>) -> Color {
    n.map_or(Color::Black, BlockPtr::color)
}

fn parent(n: BlockPtr) -> Option<BlockPtr> {
    n.read_opt(0)
}

fn left(n: BlockPtr) -> Option<BlockPtr> {
    n.read_opt(1)
}

fn right(n: BlockPtr) -> Option<BlockPtr> {
    n.read_opt(2)
}

fn set_parent(n: BlockPtr, v: Option<BlockPtr>) {
    n.write_opt(0, v)
}

fn set_left(n: BlockPtr, v: Option<BlockPtr>) {
    n.write_opt(1, v)
}

fn set_right(n: BlockPtr, v: Option<BlockPtr>) {
    n.write_opt(2, v)
}

#[derive(Default)]
pub struct VariantA {
    root: Option<BlockPtr>,
    total: usize,
}

impl VariantA {
    fn left_rotate(&mut self, x: BlockPtr) {
        let y = right(x).expect("left_rotate requires a right child");
        set_right(x, left(y));
        if let Some(yl) = left(y) {
            set_parent(yl, Some(x));
        }
        set_parent(y, parent(x));
        match parent(x) {
            None => self.root = Some(y),
            Some(p) if left(p) == Some(x) => set_left(p, Some(y)),
            Some(p) => set_right(p, Some(y)),
        }
        set_left(y, Some(x));
        set_parent(x, Some(y));
    }

    fn right_rotate(&mut self, x: BlockPtr) {
        let y = left(x).expect("right_rotate requires a left child");
        set_left(x, right(y));
        if let Some(yr) = right(y) {
            set_parent(yr, Some(x));
        }
        set_parent(y, parent(x));
        match parent(x) {
            None => self.root = Some(y),
            Some(p) if left(p) == Some(x) => set_left(p, Some(y)),
            Some(p) => set_right(p, Some(y)),
        }
        set_right(y, Some(x));
        set_parent(x, Some(y));
    }

    fn insert_fixup(&mut self, mut z: BlockPtr) {
        while color_opt(parent(z)) == Color::Red {
            let zp = parent(z).unwrap();
            let zpp = parent(zp).expect("a red node's parent cannot be the root");
            if Some(zp) == left(zpp) {
                let y = right(zpp);
                if color_opt(y) == Color::Red {
                    zp.set_color(Color::Black);
                    y.unwrap().set_color(Color::Black);
                    zpp.set_color(Color::Red);
                    z = zpp;
                } else {
                    if Some(z) == right(zp) {
                        z = zp;
                        self.left_rotate(z);
                    }
                    let zp = parent(z).unwrap();
                    let zpp = parent(zp).unwrap();
                    zp.set_color(Color::Black);
                    zpp.set_color(Color::Red);
                    self.right_rotate(zpp);
                }
            } else {
                let y = left(zpp);
                if color_opt(y) == Color::Red {
                    zp.set_color(Color::Black);
                    y.unwrap().set_color(Color::Black);
                    zpp.set_color(Color::Red);
                    z = zpp;
                } else {
                    if Some(z) == left(zp) {
                        z = zp;
                        self.right_rotate(z);
                    }
                    let zp = parent(z).unwrap();
                    let zpp = parent(zp).unwrap();
                    zp.set_color(Color::Black);
                    zpp.set_color(Color::Red);
                    self.left_rotate(zpp);
                }
            }
        }
        self.root.unwrap().set_color(Color::Black);
    }

    fn transplant(&mut self, u: BlockPtr, v: Option<BlockPtr>) {
        let up = parent(u);
        match up {
            None => self.root = v,
            Some(p) if left(p) == Some(u) => set_left(p, v),
            Some(p) => set_right(p, v),
        }
        if let Some(vn) = v {
            set_parent(vn, up);
        }
    }

    fn minimum(&self, mut n: BlockPtr) -> BlockPtr {
        while let Some(l) = left(n) {
            n = l;
        }
        n
    }

    fn delete_fixup(&mut self, mut x: Option<BlockPtr>, mut x_parent: Option<BlockPtr>) {
        while x != self.root && color_opt(x) == Color::Black {
            let p = x_parent.expect("x is not root so it has a parent");
            if x == left(p) {
                let mut w = right(p).expect("sibling must exist (black-height)");
                if w.color() == Color::Red {
                    w.set_color(Color::Black);
                    p.set_color(Color::Red);
                    self.left_rotate(p);
                    w = right(p).unwrap();
                }
                if color_opt(left(w)) == Color::Black && color_opt(right(w)) == Color::Black {
                    w.set_color(Color::Red);
                    x = Some(p);
                    x_parent = parent(p);
                } else {
                    if color_opt(right(w)) == Color::Black {
                        if let Some(wl) = left(w) {
                            wl.set_color(Color::Black);
                        }
                        w.set_color(Color::Red);
                        self.right_rotate(w);
                        w = right(p).unwrap();
                    }
                    w.set_color(p.color());
                    p.set_color(Color::Black);
                    if let Some(wr) = right(w) {
                        wr.set_color(Color::Black);
                    }
                    self.left_rotate(p);
                    x = self.root;
                    x_parent = None;
                }
            } else {
                let mut w = left(p).expect("sibling must exist (black-height)");
                if w.color() == Color::Red {
                    w.set_color(Color::Black);
                    p.set_color(Color::Red);
                    self.right_rotate(p);
                    w = left(p).unwrap();
                }
                if color_opt(right(w)) == Color::Black && color_opt(left(w)) == Color::Black {
                    w.set_color(Color::Red);
                    x = Some(p);
                    x_parent = parent(p);
                } else {
                    if color_opt(left(w)) == Color::Black {
                        if let Some(wr) = right(w) {
                            wr.set_color(Color::Black);
                        }
                        w.set_color(Color::Red);
                        self.left_rotate(w);
                        w = left(p).unwrap();
                    }
                    w.set_color(p.color());
                    p.set_color(Color::Black);
                    if let Some(wl) = left(w) {
                        wl.set_color(Color::Black);
                    }
                    self.right_rotate(p);
                    x = self.root;
                    x_parent = None;
                }
            }
        }
        if let Some(xn) = x {
            xn.set_color(Color::Black);
        }
    }
}

impl FreeTree for VariantA {
    const HAS_PARENT_POINTERS: bool = true;
    const HAS_DUPLICATE_LISTS: bool = false;
    const STRICT_ORDERING: bool = false;

    fn total(&self) -> usize {
        self.total
    }

    fn insert(&mut self, z: BlockPtr) {
        set_left(z, None);
        set_right(z, None);

        let mut y = None;
        let mut x = self.root;
        while let Some(xn) = x {
            y = Some(xn);
            x = if z.size() < xn.size() { left(xn) } else { right(xn) };
        }
        set_parent(z, y);
        match y {
            None => self.root = Some(z),
            Some(yn) if z.size() < yn.size() => set_left(yn, Some(z)),
            Some(yn) => set_right(yn, Some(z)),
        }
        z.set_color(Color::Red);
        self.total += 1;
        self.insert_fixup(z);
    }

    fn remove_node(&mut self, z: BlockPtr) {
        let mut y = z;
        let mut y_original_color = y.color();
        let x;
        let x_parent;

        if left(z).is_none() {
            x = right(z);
            x_parent = parent(z);
            self.transplant(z, right(z));
        } else if right(z).is_none() {
            x = left(z);
            x_parent = parent(z);
            self.transplant(z, left(z));
        } else {
            y = self.minimum(right(z).unwrap());
            y_original_color = y.color();
            x = right(y);
            if parent(y) == Some(z) {
                x_parent = Some(y);
            } else {
                x_parent = parent(y);
                self.transplant(y, right(y));
                set_right(y, right(z));
                set_parent(right(y).unwrap(), Some(y));
            }
            self.transplant(z, Some(y));
            set_left(y, left(z));
            set_parent(left(y).unwrap(), Some(y));
            y.set_color(z.color());
        }

        if y_original_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }
        self.total -= 1;
    }

    fn best_fit(&mut self, key: usize) -> Option<BlockPtr> {
        let mut x = self.root;
        let mut winner: Option<BlockPtr> = None;
        while let Some(xn) = x {
            let sz = xn.size();
            if sz == key {
                winner = Some(xn);
                break;
            } else if sz > key {
                if winner.map_or(true, |w| sz < w.size()) {
                    winner = Some(xn);
                }
                x = left(xn);
            } else {
                x = right(xn);
            }
        }
        if let Some(w) = winner {
            self.remove_node(w);
        }
        winner
    }

    fn root(&self) -> Option<BlockPtr> {
        self.root
    }

    fn left(&self, node: BlockPtr) -> Option<BlockPtr> {
        left(node)
    }

    fn right(&self, node: BlockPtr) -> Option<BlockPtr> {
        right(node)
    }

    fn color(&self, node: BlockPtr) -> Color {
        node.color()
    }

    fn parent(&self, node: BlockPtr) -> Option<BlockPtr> {
        parent(node)
    }

    fn for_each_duplicate(&self, _node: BlockPtr, _f: &mut dyn FnMut(BlockPtr)) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::{alloc, dealloc, Layout};

    struct Buf {
        ptr: *mut u8,
        layout: Layout,
    }

    impl Buf {
        fn new(count: usize) -> Self {
            let layout = Layout::from_size_align(count * 1024, 8).unwrap();
            let ptr = unsafe { alloc(layout) };
            Buf { ptr, layout }
        }

        fn block(&self, index: usize, size: usize) -> BlockPtr {
            let b = unsafe { BlockPtr::from_addr(self.ptr as usize + index * 1024) };
            b.init_free_node(size, true);
            b
        }
    }

    impl Drop for Buf {
        fn drop(&mut self) {
            unsafe { dealloc(self.ptr, self.layout) }
        }
    }

    fn in_order(node: Option<BlockPtr>, out: &mut Vec<usize>) {
        if let Some(n) = node {
            in_order(left(n), out);
            out.push(n.size());
            in_order(right(n), out);
        }
    }

    #[test]
    fn insert_and_remove_keep_sorted_order() {
        let buf = Buf::new(16);
        let sizes = [80usize, 40, 120, 32, 200, 160, 64, 48, 40, 40];
        let mut tree = VariantA::default();
        let mut blocks = Vec::new();
        for (i, &sz) in sizes.iter().enumerate() {
            let b = buf.block(i, sz);
            blocks.push(b);
            tree.insert(b);
        }
        assert_eq!(tree.total(), sizes.len());

        let mut out = Vec::new();
        in_order(tree.root(), &mut out);
        let mut sorted = sizes.to_vec();
        sorted.sort_unstable();
        assert_eq!(out, sorted);
        assert_eq!(tree.root().unwrap().color(), Color::Black);

        tree.remove_node(blocks[2]);
        tree.remove_node(blocks[8]);
        assert_eq!(tree.total(), sizes.len() - 2);
        let mut out2 = Vec::new();
        in_order(tree.root(), &mut out2);
        let mut remaining: Vec<usize> = sizes
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != 2 && i != 8)
            .map(|(_, &s)| s)
            .collect();
        remaining.sort_unstable();
        assert_eq!(out2, remaining);
    }

    #[test]
    fn best_fit_finds_smallest_adequate_block_and_removes_it() {
        let buf = Buf::new(8);
        let sizes = [32usize, 64, 128, 256];
        let mut tree = VariantA::default();
        for (i, &sz) in sizes.iter().enumerate() {
            tree.insert(buf.block(i, sz));
        }
        let found = tree.best_fit(50).expect("should find a fitting block");
        assert_eq!(found.size(), 64);
        assert_eq!(tree.total(), 3);
        assert!(tree.best_fit(300).is_none());
    }
}
