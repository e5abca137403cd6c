//! The red-black core shared by variants C and D: a size-keyed tree with one
//! node per distinct size (duplicates live in the per-size lists the two
//! wrappers maintain) that carries no parent field at all. Every mutation
//! rebuilds the root-to-node ancestor path as an explicit stack instead,
//! since `links[2]` plus `list_head` already fill the three free-record
//! words `MIN_BLOCK_SIZE` leaves no room to also store a parent.
//!
//! A useful side effect of dropping the parent field: splicing a fresh node
//! into an existing tree slot (`replace_node`, used to promote a duplicate
//! when its tree-node twin is taken) touches only that node and its new
//! parent's child slot. There's no child-side back-pointer to chase down
//! and repair.

use arrayvec::ArrayVec;

use crate::block::{BlockPtr, Color};
use crate::consts::MAX_TREE_HEIGHT;

const L: usize = 0;
const R: usize = 1;

pub type Path = ArrayVec<BlockPtr, MAX_TREE_HEIGHT>;

fn color_opt(n: Option<BlockPtr>) -> Color {
    n.map_or(Color::Black, BlockPtr::color)
}

pub fn link(n: BlockPtr, dir: usize) -> Option<BlockPtr> {
    n.read_opt(dir)
}

fn set_link(n: BlockPtr, dir: usize, v: Option<BlockPtr>) {
    n.write_opt(dir, v)
}

#[derive(Default)]
pub struct RbStack {
    root: Option<BlockPtr>,
}

impl RbStack {
    pub fn root(&self) -> Option<BlockPtr> {
        self.root
    }

    pub fn left(&self, node: BlockPtr) -> Option<BlockPtr> {
        link(node, L)
    }

    pub fn right(&self, node: BlockPtr) -> Option<BlockPtr> {
        link(node, R)
    }

    /// Ancestors of `target`, root first, `target` itself last. Panics (via
    /// `debug_assert`) only in debug builds if `target` isn't reachable;
    /// release builds just return whatever path the search fell off at.
    fn find_path(&self, target: BlockPtr) -> Path {
        let mut path = Path::new();
        let mut cur = self.root;
        let key = target.size();
        while let Some(n) = cur {
            path.push(n);
            if n == target {
                return path;
            }
            cur = if key < n.size() { link(n, L) } else { link(n, R) };
        }
        debug_assert!(false, "target not reachable from root by size search");
        path
    }

    /// Parent of `node`, found by re-walking from the root. `O(log n)`;
    /// variant D calls this on every duplicate-list promotion, variant C
    /// only as a fallback when its cache is stale.
    pub fn find_parent(&self, node: BlockPtr) -> Option<BlockPtr> {
        let path = self.find_path(node);
        let n = path.len();
        if n >= 2 {
            Some(path[n - 2])
        } else {
            None
        }
    }

    fn rotate(&mut self, parent_of_x: Option<BlockPtr>, x: BlockPtr, dir: usize) {
        let opp = 1 - dir;
        let y = link(x, opp).expect("rotate requires a child on the opposite side");
        set_link(x, opp, link(y, dir));
        set_link(y, dir, Some(x));
        match parent_of_x {
            None => self.root = Some(y),
            Some(p) if link(p, L) == Some(x) => set_link(p, L, Some(y)),
            Some(p) => set_link(p, R, Some(y)),
        }
    }

    fn transplant(&mut self, parent: Option<BlockPtr>, u: BlockPtr, v: Option<BlockPtr>) {
        match parent {
            None => self.root = v,
            Some(p) if link(p, L) == Some(u) => set_link(p, L, v),
            Some(p) => set_link(p, R, v),
        }
    }

    /// Swaps `new` into `old`'s exact tree slot (same color, same children,
    /// same parent child-slot), without touching `old` itself. Used to
    /// promote a duplicate-list entry into the structural tree in `O(1)`
    /// once its caller already knows `old`'s parent.
    pub fn replace_node(&mut self, old: BlockPtr, new: BlockPtr, parent: Option<BlockPtr>) {
        new.set_color(old.color());
        set_link(new, L, link(old, L));
        set_link(new, R, link(old, R));
        match parent {
            None => self.root = Some(new),
            Some(p) if link(p, L) == Some(old) => set_link(p, L, Some(new)),
            Some(p) => set_link(p, R, Some(new)),
        }
    }

    pub fn find_best_fit(&self, key: usize) -> Option<BlockPtr> {
        let mut cur = self.root;
        let mut winner: Option<BlockPtr> = None;
        while let Some(n) = cur {
            let sz = n.size();
            if sz == key {
                return Some(n);
            } else if sz > key {
                if winner.map_or(true, |w| sz < w.size()) {
                    winner = Some(n);
                }
                cur = link(n, L);
            } else {
                cur = link(n, R);
            }
        }
        winner
    }

    pub fn insert(&mut self, z: BlockPtr) {
        set_link(z, L, None);
        set_link(z, R, None);

        let mut path = Path::new();
        let mut cur = self.root;
        let mut dir = L;
        while let Some(n) = cur {
            path.push(n);
            dir = if z.size() < n.size() { L } else { R };
            cur = link(n, dir);
        }
        match path.last() {
            None => self.root = Some(z),
            Some(&p) => set_link(p, dir, Some(z)),
        }
        z.set_color(Color::Red);
        path.push(z);
        self.insert_fixup(path);
    }

    fn insert_fixup(&mut self, mut path: Path) {
        loop {
            let n = path.len();
            if n < 3 {
                break;
            }
            let z = path[n - 1];
            let zp = path[n - 2];
            if zp.color() != Color::Red {
                break;
            }
            let zpp = path[n - 3];
            let dir = if Some(zp) == link(zpp, L) { L } else { R };
            let opp = 1 - dir;
            let uncle = link(zpp, opp);
            if color_opt(uncle) == Color::Red {
                zp.set_color(Color::Black);
                uncle.unwrap().set_color(Color::Black);
                zpp.set_color(Color::Red);
                path.truncate(n - 2);
                continue;
            }
            let ggp = if n >= 4 { Some(path[n - 4]) } else { None };
            let black_node = if Some(z) == link(zp, opp) {
                self.rotate(Some(zpp), zp, dir);
                z
            } else {
                zp
            };
            black_node.set_color(Color::Black);
            zpp.set_color(Color::Red);
            self.rotate(ggp, zpp, opp);
            break;
        }
        self.root.unwrap().set_color(Color::Black);
    }

    /// Removes the tree node `z` (must currently be the structural tree
    /// node for its size, not a duplicate-list entry).
    pub fn remove(&mut self, z: BlockPtr) {
        let path = self.find_path(z);
        let m = path.len();
        let z_parent = if m >= 2 { Some(path[m - 2]) } else { None };

        let mut y = z;
        let mut y_original_color = y.color();
        let x;
        let mut x_path: Path;

        if link(z, L).is_none() {
            x = link(z, R);
            x_path = path[..m - 1].iter().copied().collect();
            self.transplant(z_parent, z, link(z, R));
        } else if link(z, R).is_none() {
            x = link(z, L);
            x_path = path[..m - 1].iter().copied().collect();
            self.transplant(z_parent, z, link(z, L));
        } else {
            let mut spath = path.clone();
            let mut n = link(z, R).unwrap();
            spath.push(n);
            while let Some(l) = link(n, L) {
                n = l;
                spath.push(n);
            }
            y = n;
            y_original_color = y.color();
            let sm = spath.len();
            let y_parent = spath[sm - 2];
            x = link(y, R);

            if y_parent == z {
                x_path = path[..m - 1].iter().copied().collect();
                x_path.push(y);
                self.transplant(z_parent, z, Some(y));
                set_link(y, L, link(z, L));
            } else {
                x_path = spath[..sm - 1].iter().copied().collect();
                self.transplant(Some(y_parent), y, link(y, R));
                set_link(y, R, link(z, R));
                self.transplant(z_parent, z, Some(y));
                set_link(y, L, link(z, L));
            }
            y.set_color(z.color());
        }

        if y_original_color == Color::Black {
            self.delete_fixup(x, x_path);
        }
    }

    fn delete_fixup(&mut self, mut x: Option<BlockPtr>, mut path: Path) {
        while x != self.root && color_opt(x) == Color::Black {
            let p = *path.last().expect("x is not root so it has a parent");
            let dir = if x == link(p, L) { L } else { R };
            let opp = 1 - dir;
            let mut w = link(p, opp).expect("sibling must exist (black-height)");
            if w.color() == Color::Red {
                w.set_color(Color::Black);
                p.set_color(Color::Red);
                let pp = if path.len() >= 2 {
                    Some(path[path.len() - 2])
                } else {
                    None
                };
                self.rotate(pp, p, dir);
                let pos = path.len() - 1;
                path.insert(pos, w);
                w = link(p, opp).unwrap();
            }
            if color_opt(link(w, L)) == Color::Black && color_opt(link(w, R)) == Color::Black {
                w.set_color(Color::Red);
                x = Some(p);
                path.pop();
            } else {
                if color_opt(link(w, opp)) == Color::Black {
                    if let Some(c) = link(w, dir) {
                        c.set_color(Color::Black);
                    }
                    w.set_color(Color::Red);
                    self.rotate(Some(p), w, opp);
                    w = link(p, opp).unwrap();
                }
                w.set_color(p.color());
                p.set_color(Color::Black);
                if let Some(c) = link(w, opp) {
                    c.set_color(Color::Black);
                }
                let pp = if path.len() >= 2 {
                    Some(path[path.len() - 2])
                } else {
                    None
                };
                self.rotate(pp, p, dir);
                x = self.root;
                path.clear();
            }
        }
        if let Some(xn) = x {
            xn.set_color(Color::Black);
        }
    }
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

    fn in_order(tree: &RbStack, node: Option<BlockPtr>, out: &mut Vec<usize>) {
        if let Some(n) = node {
            in_order(tree, link(n, L), out);
            out.push(n.size());
            in_order(tree, link(n, R), out);
        }
    }

    fn black_height(tree: &RbStack, node: Option<BlockPtr>) -> Result<usize, ()> {
        match node {
            None => Ok(0),
            Some(n) => {
                if n.color() == Color::Red {
                    let lc = link(n, L).map_or(Color::Black, BlockPtr::color);
                    let rc = link(n, R).map_or(Color::Black, BlockPtr::color);
                    if lc == Color::Red || rc == Color::Red {
                        return Err(());
                    }
                }
                let lh = black_height(tree, link(n, L))?;
                let rh = black_height(tree, link(n, R))?;
                if lh != rh {
                    return Err(());
                }
                Ok(lh + if n.color() == Color::Black { 1 } else { 0 })
            }
        }
    }

    #[test]
    fn insert_keeps_sorted_order_and_balance() {
        let buf = Buf::new(16);
        let sizes = [80usize, 40, 120, 32, 200, 160, 64, 48];
        let mut tree = RbStack::default();
        for (i, &sz) in sizes.iter().enumerate() {
            tree.insert(buf.block(i, sz));
        }
        let mut out = Vec::new();
        in_order(&tree, tree.root(), &mut out);
        let mut sorted = sizes.to_vec();
        sorted.sort_unstable();
        assert_eq!(out, sorted);
        assert_eq!(tree.root().unwrap().color(), Color::Black);
        assert!(black_height(&tree, tree.root()).is_ok());
    }

    #[test]
    fn remove_preserves_ordering_and_balance() {
        let buf = Buf::new(16);
        let sizes = [80usize, 40, 120, 32, 200, 160, 64, 48];
        let mut tree = RbStack::default();
        let mut blocks = Vec::new();
        for (i, &sz) in sizes.iter().enumerate() {
            let b = buf.block(i, sz);
            blocks.push(b);
            tree.insert(b);
        }
        tree.remove(blocks[0]);
        tree.remove(blocks[3]);
        let mut out = Vec::new();
        in_order(&tree, tree.root(), &mut out);
        let mut remaining: Vec<usize> = sizes
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != 0 && i != 3)
            .map(|(_, &s)| s)
            .collect();
        remaining.sort_unstable();
        assert_eq!(out, remaining);
        assert!(black_height(&tree, tree.root()).is_ok());
    }

    #[test]
    fn find_parent_matches_structure() {
        let buf = Buf::new(8);
        let sizes = [80usize, 40, 120, 32];
        let mut tree = RbStack::default();
        let mut blocks = Vec::new();
        for (i, &sz) in sizes.iter().enumerate() {
            let b = buf.block(i, sz);
            blocks.push(b);
            tree.insert(b);
        }
        let root = tree.root().unwrap();
        assert_eq!(tree.find_parent(root), None);
        if let Some(l) = tree.left(root) {
            assert_eq!(tree.find_parent(l), Some(root));
        }
    }
}
