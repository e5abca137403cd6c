//! Variant B: the same red-black tree as variant A, but with the left/right
//! symmetry collapsed into a single direction-parameterized implementation
//! (`links[L|R]`, `L=0, R=1`), the way a unified CLRS port usually ends up
//! looking once the mirrored cases are factored out.

use crate::block::{BlockPtr, Color};
use super::FreeTree;

const L: usize = 0;
const R: usize = 1;

fn color_opt(n: Option<BlockPtr>) -> Color {
    n.map_or(Color::Black, BlockPtr::color)
}

fn parent(n: BlockPtr) -> Option<BlockPtr> {
    n.read_opt(0)
}

fn link(n: BlockPtr, dir: usize) -> Option<BlockPtr> {
    n.read_opt(1 + dir)
}

fn set_parent(n: BlockPtr, v: Option<BlockPtr>) {
    n.write_opt(0, v)
}

fn set_link(n: BlockPtr, dir: usize, v: Option<BlockPtr>) {
    n.write_opt(1 + dir, v)
}

#[derive(Default)]
pub struct VariantB {
    root: Option<BlockPtr>,
    total: usize,
}

impl VariantB {
    /// `dir == L` behaves like `left_rotate`; `dir == R` like `right_rotate`.
    fn rotate(&mut self, x: BlockPtr, dir: usize) {
        let opp = 1 - dir;
        let y = link(x, opp).expect("rotate requires a child on the opposite side");
        set_link(x, opp, link(y, dir));
        if let Some(c) = link(y, dir) {
            set_parent(c, Some(x));
        }
        set_parent(y, parent(x));
        match parent(x) {
            None => self.root = Some(y),
            Some(p) if link(p, L) == Some(x) => set_link(p, L, Some(y)),
            Some(p) => set_link(p, R, Some(y)),
        }
        set_link(y, dir, Some(x));
        set_parent(x, Some(y));
    }

    fn insert_fixup(&mut self, mut z: BlockPtr) {
        while color_opt(parent(z)) == Color::Red {
            let zp = parent(z).unwrap();
            let zpp = parent(zp).expect("a red node's parent cannot be the root");
            let dir = if Some(zp) == link(zpp, L) { L } else { R };
            let opp = 1 - dir;
            let y = link(zpp, opp);
            if color_opt(y) == Color::Red {
                zp.set_color(Color::Black);
                y.unwrap().set_color(Color::Black);
                zpp.set_color(Color::Red);
                z = zpp;
            } else {
                if Some(z) == link(zp, opp) {
                    z = zp;
                    self.rotate(z, dir);
                }
                let zp = parent(z).unwrap();
                let zpp = parent(zp).unwrap();
                zp.set_color(Color::Black);
                zpp.set_color(Color::Red);
                self.rotate(zpp, opp);
            }
        }
        self.root.unwrap().set_color(Color::Black);
    }

    fn transplant(&mut self, u: BlockPtr, v: Option<BlockPtr>) {
        let up = parent(u);
        match up {
            None => self.root = v,
            Some(p) if link(p, L) == Some(u) => set_link(p, L, v),
            Some(p) => set_link(p, R, v),
        }
        if let Some(vn) = v {
            set_parent(vn, up);
        }
    }

    fn minimum(&self, mut n: BlockPtr) -> BlockPtr {
        while let Some(l) = link(n, L) {
            n = l;
        }
        n
    }

    fn delete_fixup(&mut self, mut x: Option<BlockPtr>, mut x_parent: Option<BlockPtr>) {
        while x != self.root && color_opt(x) == Color::Black {
            let p = x_parent.expect("x is not root so it has a parent");
            let dir = if x == link(p, L) { L } else { R };
            let opp = 1 - dir;
            let mut w = link(p, opp).expect("sibling must exist (black-height)");
            if w.color() == Color::Red {
                w.set_color(Color::Black);
                p.set_color(Color::Red);
                self.rotate(p, dir);
                w = link(p, opp).unwrap();
            }
            if color_opt(link(w, L)) == Color::Black && color_opt(link(w, R)) == Color::Black {
                w.set_color(Color::Red);
                x = Some(p);
                x_parent = parent(p);
            } else {
                if color_opt(link(w, opp)) == Color::Black {
                    if let Some(c) = link(w, dir) {
                        c.set_color(Color::Black);
                    }
                    w.set_color(Color::Red);
                    self.rotate(w, opp);
                    w = link(p, opp).unwrap();
                }
                w.set_color(p.color());
                p.set_color(Color::Black);
                if let Some(c) = link(w, opp) {
                    c.set_color(Color::Black);
                }
                self.rotate(p, dir);
                x = self.root;
                x_parent = None;
            }
        }
        if let Some(xn) = x {
            xn.set_color(Color::Black);
        }
    }
}

impl FreeTree for VariantB {
    const HAS_PARENT_POINTERS: bool = true;
    const HAS_DUPLICATE_LISTS: bool = false;
    const STRICT_ORDERING: bool = false;

    fn total(&self) -> usize {
        self.total
    }

    fn insert(&mut self, z: BlockPtr) {
        set_link(z, L, None);
        set_link(z, R, None);

        let mut y = None;
        let mut x = self.root;
        let mut dir = L;
        while let Some(xn) = x {
            y = Some(xn);
            dir = if z.size() < xn.size() { L } else { R };
            x = link(xn, dir);
        }
        set_parent(z, y);
        match y {
            None => self.root = Some(z),
            Some(yn) => set_link(yn, dir, Some(z)),
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

        if link(z, L).is_none() {
            x = link(z, R);
            x_parent = parent(z);
            self.transplant(z, link(z, R));
        } else if link(z, R).is_none() {
            x = link(z, L);
            x_parent = parent(z);
            self.transplant(z, link(z, L));
        } else {
            y = self.minimum(link(z, R).unwrap());
            y_original_color = y.color();
            x = link(y, R);
            if parent(y) == Some(z) {
                x_parent = Some(y);
            } else {
                x_parent = parent(y);
                self.transplant(y, link(y, R));
                set_link(y, R, link(z, R));
                set_parent(link(y, R).unwrap(), Some(y));
            }
            self.transplant(z, Some(y));
            set_link(y, L, link(z, L));
            set_parent(link(y, L).unwrap(), Some(y));
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
                x = link(xn, L);
            } else {
                x = link(xn, R);
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
        link(node, L)
    }

    fn right(&self, node: BlockPtr) -> Option<BlockPtr> {
        link(node, R)
    }

    fn color(&self, node: BlockPtr) -> Color {
        node.color()
    }

    fn parent(&self, node: BlockPtr) -> Option<BlockPtr> {
        parent(node)
    }

    fn for_each_duplicate(&self, _node: BlockPtr, _f: &mut dyn FnMut(BlockPtr)) {}
}
