//! Compile time constants for the segment layout.
//!
//! Plain `pub const`s, the way `kernel/src/consts.rs` lays out `PAGE_SIZE`
//! and friends: no config file, no environment variables, nothing the core
//! allocator needs to read at runtime.

use core::mem::size_of;

/// Size in bytes of a machine word. Every block size is a multiple of this.
pub const WORD_SIZE: usize = size_of::<u64>();

/// Client pointers are always aligned to this many bytes.
pub const ALIGN: usize = 8;

/// Smallest total footprint (header + payload) a block can have.
///
/// Large enough to hold the biggest free-block record: a header word plus
/// three payload words (the widest of the tree variants needs `links[2]` and
/// `list_head`, or `parent`, `left`, `right`) plus a footer word while free.
pub const MIN_BLOCK_SIZE: usize = 40;

/// Largest single request `malloc`/`realloc` will honor.
pub const MAX_REQUEST_SIZE: usize = 1 << 30;

/// Upper bound on tree depth, used to size the ancestor-path stack that the
/// parentless tree variants (C/D) build during a mutating call. A red-black
/// tree of up to 2^32 nodes never exceeds this.
pub const MAX_TREE_HEIGHT: usize = 64;

/// Rounds `n` up to a multiple of `m`. This is plain alignment rounding —
/// `heap_align` exposes exactly this, with no `MIN_BLOCK_SIZE` floor; a
/// request for fewer bytes than a free-block record can hold just means
/// the allocated block carries some unsplittable slack (`split_alloc`
/// decides that separately, per block, at placement time).
pub const fn roundup(n: usize, m: usize) -> usize {
    (n + m - 1) & !(m - 1)
}
