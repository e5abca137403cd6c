//! Block layout and tag arithmetic: the header/footer bitfield protocol that
//! makes physical-neighbor navigation and coalescing O(1).
//!
//! Ground rule (carried from the design notes): the header is one plain
//! `u64`, read and written through pure functions. No compiler bitfields,
//! no `#[repr(packed)]` struct whose layout the compiler could reshuffle.

use bitflags::bitflags;

use crate::consts::WORD_SIZE;

bitflags! {
    /// The three low bits of a block header.
    pub struct Flags: u64 {
        const ALLOCATED      = 1 << 0;
        const LEFT_ALLOCATED = 1 << 1;
        const RED            = 1 << 2;
    }
}

const SIZE_SHIFT: u32 = 3;

/// Red-black color of a free block. Black is the default for newly
/// initialized blocks; `insert` paints new nodes red per CLRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Red,
}

impl Color {
    fn flag(self) -> Flags {
        match self {
            Color::Black => Flags::empty(),
            Color::Red => Flags::RED,
        }
    }

    fn from_flags(flags: Flags) -> Self {
        if flags.contains(Flags::RED) {
            Color::Red
        } else {
            Color::Black
        }
    }
}

const fn pack(size: usize, flags_bits: u64) -> u64 {
    ((size as u64) << SIZE_SHIFT) | flags_bits
}

/// A pointer to a block's header, addressed by absolute byte offset into the
/// segment. Free-list bookkeeping (`Option::None` as a stand-in for the nil
/// sentinel, see `tree/mod.rs`) is built on top of this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPtr(usize);

impl BlockPtr {
    /// # Safety
    /// `addr` must be the header address of a block inside a live segment.
    pub unsafe fn from_addr(addr: usize) -> Self {
        debug_assert_ne!(addr, 0, "address 0 is reserved to mean \"no block\"");
        BlockPtr(addr)
    }

    pub fn addr(self) -> usize {
        self.0
    }

    fn header_ptr(self) -> *mut u64 {
        self.0 as *mut u64
    }

    pub fn header(self) -> u64 {
        unsafe { self.header_ptr().read() }
    }

    fn set_header_raw(self, header: u64) {
        unsafe { self.header_ptr().write(header) }
    }

    pub fn size(self) -> usize {
        (self.header() >> SIZE_SHIFT) as usize
    }

    fn flags(self) -> Flags {
        Flags::from_bits_truncate(self.header())
    }

    pub fn is_allocated(self) -> bool {
        self.flags().contains(Flags::ALLOCATED)
    }

    pub fn is_left_allocated(self) -> bool {
        self.flags().contains(Flags::LEFT_ALLOCATED)
    }

    pub fn color(self) -> Color {
        Color::from_flags(self.flags())
    }

    pub fn set_color(self, color: Color) {
        let mut flags = self.flags();
        flags.set(Flags::RED, color == Color::Red);
        self.set_header_raw(pack(self.size(), flags.bits()));
    }

    pub fn set_allocated(self, allocated: bool) {
        let mut flags = self.flags();
        flags.set(Flags::ALLOCATED, allocated);
        self.set_header_raw(pack(self.size(), flags.bits()));
    }

    pub fn set_left_allocated(self, left_allocated: bool) {
        let mut flags = self.flags();
        flags.set(Flags::LEFT_ALLOCATED, left_allocated);
        self.set_header_raw(pack(self.size(), flags.bits()));
    }

    /// Rewrites size while keeping the current flags.
    pub fn set_size(self, size: usize) {
        self.set_header_raw(pack(size, self.flags().bits()));
    }

    /// Address of the first byte the client may write to.
    pub fn client_space(self) -> usize {
        self.0 + WORD_SIZE
    }

    /// # Safety
    /// `client` must be a pointer previously returned by `client_space`.
    pub unsafe fn block_of(client: usize) -> Self {
        BlockPtr(client - WORD_SIZE)
    }

    /// Address of the right physical neighbor's header.
    pub fn right_neighbor_addr(self) -> usize {
        self.0 + WORD_SIZE + self.size()
    }

    pub fn right_neighbor(self) -> Self {
        BlockPtr(self.right_neighbor_addr())
    }

    /// Address of this block's footer (only meaningful while free).
    pub fn footer_addr(self) -> usize {
        self.0 + self.size()
    }

    fn footer_ptr(self) -> *mut u64 {
        self.footer_addr() as *mut u64
    }

    /// Writes a copy of the header into the footer slot. Only valid while
    /// the block is free; the slot is payload once allocated.
    pub fn write_footer(self) {
        unsafe { self.footer_ptr().write(self.header()) }
    }

    /// Reads the physical left neighbor via the boundary tag in the word
    /// immediately preceding this block.
    ///
    /// # Safety
    /// Caller must have checked `!self.is_left_allocated()` first.
    pub unsafe fn left_neighbor(self) -> Self {
        debug_assert!(!self.is_left_allocated());
        let left_footer = ((self.0 - WORD_SIZE) as *const u64).read();
        let left_size = (left_footer >> SIZE_SHIFT) as usize;
        BlockPtr(self.0 - WORD_SIZE - left_size)
    }

    /// Initializes the header of a free block: sets size, clears allocated
    /// and red, preserves `left_allocated` as given, and writes the footer.
    pub fn init_free_node(self, payload: usize, left_allocated: bool) {
        let mut flags = Flags::empty();
        flags.set(Flags::LEFT_ALLOCATED, left_allocated);
        self.set_header_raw(pack(payload, flags.bits()));
        self.write_footer();
    }

    // --- free-record field access -----------------------------------
    //
    // While free, the words starting at `client_space()` hold tree
    // bookkeeping (parent/children, or links + duplicate-list head,
    // depending on variant). Index 0 is the first word after the header.

    fn field_ptr(self, index: usize) -> *mut usize {
        (self.client_space() + index * WORD_SIZE) as *mut usize
    }

    pub fn read_field(self, index: usize) -> usize {
        unsafe { self.field_ptr(index).read() }
    }

    pub fn write_field(self, index: usize, value: usize) {
        unsafe { self.field_ptr(index).write(value) }
    }

    pub fn read_opt(self, index: usize) -> Option<BlockPtr> {
        match self.read_field(index) {
            0 => None,
            addr => Some(BlockPtr(addr)),
        }
    }

    pub fn write_opt(self, index: usize, value: Option<BlockPtr>) {
        self.write_field(index, value.map_or(0, |b| b.0));
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
    fn header_roundtrips_size_and_flags() {
        let buf = Buf::new(128);
        let b = buf.block(0);
        b.init_free_node(64, true);
        assert_eq!(b.size(), 64);
        assert!(!b.is_allocated());
        assert!(b.is_left_allocated());
        assert_eq!(b.color(), Color::Black);

        b.set_allocated(true);
        b.set_color(Color::Red);
        assert!(b.is_allocated());
        assert_eq!(b.color(), Color::Red);
        assert_eq!(b.size(), 64);
    }

    #[test]
    fn neighbors_navigate_both_directions() {
        let buf = Buf::new(128);
        let left = buf.block(0);
        left.init_free_node(32, true);

        let right = left.right_neighbor();
        right.init_free_node(40, false);

        assert_eq!(right.addr(), left.addr() + WORD_SIZE + 32);
        let back = unsafe { right.left_neighbor() };
        assert_eq!(back, left);
    }

    #[test]
    fn free_record_fields_roundtrip() {
        let buf = Buf::new(128);
        let b = buf.block(0);
        b.init_free_node(32, true);
        b.write_opt(0, None);
        b.write_opt(1, Some(buf.block(64)));
        assert_eq!(b.read_opt(0), None);
        assert_eq!(b.read_opt(1), Some(buf.block(64)));
    }
}
