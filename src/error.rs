//! Diagnostic-only error taxonomy.
//!
//! The public allocator surface never returns `Result` — `malloc`/`realloc`
//! report failure as `null`, `free` is infallible, per spec. `Violation` is
//! strictly for `validate_heap`'s structural audit, so a failing test or a
//! `log::error!` call site can name precisely which invariant broke instead
//! of collapsing everything into a bare `false`.

use core::fmt;

/// One entry per invariant named in the spec's "Testable properties"
/// section (I1-I9 from the data model, P1-P7 from the test surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// I1/P1: segment bytes don't sum to `heap_size - WORD_SIZE`.
    SegmentConservation,
    /// I2/P2: a block's size disagrees with its right neighbor's
    /// left-allocated bit.
    NeighborAgreement,
    /// I3: a free block's footer doesn't match its header.
    FooterMismatch,
    /// I4: the first block's left-allocated bit isn't set, or something
    /// starts before `client_start`.
    FirstBlockMisflagged,
    /// I5: the trailing sentinel word isn't `size=0, allocated=1`.
    SentinelCorrupt,
    /// I6/P3: tree node/list count disagrees with a linear walk.
    FreeTallyMismatch,
    /// I7: free bytes recovered from the tree disagree with a segment walk.
    FreeByteMismatch,
    /// I8/P4: red-black coloring or black-height is broken.
    RedBlackBalance,
    /// I9/P5: a subtree holds a size on the wrong side of its parent.
    OrderingViolation,
    /// P6: a child's parent pointer doesn't point back to its parent.
    ParentBackPointer,
    /// P7: duplicate-list parent-cache hygiene broken (C/D).
    DuplicateListHygiene,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Violation::SegmentConservation => "segment byte conservation failed (I1/P1)",
            Violation::NeighborAgreement => "left-allocated bit disagrees with neighbor (I2/P2)",
            Violation::FooterMismatch => "free block footer doesn't match header (I3)",
            Violation::FirstBlockMisflagged => "first block left-allocated bit unset (I4)",
            Violation::SentinelCorrupt => "trailing sentinel corrupt (I5)",
            Violation::FreeTallyMismatch => "free tree tally disagrees with linear walk (I6/P3)",
            Violation::FreeByteMismatch => "free byte accounting disagrees with walk (I7)",
            Violation::RedBlackBalance => "red-black balance violated (I8/P4)",
            Violation::OrderingViolation => "binary-search ordering violated (I9/P5)",
            Violation::ParentBackPointer => "parent back-pointer broken (P6)",
            Violation::DuplicateListHygiene => "duplicate-list parent-cache hygiene broken (P7)",
        };
        f.write_str(msg)
    }
}
