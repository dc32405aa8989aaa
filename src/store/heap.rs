/*!

The value heap: a downward bump allocator living at the high end of the
arena body. `push` hands out hunks by decrementing `heap_top`; `pop` is its
inverse, used only by `Pop` in the collector when the newest descriptor's
hunk abuts the current top.

Offsets here are body-relative, same convention as `stack.rs`: `heap_top`
counts down from `body_len` (the usable arena size minus the header) toward
the top of the descriptor stack.

*/

use crate::store::header::RawHeader;

/// Rounds `needed` up to the next multiple of `hunk_size`, with a floor of
/// one hunk. This is the `ceil` policy the spec's later revision settles on
/// (see `SPEC_FULL.md` §2-4): a value that is an exact multiple of
/// `hunk_size` does *not* get bumped up an extra hunk.
pub fn hunk_size_for(needed: usize, hunk_size: u32) -> u32 {
    let hunk_size = hunk_size.max(1) as usize;
    let hunks = needed.div_ceil(hunk_size).max(1);
    (hunks * hunk_size) as u32
}

/// Reserves `n` bytes at the top of the heap, returning the new `heap_top`
/// (the start offset of the freshly reserved hunk). Does not check that the
/// reservation stays clear of the descriptor stack; callers must do that
/// first (see invariant 1).
pub fn push(header: &mut RawHeader, n: u32) -> u32 {
    header.heap_top -= n;
    header.heap_size += n;
    header.heap_top
}

/// Releases `n` bytes back from the top of the heap (the inverse of
/// `push`). Caller must ensure the released hunk really was the most
/// recently pushed one.
pub fn pop(header: &mut RawHeader, n: u32) {
    header.heap_top += n;
    header.heap_size -= n;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hunk_rounds_up_to_a_whole_hunk() {
        assert_eq!(hunk_size_for(1, 4), 4);
        assert_eq!(hunk_size_for(4, 4), 4);
        assert_eq!(hunk_size_for(5, 4), 8);
        assert_eq!(hunk_size_for(0, 4), 4);
    }

    #[test]
    fn hunk_size_one_is_identity() {
        assert_eq!(hunk_size_for(7, 1), 7);
    }

    #[test]
    fn push_then_pop_restores_heap_top() {
        let mut header = bytemuck::Zeroable::zeroed();
        let header: &mut RawHeader = &mut header;
        header.heap_top = 100;

        let top = push(header, 8);
        assert_eq!(top, 92);
        assert_eq!(header.heap_size, 8);

        pop(header, 8);
        assert_eq!(header.heap_top, 100);
        assert_eq!(header.heap_size, 0);
    }
}
