/*!

The in-place collector: six primitives of increasing cost and increasing
willingness to disturb the arena, from cheapest (`Pop`, touches only the very
top of stack and heap) to most thorough (`Clean`, drives `GarbageSize` to
zero). None of them ever touch live data's *bytes* — only where a live
descriptor's hunk lives, and a live descriptor's own stack slot, can move.
Since nothing external ever holds a descriptor index (callers only ever see
borrowed key/value byte slices through [`crate::store::iter::Entry`]), moving
descriptors around is invisible to a caller as long as Rust's borrow checker
has already ruled out holding an `Entry` across the `&mut self` call — which
it has, see `iter.rs`.

*/

use crate::store::arena::Arena;
use crate::store::descriptor::RawDescriptor;
use crate::store::garbage;
use crate::store::header::NIL;
use crate::store::heap;
use crate::store::stack;

impl<'a> Arena<'a> {
    /// Reclaims garbage descriptors from the top of the stack, as long as
    /// each one's hunk abuts the current heap boundary (i.e. it really is
    /// the most recently allocated hunk) and reclaiming it would not push
    /// the cumulative bytes reclaimed past `limit`. Pointer-preserving: it
    /// never moves a live descriptor or a live byte, and never invalidates
    /// the key-index cache.
    ///
    /// Returns the number of heap bytes reclaimed.
    pub fn pop(&mut self, limit: usize) -> usize {
        let (header, body) = self.split_mut();
        let mut reclaimed = 0usize;

        loop {
            if header.stack_count == 0 {
                break;
            }
            let top = header.stack_count - 1;
            let descriptor = *stack::get(body, header, top);
            if !descriptor.is_garbage() || descriptor.heap_top != header.heap_top {
                break;
            }
            let size = descriptor.heap_size as usize;
            if reclaimed + size > limit {
                break;
            }

            garbage::unlink(body, header, top);
            heap::pop(header, descriptor.heap_size);
            stack::pop(header);
            reclaimed += size;
        }

        log::debug!("pop reclaimed {} bytes", reclaimed);
        reclaimed
    }

    /// Walks the descriptor stack once, coalescing adjacent garbage pairs
    /// whose hunks are contiguous on the heap into a single, larger garbage
    /// hunk, and dropping the absorbed descriptor's stack slot entirely.
    /// Most effective right after [`Arena::sort_by_heap`], which brings
    /// heap-adjacent descriptors next to each other in the stack. Leaves
    /// live descriptors and their key pointers untouched; invalidates the
    /// key-index cache (a descriptor may have moved via swap-remove).
    ///
    /// Returns the total size of every pair coalesced this pass.
    pub fn merge(&mut self) -> usize {
        let (header, body) = self.split_mut();
        let mut merged = 0usize;
        let mut i = 0u32;

        while i + 1 < header.stack_count {
            let a = *stack::get(body, header, i);
            let b = *stack::get(body, header, i + 1);

            if a.is_garbage() && b.is_garbage() && contiguous(&a, &b) {
                let (survivor_index, absorbed_index, survivor, absorbed) = if a.heap_size >= b.heap_size
                {
                    (i, i + 1, a, b)
                } else {
                    (i + 1, i, b, a)
                };

                let new_top = survivor.heap_top.min(absorbed.heap_top);
                let new_size = survivor.heap_size + absorbed.heap_size;

                garbage::unlink(body, header, absorbed_index);
                garbage::unlink(body, header, survivor_index);
                {
                    let d = stack::get_mut(body, header, survivor_index);
                    d.heap_top = new_top;
                    d.heap_size = new_size;
                }
                garbage::push_back(body, header, survivor_index);
                stack::swap_remove(body, header, absorbed_index);

                merged += new_size as usize;
            }

            i += 1;
        }

        if merged > 0 {
            header.last_found = NIL;
        }
        log::debug!("merge consolidated {} bytes", merged);
        merged
    }

    /// Walks the stack from both ends. For each garbage descriptor found
    /// scanning bottom-up, looks (top-down) for a live descriptor with the
    /// exact same hunk size; if one is found and folding it would not push
    /// cumulative bytes moved past `limit`, copies the live descriptor's
    /// hunk contents into the garbage hole and swaps which of the two is
    /// live. Invalidates the key-index cache and every iterator (the live
    /// descriptor that moved now lives at a different hunk address).
    ///
    /// Returns the total bytes folded.
    pub fn fold(&mut self, limit: usize) -> usize {
        let (header, body) = self.split_mut();
        let mut folded = 0usize;

        let mut lo: i64 = 0;
        let mut hi: i64 = header.stack_count as i64 - 1;

        while lo < hi {
            let g = *stack::get(body, header, lo as u32);
            if !g.is_garbage() {
                lo += 1;
                continue;
            }

            let t = *stack::get(body, header, hi as u32);
            if t.is_garbage() || t.heap_size != g.heap_size {
                hi -= 1;
                continue;
            }

            let bytes = t.heap_size as usize;
            if folded + bytes > limit {
                break;
            }

            let value_offset = t.value_ptr - t.heap_top;
            let key_offset = t.key_ptr - t.heap_top;
            let value_size = t.value_size;

            body.copy_within(
                t.heap_top as usize..(t.heap_top + t.heap_size) as usize,
                g.heap_top as usize,
            );

            garbage::unlink(body, header, lo as u32);
            {
                let gd = stack::get_mut(body, header, lo as u32);
                gd.value_ptr = g.heap_top + value_offset;
                gd.key_ptr = g.heap_top + key_offset;
                gd.value_size = value_size;
            }
            {
                let td = stack::get_mut(body, header, hi as u32);
                td.value_ptr = 0;
                td.key_ptr = 0;
                td.value_size = 0;
            }
            garbage::push_back(body, header, hi as u32);

            folded += bytes;
            lo += 1;
            hi -= 1;
        }

        if folded > 0 {
            header.last_found = NIL;
        }
        log::debug!("fold moved {} bytes", folded);
        folded
    }

    /// Walks adjacent descriptor pairs, newest-to-oldest. Whenever the
    /// "upper" descriptor in a pair (the later one in the stack, which in
    /// natural allocation order sits closer to the heap boundary) is
    /// garbage and the "lower" one is live, slides the live entry's whole
    /// hunk into the high end of the combined two-hunk span and leaves the
    /// garbage hole at the low end — closer to where `Pop` can eventually
    /// reach it. Both hunks keep their own `heap_size` (each already a
    /// multiple of `hunk_size`): only their position within the combined
    /// span changes, never their size, so `Pack` can't manufacture a hole
    /// that isn't itself recyclable and never changes `GarbageSize` on its
    /// own — it only relocates which bytes the existing garbage total
    /// covers. This is what actually defragments the heap; `Merge` only
    /// consolidates bookkeeping, it never moves bytes.
    ///
    /// Only fires when the pair's hunks are heap-contiguous, same
    /// precondition `Merge` has — most effective after `SortByHeap`.
    /// Invalidates the key-index cache.
    ///
    /// Returns the total live bytes relocated.
    pub fn pack(&mut self, limit: usize) -> usize {
        let (header, body) = self.split_mut();
        let mut packed = 0usize;

        let mut upper = header.stack_count as i64 - 1;
        while upper >= 1 {
            let upper_index = upper as u32;
            let lower_index = (upper - 1) as u32;
            let dest = *stack::get(body, header, upper_index);
            let src = *stack::get(body, header, lower_index);

            if dest.is_garbage() && !src.is_garbage() && contiguous(&dest, &src) {
                let bytes = src.heap_size as usize;

                if packed + bytes <= limit {
                    let combined_low = dest.heap_top.min(src.heap_top);
                    let combined_high =
                        (dest.heap_top + dest.heap_size).max(src.heap_top + src.heap_size);
                    let new_live_top = combined_high - src.heap_size;
                    let value_offset = src.value_ptr - src.heap_top;
                    let key_offset = src.key_ptr - src.heap_top;

                    body.copy_within(
                        src.heap_top as usize..(src.heap_top + src.heap_size) as usize,
                        new_live_top as usize,
                    );

                    garbage::unlink(body, header, upper_index);
                    {
                        let d = stack::get_mut(body, header, upper_index);
                        d.heap_top = new_live_top;
                        d.heap_size = src.heap_size;
                        d.value_ptr = new_live_top + value_offset;
                        d.key_ptr = new_live_top + key_offset;
                        d.value_size = src.value_size;
                    }
                    {
                        let s = stack::get_mut(body, header, lower_index);
                        s.heap_top = combined_low;
                        s.heap_size = dest.heap_size;
                        s.value_ptr = 0;
                        s.key_ptr = 0;
                        s.value_size = 0;
                    }
                    garbage::push_back(body, header, lower_index);

                    packed += bytes;
                }
            }

            upper -= 1;
        }

        if packed > 0 {
            header.last_found = NIL;
        }
        log::debug!("pack relocated {} bytes", packed);
        packed
    }

    /// Runs the collector cheapest-first: `Pop` first, then — as long as
    /// garbage remains and `limit` hasn't been met — alternates a `Fold` or
    /// `Pack` pass (whichever still makes headway) with another `Pop`,
    /// since relocating a hunk is what can bring a garbage descriptor up
    /// against the heap boundary where `Pop` can actually remove it. Stops
    /// when `limit` is met, `GarbageSize` reaches zero, or a full
    /// `Fold`+`Pack` pass relocates nothing (no further progress is
    /// possible). Bounded to at most `GarbageCount` extra rounds, which a
    /// relocating pass can never exceed before running out of garbage
    /// descriptors to place.
    ///
    /// Only `Pop` actually reduces `GarbageSize`; `Fold` and `Pack` move
    /// bytes without touching it (see their own docs), so their relocated-
    /// byte counts are never folded into the returned total or charged
    /// against `limit` — only what `Pop` itself reclaims is.
    pub fn collect(&mut self, limit: usize) -> usize {
        let mut total = self.pop(limit);
        let mut rounds_left = self.garbage_count();

        while total < limit && self.garbage_size() > 0 && rounds_left > 0 {
            let remaining = limit - total;
            let mut progressed = self.fold(remaining) > 0;
            if !progressed {
                progressed = self.pack(remaining) > 0;
            }
            if !progressed {
                break;
            }
            total += self.pop(limit - total);
            rounds_left -= 1;
        }

        total
    }

    /// `Collect` with the limit set to the current `GarbageSize`: loops
    /// `Pop`/`Fold`/`Pack` until every garbage byte has actually been
    /// reclaimed, not just relocated. Postcondition: `GarbageSize == 0`.
    pub fn clean(&mut self) -> usize {
        let target = self.garbage_size();
        self.collect(target)
    }
}

/// `true` iff the two hunks are adjacent on the heap, in either order.
fn contiguous(a: &RawDescriptor, b: &RawDescriptor) -> bool {
    a.heap_top + a.heap_size == b.heap_top || b.heap_top + b.heap_size == a.heap_top
}
