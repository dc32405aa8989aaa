/*!

The garbage list: an intrusive doubly-linked list threading together every
descriptor currently marked `Garbage`, so `Create`'s recycle path and the
collector don't have to scan the whole descriptor stack. `garbage_front`/
`garbage_back` live in the header; `prev_garbage`/`next_garbage` live in each
descriptor. Per the Design Notes, this is an optimization: every operation
here keeps `spec.md` invariant 6 (every garbage descriptor reachable from the
list exactly once, no live descriptor on the list) true by construction.

*/

use crate::store::descriptor::RawDescriptor;
use crate::store::header::{RawHeader, NIL};
use crate::store::stack;

/// Appends descriptor `index` to the back of the garbage list and marks it
/// garbage. Updates the running `garbage_count`/`garbage_size` totals.
pub fn push_back(body: &mut [u8], header: &mut RawHeader, index: u32) {
    let heap_size = stack::get(body, header, index).heap_size;

    {
        let descriptor = stack::get_mut(body, header, index);
        descriptor.set_garbage(true);
        descriptor.prev_garbage = header.garbage_back;
        descriptor.next_garbage = NIL;
    }

    if header.garbage_back != NIL {
        stack::get_mut(body, header, header.garbage_back).next_garbage = index;
    } else {
        header.garbage_front = index;
    }
    header.garbage_back = index;

    header.garbage_count += 1;
    header.garbage_size += heap_size;
}

/// Removes descriptor `index` from the garbage list and clears its garbage
/// flag. Does not touch the stack or heap; caller decides what happens to
/// the slot next (recycle, fold, pack, or pop).
pub fn unlink(body: &mut [u8], header: &mut RawHeader, index: u32) {
    let (prev, next, heap_size) = {
        let descriptor = stack::get(body, header, index);
        debug_assert!(descriptor.is_garbage(), "unlink of a non-garbage descriptor");
        (descriptor.prev_garbage, descriptor.next_garbage, descriptor.heap_size)
    };

    match prev {
        NIL => header.garbage_front = next,
        prev => stack::get_mut(body, header, prev).next_garbage = next,
    }
    match next {
        NIL => header.garbage_back = prev,
        next => stack::get_mut(body, header, next).prev_garbage = prev,
    }

    let descriptor = stack::get_mut(body, header, index);
    descriptor.set_garbage(false);
    descriptor.prev_garbage = NIL;
    descriptor.next_garbage = NIL;

    header.garbage_count -= 1;
    header.garbage_size -= heap_size;
}

/// Iterates garbage-list descriptor indices front (oldest delete) to back
/// (newest delete). Collects into a `Vec` up front so callers can freely
/// mutate the list (unlink, relink) while iterating without fighting the
/// borrow checker over `body`.
pub fn indices(body: &[u8], header: &RawHeader) -> Vec<u32> {
    let mut out = Vec::with_capacity(header.garbage_count as usize);
    let mut cursor = header.garbage_front;
    while cursor != NIL {
        out.push(cursor);
        cursor = stack::get(body, header, cursor).next_garbage;
    }
    out
}

/// Finds the first garbage descriptor (front to back, i.e. oldest-deleted
/// first) whose hunk is exactly `heap_size` bytes, per the spec's
/// exact-match recycle policy.
pub fn find_exact_fit(body: &[u8], header: &RawHeader, heap_size: u32) -> Option<u32> {
    let mut cursor = header.garbage_front;
    while cursor != NIL {
        let descriptor: &RawDescriptor = stack::get(body, header, cursor);
        if descriptor.heap_size == heap_size {
            return Some(cursor);
        }
        cursor = descriptor.next_garbage;
    }
    None
}
