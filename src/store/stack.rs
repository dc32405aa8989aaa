/*!

The descriptor stack: a contiguous array of fixed-size descriptors growing
upward from the start of the arena's *body* (the byte range following the
header). A bump allocator, same shape as the teacher's arena-of-`DagNode`s,
except indexed by `u32` offsets into the caller's buffer instead of raw
pointers.

All offsets in this module are relative to the body, i.e. offset `0` is the
first byte after the header, not the first byte of the caller's buffer. This
keeps descriptor-stack arithmetic and heap arithmetic (`heap.rs`) working
over the same shared slice without ever needing to borrow the header and the
body simultaneously from the same underlying allocation.

*/

use crate::store::descriptor::{RawDescriptor, DESCRIPTOR_SIZE};
use crate::store::header::RawHeader;

/// Body-relative byte offset of descriptor `index`.
#[inline]
fn offset_of(index: u32) -> usize {
    index as usize * DESCRIPTOR_SIZE
}

/// Borrows descriptor `index` out of the body. Panics if
/// `index >= stack_count`; callers are expected to only ever index
/// descriptors they know are live or are on a list they control.
pub fn get<'a>(body: &'a [u8], header: &RawHeader, index: u32) -> &'a RawDescriptor {
    debug_assert!(index < header.stack_count, "descriptor index out of range");
    let offset = offset_of(index);
    bytemuck::from_bytes(&body[offset..offset + DESCRIPTOR_SIZE])
}

/// Mutably borrows descriptor `index` out of the body.
pub fn get_mut<'a>(body: &'a mut [u8], header: &RawHeader, index: u32) -> &'a mut RawDescriptor {
    debug_assert!(index < header.stack_count, "descriptor index out of range");
    let offset = offset_of(index);
    bytemuck::from_bytes_mut(&mut body[offset..offset + DESCRIPTOR_SIZE])
}

/// Body-relative offset one past the last pushed descriptor, i.e. where the
/// next `push` would land. This is the "top of descriptor stack address"
/// from invariant 1.
#[inline]
pub fn top_offset(header: &RawHeader) -> usize {
    offset_of(header.stack_count)
}

/// Pushes a new, uninitialized descriptor slot and returns its index. Does
/// not check against the heap boundary; callers must do that first (see
/// invariant 1 — the stack top must not cross `heap_top`).
pub fn push(body: &mut [u8], header: &mut RawHeader, descriptor: RawDescriptor) -> u32 {
    let index = header.stack_count;
    let offset = offset_of(index);
    *bytemuck::from_bytes_mut::<RawDescriptor>(&mut body[offset..offset + DESCRIPTOR_SIZE]) =
        descriptor;
    header.stack_count += 1;
    index
}

/// Pops the top descriptor off the stack. Caller must ensure the stack is
/// non-empty and that the popped slot is no longer referenced from the
/// garbage list.
pub fn pop(header: &mut RawHeader) {
    debug_assert!(header.stack_count > 0, "pop on empty descriptor stack");
    header.stack_count -= 1;
}

/// Removes descriptor `index` by moving the current top descriptor into its
/// slot and shrinking the stack by one, same trick as `Vec::swap_remove`.
/// Fixes up any garbage-list links that pointed at the old top index, and
/// `header.last_found` if it did too. Caller is responsible for having
/// already unlinked/accounted for whatever descriptor *was* at `index`
/// before calling this — this function only ever removes the top slot.
pub fn swap_remove(body: &mut [u8], header: &mut RawHeader, index: u32) {
    use crate::store::header::NIL;

    debug_assert!(index < header.stack_count, "descriptor index out of range");
    let last = header.stack_count - 1;

    if index != last {
        let moved = *get(body, header, last);
        *get_mut(body, header, index) = moved;

        if moved.is_garbage() {
            match moved.prev_garbage {
                NIL => header.garbage_front = index,
                prev => get_mut(body, header, prev).next_garbage = index,
            }
            match moved.next_garbage {
                NIL => header.garbage_back = index,
                next => get_mut(body, header, next).prev_garbage = index,
            }
        }
        if header.last_found == last {
            header.last_found = index;
        }
    } else if header.last_found == last {
        header.last_found = NIL;
    }

    header.stack_count -= 1;
}

/// Iterates descriptor indices newest-first (top of stack down to the base).
pub fn iter_top_down(header: &RawHeader) -> impl Iterator<Item = u32> {
    (0..header.stack_count).rev()
}

/// Iterates descriptor indices oldest-first (base of stack up to the top).
pub fn iter_bottom_up(header: &RawHeader) -> impl Iterator<Item = u32> {
    0..header.stack_count
}
