/*!

The key index: a linear scan over live descriptors, short-circuited by a
single-slot "last found" cache in the header. Per `spec.md` §4.4, the cache
is invalidated by any delete, any collector phase that moves descriptors,
`Clear`, `Empty`, and create-via-recycle — those call sites are responsible
for clearing `header.last_found`, not this module.

*/

use crate::store::descriptor::RawDescriptor;
use crate::store::header::{RawHeader, NIL};
use crate::store::stack;

/// Reads a descriptor's key bytes (without the null terminator) out of its
/// hunk. Takes the descriptor by value (they're `Copy`) rather than an index,
/// so callers that already hold a snapshot (the collector, `SortByKey`)
/// don't need a live `&RawHeader` just to look a key up.
pub(crate) fn key_bytes<'a>(body: &'a [u8], descriptor: &RawDescriptor) -> &'a [u8] {
    let start = descriptor.key_ptr as usize;
    let hunk_end = descriptor.heap_top as usize + descriptor.heap_size as usize;
    let nul = body[start..hunk_end]
        .iter()
        .position(|&b| b == 0)
        .expect("descriptor hunk is not null-terminated");
    &body[start..start + nul]
}

/// Finds the live descriptor whose key compares byte-exactly equal to
/// `key`. Checks `header.last_found` first; on a hit, leaves it untouched.
/// On a scan hit, updates `header.last_found` to the match. On a miss,
/// leaves the cache as-is (a miss is not itself an invalidation event).
pub fn find(body: &[u8], header: &mut RawHeader, key: &[u8]) -> Option<u32> {
    if header.last_found != NIL {
        let cached = header.last_found;
        let descriptor = stack::get(body, header, cached);
        if !descriptor.is_garbage() && key_bytes(body, descriptor) == key {
            return Some(cached);
        }
    }

    for index in stack::iter_bottom_up(header) {
        let descriptor = stack::get(body, header, index);
        if descriptor.is_garbage() {
            continue;
        }
        if key_bytes(body, descriptor) == key {
            header.last_found = index;
            return Some(index);
        }
    }

    None
}

/// Read-only variant of [`find`] that does not update the cache. Used by
/// collector phases that must not observe (or mutate) `last_found` while
/// they are themselves about to invalidate it wholesale.
pub fn find_readonly(body: &[u8], header: &RawHeader, key: &[u8]) -> Option<u32> {
    if header.last_found != NIL {
        let cached = header.last_found;
        let descriptor = stack::get(body, header, cached);
        if !descriptor.is_garbage() && key_bytes(body, descriptor) == key {
            return Some(cached);
        }
    }

    stack::iter_bottom_up(header).find(|&index| {
        let descriptor = stack::get(body, header, index);
        !descriptor.is_garbage() && key_bytes(body, descriptor) == key
    })
}
