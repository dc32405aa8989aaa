/*!

[`Arena`] ties the descriptor stack, value heap, garbage list and key index
together into the CRUD surface a caller actually uses. It owns nothing — the
caller supplies the backing buffer and keeps it alive for as long as the
`Arena` (or anything borrowed from it) is in scope, same contract the
teacher's `Allocator` places on the `GLOBAL_NODE_ALLOCATOR` arena, minus the
global: there is no singleton here, the caller's buffer is the only state.

*/

use bytemuck::Zeroable;

use crate::error::{Error, Result};
use crate::store::descriptor::{RawDescriptor, DESCRIPTOR_SIZE};
use crate::store::garbage;
use crate::store::header::{self, RawHeader, HEADER_SIZE, NIL};
use crate::store::heap;
use crate::store::index;
use crate::store::iter::Iter;
use crate::store::stack;

/// Largest buffer an arena can manage — every offset in the header and every
/// descriptor field is a `u32`.
pub const MAX_SIZE: usize = u32::MAX as usize;

/// A key/value arena living entirely inside a caller-supplied buffer.
///
/// `Arena` borrows the buffer for its whole lifetime; there is no detach,
/// no resize, no background thread touching it. One arena, one writer, at a
/// time — concurrent access from multiple threads is the caller's problem,
/// same as it would be for a `&mut [u8]` anywhere else.
pub struct Arena<'a> {
    buffer: &'a mut [u8],
}

impl<'a> Arena<'a> {
    /// Lays a fresh, empty arena out over `buffer`. `hunk_size` is the
    /// minimum value-side allocation granularity (every hunk is a multiple
    /// of it); `max_key_length` bounds how long a key byte string `Create`
    /// will accept.
    ///
    /// Fails if `buffer` is too small to hold even the header, if
    /// `hunk_size` is zero, or if `buffer` exceeds [`MAX_SIZE`].
    pub fn initialize(buffer: &'a mut [u8], hunk_size: u32, max_key_length: u32) -> Result<Self> {
        if buffer.len() < HEADER_SIZE || hunk_size == 0 {
            return Err(Error::BadBuffer {
                needed: HEADER_SIZE.max(1),
            });
        }
        if buffer.len() > MAX_SIZE {
            return Err(Error::BadBuffer { needed: MAX_SIZE });
        }

        let size = buffer.len() as u32;
        let body_len = (buffer.len() - HEADER_SIZE) as u32;
        buffer.fill(0);

        let header = header::read_mut(buffer);
        *header = RawHeader::zeroed();
        header.size = size;
        header.hunk_size = hunk_size;
        header.max_key_length = max_key_length;
        header.stack_start = HEADER_SIZE as u32;
        header.heap_top = body_len;
        header.garbage_front = NIL;
        header.garbage_back = NIL;
        header.last_found = NIL;

        log::debug!(
            "arena initialized: size={} hunk_size={} max_key_length={}",
            size,
            hunk_size,
            max_key_length
        );

        Ok(Arena { buffer })
    }

    #[inline]
    fn header(&self) -> &RawHeader {
        header::read(self.buffer)
    }

    #[inline]
    fn header_mut(&mut self) -> &mut RawHeader {
        header::read_mut(self.buffer)
    }

    /// Splits the buffer into its header and body halves, both mutable.
    /// Every mutating operation below needs this, since the header and the
    /// descriptor stack/heap it describes live in the same allocation.
    #[inline]
    fn split(&mut self) -> (&mut RawHeader, &mut [u8]) {
        let (head, body) = self.buffer.split_at_mut(HEADER_SIZE);
        (header::read_mut(head), body)
    }

    #[inline]
    fn split_ref(&self) -> (&RawHeader, &[u8]) {
        let (head, body) = self.buffer.split_at(HEADER_SIZE);
        (header::read(head), body)
    }

    /// Resets the arena to a pristine, empty state: stack, heap and garbage
    /// list all cleared, as if freshly `Initialize`d. Unlike [`Arena::empty`],
    /// this discards all internal bookkeeping, not just live entries.
    pub fn clear(&mut self) {
        let header = self.header();
        let (size, hunk_size, max_key_length) =
            (header.size, header.hunk_size, header.max_key_length);
        let body_len = size - HEADER_SIZE as u32;

        self.buffer.fill(0);
        let header = self.header_mut();
        header.size = size;
        header.hunk_size = hunk_size;
        header.max_key_length = max_key_length;
        header.stack_start = HEADER_SIZE as u32;
        header.heap_top = body_len;
        header.garbage_front = NIL;
        header.garbage_back = NIL;
        header.last_found = NIL;

        log::debug!("arena cleared");
    }

    /// Marks every live descriptor as garbage, so `Count` drops to zero and
    /// no key is findable, but keeps the descriptor stack, heap layout and
    /// garbage list intact — unlike [`Arena::clear`], which discards all of
    /// it. The collector can still reclaim this space afterwards via `Pop`,
    /// `Fold`, `Pack` or `Collect`, same as after an equivalent sequence of
    /// `Delete` calls.
    pub fn empty(&mut self) {
        let (header, body) = self.split();
        let live: Vec<u32> = stack::iter_bottom_up(header)
            .filter(|&i| !stack::get(body, header, i).is_garbage())
            .collect();
        for index in live {
            garbage::push_back(body, header, index);
        }
        header.last_found = NIL;
        log::debug!("arena emptied ({} descriptors marked garbage)", header.garbage_count);
    }

    /// Total arena size in bytes, as given to `Initialize`.
    pub fn size(&self) -> usize {
        self.header().size as usize
    }

    /// Size in bytes of the fixed header block at the front of the buffer —
    /// equivalently, the byte offset at which the descriptor stack begins.
    /// Constant across the arena's lifetime; does not depend on `size` or
    /// `hunk_size`.
    pub fn head_size(&self) -> usize {
        HEADER_SIZE
    }

    /// Bytes currently committed: header, the whole descriptor stack, and
    /// every allocated hunk (live and garbage alike — garbage hunks are
    /// still "used" until a collector phase reclaims them).
    pub fn size_used(&self) -> usize {
        let header = self.header();
        HEADER_SIZE + header.stack_count as usize * DESCRIPTOR_SIZE + header.heap_size as usize
    }

    /// Number of live (non-garbage) keyvalue entries.
    pub fn count(&self) -> usize {
        let header = self.header();
        (header.stack_count - header.garbage_count) as usize
    }

    /// `true` iff there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Maximum key length (excluding the null terminator) this arena accepts.
    pub fn max_key_length(&self) -> usize {
        self.header().max_key_length as usize
    }

    /// Rough estimate of how many more entries of a given combined
    /// key+value size could still fit, assuming no further fragmentation.
    /// Ignores existing garbage (a `Collect` first would only improve the
    /// estimate).
    pub fn max_count(&self, kv_size: usize) -> usize {
        let header = self.header();
        let hunk = heap::hunk_size_for(kv_size, header.hunk_size) as usize;
        let per_entry = DESCRIPTOR_SIZE + hunk;
        if per_entry == 0 {
            return 0;
        }
        let available = header.heap_top as usize - stack::top_offset(header);
        available / per_entry
    }

    /// Sum of `heap_size` over every garbage descriptor.
    pub fn garbage_size(&self) -> usize {
        self.header().garbage_size as usize
    }

    /// Number of descriptors currently marked garbage.
    pub fn garbage_count(&self) -> usize {
        self.header().garbage_count as usize
    }

    fn validate_key(&self, key: &[u8]) -> Result<()> {
        let max = self.header().max_key_length as usize;
        if key.is_empty() || key.len() > max {
            return Err(Error::KeyTooLong {
                length: key.len(),
                max,
            });
        }
        Ok(())
    }

    /// Binds `key` to `value`, failing if the key already has a live
    /// descriptor, if `key` is empty or longer than `MaxKeyLength`, or if
    /// there is no room left.
    ///
    /// Prefers recycling an exact-size garbage hunk (the garbage list's
    /// front, i.e. the oldest delete) over growing the heap. A recycle
    /// invalidates the key-index cache; a fresh allocation does not, since
    /// it cannot have displaced whatever `last_found` was pointing at.
    pub fn create(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.validate_key(key)?;

        let (header, body) = self.split();
        if index::find(body, header, key).is_some() {
            return Err(Error::KeyExists);
        }

        let needed = value.len() + key.len() + 1;
        let hunk_required = heap::hunk_size_for(needed, header.hunk_size);

        if let Some(slot) = garbage::find_exact_fit(body, header, hunk_required) {
            garbage::unlink(body, header, slot);
            let heap_top = stack::get(body, header, slot).heap_top;
            write_entry(body, heap_top, key, value);
            let descriptor = stack::get_mut(body, header, slot);
            descriptor.value_ptr = heap_top;
            descriptor.value_size = value.len() as u32;
            descriptor.key_ptr = heap_top + value.len() as u32;
            header.last_found = NIL;
            log::debug!("create: recycled descriptor {} ({} bytes)", slot, value.len());
            return Ok(());
        }

        let prospective_stack_top = stack::top_offset(header) + DESCRIPTOR_SIZE;
        let prospective_heap_top = (header.heap_top as usize).checked_sub(hunk_required as usize);
        match prospective_heap_top {
            Some(new_heap_top) if prospective_stack_top <= new_heap_top => {}
            _ => return Err(Error::ArenaFull),
        }

        let index = stack::push(body, header, RawDescriptor::fresh());
        let heap_top = heap::push(header, hunk_required);
        write_entry(body, heap_top, key, value);
        let descriptor = stack::get_mut(body, header, index);
        descriptor.heap_top = heap_top;
        descriptor.heap_size = hunk_required;
        descriptor.value_ptr = heap_top;
        descriptor.value_size = value.len() as u32;
        descriptor.key_ptr = heap_top + value.len() as u32;

        log::debug!("create: allocated descriptor {} ({} hunk bytes)", index, hunk_required);
        Ok(())
    }

    /// Copies `key`'s value into `out`. Fails with [`Error::BadSize`] if
    /// `out.len()` doesn't match the stored value's size — use
    /// [`Arena::read_size`] to size the buffer first.
    pub fn read(&self, key: &[u8], out: &mut [u8]) -> Result<()> {
        let (header, body) = self.split_ref();
        let index = index::find_readonly(body, header, key).ok_or(Error::KeyNotFound)?;
        let descriptor = stack::get(body, header, index);
        if descriptor.value_size as usize != out.len() {
            return Err(Error::BadSize {
                expected: descriptor.value_size as usize,
                actual: out.len(),
            });
        }
        let start = descriptor.value_ptr as usize;
        out.copy_from_slice(&body[start..start + out.len()]);
        Ok(())
    }

    /// Size in bytes of `key`'s stored value, or `0` if `key` is not found.
    pub fn read_size(&self, key: &[u8]) -> usize {
        let (header, body) = self.split_ref();
        index::find_readonly(body, header, key)
            .map(|index| stack::get(body, header, index).value_size as usize)
            .unwrap_or(0)
    }

    /// Overwrites `key`'s stored value in place. The new value must be
    /// exactly the same size as the old one — `Update` never reallocates
    /// the hunk, so it never invalidates the key index or any iterator.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let (header, body) = self.split();
        let index = index::find(body, header, key).ok_or(Error::KeyNotFound)?;
        let descriptor = stack::get(body, header, index);
        if descriptor.value_size as usize != value.len() {
            return Err(Error::BadSize {
                expected: descriptor.value_size as usize,
                actual: value.len(),
            });
        }
        let start = descriptor.value_ptr as usize;
        body[start..start + value.len()].copy_from_slice(value);
        Ok(())
    }

    /// Removes `key`, if present. Always succeeds — deleting a missing key
    /// is a no-op, not an error. Invalidates the key-index cache.
    pub fn delete(&mut self, key: &[u8]) {
        let (header, body) = self.split();
        if let Some(index) = index::find(body, header, key) {
            garbage::push_back(body, header, index);
            header.last_found = NIL;
            log::debug!("delete: descriptor {} marked garbage", index);
        }
    }

    /// Copies every live entry from `src` into `self` via `Create`. Stops at
    /// the first failure (a duplicate key or lack of room) and returns it;
    /// entries already copied stay copied — this is not transactional.
    pub fn copy_from(&mut self, src: &Arena<'_>) -> Result<()> {
        let (src_header, src_body) = src.split_ref();
        for index in stack::iter_bottom_up(src_header) {
            let descriptor = stack::get(src_body, src_header, index);
            if descriptor.is_garbage() {
                continue;
            }
            let key = index::key_bytes(src_body, descriptor);
            let start = descriptor.value_ptr as usize;
            let value = &src_body[start..start + descriptor.value_size as usize];
            self.create(key, value)?;
        }
        Ok(())
    }

    /// Reorders the descriptor stack by ascending key, lexicographically.
    /// Invalidates the key-index cache (it does not need to invalidate
    /// itself, but rebuilding it lazily on the next `Find` is simpler than
    /// tracking where the cached entry moved to).
    pub fn sort_by_key(&mut self) {
        let (header, body) = self.split();
        reorder(header, body, |body, descriptors, a, b| {
            index::key_bytes(body, &descriptors[a]).cmp(index::key_bytes(body, &descriptors[b]))
        });
    }

    /// Reorders the descriptor stack by ascending heap address. Useful as a
    /// precondition for `Merge`, which only coalesces hunks that are already
    /// adjacent both in the stack and on the heap.
    pub fn sort_by_heap(&mut self) {
        let (header, body) = self.split();
        reorder(header, body, |_, descriptors, a, b| {
            descriptors[a].heap_top.cmp(&descriptors[b].heap_top)
        });
    }

    /// A read-only iterator over every live entry, oldest-created first.
    /// Borrows `self` immutably, so the usual Rust rule applies: no mutating
    /// call (`Create`, `Delete`, `Update`, any collector phase) can happen
    /// while an `Iter` (or an `Entry` it yielded) is still alive.
    pub fn iter(&self) -> Iter<'_> {
        let (header, body) = self.split_ref();
        Iter::new(header, body)
    }

    pub(crate) fn split_mut(&mut self) -> (&mut RawHeader, &mut [u8]) {
        self.split()
    }
}

fn write_entry(body: &mut [u8], heap_top: u32, key: &[u8], value: &[u8]) {
    let start = heap_top as usize;
    body[start..start + value.len()].copy_from_slice(value);
    let key_start = start + value.len();
    body[key_start..key_start + key.len()].copy_from_slice(key);
    body[key_start + key.len()] = 0;
}

/// Shared guts of `SortByKey`/`SortByHeap`: snapshot every descriptor,
/// compute a new order by `compare`, then write the permutation back and fix
/// up every garbage-list link (which is index-based) to match. Always
/// invalidates `last_found` — cheaper than proving it survived the move.
fn reorder<F>(header: &mut RawHeader, body: &mut [u8], compare: F)
where
    F: Fn(&[u8], &[RawDescriptor], usize, usize) -> std::cmp::Ordering,
{
    let count = header.stack_count as usize;
    if count < 2 {
        header.last_found = NIL;
        return;
    }

    let snapshot: Vec<RawDescriptor> =
        (0..count as u32).map(|i| *stack::get(body, header, i)).collect();

    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by(|&a, &b| compare(body, &snapshot, a, b));

    let mut old_to_new = vec![0u32; count];
    for (new_index, &old_index) in order.iter().enumerate() {
        old_to_new[old_index] = new_index as u32;
    }

    for (new_index, &old_index) in order.iter().enumerate() {
        let mut descriptor = snapshot[old_index];
        if descriptor.prev_garbage != NIL {
            descriptor.prev_garbage = old_to_new[descriptor.prev_garbage as usize];
        }
        if descriptor.next_garbage != NIL {
            descriptor.next_garbage = old_to_new[descriptor.next_garbage as usize];
        }
        *stack::get_mut(body, header, new_index as u32) = descriptor;
    }

    if header.garbage_front != NIL {
        header.garbage_front = old_to_new[header.garbage_front as usize];
    }
    if header.garbage_back != NIL {
        header.garbage_back = old_to_new[header.garbage_back as usize];
    }
    header.last_found = NIL;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_arena(buf: &mut [u8], hunk_size: u32, max_key_length: u32) -> Arena<'_> {
        Arena::initialize(buf, hunk_size, max_key_length).unwrap()
    }

    #[test]
    fn head_size_matches_the_header_constant() {
        let mut buf = vec![0u8; 4096];
        let arena = new_arena(&mut buf, 8, 32);
        assert_eq!(arena.head_size(), HEADER_SIZE);
    }

    #[test]
    fn create_read_update_delete_round_trip() {
        let mut buf = vec![0u8; 4096];
        let mut arena = new_arena(&mut buf, 8, 32);

        arena.create(b"alpha", b"1234").unwrap();
        assert_eq!(arena.count(), 1);

        let mut out = [0u8; 4];
        arena.read(b"alpha", &mut out).unwrap();
        assert_eq!(&out, b"1234");

        arena.update(b"alpha", b"5678").unwrap();
        arena.read(b"alpha", &mut out).unwrap();
        assert_eq!(&out, b"5678");

        arena.delete(b"alpha");
        assert_eq!(arena.count(), 0);
        assert_eq!(arena.read(b"alpha", &mut out), Err(Error::KeyNotFound));
    }

    #[test]
    fn create_duplicate_key_fails() {
        let mut buf = vec![0u8; 4096];
        let mut arena = new_arena(&mut buf, 8, 32);
        arena.create(b"k", b"v").unwrap();
        assert_eq!(arena.create(b"k", b"v2"), Err(Error::KeyExists));
    }

    #[test]
    fn create_rejects_oversized_key() {
        let mut buf = vec![0u8; 4096];
        let mut arena = new_arena(&mut buf, 8, 4);
        let result = arena.create(b"way-too-long", b"v");
        assert!(matches!(result, Err(Error::KeyTooLong { .. })));
    }

    #[test]
    fn update_requires_matching_size() {
        let mut buf = vec![0u8; 4096];
        let mut arena = new_arena(&mut buf, 8, 32);
        arena.create(b"k", b"1234").unwrap();
        assert_eq!(
            arena.update(b"k", b"12"),
            Err(Error::BadSize { expected: 4, actual: 2 })
        );
    }

    #[test]
    fn fill_to_capacity_then_refuse() {
        let mut buf = vec![0u8; HEADER_SIZE + DESCRIPTOR_SIZE + 8];
        let mut arena = new_arena(&mut buf, 8, 8);
        arena.create(b"k", b"v").unwrap();
        let err = arena.create(b"k2", b"v2");
        assert_eq!(err, Err(Error::ArenaFull));
    }

    #[test]
    fn empty_marks_everything_garbage_but_keeps_layout() {
        let mut buf = vec![0u8; 4096];
        let mut arena = new_arena(&mut buf, 8, 32);
        arena.create(b"a", b"1").unwrap();
        arena.create(b"b", b"2").unwrap();

        let stack_count_before = arena.header().stack_count;
        arena.empty();

        assert_eq!(arena.count(), 0);
        assert!(arena.read(b"a", &mut [0u8; 1]).is_err());
        assert_eq!(arena.header().stack_count, stack_count_before);
        assert_eq!(arena.garbage_count(), 2);
    }

    #[test]
    fn clear_discards_all_bookkeeping() {
        let mut buf = vec![0u8; 4096];
        let mut arena = new_arena(&mut buf, 8, 32);
        arena.create(b"a", b"1").unwrap();
        arena.clear();
        assert_eq!(arena.header().stack_count, 0);
        assert_eq!(arena.garbage_count(), 0);
        assert_eq!(arena.count(), 0);
    }

    #[test]
    fn recycle_reuses_exact_size_hole() {
        let mut buf = vec![0u8; HEADER_SIZE + 3 * DESCRIPTOR_SIZE + 3 * 8];
        let mut arena = new_arena(&mut buf, 8, 8);
        arena.create(b"a", b"1").unwrap();
        arena.create(b"b", b"2").unwrap();
        arena.delete(b"a");
        let garbage_before = arena.header().stack_count;
        arena.create(b"c", b"3").unwrap();
        assert_eq!(arena.header().stack_count, garbage_before);
        assert_eq!(arena.garbage_count(), 0);
    }

    #[test]
    fn sort_by_key_orders_entries_lexicographically() {
        let mut buf = vec![0u8; 4096];
        let mut arena = new_arena(&mut buf, 8, 32);
        arena.create(b"banana", b"1").unwrap();
        arena.create(b"apple", b"2").unwrap();
        arena.create(b"cherry", b"3").unwrap();

        arena.sort_by_key();

        let keys: Vec<Vec<u8>> = arena.iter().map(|e| e.key().to_vec()).collect();
        assert_eq!(keys, vec![b"apple".to_vec(), b"banana".to_vec(), b"cherry".to_vec()]);

        // Data is still all there and findable after the reorder.
        let mut out = [0u8; 1];
        arena.read(b"cherry", &mut out).unwrap();
        assert_eq!(&out, b"3");
    }
}
