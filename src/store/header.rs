/*!

The arena header: the fixed-size block of bookkeeping fields that lives at
the very start of the caller's buffer. It is reinterpreted in place via
`bytemuck` rather than read through pointer casts, so there is no aliasing
undefined behavior to reason about (see the allocator header-at-front-of-heap
technique this is grounded on).

*/

use bytemuck::{Pod, Zeroable};

/// Sentinel value meaning "no link" for any index-typed field (`last_found`,
/// `garbage_front`, `garbage_back`, a descriptor's `prev_garbage`/
/// `next_garbage`). Chosen so the all-zero (freshly `alloc_zeroed`) state
/// does *not* look like a valid link to descriptor `0`.
pub const NIL: u32 = u32::MAX;

/// Fixed bookkeeping block at `buffer[0..HEADER_SIZE]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct RawHeader {
    /// Total arena size in bytes (immutable after `Initialize`).
    pub size: u32,
    /// Minimum value-side allocation granularity.
    pub hunk_size: u32,
    /// Maximum key length (excluding the null terminator) this arena accepts.
    pub max_key_length: u32,
    /// Byte offset of the first descriptor slot.
    pub stack_start: u32,
    /// Number of descriptor slots currently pushed (live + garbage).
    pub stack_count: u32,
    /// Current heap bump pointer (byte offset; shrinks toward `stack_start`).
    pub heap_top: u32,
    /// Total bytes currently allocated on the heap side (live + garbage).
    pub heap_size: u32,
    /// Descriptor index at the front (oldest) of the garbage list, or `NIL`.
    pub garbage_front: u32,
    /// Descriptor index at the back (newest) of the garbage list, or `NIL`.
    pub garbage_back: u32,
    /// Number of descriptors currently marked garbage.
    pub garbage_count: u32,
    /// Sum of `heap_size` over all garbage descriptors.
    pub garbage_size: u32,
    /// Cached descriptor index of the last successful `Find`, or `NIL`.
    pub last_found: u32,
}

/// Size in bytes of the header block, i.e. where the descriptor stack begins.
pub const HEADER_SIZE: usize = std::mem::size_of::<RawHeader>();

/// Reads the header out of the front of `buffer`.
#[inline]
pub fn read(buffer: &[u8]) -> &RawHeader {
    bytemuck::from_bytes(&buffer[0..HEADER_SIZE])
}

/// Mutably reads the header out of the front of `buffer`.
#[inline]
pub fn read_mut(buffer: &mut [u8]) -> &mut RawHeader {
    bytemuck::from_bytes_mut(&mut buffer[0..HEADER_SIZE])
}
