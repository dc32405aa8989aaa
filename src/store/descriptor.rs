/*!

The keyvalue descriptor: one fixed-size record per logical key, binding it to
its hunk on the value heap. Flags use `enumflags2`, same as the teacher's
`DagNodeFlags`, even though today there is only one bit (`Garbage`) — it
keeps the door open for the same kind of flag growth `DagNodeFlag` went
through without a layout change.

*/

use bytemuck::{Pod, Zeroable};
use enumflags2::{bitflags, BitFlags};

use crate::store::header::NIL;

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DescriptorFlag {
    /// Set once `Delete` has been called on this descriptor and it has not
    /// yet been reclaimed or recycled.
    Garbage,
}

pub type DescriptorFlags = BitFlags<DescriptorFlag, u8>;

/// One descriptor slot in the descriptor stack. 32 bytes, 4-byte aligned.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct RawDescriptor {
    /// Start offset of this descriptor's hunk on the heap.
    pub heap_top: u32,
    /// Size in bytes of this descriptor's hunk (a multiple of `hunk_size`).
    pub heap_size: u32,
    /// Offset of the key's null-terminated byte string within the hunk.
    pub key_ptr: u32,
    /// Offset of the value payload within the hunk.
    pub value_ptr: u32,
    /// Length in bytes of the value payload.
    pub value_size: u32,
    flags_bits: u8,
    _pad: [u8; 3],
    /// Garbage-list predecessor (descriptor index), or `NIL`.
    pub prev_garbage: u32,
    /// Garbage-list successor (descriptor index), or `NIL`.
    pub next_garbage: u32,
}

pub const DESCRIPTOR_SIZE: usize = std::mem::size_of::<RawDescriptor>();

impl RawDescriptor {
    /// A freshly pushed or recycled descriptor: no garbage-list links, not
    /// marked garbage. Caller still has to fill in the hunk/key/value fields.
    pub fn fresh() -> Self {
        RawDescriptor {
            heap_top: 0,
            heap_size: 0,
            key_ptr: 0,
            value_ptr: 0,
            value_size: 0,
            flags_bits: 0,
            _pad: [0; 3],
            prev_garbage: NIL,
            next_garbage: NIL,
        }
    }

    #[inline]
    pub fn flags(&self) -> DescriptorFlags {
        DescriptorFlags::from_bits_truncate(self.flags_bits)
    }

    #[inline]
    pub fn set_flags(&mut self, flags: DescriptorFlags) {
        self.flags_bits = flags.bits();
    }

    #[inline]
    pub fn is_garbage(&self) -> bool {
        self.flags().contains(DescriptorFlag::Garbage)
    }

    #[inline]
    pub fn set_garbage(&mut self, garbage: bool) {
        let mut flags = self.flags();
        if garbage {
            flags.insert(DescriptorFlag::Garbage);
        } else {
            flags.remove(DescriptorFlag::Garbage);
        }
        self.set_flags(flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_size_is_four_byte_aligned() {
        assert_eq!(DESCRIPTOR_SIZE % 4, 0);
    }

    #[test]
    fn fresh_descriptor_is_not_garbage_and_has_no_links() {
        let d = RawDescriptor::fresh();
        assert!(!d.is_garbage());
        assert_eq!(d.prev_garbage, NIL);
        assert_eq!(d.next_garbage, NIL);
    }

    #[test]
    fn garbage_flag_round_trips() {
        let mut d = RawDescriptor::fresh();
        d.set_garbage(true);
        assert!(d.is_garbage());
        d.set_garbage(false);
        assert!(!d.is_garbage());
    }
}
