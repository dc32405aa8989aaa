//! An embedded key/value arena: a single caller-supplied buffer holding a
//! descriptor stack (growing up from the low end) and a value heap (growing
//! down from the high end), with an in-place collector for reclaiming
//! deleted entries. See [`store::Arena`] for the full surface.

#![allow(dead_code)]

pub mod error;
mod store;

pub use error::{is_error, Error, ErrorCode, Result};
pub use store::{Arena, DescriptorFlag, DescriptorFlags, Entry, Iter, HEADER_SIZE, MAX_SIZE};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_crud_smoke_test() {
        let mut buf = vec![0u8; 4096];
        let mut arena = Arena::initialize(&mut buf, 8, 64).unwrap();

        arena.create(b"name", b"arenakv").unwrap();
        assert_eq!(arena.count(), 1);

        let mut out = vec![0u8; arena.read_size(b"name")];
        arena.read(b"name", &mut out).unwrap();
        assert_eq!(out, b"arenakv");

        arena.delete(b"name");
        assert!(arena.is_empty());
    }
}
