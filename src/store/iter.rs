/*!

A borrowing iterator over an arena's live entries. `Begin`/`End`/`Next` from
the original interface collapse onto the standard [`Iterator`] trait here —
`Arena::iter()` is `Begin`, exhaustion is `End`, and `next()` is `Next`.
`Equal` falls out of `Entry::key` returning a plain `&[u8]`, which already
implements `PartialEq`.

Borrowing `&'a Arena` for the iterator's whole lifetime is what actually
enforces the "pointer-preserving" half of the collector's contract: the
borrow checker refuses to compile a call to any `&mut self` method (`Create`,
`Delete`, `Fold`, `Pack`, ...) while an `Iter` or `Entry` derived from it is
still alive, so there is no way to observe a descriptor mid-move.

*/

use crate::store::descriptor::RawDescriptor;
use crate::store::header::RawHeader;
use crate::store::index;
use crate::store::stack;

/// Iterator over an arena's live entries, oldest-created first.
pub struct Iter<'a> {
    header: &'a RawHeader,
    body: &'a [u8],
    cursor: u32,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(header: &'a RawHeader, body: &'a [u8]) -> Self {
        Iter { header, body, cursor: 0 }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Entry<'a>> {
        while self.cursor < self.header.stack_count {
            let index = self.cursor;
            self.cursor += 1;
            let descriptor = *stack::get(self.body, self.header, index);
            if !descriptor.is_garbage() {
                return Some(Entry { body: self.body, descriptor });
            }
        }
        None
    }
}

/// A single live keyvalue entry borrowed out of the arena.
pub struct Entry<'a> {
    body: &'a [u8],
    descriptor: RawDescriptor,
}

impl<'a> Entry<'a> {
    /// The entry's key bytes, excluding the null terminator.
    pub fn key(&self) -> &'a [u8] {
        index::key_bytes(self.body, &self.descriptor)
    }

    /// The entry's value bytes.
    pub fn value(&self) -> &'a [u8] {
        let start = self.descriptor.value_ptr as usize;
        &self.body[start..start + self.descriptor.value_size as usize]
    }

    /// Size in bytes of the entry's value.
    pub fn value_size(&self) -> usize {
        self.descriptor.value_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::arena::Arena;

    #[test]
    fn iter_yields_only_live_entries_in_creation_order() {
        let mut buf = vec![0u8; 4096];
        let mut arena = Arena::initialize(&mut buf, 8, 32).unwrap();
        arena.create(b"a", b"1").unwrap();
        arena.create(b"b", b"22").unwrap();
        arena.create(b"c", b"333").unwrap();
        arena.delete(b"b");

        let entries: Vec<(Vec<u8>, Vec<u8>)> =
            arena.iter().map(|e| (e.key().to_vec(), e.value().to_vec())).collect();

        assert_eq!(
            entries,
            vec![(b"a".to_vec(), b"1".to_vec()), (b"c".to_vec(), b"333".to_vec())]
        );
    }

    #[test]
    fn iter_over_empty_arena_yields_nothing() {
        let mut buf = vec![0u8; 4096];
        let arena = Arena::initialize(&mut buf, 8, 32).unwrap();
        assert_eq!(arena.iter().count(), 0);
    }
}
