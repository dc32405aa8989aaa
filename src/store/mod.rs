/*!

The storage layer: everything that knows about the arena's on-buffer byte
layout. Submodules are organized the way the teacher splits its allocator
concerns apart (`allocator::{arena, bucket, storage_allocator}`) — one file
per piece of bookkeeping, composed together by [`arena::Arena`].

*/

mod collector;
mod descriptor;
mod garbage;
mod header;
mod heap;
mod index;
mod stack;

pub mod arena;
pub mod iter;

pub use arena::{Arena, MAX_SIZE};
pub use descriptor::{DescriptorFlag, DescriptorFlags};
pub use header::{HEADER_SIZE, NIL};
pub use iter::{Entry, Iter};
