//! Reflecta memory management infrastructure
//!
//! This crate provides the storage primitives behind reflection metadata:
//!
//! - **Metadata arena**: address-stable bump allocation for descriptors and
//!   class tables that live for the whole process
//! - **String pool**: deduplicated names referenced by byte-exact
//!   offset/length pairs, frozen into an immutable table

pub mod arena;
pub mod string_pool;

pub use arena::{ArenaAllocError, ArenaStats, MetaArena, global_arena};
pub use string_pool::{StrRef, StringPool, StringPoolError, StringTable};
