//! Address-stable arena for reflection metadata.
//!
//! Type descriptors, class tables and their string tables live for the whole
//! program and are compared by address, so they must never move. The
//! [`MetaArena`] hands out `&'static` references into bump-allocated chunks
//! that are never reused.
//!
//! # Architecture
//!
//! - Chunks are allocated from the system allocator and only grow in number.
//! - A bump offset inside the newest chunk serves each request; a request
//!   that does not fit opens a new chunk sized for it.
//! - Values placed in the arena are never dropped. Only metadata that is
//!   meant to live for the process belongs here.
//!
//! # Example
//!
//! ```
//! use reflecta_mem::arena::global_arena;
//!
//! let arena = global_arena();
//! let name: &'static str = arena.alloc_str("Counter");
//! let count: &'static u32 = arena.alloc(3u32);
//!
//! assert_eq!(name, "Counter");
//! assert_eq!(*count, 3);
//! ```

use parking_lot::Mutex;
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Error type for arena allocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("arena allocation of {size} bytes (align {align}) failed")]
pub struct ArenaAllocError {
    /// Requested size in bytes.
    pub size: usize,
    /// Requested alignment.
    pub align: usize,
}

/// Alignment of every chunk base.
const CHUNK_ALIGNMENT: usize = 16;

/// Smallest chunk the arena will open.
const MIN_CHUNK_SIZE: usize = 4096;

/// Default chunk size of the global arena.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Arena allocation statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Bytes handed out, excluding alignment padding.
    pub total_allocated: usize,
    /// Number of chunks opened.
    pub chunk_count: usize,
    /// Sum of all chunk capacities.
    pub total_capacity: usize,
}

/// One contiguous region with a bump offset.
struct Chunk {
    start: NonNull<u8>,
    capacity: usize,
    used: usize,
}

// SAFETY: a Chunk exclusively owns its allocation; all access goes through
// the arena's mutex.
unsafe impl Send for Chunk {}

impl Chunk {
    fn new(capacity: usize) -> Result<Self, ArenaAllocError> {
        let layout = Layout::from_size_align(capacity, CHUNK_ALIGNMENT).map_err(|_| {
            ArenaAllocError {
                size: capacity,
                align: CHUNK_ALIGNMENT,
            }
        })?;

        // SAFETY: capacity is at least MIN_CHUNK_SIZE, so the layout is non-zero.
        let raw = unsafe { alloc::alloc(layout) };
        let start = NonNull::new(raw).ok_or(ArenaAllocError {
            size: capacity,
            align: CHUNK_ALIGNMENT,
        })?;

        Ok(Self {
            start,
            capacity,
            used: 0,
        })
    }

    /// Bumps the offset for `layout`, returning `None` if the chunk is full.
    fn try_alloc(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        let base = self.start.as_ptr() as usize;
        let align = layout.align();
        let aligned = (base + self.used + align - 1) & !(align - 1);
        let offset = aligned - base;
        let end = offset.checked_add(layout.size())?;

        if end > self.capacity {
            return None;
        }

        self.used = end;
        // SAFETY: offset + size <= capacity, so the pointer stays in bounds
        // and keeps the provenance of `start`.
        Some(unsafe { NonNull::new_unchecked(self.start.as_ptr().add(offset)) })
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: the layout matches the one used in Chunk::new.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.capacity, CHUNK_ALIGNMENT);
            alloc::dealloc(self.start.as_ptr(), layout);
        }
    }
}

/// Thread-safe bump arena whose allocations live as long as the arena.
///
/// Allocation methods take `&'static self`, so references handed out can
/// never outlive their storage. Use [`global_arena`] or leak an arena you
/// own.
pub struct MetaArena {
    chunks: Mutex<Vec<Chunk>>,
    chunk_size: usize,
    total_allocated: AtomicUsize,
}

impl MetaArena {
    /// Creates an arena whose chunks hold at least `chunk_size` bytes.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
            chunk_size: chunk_size.max(MIN_CHUNK_SIZE).next_power_of_two(),
            total_allocated: AtomicUsize::new(0),
        }
    }

    /// Moves `value` into the arena.
    ///
    /// The value's destructor never runs.
    pub fn alloc<T: Send + Sync + 'static>(&'static self, value: T) -> &'static T {
        let layout = Layout::new::<T>();
        if layout.size() == 0 {
            return Box::leak(Box::new(value));
        }

        let ptr = self.alloc_layout(layout).cast::<T>();
        // SAFETY: the slot is fresh, sized and aligned for T, and never
        // handed out again.
        unsafe {
            ptr.as_ptr().write(value);
            &*ptr.as_ptr()
        }
    }

    /// Copies a slice into the arena.
    pub fn alloc_slice<T: Copy + Send + Sync + 'static>(&'static self, items: &[T]) -> &'static [T] {
        if items.is_empty() {
            return &[];
        }

        let Ok(layout) = Layout::array::<T>(items.len()) else {
            alloc::handle_alloc_error(Layout::new::<T>());
        };
        if layout.size() == 0 {
            return Box::leak(items.to_vec().into_boxed_slice());
        }

        let ptr = self.alloc_layout(layout).cast::<T>();
        // SAFETY: the region is sized for items.len() elements and does not
        // overlap `items`.
        unsafe {
            std::ptr::copy_nonoverlapping(items.as_ptr(), ptr.as_ptr(), items.len());
            std::slice::from_raw_parts(ptr.as_ptr(), items.len())
        }
    }

    /// Copies a string into the arena.
    pub fn alloc_str(&'static self, s: &str) -> &'static str {
        let bytes = self.alloc_slice(s.as_bytes());
        // SAFETY: the bytes were copied from a valid &str.
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }

    /// Returns allocation statistics.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let chunks = self.chunks.lock();
        ArenaStats {
            total_allocated: self.total_allocated.load(Ordering::Relaxed),
            chunk_count: chunks.len(),
            total_capacity: chunks.iter().map(|c| c.capacity).sum(),
        }
    }

    fn alloc_layout(&self, layout: Layout) -> NonNull<u8> {
        let mut chunks = self.chunks.lock();

        if let Some(ptr) = chunks.last_mut().and_then(|c| c.try_alloc(layout)) {
            self.total_allocated.fetch_add(layout.size(), Ordering::Relaxed);
            return ptr;
        }

        let needed = layout.size() + layout.align();
        let capacity = self.chunk_size.max(needed.next_power_of_two());
        let mut chunk = match Chunk::new(capacity) {
            Ok(chunk) => chunk,
            Err(_) => alloc::handle_alloc_error(layout),
        };

        let Some(ptr) = chunk.try_alloc(layout) else {
            alloc::handle_alloc_error(layout);
        };
        chunks.push(chunk);
        self.total_allocated.fetch_add(layout.size(), Ordering::Relaxed);
        ptr
    }
}

/// Global arena for runtime metadata.
#[must_use]
pub fn global_arena() -> &'static MetaArena {
    static ARENA: OnceLock<MetaArena> = OnceLock::new();
    ARENA.get_or_init(|| MetaArena::new(DEFAULT_CHUNK_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaked(chunk_size: usize) -> &'static MetaArena {
        Box::leak(Box::new(MetaArena::new(chunk_size)))
    }

    #[test]
    fn test_alloc_values_are_stable() {
        let arena = leaked(4096);
        let a = arena.alloc(1u64);
        let b = arena.alloc(2u8);
        let c = arena.alloc(3u32);

        assert_eq!((*a, *b, *c), (1, 2, 3));
        assert_eq!(a as *const u64 as usize % std::mem::align_of::<u64>(), 0);
        assert_eq!(c as *const u32 as usize % std::mem::align_of::<u32>(), 0);
    }

    #[test]
    fn test_alloc_str_and_slice() {
        let arena = leaked(4096);
        let s = arena.alloc_str("valueChanged(i32)");
        let empty = arena.alloc_str("");
        let ids = arena.alloc_slice(&[2i32, 10, 65536]);

        assert_eq!(s, "valueChanged(i32)");
        assert_eq!(empty, "");
        assert_eq!(ids, &[2, 10, 65536]);
    }

    #[test]
    fn test_oversized_allocation_opens_dedicated_chunk() {
        let arena = leaked(4096);
        let big = arena.alloc([7u8; 10_000]);

        assert_eq!(big.len(), 10_000);
        assert!(big.iter().all(|&b| b == 7));
        assert!(arena.stats().total_capacity >= 10_000);
    }

    #[test]
    fn test_stats_track_chunks() {
        let arena = leaked(4096);
        assert_eq!(arena.stats(), ArenaStats::default());

        for i in 0..2048u32 {
            arena.alloc(i);
        }
        let stats = arena.stats();
        assert_eq!(stats.total_allocated, 2048 * 4);
        assert!(stats.chunk_count >= 2);
    }

    #[test]
    fn test_concurrent_allocation() {
        let arena = global_arena();
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                std::thread::spawn(move || {
                    (0..256u64)
                        .map(|i| arena.alloc(t * 1000 + i))
                        .all(|v| *v / 1000 == t)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
