//! Deduplicated string pool backing class reflection tables.
//!
//! Every name a class table records (class, method, parameter, property,
//! enumerator keys, class-info pairs) is stored once in a flat byte buffer
//! and referenced by a [`StrRef`] offset/length pair. The pool is mutable
//! while a table is being built and is then frozen into an immutable
//! [`StringTable`].
//!
//! # Examples
//!
//! ```
//! use reflecta_mem::StringPool;
//!
//! let mut pool = StringPool::new();
//! let a = pool.intern("value").unwrap();
//! let b = pool.intern("setValue").unwrap();
//! let c = pool.intern("value").unwrap();
//!
//! assert_eq!(a, c);
//! assert_ne!(a, b);
//!
//! let table = pool.freeze();
//! assert_eq!(table.get(b), "setValue");
//! ```
//!
//! # Performance
//!
//! - **Interned string**: O(1) hash lookup
//! - **New string**: O(n) copy into the buffer + O(1) hash insert
//! - **Resolve**: O(1) slice of the buffer

use hashbrown::HashMap;

/// Largest buffer a pool may grow to (offsets are `u32`).
pub const MAX_POOL_BYTES: usize = u32::MAX as usize;

/// Byte-exact reference into a [`StringTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StrRef {
    /// Byte offset of the first character.
    pub offset: u32,
    /// Length in bytes.
    pub len: u32,
}

impl StrRef {
    /// The empty string, valid in every table.
    pub const EMPTY: StrRef = StrRef { offset: 0, len: 0 };

    /// Returns true if this reference covers zero bytes.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    fn range(self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.len as usize
    }
}

/// Errors raised while interning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StringPoolError {
    /// The pool would exceed `u32` addressing.
    #[error("string pool overflow: {needed} bytes requested, {available} available")]
    Overflow {
        /// Bytes requested.
        needed: usize,
        /// Bytes left before the limit.
        available: usize,
    },
}

/// Builder-side string pool.
#[derive(Debug, Default)]
pub struct StringPool {
    data: String,
    refs: HashMap<Box<str>, StrRef>,
}

impl StringPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning the existing reference if it is already pooled.
    ///
    /// # Errors
    ///
    /// Returns [`StringPoolError::Overflow`] if the buffer would exceed
    /// [`MAX_POOL_BYTES`].
    pub fn intern(&mut self, s: &str) -> Result<StrRef, StringPoolError> {
        if s.is_empty() {
            return Ok(StrRef::EMPTY);
        }
        if let Some(&r) = self.refs.get(s) {
            return Ok(r);
        }

        let available = MAX_POOL_BYTES - self.data.len();
        if s.len() > available {
            return Err(StringPoolError::Overflow {
                needed: s.len(),
                available,
            });
        }

        // Both casts are bounded by MAX_POOL_BYTES above.
        let r = StrRef {
            offset: self.data.len() as u32,
            len: s.len() as u32,
        };
        self.data.push_str(s);
        self.refs.insert(s.into(), r);
        Ok(r)
    }

    /// Resolves a reference against the unfrozen pool.
    #[must_use]
    pub fn resolve(&self, r: StrRef) -> Option<&str> {
        self.data.get(r.range())
    }

    /// Number of distinct non-empty strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns true if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Bytes used by the buffer.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Freezes the pool into an immutable table.
    #[must_use]
    pub fn freeze(self) -> StringTable {
        StringTable {
            data: self.data.into_boxed_str(),
        }
    }
}

/// Frozen, read-only string table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringTable {
    data: Box<str>,
}

impl StringTable {
    /// Returns the string for `r`, or `""` if `r` does not lie on valid
    /// boundaries of this table.
    #[must_use]
    pub fn get(&self, r: StrRef) -> &str {
        self.data.get(r.range()).unwrap_or("")
    }

    /// Returns the string for `r` if it is in range.
    #[must_use]
    pub fn try_get(&self, r: StrRef) -> Option<&str> {
        self.data.get(r.range())
    }

    /// Raw bytes of the table.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Table size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the table holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
