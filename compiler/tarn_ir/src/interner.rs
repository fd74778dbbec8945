//! String interner for identifier storage.
//!
//! Provides O(1) interning and lookup. The interner is a plain
//! single-threaded value: every compilation session owns its own, so no
//! locking is required.

use rustc_hash::FxHashMap;

use crate::Name;

/// Error when interning a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternError {
    /// Interner exceeded capacity (over 4 billion distinct strings).
    Overflow { count: usize },
}

impl std::fmt::Display for InternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternError::Overflow { count } => write!(
                f,
                "interner exceeded capacity: {count} strings, max is {}",
                u32::MAX
            ),
        }
    }
}

impl std::error::Error for InternError {}

/// String interner mapping identifiers to dense [`Name`] indices.
///
/// Interned strings are leaked for `'static` lifetime; the interner lives
/// for the whole compilation session, so the leak is bounded by the set of
/// distinct identifiers seen.
pub struct StringInterner {
    map: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

impl StringInterner {
    /// Create a new interner with the empty string pre-interned at index 0.
    pub fn new() -> Self {
        let mut interner = Self {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(256),
        };
        let empty: &'static str = "";
        interner.map.insert(empty, 0);
        interner.strings.push(empty);
        interner
    }

    /// Try to intern a string, returning its [`Name`] or an error on overflow.
    pub fn try_intern(&mut self, s: &str) -> Result<Name, InternError> {
        if let Some(&idx) = self.map.get(s) {
            return Ok(Name::from_raw(idx));
        }
        let idx = u32::try_from(self.strings.len()).map_err(|_| InternError::Overflow {
            count: self.strings.len(),
        })?;
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        self.map.insert(leaked, idx);
        self.strings.push(leaked);
        Ok(Name::from_raw(idx))
    }

    /// Intern a string.
    ///
    /// # Panics
    /// Panics on interner overflow. Use [`try_intern`](Self::try_intern) to
    /// handle the overflow case gracefully.
    #[inline]
    pub fn intern(&mut self, s: &str) -> Name {
        self.try_intern(s).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Look up the string for a previously interned [`Name`].
    ///
    /// Returns the empty string for a `Name` that was never interned here.
    #[inline]
    pub fn lookup(&self, name: Name) -> &str {
        self.strings.get(name.index()).copied().unwrap_or("")
    }

    /// Number of interned strings (including the pre-interned empty string).
    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the interner holds only the pre-interned empty string.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
