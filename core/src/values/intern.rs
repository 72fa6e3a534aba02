use alloc::sync::Arc;

use hashbrown::HashSet;

/// String de-duplication service consulted when string literals enter a
/// program's literal table.
pub trait Interner {
    /// Returns the canonical shared copy of `s`.
    fn intern(&mut self, s: &str) -> Arc<str>;
}

/// Default [`Interner`]: a set of shared strings.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: HashSet<Arc<str>>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Interner for StringPool {
    fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return existing.clone();
        }
        let shared: Arc<str> = Arc::from(s);
        self.strings.insert(shared.clone());
        shared
    }
}
