//! String interning for symbols
//!
//! Identifiers, macro names, and placeholder names are interned once and
//! compared as [`Symbol`]s everywhere else.

pub use lasso::Spur as Symbol;
use lasso::ThreadedRodeo;
use std::sync::Arc;

/// Thread-safe string interner, cheap to clone and share across unit workers
#[derive(Clone)]
pub struct Interner {
    inner: Arc<ThreadedRodeo>,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ThreadedRodeo::new()),
        }
    }

    pub fn intern(&self, text: &str) -> Symbol {
        self.inner.get_or_intern(text)
    }

    /// Resolves a symbol interned through this interner
    pub fn resolve(&self, sym: Symbol) -> &str {
        self.inner.resolve(&sym)
    }

    /// Resolves a symbol that may come from another interner
    pub fn try_resolve(&self, sym: Symbol) -> Option<&str> {
        self.inner.try_resolve(&sym)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
