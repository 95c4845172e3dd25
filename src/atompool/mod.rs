//! The atom pool (spec §3.8, §4.3; component C3): refcounted string
//! interning behind one facade over two interchangeable backends.
//!
//! Per the design notes (spec §9 "Cyclic / back-pointer graphs... a sum
//! type (tagged union)... each variant owns its data directly"), the two
//! backends are plain enum variants rather than a `dyn Trait` object — the
//! set of backends is closed and known at compile time, so a match
//! expresses the dispatch directly without an extra indirection.

mod hash_backend;
mod tree_backend;

use hash_backend::HashPool;
use tree_backend::TreePool;

pub use crate::value::AtomId;

/// Which interning strategy an [`AtomPool`] uses (spec §4.3 backend
/// selection guidance: hash for iteration/lookup-heavy workloads, tree for
/// memory-constrained write-heavy workloads).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Hash,
    Tree,
}

impl Backend {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Backend::Hash => "hash",
            Backend::Tree => "tree",
        }
    }
}

enum Inner {
    Hash(HashPool),
    Tree(TreePool),
}

/// Refcounted string interning facade (spec §4.3 contract).
pub struct AtomPool {
    inner: Inner,
    backend: Backend,
}

impl AtomPool {
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        let inner = match backend {
            Backend::Hash => Inner::Hash(HashPool::new()),
            Backend::Tree => Inner::Tree(TreePool::new()),
        };
        Self { inner, backend }
    }

    /// Default backend is hash, favoring speed (spec §4.3 guidance; also
    /// matches `atomPoolNewDefault`'s documented choice in `atomPool.h`).
    #[must_use]
    pub fn new_default() -> Self {
        Self::new(Backend::Hash)
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Resets to empty, keeping allocated memory where the backend
    /// supports it. No-op for the tree backend (spec §4.3).
    pub fn reset(&mut self) {
        match &mut self.inner {
            Inner::Hash(p) => p.reset(),
            Inner::Tree(p) => p.reset(),
        }
    }

    /// Interns `s`, returning its id (always `>= 1` on success; `0` is
    /// never returned because allocation failure is fatal per spec §7, not
    /// a reportable condition here).
    pub fn intern(&mut self, s: &[u8]) -> AtomId {
        match &mut self.inner {
            Inner::Hash(p) => p.intern(s),
            Inner::Tree(p) => p.intern(s),
        }
    }

    #[must_use]
    pub fn get_id(&self, s: &[u8]) -> AtomId {
        match &self.inner {
            Inner::Hash(p) => p.get_id(s),
            Inner::Tree(p) => p.get_id(s),
        }
    }

    #[must_use]
    pub fn exists(&self, s: &[u8]) -> bool {
        match &self.inner {
            Inner::Hash(p) => p.exists(s),
            Inner::Tree(p) => p.exists(s),
        }
    }

    #[must_use]
    pub fn lookup(&self, id: AtomId) -> Option<&[u8]> {
        match &self.inner {
            Inner::Hash(p) => p.lookup(id),
            Inner::Tree(p) => p.lookup(id),
        }
    }

    pub fn retain(&mut self, id: AtomId) {
        match &mut self.inner {
            Inner::Hash(p) => p.retain(id),
            Inner::Tree(p) => p.retain(id),
        }
    }

    /// Returns `true` iff the refcount dropped to zero and the entry was
    /// freed.
    pub fn release(&mut self, id: AtomId) -> bool {
        match &mut self.inner {
            Inner::Hash(p) => p.release(id),
            Inner::Tree(p) => p.release(id),
        }
    }

    #[must_use]
    pub fn refcount(&self, id: AtomId) -> u64 {
        match &self.inner {
            Inner::Hash(p) => p.refcount(id),
            Inner::Tree(p) => p.refcount(id),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        match &self.inner {
            Inner::Hash(p) => p.count(),
            Inner::Tree(p) => p.count(),
        }
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        match &self.inner {
            Inner::Hash(p) => p.bytes(),
            Inner::Tree(p) => p.bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_backends_agree_on_observable_contract() {
        for backend in [Backend::Hash, Backend::Tree] {
            let mut pool = AtomPool::new(backend);
            let id = pool.intern(b"member");
            assert_eq!(pool.refcount(id), 1, "{backend:?} refcount must start 1-based");
            pool.retain(id);
            assert_eq!(pool.refcount(id), 2);
            assert!(!pool.release(id));
            assert!(pool.release(id));
            assert_eq!(pool.get_id(b"member"), 0);
        }
    }

    #[test]
    fn lookup_returns_interned_bytes() {
        let mut pool = AtomPool::new_default();
        let id = pool.intern(b"abc");
        assert_eq!(pool.lookup(id), Some(b"abc".as_slice()));
    }
}
