//! `ATOM_POOL_TREE` backend (spec §4.3): O(log n), more compact, stores
//! refcounts 0-based internally ("DATABOX_FALSE (0) = 1 byte vs 3 bytes for
//! encoding '1'" per `atomPool.h`) and translates to the 1-based public API
//! at every read/write, exactly as spec §4.3's "Semantic note on refcount"
//! requires.

use std::collections::BTreeMap;

use crate::value::AtomId;

#[derive(Debug, Default)]
pub struct TreePool {
    by_string: BTreeMap<Vec<u8>, AtomId>,
    /// Refcount stored 0-based: a freshly interned entry has
    /// `internal_refcount == 0`, presented externally as `1`.
    by_id: BTreeMap<AtomId, (Vec<u8>, u64)>,
    free_ids: Vec<AtomId>,
    next_id: AtomId,
}

impl TreePool {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Tree backend reset is a documented no-op (spec §4.3, `atomPool.h`
    /// LIMITATIONS: "atomPoolReset() only works with HASH backend").
    pub fn reset(&mut self) {}

    fn allocate_id(&mut self) -> AtomId {
        self.free_ids.pop().unwrap_or_else(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        })
    }

    pub fn intern(&mut self, s: &[u8]) -> AtomId {
        if let Some(&id) = self.by_string.get(s) {
            if let Some(entry) = self.by_id.get_mut(&id) {
                entry.1 += 1;
            }
            return id;
        }
        let id = self.allocate_id();
        self.by_string.insert(s.to_vec(), id);
        self.by_id.insert(id, (s.to_vec(), 0));
        id
    }

    pub fn get_id(&self, s: &[u8]) -> AtomId {
        self.by_string.get(s).copied().unwrap_or(0)
    }

    pub fn exists(&self, s: &[u8]) -> bool {
        self.by_string.contains_key(s)
    }

    pub fn lookup(&self, id: AtomId) -> Option<&[u8]> {
        self.by_id.get(&id).map(|(bytes, _)| bytes.as_slice())
    }

    pub fn retain(&mut self, id: AtomId) {
        if let Some(entry) = self.by_id.get_mut(&id) {
            entry.1 += 1;
        }
    }

    pub fn release(&mut self, id: AtomId) -> bool {
        let Some(entry) = self.by_id.get_mut(&id) else {
            return false;
        };
        if entry.1 == 0 {
            let (bytes, _) = self.by_id.remove(&id).expect("entry present");
            self.by_string.remove(&bytes);
            self.free_ids.push(id);
            true
        } else {
            entry.1 -= 1;
            false
        }
    }

    /// Public (1-based) refcount: internal `0` reads as `1`.
    pub fn refcount(&self, id: AtomId) -> u64 {
        self.by_id.get(&id).map_or(0, |(_, rc)| rc + 1)
    }

    pub fn count(&self) -> usize {
        self.by_id.len()
    }

    pub fn bytes(&self) -> usize {
        self.by_id
            .values()
            .map(|(b, _)| b.len() + core::mem::size_of::<AtomId>())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refcount_is_presented_one_based() {
        let mut pool = TreePool::new();
        let id = pool.intern(b"z");
        assert_eq!(pool.refcount(id), 1);
        pool.retain(id);
        assert_eq!(pool.refcount(id), 2);
    }

    #[test]
    fn reset_is_a_documented_no_op() {
        let mut pool = TreePool::new();
        pool.intern(b"kept");
        pool.reset();
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn release_frees_at_zero_refcount() {
        let mut pool = TreePool::new();
        let id = pool.intern(b"solo");
        assert!(pool.release(id));
        assert_eq!(pool.count(), 0);
    }
}
