//! `ATOM_POOL_HASH` backend (spec §4.3): O(1) intern/lookup/release, stored
//! directly 1-based — no translation layer needed, unlike the tree backend.

use std::collections::HashMap;

use crate::value::AtomId;

#[derive(Debug, Default)]
pub struct HashPool {
    by_string: HashMap<Vec<u8>, AtomId>,
    by_id: HashMap<AtomId, (Vec<u8>, u64)>,
    free_ids: Vec<AtomId>,
    next_id: AtomId,
}

impl HashPool {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        self.by_string.clear();
        self.by_id.clear();
        self.free_ids.clear();
        self.next_id = 1;
    }

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
        self.by_id.insert(id, (s.to_vec(), 1));
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
        entry.1 -= 1;
        if entry.1 == 0 {
            let (bytes, _) = self.by_id.remove(&id).expect("entry present");
            self.by_string.remove(&bytes);
            self.free_ids.push(id);
            true
        } else {
            false
        }
    }

    pub fn refcount(&self, id: AtomId) -> u64 {
        self.by_id.get(&id).map_or(0, |(_, rc)| *rc)
    }

    pub fn count(&self) -> usize {
        self.by_id.len()
    }

    pub fn bytes(&self) -> usize {
        self.by_id
            .values()
            .map(|(b, _)| b.len() + core::mem::size_of::<(AtomId, u64)>())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedups_and_refcounts() {
        let mut pool = HashPool::new();
        let a = pool.intern(b"hello");
        let b = pool.intern(b"hello");
        assert_eq!(a, b);
        assert_eq!(pool.refcount(a), 2);
    }

    #[test]
    fn release_to_zero_frees_and_reuses_id() {
        let mut pool = HashPool::new();
        let a = pool.intern(b"x");
        assert!(pool.release(a));
        assert_eq!(pool.get_id(b"x"), 0);
        let b = pool.intern(b"y");
        assert_eq!(a, b, "freed id should be reused");
    }
}
