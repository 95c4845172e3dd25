//! The auxiliary hash index (spec §3.9, §4.2; component C2).
//!
//! An open-addressed hash map with **incremental rehashing**: growth
//! allocates a doubled table and migrates at most one bucket from the old
//! table into the new one per call, so no single operation pays the full
//! cost of a rehash (spec §4.2 "Algorithm"). This is the classic
//! Redis-style two-table incremental rehash, the same shape the generic
//! `HashIndex` in this crate's Full-tier ordered set and multimap rest on.
//!
//! Unlike [`crate::atompool`]'s hash backend (which wraps `std::HashMap`
//! because nothing about its contract depends on bounded per-op latency),
//! this module hand-rolls open addressing because the bounded-incremental-
//! rehash behavior *is* the tested contract (spec §4.2, §5 "no operation
//! suspends... CPU-bound" and the latency-boundedness it implies).

use core::cell::Cell;
use core::hash::{BuildHasher, Hash, Hasher};
use std::collections::hash_map::RandomState;
use std::rc::Rc;

const INITIAL_CAPACITY: usize = 8;
const MAX_LOAD_FACTOR_NUM: usize = 3;
const MAX_LOAD_FACTOR_DEN: usize = 4;
/// How many old-table buckets to migrate per mutating call (spec §4.2:
/// "a bounded number of buckets... per call").
const REHASH_STEP: usize = 2;

#[derive(Clone)]
enum Slot<K, V> {
    Empty,
    Deleted,
    Occupied(K, V, u64),
}

/// An open-addressed, incrementally-rehashing hash map from `K` to `V`.
pub struct HashIndex<K, V, S = RandomState> {
    table: Vec<Slot<K, V>>,
    old_table: Vec<Slot<K, V>>,
    rehash_cursor: usize,
    len: usize,
    hasher_builder: S,
    /// Count of outstanding safe iterators; rehashing is suspended while
    /// this is nonzero (spec §4.2 "Safe iteration"). Held behind a shared
    /// counter rather than a plain field so a [`SafeIter`] guard can outlive
    /// any single borrow of `self` — it must remain droppable (decrementing
    /// the count) while the caller still holds and mutates the index
    /// through ordinary `&mut self` calls, which a guard borrowing `self`
    /// directly could never allow.
    safe_iterators: Rc<Cell<u32>>,
    rng_state: u64,
}

impl<K, V> HashIndex<K, V, RandomState>
where
    K: Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V> Default for HashIndex<K, V, RandomState>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashIndex<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    #[must_use]
    pub fn with_hasher(hasher_builder: S) -> Self {
        Self {
            table: vec_of_empty(INITIAL_CAPACITY),
            old_table: Vec::new(),
            rehash_cursor: 0,
            len: 0,
            hasher_builder,
            safe_iterators: Rc::new(Cell::new(0)),
            rng_state: 0x9E37_79B9_7F4A_7C15,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn hash_of(&self, key: &K) -> u64 {
        let mut hasher = self.hasher_builder.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn rehashing(&self) -> bool {
        !self.old_table.is_empty()
    }

    /// Migrates up to `REHASH_STEP` buckets from `old_table` into `table`.
    /// Suspended while any safe iterator is live.
    fn step_rehash(&mut self) {
        if !self.rehashing() || self.safe_iterators.get() > 0 {
            return;
        }
        let mut migrated = 0;
        while migrated < REHASH_STEP && self.rehash_cursor < self.old_table.len() {
            if let Slot::Occupied(..) = &self.old_table[self.rehash_cursor] {
                let slot = core::mem::replace(&mut self.old_table[self.rehash_cursor], Slot::Deleted);
                if let Slot::Occupied(k, v, h) = slot {
                    Self::raw_insert(&mut self.table, k, v, h);
                }
                migrated += 1;
            }
            self.rehash_cursor += 1;
        }
        if self.rehash_cursor >= self.old_table.len() {
            self.old_table.clear();
            self.old_table.shrink_to_fit();
            self.rehash_cursor = 0;
        }
    }

    /// Begins a rehash into a table double the current size.
    fn start_rehash(&mut self) {
        if self.rehashing() {
            return;
        }
        let new_capacity = (self.table.len() * 2).max(INITIAL_CAPACITY);
        let new_table = vec_of_empty(new_capacity);
        self.old_table = core::mem::replace(&mut self.table, new_table);
        self.rehash_cursor = 0;
    }

    fn needs_growth(&self) -> bool {
        !self.rehashing()
            && self.len * MAX_LOAD_FACTOR_DEN >= self.table.len() * MAX_LOAD_FACTOR_NUM
    }

    fn raw_insert(table: &mut [Slot<K, V>], key: K, value: V, hash: u64) {
        let mask = table.len() - 1;
        let mut idx = (hash as usize) & mask;
        loop {
            match &table[idx] {
                Slot::Empty | Slot::Deleted => {
                    table[idx] = Slot::Occupied(key, value, hash);
                    return;
                }
                Slot::Occupied(k, _, _) if *k == key => {
                    table[idx] = Slot::Occupied(key, value, hash);
                    return;
                }
                _ => idx = (idx + 1) & mask,
            }
        }
    }

    fn raw_find<'a>(table: &'a [Slot<K, V>], key: &K, hash: u64) -> Option<usize> {
        if table.is_empty() {
            return None;
        }
        let mask = table.len() - 1;
        let mut idx = (hash as usize) & mask;
        let mut probes = 0;
        while probes < table.len() {
            match &table[idx] {
                Slot::Empty => return None,
                Slot::Occupied(k, _, _) if k == key => return Some(idx),
                _ => {
                    idx = (idx + 1) & mask;
                    probes += 1;
                }
            }
        }
        None
    }

    /// Inserts `key -> value`, returning the previous value if the key was
    /// already present. Amortised O(1) (spec §3.9).
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.step_rehash();
        if self.needs_growth() {
            self.start_rehash();
        }
        let hash = self.hash_of(&key);
        // Drop any stale copy in the old table so the new table stays the
        // single source of truth, per spec §4.2: "inserts land in the new
        // table".
        let previous = if let Some(idx) = Self::raw_find(&self.old_table, &key, hash) {
            match core::mem::replace(&mut self.old_table[idx], Slot::Deleted) {
                Slot::Occupied(_, v, _) => Some(v),
                _ => None,
            }
        } else {
            None
        };
        let previous = match Self::raw_find(&self.table, &key, hash) {
            Some(idx) => match core::mem::replace(&mut self.table[idx], Slot::Empty) {
                Slot::Occupied(_, v, _) => Some(v),
                _ => previous,
            },
            None => previous,
        };
        Self::raw_insert(&mut self.table, key, value, hash);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    #[must_use]
    pub fn find(&self, key: &K) -> Option<&V> {
        let hash = self.hash_of(key);
        if let Some(idx) = Self::raw_find(&self.table, key, hash) {
            if let Slot::Occupied(_, v, _) = &self.table[idx] {
                return Some(v);
            }
        }
        if self.rehashing() {
            if let Some(idx) = Self::raw_find(&self.old_table, key, hash) {
                if let Slot::Occupied(_, v, _) = &self.old_table[idx] {
                    return Some(v);
                }
            }
        }
        None
    }

    #[must_use]
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hash_of(key);
        if let Some(idx) = Self::raw_find(&self.table, key, hash) {
            if let Slot::Occupied(_, v, _) = &mut self.table[idx] {
                return Some(v);
            }
        }
        if self.rehashing() {
            if let Some(idx) = Self::raw_find(&self.old_table, key, hash) {
                if let Slot::Occupied(_, v, _) = &mut self.old_table[idx] {
                    return Some(v);
                }
            }
        }
        None
    }

    #[must_use]
    pub fn exists(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Removes `key`. Returns `false` if absent (spec §4.2 "Delete returns
    /// `false` if absent (not an error)"); here expressed as `Option<V>`
    /// for the idiomatic Rust equivalent.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        self.step_rehash();
        let hash = self.hash_of(key);
        if let Some(idx) = Self::raw_find(&self.table, key, hash) {
            if let Slot::Occupied(_, v, _) = core::mem::replace(&mut self.table[idx], Slot::Deleted) {
                self.len -= 1;
                return Some(v);
            }
        }
        if self.rehashing() {
            if let Some(idx) = Self::raw_find(&self.old_table, key, hash) {
                if let Slot::Occupied(_, v, _) =
                    core::mem::replace(&mut self.old_table[idx], Slot::Deleted)
                {
                    self.len -= 1;
                    return Some(v);
                }
            }
        }
        None
    }

    /// Unsafe (caller-serialized) iteration. Mutating the map while this
    /// iterator is alive is undefined (mirrors spec §4.2: "Unsafe iterators
    /// assume no concurrent mutation").
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.table
            .iter()
            .chain(self.old_table.iter())
            .filter_map(|slot| match slot {
                Slot::Occupied(k, v, _) => Some((k, v)),
                _ => None,
            })
    }

    /// A safe iterator: for as long as the returned guard is alive,
    /// rehashing (and therefore bucket relocation) is suspended, so a
    /// traversal via [`HashIndex::iter`] stays valid across calls even if
    /// `step_rehash` would otherwise run (spec §4.2 "Safe iteration"). The
    /// guard deliberately holds no borrow of `self`: callers are expected to
    /// keep mutating and iterating the index through ordinary methods while
    /// the guard is alive, exactly as the "safe iterator" contract promises.
    pub fn safe_iter(&self) -> SafeIter {
        self.safe_iterators.set(self.safe_iterators.get() + 1);
        SafeIter {
            counter: Rc::clone(&self.safe_iterators),
        }
    }

    /// Picks a uniformly-ish random occupied entry. Uses a small
    /// instance-local xorshift64* PRNG rather than pulling in a `rand`
    /// dependency for a single non-cryptographic internal use.
    pub fn random_entry(&mut self) -> Option<(&K, &V)> {
        if self.len == 0 {
            return None;
        }
        let total = self.table.len() + self.old_table.len();
        let start = (self.next_rng() as usize) % total;
        let mut found_idx = None;
        for offset in 0..total {
            let idx = (start + offset) % total;
            let occupied = if idx < self.table.len() {
                matches!(self.table[idx], Slot::Occupied(..))
            } else {
                matches!(self.old_table[idx - self.table.len()], Slot::Occupied(..))
            };
            if occupied {
                found_idx = Some(idx);
                break;
            }
        }
        found_idx.and_then(|idx| self.find_pair_at(idx))
    }

    fn find_pair_at(&self, idx: usize) -> Option<(&K, &V)> {
        let slot = if idx < self.table.len() {
            &self.table[idx]
        } else {
            &self.old_table[idx - self.table.len()]
        };
        match slot {
            Slot::Occupied(k, v, _) => Some((k, v)),
            _ => None,
        }
    }

    fn next_rng(&mut self) -> u64 {
        // xorshift64*: small, dependency-free, fine for "pick a random
        // member", not for anything security sensitive.
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Forces growth ahead of expected insert volume (spec §4.2 `resize`).
    /// Runs any in-flight rehash to completion, then starts and immediately
    /// completes further rehashes until the table can hold `additional`
    /// more entries without crossing the load factor.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.len + additional;
        loop {
            while self.rehashing() {
                self.step_rehash();
            }
            if needed * MAX_LOAD_FACTOR_DEN < self.table.len() * MAX_LOAD_FACTOR_NUM {
                break;
            }
            self.start_rehash();
        }
    }
}

fn vec_of_empty<K, V>(capacity: usize) -> Vec<Slot<K, V>> {
    let capacity = capacity.next_power_of_two().max(1);
    let mut v = Vec::with_capacity(capacity);
    for _ in 0..capacity {
        v.push(Slot::Empty);
    }
    v
}

/// RAII guard produced by [`HashIndex::safe_iter`]. Rehashing resumes when
/// this guard (and every other outstanding one) is dropped. Borrows nothing
/// from the index it guards; traverse via [`HashIndex::iter`] as usual while
/// holding it.
pub struct SafeIter {
    counter: Rc<Cell<u32>>,
}

impl Drop for SafeIter {
    fn drop(&mut self) {
        self.counter.set(self.counter.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_find_delete_roundtrip() {
        let mut idx: HashIndex<String, i32> = HashIndex::new();
        assert_eq!(idx.insert("a".to_string(), 1), None);
        assert_eq!(idx.insert("a".to_string(), 2), Some(1));
        assert_eq!(idx.find(&"a".to_string()), Some(&2));
        assert_eq!(idx.delete(&"a".to_string()), Some(2));
        assert_eq!(idx.find(&"a".to_string()), None);
    }

    #[test]
    fn survives_growth_across_many_inserts() {
        let mut idx: HashIndex<u64, u64> = HashIndex::new();
        for i in 0..5000u64 {
            idx.insert(i, i * 2);
        }
        assert_eq!(idx.len(), 5000);
        for i in 0..5000u64 {
            assert_eq!(idx.find(&i), Some(&(i * 2)));
        }
    }

    #[test]
    fn delete_during_rehash_is_visible_in_either_table() {
        let mut idx: HashIndex<u64, u64> = HashIndex::new();
        for i in 0..100u64 {
            idx.insert(i, i);
        }
        // Force a rehash to be in-flight, then delete immediately.
        idx.start_rehash();
        assert_eq!(idx.delete(&5), Some(5));
        assert_eq!(idx.find(&5), None);
        assert_eq!(idx.len(), 99);
    }

    #[test]
    fn safe_iterator_suspends_rehash() {
        let mut idx: HashIndex<u64, u64> = HashIndex::new();
        for i in 0..20u64 {
            idx.insert(i, i);
        }
        idx.start_rehash();
        let cursor_before = idx.rehash_cursor;
        {
            let _guard = idx.safe_iter();
            idx.step_rehash();
            assert_eq!(idx.rehash_cursor, cursor_before);
        }
        idx.step_rehash();
        assert!(idx.rehash_cursor >= cursor_before);
    }

    #[test]
    fn iter_yields_every_entry_exactly_once() {
        let mut idx: HashIndex<u64, u64> = HashIndex::new();
        for i in 0..50u64 {
            idx.insert(i, i);
        }
        let mut seen: Vec<u64> = idx.iter().map(|(k, _)| *k).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 50);
    }
}
