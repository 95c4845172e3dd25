//! Full tier (spec §3.7, §4.4.3; component C4): a [`HashIndex`] mapping
//! every member to its score for O(1) lookup, backing a sequence of
//! [`Flex`] sub-maps ordered by score range so that rank/range scans still
//! walk packed arrays instead of a tree. Grounded on
//! `multiOrderedSetFull.h`'s split-on-growth / merge-on-shrink sub-map
//! design and `atomPool.h`'s shared-vs-owned pool ownership split.
//!
//! An [`AtomPool`] may optionally be attached (spec §3.7, §3.10) to
//! interned-refcount members for memory accounting and cross-set sharing
//! stats. Entries inside each sub-map still store the full member
//! [`Value`], not an interned [`AtomId`]: the sub-map's sort order is
//! `(score, member)`, and `Value::Ref` compares by numeric id rather than
//! by the referenced bytes (see `value.rs`), so substituting a ref for the
//! member would silently break the sortedness the rank/range scans depend
//! on. The pool therefore tracks membership and refcounts for accounting
//! and potential byte-sharing, while the sub-maps remain the source of
//! truth for order.

use std::cell::RefCell;
use std::rc::Rc;

use crate::atompool::{AtomId, AtomPool};
use crate::flex::search::SearchOutcome;
use crate::flex::Flex;
use crate::hashindex::HashIndex;
use crate::orderedset::common::ScoreRange;
use crate::value::Value;

/// How an [`AtomPool`] is attached to a full-tier set (spec §3.10: a pool
/// can be owned outright by one set, or shared — and therefore kept alive
/// and mutated — across several sets). `Rc<RefCell<_>>` is the idiomatic
/// translation of the original's shared, non-owning pool pointer: Rust has
/// no raw aliasing-without-ownership escape hatch, so shared mutable
/// access is expressed with reference counting plus interior mutability
/// instead.
pub enum PoolHandle {
    None,
    Owned(AtomPool),
    Shared(Rc<RefCell<AtomPool>>),
}

impl Default for PoolHandle {
    fn default() -> Self {
        PoolHandle::None
    }
}

impl PoolHandle {
    fn intern(&mut self, bytes: &[u8]) -> Option<AtomId> {
        match self {
            PoolHandle::None => None,
            PoolHandle::Owned(p) => Some(p.intern(bytes)),
            PoolHandle::Shared(p) => Some(p.borrow_mut().intern(bytes)),
        }
    }

    fn release(&mut self, id: AtomId) {
        match self {
            PoolHandle::None => {}
            PoolHandle::Owned(p) => {
                p.release(id);
            }
            PoolHandle::Shared(p) => {
                p.borrow_mut().release(id);
            }
        }
    }

    #[must_use]
    pub fn backend_name(&self) -> Option<&'static str> {
        match self {
            PoolHandle::None => None,
            PoolHandle::Owned(p) => Some(p.backend().name()),
            PoolHandle::Shared(p) => Some(p.borrow().backend().name()),
        }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        !matches!(self, PoolHandle::None)
    }
}

#[derive(Clone)]
struct MemberEntry {
    score: Value,
    pool_id: Option<AtomId>,
}

pub struct FullSet {
    member_index: HashIndex<Value, MemberEntry>,
    sub_maps: Vec<Flex>,
    /// `bounds[i]` is the lowest score in `sub_maps[i + 1]`. Always sorted
    /// ascending and one element shorter than `sub_maps`.
    bounds: Vec<Value>,
    max_map_size: usize,
    pool: PoolHandle,
}

impl FullSet {
    #[must_use]
    pub fn new(max_map_size: usize) -> Self {
        Self {
            member_index: HashIndex::new(),
            sub_maps: vec![Flex::new()],
            bounds: Vec::new(),
            max_map_size,
            pool: PoolHandle::None,
        }
    }

    #[must_use]
    pub fn with_owned_pool(max_map_size: usize, pool: AtomPool) -> Self {
        let mut set = Self::new(max_map_size);
        set.pool = PoolHandle::Owned(pool);
        set
    }

    #[must_use]
    pub fn with_shared_pool(max_map_size: usize, pool: Rc<RefCell<AtomPool>>) -> Self {
        let mut set = Self::new(max_map_size);
        set.pool = PoolHandle::Shared(pool);
        set
    }

    #[must_use]
    pub fn pool(&self) -> &PoolHandle {
        &self.pool
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.member_index.len()
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        self.sub_maps.iter().map(Flex::bytes).sum()
    }

    /// Which sub-map index currently owns `score`.
    fn sub_map_index_for(&self, score: &Value) -> usize {
        self.bounds.partition_point(|b| b.compare(score) != core::cmp::Ordering::Greater)
    }

    #[must_use]
    pub fn exists(&self, member: &Value) -> bool {
        self.member_index.find(member).is_some()
    }

    #[must_use]
    pub fn get_score(&self, member: &Value) -> Option<Value> {
        self.member_index.find(member).map(|e| e.score.clone())
    }

    fn insert_entry(&mut self, member: Value, score: Value) {
        let idx = self.sub_map_index_for(&score);
        self.sub_maps[idx].insert_sorted_group(&[score.clone(), member.clone()], 2, true);
        let pool_id = member_bytes(&member).and_then(|bytes| self.pool.intern(bytes));
        self.member_index.insert(member, MemberEntry { score, pool_id });
        self.maybe_split(idx);
    }

    fn remove_entry(&mut self, member: &Value, score: &Value) {
        let idx = self.sub_map_index_for(score);
        if let SearchOutcome::Found(start) = self.sub_maps[idx].find_sorted_group(2, &[score.clone(), member.clone()], 2) {
            self.sub_maps[idx].delete(start, 2);
        }
        if let Some(entry) = self.member_index.delete(member) {
            if let Some(id) = entry.pool_id {
                self.pool.release(id);
            }
        }
        self.maybe_merge(idx);
    }

    pub fn add(&mut self, member: Value, score: Value, nx: bool, xx: bool) -> (bool, Option<Value>) {
        match self.member_index.find(&member).cloned() {
            Some(existing) => {
                if nx {
                    return (false, Some(existing.score));
                }
                self.remove_entry(&member, &existing.score);
                self.insert_entry(member, score);
                (false, Some(existing.score))
            }
            None => {
                if xx {
                    return (false, None);
                }
                self.insert_entry(member, score);
                (true, None)
            }
        }
    }

    pub fn incr_by(&mut self, member: Value, delta: f64) -> Value {
        let current = self
            .member_index
            .find(&member)
            .map_or(0.0, |e| e.score.to_f64().unwrap_or(0.0));
        let next = Value::Double(current + delta);
        self.add(member, next.clone(), false, false);
        next
    }

    pub fn remove(&mut self, member: &Value) -> Option<Value> {
        let score = self.member_index.find(member)?.score.clone();
        self.remove_entry(member, &score);
        Some(score)
    }

    /// Splits `sub_maps[idx]` in half once it grows past
    /// `max_map_size` (spec §4.4.2): a sub-map only splits once it holds
    /// at least two entry groups *and* its packed byte size exceeds
    /// `max_map_size`. A single-group sub-map is never split regardless
    /// of size; a later insert that targets it lands in a fresh adjacent
    /// sub-map instead (handled naturally: the new sub-map appears once
    /// this sub-map next qualifies, via the normal split path).
    fn maybe_split(&mut self, idx: usize) {
        let sub = &self.sub_maps[idx];
        if sub.group_count(2) < 2 || sub.bytes() <= self.max_map_size {
            return;
        }
        let upper = self.sub_maps[idx].split_middle(2);
        if upper.is_empty() {
            return;
        }
        let boundary = upper.get(upper.head().expect("non-empty")).clone();
        self.sub_maps.insert(idx + 1, upper);
        self.bounds.insert(idx, boundary);
    }

    /// On deletion (spec §4.4.3): if the touched sub-map emptied out and
    /// isn't the only one, drop it outright. Otherwise, opportunistically
    /// merge it with its right neighbor if the combined byte size still
    /// fits under `max_map_size` — single-pass, no cascading merges.
    fn maybe_merge(&mut self, idx: usize) {
        if self.sub_maps.len() == 1 {
            return;
        }
        if self.sub_maps[idx].is_empty() {
            self.sub_maps.remove(idx);
            if idx == 0 {
                self.bounds.remove(0);
            } else {
                self.bounds.remove(idx - 1);
            }
            return;
        }
        if idx + 1 >= self.sub_maps.len() {
            return;
        }
        let combined = self.sub_maps[idx].bytes() + self.sub_maps[idx + 1].bytes();
        if combined > self.max_map_size {
            return;
        }
        let right = self.sub_maps.remove(idx + 1);
        self.sub_maps[idx].append_array(&right, 2);
        self.bounds.remove(idx);
    }

    #[must_use]
    pub fn get_rank(&self, member: &Value) -> Option<usize> {
        let entry = self.member_index.find(member)?;
        let idx = self.sub_map_index_for(&entry.score);
        let mut rank = 0;
        for sub in &self.sub_maps[..idx] {
            rank += sub.group_count(2);
        }
        if let SearchOutcome::Found(start) =
            self.sub_maps[idx].find_sorted_group(2, &[entry.score.clone(), member.clone()], 2)
        {
            rank += start / 2;
            Some(rank)
        } else {
            None
        }
    }

    #[must_use]
    pub fn get_reverse_rank(&self, member: &Value) -> Option<usize> {
        self.get_rank(member).map(|r| self.count() - 1 - r)
    }

    #[must_use]
    pub fn get_by_rank(&self, mut rank: usize) -> Option<(Value, Value)> {
        for sub in &self.sub_maps {
            let n = sub.group_count(2);
            if rank < n {
                let start = rank * 2;
                let score = sub.get(sub.index(start)?).clone();
                let member = sub.get(sub.index(start + 1)?).clone();
                return Some((member, score));
            }
            rank -= n;
        }
        None
    }

    pub fn remove_by_rank(&mut self, rank: usize) -> Option<(Value, Value)> {
        let (member, score) = self.get_by_rank(rank)?;
        self.remove_entry(&member, &score);
        Some((member, score))
    }

    pub fn remove_rank_range(&mut self, start: usize, stop: usize) -> Vec<(Value, Value)> {
        let mut removed = Vec::with_capacity(stop - start + 1);
        for rank in (start..=stop).rev() {
            if let Some(pair) = self.remove_by_rank(rank) {
                removed.push(pair);
            }
        }
        removed.reverse();
        removed
    }

    pub fn remove_score_range(&mut self, range: &ScoreRange) -> Vec<(Value, Value)> {
        let matches: Vec<(Value, Value)> = self.iter().filter(|(_, score)| range.contains(score)).collect();
        for (member, score) in &matches {
            self.remove_entry(member, score);
        }
        matches
    }

    #[must_use]
    pub fn count_by_score(&self, range: &ScoreRange) -> usize {
        self.sub_maps
            .iter()
            .map(|sub| {
                (0..sub.group_count(2))
                    .filter(|&g| range.contains(sub.get(sub.index(g * 2).unwrap())))
                    .count()
            })
            .sum()
    }

    #[must_use]
    pub fn first(&self) -> Option<(Value, Value)> {
        self.get_by_rank(0)
    }

    #[must_use]
    pub fn last(&self) -> Option<(Value, Value)> {
        let n = self.count();
        if n == 0 {
            None
        } else {
            self.get_by_rank(n - 1)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.sub_maps.iter().flat_map(|sub| {
            (0..sub.group_count(2)).map(move |g| {
                let start = g * 2;
                (
                    sub.get(sub.index(start + 1).unwrap()).clone(),
                    sub.get(sub.index(start).unwrap()).clone(),
                )
            })
        })
    }

    #[must_use]
    pub fn sub_map_count(&self) -> usize {
        self.sub_maps.len()
    }
}

/// Members other than byte strings are never interned: there is no
/// canonical byte form to dedup on, and treating them as an empty slice
/// would make every non-string member collide on the same pool entry.
fn member_bytes(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Bytes(b) => Some(b.as_slice()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }

    #[test]
    fn add_and_split_keeps_rank_order_across_many_sub_maps() {
        let mut set = FullSet::new(8);
        for i in 0..200 {
            set.add(m(&format!("m{i:04}")), Value::Double(f64::from(i)), false, false);
        }
        assert!(set.sub_map_count() > 1);
        assert_eq!(set.count(), 200);
        for rank in 0..200 {
            let (member, score) = set.get_by_rank(rank).unwrap();
            assert_eq!(score, Value::Double(f64::from(rank as i64)));
            assert_eq!(set.get_rank(&member), Some(rank));
        }
    }

    #[test]
    fn remove_merges_emptied_sub_maps() {
        let mut set = FullSet::new(4);
        for i in 0..40 {
            set.add(m(&format!("m{i:03}")), Value::Double(f64::from(i)), false, false);
        }
        for i in 0..40 {
            set.remove(&m(&format!("m{i:03}")));
        }
        assert_eq!(set.count(), 0);
        assert_eq!(set.sub_map_count(), 1);
    }

    #[test]
    fn shared_pool_tracks_refcounts_across_attachment() {
        let pool = Rc::new(RefCell::new(AtomPool::new_default()));
        let mut set = FullSet::with_shared_pool(100, Rc::clone(&pool));
        set.add(m("shared"), Value::Double(1.0), false, false);
        assert_eq!(pool.borrow().count(), 1);
        set.remove(&m("shared"));
        assert_eq!(pool.borrow().count(), 0);
    }

    #[test]
    fn nx_and_xx_gating_match_other_tiers() {
        let mut set = FullSet::new(100);
        set.add(m("a"), Value::Double(1.0), false, false);
        let (inserted, _) = set.add(m("a"), Value::Double(2.0), true, false);
        assert!(!inserted);
        assert_eq!(set.get_score(&m("a")), Some(Value::Double(1.0)));
        let (inserted, prev) = set.add(m("ghost"), Value::Double(1.0), false, true);
        assert!(!inserted);
        assert_eq!(prev, None);
    }
}
