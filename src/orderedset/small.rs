//! Small tier (spec §3.5, §4.4.1; component C4): a single [`Flex`] of
//! `(score, member)` pairs, member lookup by linear scan. Grounded on
//! `multiOrderedSetSmall.h`: the header documents the small tier as "no
//! index, find by scanning" up to a small element-count ceiling, matching
//! `original_source/multiOrderedSetCommon.h`'s `mosFindMemberLinear` helper.

use crate::flex::Flex;
use crate::orderedset::common::{compare_entries, normalize_rank, normalize_rank_range, ScoreRange};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct SmallSet {
    flex: Flex,
}

/// Result of a small-tier member scan: the group's starting element index
/// and its score.
struct Found {
    start: usize,
    score: Value,
}

impl SmallSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.flex.group_count(2)
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        self.flex.bytes()
    }

    /// Linear scan for `member` (spec's `mosFindMemberLinear`): small tiers
    /// never build an index, so this is a plain O(n) walk comparing only
    /// the member half of each pair.
    fn find(&self, member: &Value) -> Option<Found> {
        let mut i = 0;
        let n = self.flex.count();
        while i < n {
            let m = self.flex.index(i + 1).map(|e| self.flex.get(e))?;
            if m == member {
                let score = self.flex.get(self.flex.index(i)?).clone();
                return Some(Found { start: i, score });
            }
            i += 2;
        }
        None
    }

    #[must_use]
    pub fn exists(&self, member: &Value) -> bool {
        self.find(member).is_some()
    }

    #[must_use]
    pub fn get_score(&self, member: &Value) -> Option<Value> {
        self.find(member).map(|f| f.score)
    }

    /// Inserts or updates `member` with `score`, applying nx/xx gating the
    /// same way every tier does (spec §6.2 `Add`/`AddNX`/`AddXX`).
    ///
    /// Returns `(inserted_new, previous_score)`.
    pub fn add(&mut self, member: Value, score: Value, nx: bool, xx: bool) -> (bool, Option<Value>) {
        let result = match self.find(&member) {
            Some(found) => {
                if nx {
                    return (false, Some(found.score));
                }
                self.flex.delete(found.start, 2);
                self.flex
                    .insert_sorted_group(&[score, member], 2, true);
                (false, Some(found.score))
            }
            None => {
                if xx {
                    return (false, None);
                }
                self.flex.insert_sorted_group(&[score, member], 2, true);
                (true, None)
            }
        };
        debug_assert!({
            assert_sorted_invariant(&self.flex);
            true
        });
        result
    }

    /// Adds `delta` to `member`'s current score (or `0` if absent), per
    /// spec §6.2 `IncrBy`. Returns the new score.
    pub fn incr_by(&mut self, member: Value, delta: f64) -> Value {
        let current = self.find(&member).map_or(0.0, |f| f.score.to_f64().unwrap_or(0.0));
        let next = Value::Double(current + delta);
        self.add(member, next.clone(), false, false);
        next
    }

    /// Removes `member`, returning its score if it existed.
    pub fn remove(&mut self, member: &Value) -> Option<Value> {
        let found = self.find(member)?;
        self.flex.delete(found.start, 2);
        Some(found.score)
    }

    #[must_use]
    pub fn get_rank(&self, member: &Value) -> Option<usize> {
        self.find(member).map(|f| f.start / 2)
    }

    #[must_use]
    pub fn get_reverse_rank(&self, member: &Value) -> Option<usize> {
        self.get_rank(member).map(|r| self.count() - 1 - r)
    }

    #[must_use]
    pub fn get_by_rank(&self, rank: usize) -> Option<(Value, Value)> {
        let start = rank * 2;
        let score = self.flex.get(self.flex.index(start)?).clone();
        let member = self.flex.get(self.flex.index(start + 1)?).clone();
        Some((member, score))
    }

    pub fn remove_by_rank(&mut self, rank: usize) -> Option<(Value, Value)> {
        let pair = self.get_by_rank(rank)?;
        self.flex.delete(rank * 2, 2);
        Some(pair)
    }

    /// Removes every member in the inclusive rank range `[start, stop]`
    /// (already normalized by the caller via
    /// [`normalize_rank_range`](super::common::normalize_rank_range)).
    pub fn remove_rank_range(&mut self, start: usize, stop: usize) -> Vec<(Value, Value)> {
        let mut removed = Vec::with_capacity((stop - start + 1) * 2);
        for rank in (start..=stop).rev() {
            if let Some(pair) = self.remove_by_rank(rank) {
                removed.push(pair);
            }
        }
        removed.reverse();
        removed
    }

    pub fn remove_score_range(&mut self, range: &ScoreRange) -> Vec<(Value, Value)> {
        let mut removed = Vec::new();
        let mut i = 0;
        while i < self.flex.count() {
            let score = self.flex.get(self.flex.index(i).unwrap()).clone();
            if range.contains(&score) {
                let member = self.flex.get(self.flex.index(i + 1).unwrap()).clone();
                self.flex.delete(i, 2);
                removed.push((member, score));
            } else {
                i += 2;
            }
        }
        removed
    }

    #[must_use]
    pub fn count_by_score(&self, range: &ScoreRange) -> usize {
        let mut count = 0;
        let mut i = 0;
        while i < self.flex.count() {
            let score = self.flex.get(self.flex.index(i).unwrap());
            if range.contains(score) {
                count += 1;
            }
            i += 2;
        }
        count
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

    /// Promotion threshold check (spec §4.4.6): small tiers graduate to
    /// medium once either the element count or the encoded byte size
    /// crosses the configured ceiling.
    #[must_use]
    pub fn exceeds(&self, max_count: usize, max_bytes: usize) -> bool {
        self.count() > max_count || self.bytes() > max_bytes
    }

    /// Iterates `(member, score)` pairs in ascending rank order.
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        (0..self.count()).map(move |r| self.get_by_rank(r).expect("rank in bounds"))
    }

    #[must_use]
    pub fn into_flex(self) -> Flex {
        self.flex
    }

    #[must_use]
    pub fn from_flex(flex: Flex) -> Self {
        Self { flex }
    }
}

fn assert_sorted_invariant(flex: &Flex) {
    let mut prev: Option<(Value, Value)> = None;
    for i in (0..flex.count()).step_by(2) {
        let score = flex.get(flex.index(i).unwrap()).clone();
        let member = flex.get(flex.index(i + 1).unwrap()).clone();
        if let Some((ps, pm)) = &prev {
            debug_assert!(compare_entries(ps, pm, &score, &member).is_le());
        }
        prev = Some((score, member));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }

    #[test]
    fn add_then_lookup_roundtrips() {
        let mut set = SmallSet::new();
        set.add(m("a"), Value::Double(1.0), false, false);
        set.add(m("b"), Value::Double(2.0), false, false);
        assert_eq!(set.get_score(&m("a")), Some(Value::Double(1.0)));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn nx_refuses_update_xx_refuses_insert() {
        let mut set = SmallSet::new();
        set.add(m("a"), Value::Double(1.0), false, false);
        let (inserted, _) = set.add(m("a"), Value::Double(5.0), true, false);
        assert!(!inserted);
        assert_eq!(set.get_score(&m("a")), Some(Value::Double(1.0)));
        let (inserted, prev) = set.add(m("missing"), Value::Double(9.0), false, true);
        assert!(!inserted);
        assert_eq!(prev, None);
        assert!(!set.exists(&m("missing")));
    }

    #[test]
    fn incr_by_accumulates() {
        let mut set = SmallSet::new();
        set.incr_by(m("a"), 2.5);
        let new = set.incr_by(m("a"), 2.5);
        assert_eq!(new, Value::Double(5.0));
    }

    #[test]
    fn rank_and_remove_by_rank_follow_sort_order() {
        let mut set = SmallSet::new();
        for (score, name) in [(3.0, "c"), (1.0, "a"), (2.0, "b")] {
            set.add(m(name), Value::Double(score), false, false);
        }
        assert_eq!(set.get_rank(&m("b")), Some(1));
        let (member, score) = set.remove_by_rank(0).unwrap();
        assert_eq!(member, m("a"));
        assert_eq!(score, Value::Double(1.0));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn score_range_counts_and_removes() {
        let mut set = SmallSet::new();
        for i in 0..5 {
            set.add(m(&format!("m{i}")), Value::Double(f64::from(i)), false, false);
        }
        let range = ScoreRange {
            min: Value::Double(1.0),
            max: Value::Double(3.0),
            min_exclusive: false,
            max_exclusive: false,
        };
        assert_eq!(set.count_by_score(&range), 3);
        let removed = set.remove_score_range(&range);
        assert_eq!(removed.len(), 3);
        assert_eq!(set.count(), 2);
    }
}
