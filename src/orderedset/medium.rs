//! Medium tier (spec §3.6, §4.4.2; component C4): two [`Flex`] halves,
//! `map[0]` holding the lower-scoring half and `map[1]` the upper-scoring
//! half, split at a boundary score rather than a fixed element count. No
//! hash index yet — lookup is a linear scan of whichever half the probed
//! score could fall in, same as the small tier but over half the elements
//! on average.
//!
//! Grounded on `multiOrderedSetMedium.h`'s two-array design note ("a single
//! boundary split avoids the index-maintenance cost of full... while still
//! halving the average scan length of the small representation") and the
//! "rebalance when one side empties" remark that motivates
//! [`MediumSet::rebalance`] below.

use crate::flex::Flex;
use crate::orderedset::common::ScoreRange;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct MediumSet {
    maps: [Flex; 2],
}

struct Found {
    side: usize,
    start: usize,
    score: Value,
}

impl MediumSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.maps[0].group_count(2) + self.maps[1].group_count(2)
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        self.maps[0].bytes() + self.maps[1].bytes()
    }

    /// The score separating `map[0]` from `map[1]`: the lowest score
    /// present in `map[1]`, or `None` if every element currently lives in
    /// `map[0]` (everything routes there until it grows past the split
    /// threshold).
    fn boundary(&self) -> Option<Value> {
        self.maps[1].head().map(|e| self.maps[1].get(e).clone())
    }

    fn side_for_score(&self, score: &Value) -> usize {
        match self.boundary() {
            Some(b) if score.compare(&b) != core::cmp::Ordering::Less => 1,
            _ => 0,
        }
    }

    fn find_in(&self, side: usize, member: &Value) -> Option<Found> {
        let flex = &self.maps[side];
        let mut i = 0;
        while i < flex.count() {
            let m = flex.get(flex.index(i + 1)?);
            if m == member {
                return Some(Found {
                    side,
                    start: i,
                    score: flex.get(flex.index(i)?).clone(),
                });
            }
            i += 2;
        }
        None
    }

    fn find(&self, member: &Value) -> Option<Found> {
        self.find_in(0, member).or_else(|| self.find_in(1, member))
    }

    #[must_use]
    pub fn exists(&self, member: &Value) -> bool {
        self.find(member).is_some()
    }

    #[must_use]
    pub fn get_score(&self, member: &Value) -> Option<Value> {
        self.find(member).map(|f| f.score)
    }

    pub fn add(&mut self, member: Value, score: Value, nx: bool, xx: bool) -> (bool, Option<Value>) {
        match self.find(&member) {
            Some(found) => {
                if nx {
                    return (false, Some(found.score));
                }
                self.maps[found.side].delete(found.start, 2);
                self.rebalance();
                let side = self.side_for_score(&score);
                self.maps[side].insert_sorted_group(&[score, member], 2, true);
                (false, Some(found.score))
            }
            None => {
                if xx {
                    return (false, None);
                }
                let side = self.side_for_score(&score);
                self.maps[side].insert_sorted_group(&[score, member], 2, true);
                (true, None)
            }
        }
    }

    pub fn incr_by(&mut self, member: Value, delta: f64) -> Value {
        let current = self.find(&member).map_or(0.0, |f| f.score.to_f64().unwrap_or(0.0));
        let next = Value::Double(current + delta);
        self.add(member, next.clone(), false, false);
        next
    }

    pub fn remove(&mut self, member: &Value) -> Option<Value> {
        let found = self.find(member)?;
        self.maps[found.side].delete(found.start, 2);
        self.rebalance();
        Some(found.score)
    }

    /// Restores the invariant that `map[0]` is non-empty whenever any
    /// element exists, by swapping the two halves if `map[0]` emptied out
    /// (e.g. after removing its sole element). Without this, every future
    /// insert would see an empty `map[0]` boundary-compare as "always goes
    /// to map[1]", silently degrading back into a single-array tier.
    fn rebalance(&mut self) {
        if self.maps[0].is_empty() && !self.maps[1].is_empty() {
            self.maps.swap(0, 1);
        }
    }

    #[must_use]
    pub fn get_rank(&self, member: &Value) -> Option<usize> {
        let found = self.find(member)?;
        let base = if found.side == 1 { self.maps[0].group_count(2) } else { 0 };
        Some(base + found.start / 2)
    }

    #[must_use]
    pub fn get_reverse_rank(&self, member: &Value) -> Option<usize> {
        self.get_rank(member).map(|r| self.count() - 1 - r)
    }

    #[must_use]
    pub fn get_by_rank(&self, rank: usize) -> Option<(Value, Value)> {
        let lower = self.maps[0].group_count(2);
        let (side, local_rank) = if rank < lower { (0, rank) } else { (1, rank - lower) };
        let start = local_rank * 2;
        let flex = &self.maps[side];
        let score = flex.get(flex.index(start)?).clone();
        let member = flex.get(flex.index(start + 1)?).clone();
        Some((member, score))
    }

    pub fn remove_by_rank(&mut self, rank: usize) -> Option<(Value, Value)> {
        let lower = self.maps[0].group_count(2);
        let (side, local_rank) = if rank < lower { (0, rank) } else { (1, rank - lower) };
        let pair = self.get_by_rank(rank)?;
        self.maps[side].delete(local_rank * 2, 2);
        self.rebalance();
        Some(pair)
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
        let mut removed = Vec::new();
        for side in [0usize, 1] {
            let mut i = 0;
            while i < self.maps[side].count() {
                let flex = &self.maps[side];
                let score = flex.get(flex.index(i).unwrap()).clone();
                if range.contains(&score) {
                    let member = flex.get(flex.index(i + 1).unwrap()).clone();
                    self.maps[side].delete(i, 2);
                    removed.push((member, score));
                } else {
                    i += 2;
                }
            }
        }
        self.rebalance();
        removed
    }

    #[must_use]
    pub fn count_by_score(&self, range: &ScoreRange) -> usize {
        [0usize, 1]
            .into_iter()
            .map(|side| {
                let flex = &self.maps[side];
                (0..flex.count())
                    .step_by(2)
                    .filter(|&i| range.contains(flex.get(flex.index(i).unwrap())))
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

    #[must_use]
    pub fn exceeds(&self, max_count: usize, max_bytes: usize) -> bool {
        self.count() > max_count || self.bytes() > max_bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        (0..self.count()).map(move |r| self.get_by_rank(r).expect("rank in bounds"))
    }

    /// Count of element groups on each side; used by the dispatcher's
    /// promotion check (spec §4.4.6: "Medium → Full when... both
    /// sub-maps are non-empty").
    #[must_use]
    pub fn half_counts(&self) -> (usize, usize) {
        (self.maps[0].group_count(2), self.maps[1].group_count(2))
    }

    /// Seeds a freshly promoted medium tier by splitting `flex` (a small
    /// tier's single array) at its midpoint into `map[0]`/`map[1]` (spec
    /// §4.4.6: "Promotion splits the single array at its midpoint").
    pub fn seed_from_single(&mut self, mut flex: Flex) {
        let upper = flex.split_middle(2);
        self.maps = [flex, upper];
    }

    /// Splits into `max_sub_map_size`-ish chunks for promotion into the
    /// full tier's sub-maps (spec §4.4.3 "an initial full tier is built by
    /// walking the demoted tier's elements in rank order").
    #[must_use]
    pub fn into_sorted_pairs(self) -> Vec<(Value, Value)> {
        let mut out: Vec<_> = self.maps[0]
            .iter()
            .cloned()
            .chain(self.maps[1].iter().cloned())
            .collect::<Vec<_>>()
            .chunks(2)
            .map(|c| (c[1].clone(), c[0].clone()))
            .collect();
        out.sort_by(|a, b| a.1.compare(&b.1).then_with(|| a.0.compare(&b.0)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }

    #[test]
    fn splits_across_both_halves_and_ranks_consistently() {
        let mut set = MediumSet::new();
        for i in 0..20 {
            set.add(m(&format!("m{i}")), Value::Double(f64::from(i)), false, false);
        }
        assert_eq!(set.count(), 20);
        for rank in 0..20 {
            let (member, score) = set.get_by_rank(rank).unwrap();
            assert_eq!(score, Value::Double(f64::from(rank as i64)));
            assert_eq!(set.get_rank(&member), Some(rank));
        }
    }

    #[test]
    fn removing_everything_from_one_side_rebalances() {
        let mut set = MediumSet::new();
        set.add(m("a"), Value::Double(1.0), false, false);
        set.add(m("b"), Value::Double(2.0), false, false);
        set.remove(&m("a"));
        assert!(set.exists(&m("b")));
        assert_eq!(set.get_by_rank(0), Some((m("b"), Value::Double(2.0))));
    }

    #[test]
    fn incr_by_moves_member_across_boundary_if_needed() {
        let mut set = MediumSet::new();
        for i in 0..10 {
            set.add(m(&format!("m{i}")), Value::Double(f64::from(i)), false, false);
        }
        let new = set.incr_by(m("m0"), 100.0);
        assert_eq!(new, Value::Double(100.0));
        assert_eq!(set.get_rank(&m("m0")), Some(9));
    }
}
