//! The ordered-set container (spec §3.5–§3.7, §4.4–§4.5; components C4,
//! C5): a three-tier auto-promoting sorted set mapping unique members to
//! scores, ordered by `(score, member)`.
//!
//! [`OrderedSet`] is the public façade (component C5, the "Tier
//! Dispatcher"). The original engine bit-tags a tier-specific struct
//! pointer with its discriminant so one pointer can stand in for three
//! struct shapes; spec §9 explicitly sanctions the idiomatic substitute for
//! a language with strict aliasing and no pointer tagging: "a plain enum
//! discriminant is adequate". [`Tier`] is that enum. Every mutating method
//! untags (matches), dispatches to the active tier, and re-tags (checks
//! promotion) exactly as the original dispatcher's contract requires,
//! without the `unsafe` pointer arithmetic that contract depended on.

pub mod common;
pub mod full;
pub mod medium;
pub mod small;

use crate::atompool::{AtomPool, Backend};
pub use common::{Aggregate, ScoreRange};
use common::{normalize_rank, normalize_rank_range};
use full::FullSet;
use medium::MediumSet;
use small::SmallSet;

use crate::value::Value;

/// Configuration for an [`OrderedSet`] (spec §4.4.6 `flex_size_limit`,
/// §4.4.2 `max_map_size`, §3.8 atom pool backend choice). A constructor
/// parameter / `Default`-derived struct, not environment or file
/// configuration — this is a library, not a service.
#[derive(Debug, Clone)]
pub struct OrderedSetConfig {
    /// Small tier promotes to Medium once its packed size passes this
    /// (spec §4.4.6). Medium promotes to Full at `3 * flex_size_limit`.
    pub flex_size_limit: usize,
    /// Full tier's per-sub-map split/merge threshold (spec §4.4.2,
    /// §4.4.3).
    pub max_map_size: usize,
    /// If set, the Full tier interns byte-string members into an
    /// [`AtomPool`] of this backend for refcount/sharing accounting
    /// (spec §3.7, §3.10). `None` means no pool is attached.
    pub pool_backend: Option<Backend>,
}

impl Default for OrderedSetConfig {
    fn default() -> Self {
        Self {
            flex_size_limit: 4096,
            max_map_size: 4096,
            pool_backend: None,
        }
    }
}

enum Tier {
    Small(SmallSet),
    Medium(MediumSet),
    Full(FullSet),
}

/// A three-tier auto-promoting ordered set of `(member, score)` pairs,
/// unique by member, ordered by `(score, member)` (spec §3.1–§3.7).
///
/// # Examples
///
/// ```
/// use ordered_set_engine::orderedset::OrderedSet;
/// use ordered_set_engine::value::Value;
///
/// let mut set = OrderedSet::new();
/// set.add(Value::Bytes(b"a".to_vec()), Value::Double(1.0));
/// set.add(Value::Bytes(b"b".to_vec()), Value::Double(2.0));
/// assert_eq!(set.count(), 2);
/// assert_eq!(set.get_score(&Value::Bytes(b"a".to_vec())), Some(Value::Double(1.0)));
/// ```
pub struct OrderedSet {
    tier: Tier,
    config: OrderedSetConfig,
    /// Instance-local PRNG state for `random_members` (spec §9: "not a
    /// true global... treat as a per-instance field").
    rng_state: u64,
}

impl Default for OrderedSet {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(OrderedSetConfig::default())
    }

    #[must_use]
    pub fn new_with_limit(flex_size_limit: usize, max_map_size: usize) -> Self {
        Self::with_config(OrderedSetConfig {
            flex_size_limit,
            max_map_size,
            pool_backend: None,
        })
    }

    #[must_use]
    pub fn new_with_compression(pool_backend: Backend) -> Self {
        Self::with_config(OrderedSetConfig {
            pool_backend: Some(pool_backend),
            ..OrderedSetConfig::default()
        })
    }

    #[must_use]
    pub fn with_config(config: OrderedSetConfig) -> Self {
        Self {
            tier: Tier::Small(SmallSet::new()),
            config,
            rng_state: 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// Deep-copies the set, including its current tier and (for a Full
    /// tier with an owned pool) a fresh independent pool (spec §3.10
    /// "Copy/free must preserve... metadata").
    #[must_use]
    pub fn copy(&self) -> Self {
        let pairs: Vec<_> = self.iter().collect();
        let mut out = Self::with_config(self.config.clone());
        for (member, score) in pairs {
            out.add(member, score);
        }
        out
    }

    /// Clears the set back to an empty Small tier, dropping any owned
    /// pool (spec §3.10 "freed explicitly, freeing all owned arrays, the
    /// hash index (if any), and the pool (if owned)").
    pub fn reset(&mut self) {
        self.tier = Tier::Small(SmallSet::new());
    }

    #[must_use]
    pub fn count(&self) -> usize {
        match &self.tier {
            Tier::Small(s) => s.count(),
            Tier::Medium(s) => s.count(),
            Tier::Full(s) => s.count(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        match &self.tier {
            Tier::Small(s) => s.bytes(),
            Tier::Medium(s) => s.bytes(),
            Tier::Full(s) => s.bytes(),
        }
    }

    #[must_use]
    pub fn tier_name(&self) -> &'static str {
        match &self.tier {
            Tier::Small(_) => "small",
            Tier::Medium(_) => "medium",
            Tier::Full(_) => "full",
        }
    }

    // ---- Insert/Upsert (spec §4.4.1) ----------------------------------

    /// Upserts `member` with `score`. Returns `true` if this replaced an
    /// existing entry, `false` if it was a fresh insert.
    pub fn add(&mut self, member: Value, score: Value) -> bool {
        let (_, previous) = self.add_inner(member, score, false, false);
        previous.is_some()
    }

    /// Inserts only if `member` is absent. Returns whether it was
    /// inserted.
    pub fn add_nx(&mut self, member: Value, score: Value) -> bool {
        let (inserted, _) = self.add_inner(member, score, true, false);
        inserted
    }

    /// Updates only if `member` is present. Returns whether it was
    /// updated.
    pub fn add_xx(&mut self, member: Value, score: Value) -> bool {
        let (_, previous) = self.add_inner(member, score, false, true);
        previous.is_some()
    }

    /// Upserts `member` with `score`, returning the previous score if one
    /// existed.
    pub fn add_get_previous(&mut self, member: Value, score: Value) -> Option<Value> {
        let (_, previous) = self.add_inner(member, score, false, false);
        previous
    }

    /// Adds `delta` (double precision, spec §4.4.7) to `member`'s current
    /// score, initializing to `delta` if absent. Fails (`None`) only if
    /// the existing stored score cannot be coerced to a number.
    pub fn incr_by(&mut self, member: Value, delta: f64) -> Option<Value> {
        if let Some(existing) = self.get_score(&member) {
            if !existing.is_numeric() {
                return None;
            }
        }
        let new_score = match &mut self.tier {
            Tier::Small(s) => s.incr_by(member, delta),
            Tier::Medium(s) => s.incr_by(member, delta),
            Tier::Full(s) => s.incr_by(member, delta),
        };
        self.check_promotion();
        Some(new_score)
    }

    fn add_inner(&mut self, member: Value, score: Value, nx: bool, xx: bool) -> (bool, Option<Value>) {
        let result = match &mut self.tier {
            Tier::Small(s) => s.add(member, score, nx, xx),
            Tier::Medium(s) => s.add(member, score, nx, xx),
            Tier::Full(s) => s.add(member, score, nx, xx),
        };
        self.check_promotion();
        result
    }

    /// Re-tags after a potential size-triggered promotion (spec §4.4.6,
    /// the dispatcher's "after every insertion" check).
    fn check_promotion(&mut self) {
        let should_promote = match &self.tier {
            Tier::Small(s) => s.count() >= 2 && s.bytes() > self.config.flex_size_limit,
            Tier::Medium(s) => {
                let (c0, c1) = s.half_counts();
                s.count() >= 2 && s.bytes() > 3 * self.config.flex_size_limit && c0 > 0 && c1 > 0
            }
            Tier::Full(_) => false,
        };
        if !should_promote {
            return;
        }
        let is_small = matches!(self.tier, Tier::Small(_));
        if is_small {
            self.promote_small_to_medium();
        } else {
            self.promote_medium_to_full();
        }
    }

    fn promote_small_to_medium(&mut self) {
        let Tier::Small(small) = core::mem::replace(&mut self.tier, Tier::Small(SmallSet::new())) else {
            unreachable!("guarded by caller");
        };
        let flex = small.into_flex();
        let mut medium = MediumSet::new();
        medium.seed_from_single(flex);
        self.tier = Tier::Medium(medium);
    }

    fn promote_medium_to_full(&mut self) {
        let Tier::Medium(medium) = core::mem::replace(&mut self.tier, Tier::Small(SmallSet::new())) else {
            unreachable!("guarded by caller");
        };
        let mut full = match self.config.pool_backend {
            Some(backend) => FullSet::with_owned_pool(self.config.max_map_size, AtomPool::new(backend)),
            None => FullSet::new(self.config.max_map_size),
        };
        for (member, score) in medium.into_sorted_pairs() {
            full.add(member, score, false, false);
        }
        self.tier = Tier::Full(full);
    }

    // ---- Deletion (spec §6.2 "Writes") --------------------------------

    pub fn remove(&mut self, member: &Value) -> bool {
        self.remove_get_score(member).is_some()
    }

    pub fn remove_get_score(&mut self, member: &Value) -> Option<Value> {
        match &mut self.tier {
            Tier::Small(s) => s.remove(member),
            Tier::Medium(s) => s.remove(member),
            Tier::Full(s) => s.remove(member),
        }
    }

    pub fn remove_range_by_score(&mut self, range: &ScoreRange) -> usize {
        let removed = match &mut self.tier {
            Tier::Small(s) => s.remove_score_range(range),
            Tier::Medium(s) => s.remove_score_range(range),
            Tier::Full(s) => s.remove_score_range(range),
        };
        removed.len()
    }

    /// Removes every member whose rank falls in the inclusive range
    /// `[start, stop]` after normalization (spec §6.2 rank semantics);
    /// returns the number removed (`0` if the normalized range is empty).
    pub fn remove_range_by_rank(&mut self, start: i64, stop: i64) -> usize {
        let Some((start, stop)) = normalize_rank_range(start, stop, self.count()) else {
            return 0;
        };
        let removed = match &mut self.tier {
            Tier::Small(s) => s.remove_rank_range(start, stop),
            Tier::Medium(s) => s.remove_rank_range(start, stop),
            Tier::Full(s) => s.remove_rank_range(start, stop),
        };
        removed.len()
    }

    /// Removes and returns up to `n` members with the lowest scores, in
    /// ascending order.
    pub fn pop_min(&mut self, n: usize) -> Vec<(Value, Value)> {
        let n = n.min(self.count());
        if n == 0 {
            return Vec::new();
        }
        self.remove_and_collect(0, n - 1)
    }

    /// Removes and returns up to `n` members with the highest scores, in
    /// descending order.
    pub fn pop_max(&mut self, n: usize) -> Vec<(Value, Value)> {
        let count = self.count();
        let n = n.min(count);
        if n == 0 {
            return Vec::new();
        }
        let mut out = self.remove_and_collect(count - n, count - 1);
        out.reverse();
        out
    }

    fn remove_and_collect(&mut self, start: usize, stop: usize) -> Vec<(Value, Value)> {
        match &mut self.tier {
            Tier::Small(s) => s.remove_rank_range(start, stop),
            Tier::Medium(s) => s.remove_rank_range(start, stop),
            Tier::Full(s) => s.remove_rank_range(start, stop),
        }
    }

    // ---- Reads (spec §6.2 "Reads") ------------------------------------

    #[must_use]
    pub fn exists(&self, member: &Value) -> bool {
        match &self.tier {
            Tier::Small(s) => s.exists(member),
            Tier::Medium(s) => s.exists(member),
            Tier::Full(s) => s.exists(member),
        }
    }

    #[must_use]
    pub fn get_score(&self, member: &Value) -> Option<Value> {
        match &self.tier {
            Tier::Small(s) => s.get_score(member),
            Tier::Medium(s) => s.get_score(member),
            Tier::Full(s) => s.get_score(member),
        }
    }

    #[must_use]
    pub fn get_rank(&self, member: &Value) -> Option<usize> {
        match &self.tier {
            Tier::Small(s) => s.get_rank(member),
            Tier::Medium(s) => s.get_rank(member),
            Tier::Full(s) => s.get_rank(member),
        }
    }

    #[must_use]
    pub fn get_reverse_rank(&self, member: &Value) -> Option<usize> {
        match &self.tier {
            Tier::Small(s) => s.get_reverse_rank(member),
            Tier::Medium(s) => s.get_reverse_rank(member),
            Tier::Full(s) => s.get_reverse_rank(member),
        }
    }

    /// `rank` may be negative (counts from the end, spec §6.2).
    #[must_use]
    pub fn get_by_rank(&self, rank: i64) -> Option<(Value, Value)> {
        let rank = normalize_rank(rank, self.count())?;
        match &self.tier {
            Tier::Small(s) => s.get_by_rank(rank),
            Tier::Medium(s) => s.get_by_rank(rank),
            Tier::Full(s) => s.get_by_rank(rank),
        }
    }

    #[must_use]
    pub fn count_by_score(&self, range: &ScoreRange) -> usize {
        match &self.tier {
            Tier::Small(s) => s.count_by_score(range),
            Tier::Medium(s) => s.count_by_score(range),
            Tier::Full(s) => s.count_by_score(range),
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<(Value, Value)> {
        match &self.tier {
            Tier::Small(s) => s.first(),
            Tier::Medium(s) => s.first(),
            Tier::Full(s) => s.first(),
        }
    }

    #[must_use]
    pub fn last(&self) -> Option<(Value, Value)> {
        match &self.tier {
            Tier::Small(s) => s.last(),
            Tier::Medium(s) => s.last(),
            Tier::Full(s) => s.last(),
        }
    }

    /// Samples `count` members uniformly at random, with replacement
    /// (spec §6.2 `random_members`; §9 "instance-local seed... treat as a
    /// per-instance field" — the seed lives on this façade rather than a
    /// process-global, since it is only ever consulted through `&mut
    /// self`).
    pub fn random_members(&mut self, count: usize) -> Vec<(Value, Value)> {
        let n = self.count();
        if n == 0 {
            return Vec::new();
        }
        (0..count)
            .filter_map(|_| {
                let rank = (self.next_rng() as usize) % n;
                self.get_by_rank(rank as i64)
            })
            .collect()
    }

    /// xorshift64*, same construction as `HashIndex::next_rng` (spec §9:
    /// no `rand` dependency for a single non-cryptographic internal use).
    fn next_rng(&mut self) -> u64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    // ---- Iteration (spec §6.2 "Iteration") ----------------------------

    /// Iterates every `(member, score)` pair in ascending rank order. The
    /// full sequence is materialized up front: every tier already walks
    /// its packed arrays in O(n) to do this, and a snapshot avoids tying
    /// an iterator's lifetime to tier-swapping mutations (which, unlike
    /// the hash index's safe iterators, this facade does not attempt to
    /// interleave with promotion).
    #[must_use]
    pub fn iter(&self) -> std::vec::IntoIter<(Value, Value)> {
        let pairs: Vec<_> = match &self.tier {
            Tier::Small(s) => s.iter().collect(),
            Tier::Medium(s) => s.iter().collect(),
            Tier::Full(s) => s.iter().collect(),
        };
        pairs.into_iter()
    }

    #[must_use]
    pub fn iterator_init(&self, forward: bool) -> OrderedSetIter {
        let mut pairs: Vec<_> = self.iter().collect();
        if !forward {
            pairs.reverse();
        }
        OrderedSetIter { pairs, cursor: 0 }
    }

    /// Positions an iterator at the first entry with score `>= score`
    /// (forward) or the last entry with score `<= score` (backward).
    /// Returns `(iterator, found)` where `found` is whether an entry with
    /// score exactly equal to `score` exists anywhere in the set.
    #[must_use]
    pub fn iterator_init_at_score(&self, score: &Value, forward: bool) -> (OrderedSetIter, bool) {
        let all: Vec<_> = self.iter().collect();
        let found = all.iter().any(|(_, s)| s == score);
        let start = if forward {
            all.iter().position(|(_, s)| s.compare(score) != core::cmp::Ordering::Less)
        } else {
            all.iter().rposition(|(_, s)| s.compare(score) != core::cmp::Ordering::Greater)
        };
        let pairs = match start {
            Some(i) if forward => all[i..].to_vec(),
            Some(i) => {
                let mut slice = all[..=i].to_vec();
                slice.reverse();
                slice
            }
            None => Vec::new(),
        };
        (OrderedSetIter { pairs, cursor: 0 }, found)
    }

    /// Positions an iterator starting at `rank` (may be negative). Returns
    /// `(iterator, found)` where `found` indicates `rank` was in bounds.
    #[must_use]
    pub fn iterator_init_at_rank(&self, rank: i64, forward: bool) -> (OrderedSetIter, bool) {
        let count = self.count();
        let Some(normalized) = normalize_rank(rank, count) else {
            return (OrderedSetIter { pairs: Vec::new(), cursor: 0 }, false);
        };
        let all: Vec<_> = self.iter().collect();
        let pairs = if forward {
            all[normalized..].to_vec()
        } else {
            let mut slice = all[..=normalized].to_vec();
            slice.reverse();
            slice
        };
        (OrderedSetIter { pairs, cursor: 0 }, true)
    }

    // ---- Set algebra (spec §4.4.8) ------------------------------------

    /// Unions `sets`, combining each member's weighted score with
    /// `aggregate`. Weights default to `1.0` when `weights` is `None`.
    #[must_use]
    pub fn union(sets: &[&OrderedSet], weights: Option<&[f64]>, aggregate: Aggregate) -> OrderedSet {
        let mut result = OrderedSet::new();
        for (i, set) in sets.iter().enumerate() {
            let weight = weights.and_then(|w| w.get(i)).copied().unwrap_or(1.0);
            for (member, score) in set.iter() {
                let weighted = score.to_f64().unwrap_or(0.0) * weight;
                match result.get_score(&member) {
                    Some(existing) => {
                        let combined = aggregate.combine(existing.to_f64().unwrap_or(0.0), weighted);
                        result.add(member, Value::Double(combined));
                    }
                    None => {
                        result.add(member, Value::Double(weighted));
                    }
                }
            }
        }
        result
    }

    /// Intersects `sets`: a member survives only if present in every set.
    #[must_use]
    pub fn intersect(sets: &[&OrderedSet], weights: Option<&[f64]>, aggregate: Aggregate) -> OrderedSet {
        let mut result = OrderedSet::new();
        let Some((smallest_idx, smallest)) = sets
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.count())
        else {
            return result;
        };
        'member: for (member, base_score) in smallest.iter() {
            let base_weight = weights.and_then(|w| w.get(smallest_idx)).copied().unwrap_or(1.0);
            let mut combined = base_score.to_f64().unwrap_or(0.0) * base_weight;
            for (i, set) in sets.iter().enumerate() {
                if i == smallest_idx {
                    continue;
                }
                let Some(score) = set.get_score(&member) else {
                    continue 'member;
                };
                let weight = weights.and_then(|w| w.get(i)).copied().unwrap_or(1.0);
                combined = aggregate.combine(combined, score.to_f64().unwrap_or(0.0) * weight);
            }
            result.add(member, Value::Double(combined));
        }
        result
    }

    /// Copies `sets[0]` and removes every member appearing in any
    /// subsequent set.
    #[must_use]
    pub fn difference(sets: &[&OrderedSet]) -> OrderedSet {
        let Some(first) = sets.first() else {
            return OrderedSet::new();
        };
        let mut result = first.copy();
        for other in &sets[1..] {
            for (member, _) in other.iter() {
                result.remove(&member);
            }
        }
        result
    }
}

/// Cursor over a materialized iteration snapshot (spec §6.2
/// `iterator_next`).
pub struct OrderedSetIter {
    pairs: Vec<(Value, Value)>,
    cursor: usize,
}

impl OrderedSetIter {
    pub fn iterator_next(&mut self) -> Option<(Value, Value)> {
        let item = self.pairs.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(item)
    }
}

impl Iterator for OrderedSetIter {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.iterator_next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }
    fn d(v: f64) -> Value {
        Value::Double(v)
    }

    /// S1: basic insert + iteration + rank + score.
    #[test]
    fn s1_basic_insert_and_order() {
        let mut set = OrderedSet::new();
        set.add(m("b"), d(2.0));
        set.add(m("a"), d(1.0));
        set.add(m("c"), d(1.5));
        assert_eq!(set.count(), 3);
        let got: Vec<_> = set.iter().collect();
        assert_eq!(got, vec![(m("a"), d(1.0)), (m("c"), d(1.5)), (m("b"), d(2.0))]);
        assert_eq!(set.get_rank(&m("c")), Some(1));
        assert_eq!(set.get_score(&m("b")), Some(d(2.0)));
    }

    /// S2: upsert replaces in place rather than growing count.
    #[test]
    fn s2_upsert_does_not_grow_count() {
        let mut set = OrderedSet::new();
        assert!(!set.add(m("k"), d(10.0)));
        assert!(set.add(m("k"), d(99.0)));
        assert_eq!(set.count(), 1);
        assert_eq!(set.get_score(&m("k")), Some(d(99.0)));
    }

    /// S3: nx/xx gating.
    #[test]
    fn s3_nx_xx_gating() {
        let mut set = OrderedSet::new();
        assert!(set.add_nx(m("m"), d(1.0)));
        assert!(!set.add_nx(m("m"), d(2.0)));
        assert_eq!(set.get_score(&m("m")), Some(d(1.0)));
        assert!(set.add_xx(m("m"), d(3.0)));
        assert_eq!(set.get_score(&m("m")), Some(d(3.0)));
        assert!(!set.add_xx(m("z"), d(9.0)));
        assert_eq!(set.count(), 1);
    }

    /// S4: forced promotion to Full via a tiny limit, scaled to 5000 keys.
    #[test]
    fn s4_promotes_to_full_under_load() {
        let mut set = OrderedSet::new_with_limit(64, 256);
        for i in 0..5000 {
            set.add(m(&format!("key{i}")), d(f64::from(i)));
        }
        assert_eq!(set.tier_name(), "full");
        for i in 0..5000 {
            let member = m(&format!("key{i}"));
            assert_eq!(set.get_score(&member), Some(d(f64::from(i))));
            assert_eq!(set.get_by_rank(i64::from(i)), Some((member, d(f64::from(i)))));
        }
        let forward: Vec<_> = set.iter().map(|(_, s)| s).collect();
        let mut sorted = forward.clone();
        sorted.sort_by(Value::compare);
        assert_eq!(forward, sorted);
    }

    /// S5: exclusive score-range removal.
    #[test]
    fn s5_remove_range_by_score_exclusive_bounds() {
        let mut set = OrderedSet::new();
        for i in 0..10 {
            set.add(m(&format!("m{i}")), d(f64::from(i * 10)));
        }
        let removed = set.remove_range_by_score(&ScoreRange {
            min: d(20.0),
            max: d(50.0),
            min_exclusive: true,
            max_exclusive: true,
        });
        assert_eq!(removed, 2);
        assert_eq!(set.count(), 8);
    }

    /// S6: union with default weights and SUM aggregate.
    #[test]
    fn s6_union_sum_aggregate() {
        let mut a = OrderedSet::new();
        a.add(m("a"), d(1.0));
        a.add(m("b"), d(2.0));
        let mut b = OrderedSet::new();
        b.add(m("b"), d(3.0));
        b.add(m("c"), d(4.0));
        let result = OrderedSet::union(&[&a, &b], None, Aggregate::Sum);
        assert_eq!(result.count(), 3);
        assert_eq!(result.get_score(&m("a")), Some(d(1.0)));
        assert_eq!(result.get_score(&m("b")), Some(d(5.0)));
        assert_eq!(result.get_score(&m("c")), Some(d(4.0)));
    }

    /// S7: pop_min returns ascending lowest-score members.
    #[test]
    fn s7_pop_min_order() {
        let mut set = OrderedSet::new();
        for i in 0..5 {
            set.add(m(&format!("m{i}")), d(f64::from(i * 10)));
        }
        let popped = set.pop_min(2);
        assert_eq!(popped, vec![(m("m0"), d(0.0)), (m("m1"), d(10.0))]);
        assert_eq!(set.count(), 3);
    }

    /// S8: iterator_init_at_score positions forward iteration correctly.
    #[test]
    fn s8_iterator_init_at_score() {
        let mut set = OrderedSet::new();
        set.add(m("a"), d(0.0));
        set.add(m("b"), d(10.0));
        set.add(m("c"), d(20.0));
        set.add(m("d"), d(30.0));
        let (mut iter, found) = set.iterator_init_at_score(&d(15.0), true);
        assert!(!found);
        let rest: Vec<_> = iter.by_ref().collect();
        assert_eq!(rest, vec![(m("c"), d(20.0)), (m("d"), d(30.0))]);
    }

    #[test]
    fn promotion_preserves_every_member() {
        let mut set = OrderedSet::new_with_limit(32, 128);
        for i in 0..300 {
            set.add(m(&format!("member-{i:04}")), d(f64::from(i)));
        }
        for i in 0..300 {
            assert!(set.exists(&m(&format!("member-{i:04}"))));
        }
    }

    #[test]
    fn difference_removes_members_present_in_later_sets() {
        let mut a = OrderedSet::new();
        a.add(m("a"), d(1.0));
        a.add(m("b"), d(2.0));
        a.add(m("c"), d(3.0));
        let mut b = OrderedSet::new();
        b.add(m("b"), d(0.0));
        let result = OrderedSet::difference(&[&a, &b]);
        assert_eq!(result.count(), 2);
        assert!(!result.exists(&m("b")));
    }
}
