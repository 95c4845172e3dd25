//! The generic sorted multimap (spec §3.1 "generic sorted multimap", §4.6;
//! component C6): the same three-tier packed-array shape as the ordered
//! set (component C4), generalized over an arbitrary `elements_per_entry`
//! (the key is always element 0) and a `map_is_set` flag selecting
//! "unique keys, upsert replaces" vs. "duplicate keys allowed, full-width
//! comparison for dedup" (spec §4.1, §4.6).
//!
//! Grounded on the same `original_source/` headers as [`crate::orderedset`]
//! (the ordered set is explicitly "specialised" from this shape per spec
//! §1) plus `multiOrderedSetCommon.h`'s merge-zipper description for
//! `intersect_keys`/`difference_keys`/`copy_keys`. Unlike the ordered
//! set's Full tier, this one has no separate key→value hash index: under
//! `map_is_set = true` multiple entries can legitimately share a key, so a
//! single hash slot per key doesn't apply, and the sub-map range-bound
//! binary search (§4.4.4) already gives sub-linear lookup without one.

use crate::flex::search::SearchOutcome;
use crate::flex::Flex;
use crate::value::Value;

/// Configuration mirroring [`crate::orderedset::OrderedSetConfig`]'s
/// promotion thresholds (spec §4.4.6, applied identically here per §4.6
/// "same three-tier structure as §4.4").
#[derive(Debug, Clone)]
pub struct MultimapConfig {
    pub flex_size_limit: usize,
    pub max_map_size: usize,
}

impl Default for MultimapConfig {
    fn default() -> Self {
        Self {
            flex_size_limit: 4096,
            max_map_size: 4096,
        }
    }
}

enum Tier {
    Small(Flex),
    Medium([Flex; 2]),
    Full { sub_maps: Vec<Flex>, bounds: Vec<Value> },
}

/// A generic sorted multimap of fixed-arity entry groups, unique or
/// duplicate-permitting by key depending on `map_is_set` (spec §4.6).
pub struct Multimap {
    n: usize,
    map_is_set: bool,
    tier: Tier,
    config: MultimapConfig,
}

impl Multimap {
    /// `n` is `elements_per_entry` (must be `>= 1`, element 0 is the key).
    #[must_use]
    pub fn new(n: usize, map_is_set: bool) -> Self {
        Self::with_config(n, map_is_set, MultimapConfig::default())
    }

    #[must_use]
    pub fn with_config(n: usize, map_is_set: bool, config: MultimapConfig) -> Self {
        assert!(n >= 1, "elements_per_entry must be at least 1");
        Self {
            n,
            map_is_set,
            tier: Tier::Small(Flex::new()),
            config,
        }
    }

    #[must_use]
    pub fn elements_per_entry(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn count(&self) -> usize {
        match &self.tier {
            Tier::Small(flex) => flex.group_count(self.n),
            Tier::Medium(maps) => maps[0].group_count(self.n) + maps[1].group_count(self.n),
            Tier::Full { sub_maps, .. } => sub_maps.iter().map(|f| f.group_count(self.n)).sum(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        match &self.tier {
            Tier::Small(flex) => flex.bytes(),
            Tier::Medium(maps) => maps[0].bytes() + maps[1].bytes(),
            Tier::Full { sub_maps, .. } => sub_maps.iter().map(Flex::bytes).sum(),
        }
    }

    #[must_use]
    pub fn tier_name(&self) -> &'static str {
        match &self.tier {
            Tier::Small(_) => "small",
            Tier::Medium(_) => "medium",
            Tier::Full { .. } => "full",
        }
    }

    /// Builds a probe group of width `n` for a key-only comparison
    /// (`compare_len == 1`): only element 0 participates, so the
    /// remaining slots are filled with clones of the key itself — any
    /// value would do, since [`Flex::find_sorted_group`] never looks at
    /// them when `compare_len == 1`.
    fn key_probe(&self, key: &Value) -> Vec<Value> {
        vec![key.clone(); self.n]
    }

    // ---- Insert (spec §4.1 map_is_set contract, §4.6 full-width/surrogate) ----

    /// Inserts `group` (length `n`). Under `map_is_set = false`, an
    /// existing key is overwritten (upsert); under `map_is_set = true`,
    /// only an exact full-width duplicate is overwritten. Returns whether
    /// an existing entry was replaced.
    pub fn insert(&mut self, group: Vec<Value>) -> bool {
        assert_eq!(group.len(), self.n, "entry group must have elements_per_entry elements");
        let replaced = self.insert_into_tier(&group);
        self.check_promotion();
        replaced
    }

    /// `insert_full_width` (spec §4.6): always compares every element,
    /// regardless of this map's `map_is_set` setting, so duplicate keys
    /// with distinct trailing elements are both kept. Entries remain
    /// sorted lexicographically across all `n` elements.
    pub fn insert_full_width(&mut self, group: Vec<Value>) -> bool {
        assert_eq!(group.len(), self.n);
        let replaced = match &mut self.tier {
            Tier::Small(flex) => flex.insert_sorted_group(&group, self.n, true),
            Tier::Medium(maps) => {
                let side = Self::side_for(maps, &group[0]);
                maps[side].insert_sorted_group(&group, self.n, true)
            }
            Tier::Full { sub_maps, bounds } => {
                let idx = Self::sub_map_index_for(bounds, &group[0]);
                sub_maps[idx].insert_sorted_group(&group, self.n, true)
            }
        };
        self.check_promotion();
        replaced
    }

    /// `insert_with_surrogate_key` (spec §4.6): the caller supplies a
    /// synthetic first element (e.g. a sequence counter) so that
    /// otherwise-identical groups can coexist even under `map_is_set =
    /// false` upsert semantics, by construction unique.
    pub fn insert_with_surrogate_key(&mut self, surrogate_key: Value, mut rest: Vec<Value>) -> bool {
        let mut group = Vec::with_capacity(self.n);
        group.push(surrogate_key);
        group.append(&mut rest);
        self.insert(group)
    }

    fn insert_into_tier(&mut self, group: &[Value]) -> bool {
        match &mut self.tier {
            Tier::Small(flex) => flex.insert_sorted_group(group, self.n, self.map_is_set),
            Tier::Medium(maps) => {
                let side = Self::side_for(maps, &group[0]);
                maps[side].insert_sorted_group(group, self.n, self.map_is_set)
            }
            Tier::Full { sub_maps, bounds } => {
                let idx = Self::sub_map_index_for(bounds, &group[0]);
                let replaced = sub_maps[idx].insert_sorted_group(group, self.n, self.map_is_set);
                Self::maybe_split(sub_maps, bounds, idx, self.n, self.config.max_map_size);
                replaced
            }
        }
    }

    fn side_for(maps: &[Flex; 2], key: &Value) -> usize {
        match maps[1].head() {
            Some(e) if key.compare(maps[1].get(e)) != core::cmp::Ordering::Less => 1,
            _ => 0,
        }
    }

    fn sub_map_index_for(bounds: &[Value], key: &Value) -> usize {
        bounds.partition_point(|b| b.compare(key) != core::cmp::Ordering::Greater)
    }

    // ---- Lookup / removal ----------------------------------------------

    /// Finds the first entry group whose key matches, returning a clone
    /// of the full group.
    #[must_use]
    pub fn find(&self, key: &Value) -> Option<Vec<Value>> {
        let probe = self.key_probe(key);
        match &self.tier {
            Tier::Small(flex) => Self::group_at(flex, flex_find(flex, self.n, &probe, 1)?, self.n),
            Tier::Medium(maps) => {
                let side = Self::side_for(maps, key);
                Self::group_at(&maps[side], flex_find(&maps[side], self.n, &probe, 1)?, self.n)
            }
            Tier::Full { sub_maps, bounds } => {
                let idx = Self::sub_map_index_for(bounds, key);
                Self::group_at(&sub_maps[idx], flex_find(&sub_maps[idx], self.n, &probe, 1)?, self.n)
            }
        }
    }

    #[must_use]
    pub fn exists(&self, key: &Value) -> bool {
        self.find(key).is_some()
    }

    fn group_at(flex: &Flex, start: usize, n: usize) -> Option<Vec<Value>> {
        Some((0..n).map(|i| flex.get(flex.index(start + i)?).clone()).collect())
    }

    /// Removes a single entry keyed by `key`. Under `map_is_set = true`
    /// with duplicate keys, `find_sorted_group`'s bidirectional walk from
    /// the cached midpoint (spec §4.1 "Search policy") stops at whichever
    /// matching entry it reaches first, so which of several same-key
    /// entries is removed is unspecified — not necessarily the
    /// lexicographically-first one.
    pub fn remove(&mut self, key: &Value) -> Option<Vec<Value>> {
        let probe = self.key_probe(key);
        match &mut self.tier {
            Tier::Small(flex) => {
                let start = flex_find(flex, self.n, &probe, 1)?;
                let group = Self::group_at(flex, start, self.n);
                flex.delete(start, self.n);
                group
            }
            Tier::Medium(maps) => {
                let side = Self::side_for(maps, key);
                let start = flex_find(&maps[side], self.n, &probe, 1)?;
                let group = Self::group_at(&maps[side], start, self.n);
                maps[side].delete(start, self.n);
                group
            }
            Tier::Full { sub_maps, bounds } => {
                let idx = Self::sub_map_index_for(bounds, key);
                let start = flex_find(&sub_maps[idx], self.n, &probe, 1)?;
                let group = Self::group_at(&sub_maps[idx], start, self.n);
                sub_maps[idx].delete(start, self.n);
                Self::maybe_merge(sub_maps, bounds, idx, self.n, self.config.max_map_size);
                group
            }
        }
    }

    // ---- Promotion (spec §4.4.6, reused verbatim by §4.6) --------------

    fn check_promotion(&mut self) {
        let should_promote = match &self.tier {
            Tier::Small(flex) => flex.group_count(self.n) >= 2 && flex.bytes() > self.config.flex_size_limit,
            Tier::Medium(maps) => {
                let (c0, c1) = (maps[0].group_count(self.n), maps[1].group_count(self.n));
                c0 + c1 >= 2
                    && maps[0].bytes() + maps[1].bytes() > 3 * self.config.flex_size_limit
                    && c0 > 0
                    && c1 > 0
            }
            Tier::Full { .. } => false,
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
        let Tier::Small(mut flex) = core::mem::replace(&mut self.tier, Tier::Small(Flex::new())) else {
            unreachable!("guarded by caller");
        };
        let upper = flex.split_middle(self.n);
        self.tier = Tier::Medium([flex, upper]);
    }

    fn promote_medium_to_full(&mut self) {
        let Tier::Medium(maps) = core::mem::replace(&mut self.tier, Tier::Small(Flex::new())) else {
            unreachable!("guarded by caller");
        };
        let [lower, upper] = maps;
        let bounds = if let Some(e) = upper.head() {
            vec![upper.get(e).clone()]
        } else {
            Vec::new()
        };
        self.tier = Tier::Full {
            sub_maps: vec![lower, upper],
            bounds,
        };
    }

    fn maybe_split(sub_maps: &mut Vec<Flex>, bounds: &mut Vec<Value>, idx: usize, n: usize, max_map_size: usize) {
        let sub = &sub_maps[idx];
        if sub.group_count(n) < 2 || sub.bytes() <= max_map_size {
            return;
        }
        let upper = sub_maps[idx].split_middle(n);
        if upper.is_empty() {
            return;
        }
        let boundary = upper.get(upper.head().expect("non-empty")).clone();
        sub_maps.insert(idx + 1, upper);
        bounds.insert(idx, boundary);
    }

    fn maybe_merge(sub_maps: &mut Vec<Flex>, bounds: &mut Vec<Value>, idx: usize, n: usize, max_map_size: usize) {
        if sub_maps.len() == 1 {
            return;
        }
        if sub_maps[idx].is_empty() {
            sub_maps.remove(idx);
            if idx == 0 {
                bounds.remove(0);
            } else {
                bounds.remove(idx - 1);
            }
            return;
        }
        if idx + 1 >= sub_maps.len() {
            return;
        }
        let combined_bytes = sub_maps[idx].bytes() + sub_maps[idx + 1].bytes();
        if combined_bytes > max_map_size {
            return;
        }
        let right = sub_maps.remove(idx + 1);
        sub_maps[idx].append_array(&right, n);
        bounds.remove(idx);
    }

    /// Iterates every entry group in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        let n = self.n;
        let flexes: Vec<&Flex> = match &self.tier {
            Tier::Small(flex) => vec![flex],
            Tier::Medium(maps) => vec![&maps[0], &maps[1]],
            Tier::Full { sub_maps, .. } => sub_maps.iter().collect(),
        };
        flexes.into_iter().flat_map(move |flex| {
            (0..flex.group_count(n)).map(move |g| {
                let start = g * n;
                (0..n).map(|i| flex.get(flex.index(start + i).unwrap()).clone()).collect()
            })
        })
    }

    /// Keys only, in ascending order (used by the merge-zipper
    /// primitives below).
    fn keys(&self) -> Vec<Value> {
        self.iter().map(|group| group[0].clone()).collect()
    }

    // ---- Key merge-zipper primitives (spec §4.6) ------------------------

    /// `intersect_keys`: keys present in both `self` and `other`, merging
    /// two sorted key sequences in one linear pass.
    #[must_use]
    pub fn intersect_keys(&self, other: &Multimap) -> Vec<Value> {
        let (a, b) = (self.keys(), other.keys());
        let (mut i, mut j) = (0, 0);
        let mut out = Vec::new();
        while i < a.len() && j < b.len() {
            match a[i].compare(&b[j]) {
                core::cmp::Ordering::Less => i += 1,
                core::cmp::Ordering::Greater => j += 1,
                core::cmp::Ordering::Equal => {
                    out.push(a[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }

    /// `difference_keys` (A \ B): keys in `self` not present in `other`
    /// (spec §4.6 "on a < b, emit a and advance a; on a > b, advance b;
    /// on equal, advance both; when B exhausts, drain remaining A").
    #[must_use]
    pub fn difference_keys(&self, other: &Multimap) -> Vec<Value> {
        let (a, b) = (self.keys(), other.keys());
        let (mut i, mut j) = (0, 0);
        let mut out = Vec::new();
        while i < a.len() {
            if j >= b.len() {
                out.push(a[i].clone());
                i += 1;
                continue;
            }
            match a[i].compare(&b[j]) {
                core::cmp::Ordering::Less => {
                    out.push(a[i].clone());
                    i += 1;
                }
                core::cmp::Ordering::Greater => j += 1,
                core::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }

    /// `copy_keys`: the sorted union of both key sequences, deduplicated.
    #[must_use]
    pub fn copy_keys(&self, other: &Multimap) -> Vec<Value> {
        let (a, b) = (self.keys(), other.keys());
        let (mut i, mut j) = (0, 0);
        let mut out = Vec::new();
        while i < a.len() || j < b.len() {
            let take_a = j >= b.len() || (i < a.len() && a[i].compare(&b[j]) != core::cmp::Ordering::Greater);
            if take_a {
                out.push(a[i].clone());
                if j < b.len() && a[i].compare(&b[j]) == core::cmp::Ordering::Equal {
                    j += 1;
                }
                i += 1;
            } else {
                out.push(b[j].clone());
                j += 1;
            }
        }
        out
    }
}

fn flex_find(flex: &Flex, n: usize, probe: &[Value], compare_len: usize) -> Option<usize> {
    match flex.find_sorted_group(n, probe, compare_len) {
        SearchOutcome::Found(start) => Some(start),
        SearchOutcome::NotFound { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }

    #[test]
    fn upsert_by_key_replaces_value() {
        let mut map = Multimap::new(2, false);
        map.insert(vec![k("a"), Value::Int(1)]);
        let replaced = map.insert(vec![k("a"), Value::Int(2)]);
        assert!(replaced);
        assert_eq!(map.find(&k("a")), Some(vec![k("a"), Value::Int(2)]));
        assert_eq!(map.count(), 1);
    }

    #[test]
    fn full_width_set_allows_duplicate_keys() {
        let mut map = Multimap::new(2, true);
        map.insert(vec![k("a"), Value::Int(1)]);
        map.insert(vec![k("a"), Value::Int(2)]);
        assert_eq!(map.count(), 2);
    }

    #[test]
    fn insert_full_width_bypasses_map_is_set_false() {
        let mut map = Multimap::new(2, false);
        map.insert_full_width(vec![k("a"), Value::Int(1)]);
        map.insert_full_width(vec![k("a"), Value::Int(2)]);
        assert_eq!(map.count(), 2);
    }

    #[test]
    fn surrogate_key_keeps_groups_distinct() {
        let mut map = Multimap::new(3, false);
        map.insert_with_surrogate_key(Value::Int(1), vec![k("x"), k("y")]);
        map.insert_with_surrogate_key(Value::Int(2), vec![k("x"), k("y")]);
        assert_eq!(map.count(), 2);
    }

    #[test]
    fn promotes_across_tiers_and_stays_lookupable() {
        let mut map = Multimap::with_config(
            2,
            false,
            MultimapConfig {
                flex_size_limit: 64,
                max_map_size: 128,
            },
        );
        for i in 0..2000 {
            map.insert(vec![k(&format!("k{i:05}")), Value::Int(i)]);
        }
        assert_eq!(map.tier_name(), "full");
        for i in 0..2000 {
            assert_eq!(map.find(&k(&format!("k{i:05}"))), Some(vec![k(&format!("k{i:05}")), Value::Int(i)]));
        }
    }

    #[test]
    fn merge_zipper_primitives_match_classic_semantics() {
        let mut a = Multimap::new(1, false);
        let mut b = Multimap::new(1, false);
        for key in ["a", "b", "c"] {
            a.insert(vec![k(key)]);
        }
        for key in ["b", "c", "d"] {
            b.insert(vec![k(key)]);
        }
        assert_eq!(a.intersect_keys(&b), vec![k("b"), k("c")]);
        assert_eq!(a.difference_keys(&b), vec![k("a")]);
        assert_eq!(a.copy_keys(&b), vec![k("a"), k("b"), k("c"), k("d")]);
    }
}
