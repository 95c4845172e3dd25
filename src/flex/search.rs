//! Cached-midpoint bidirectional search (spec §4.1 "Search policy").
//!
//! `find_sorted_group` starts at the cached midpoint group and walks
//! forward or backward depending on which side of the midpoint the search
//! key falls on, stopping at an exact match or at the point where the walk
//! has overshot the key's correct position. This is the behavior spec §4.1
//! describes; `Flex` happens to store its entries in a `Vec` rather than a
//! raw byte buffer (see the module doc on `flex::Flex`), but the traversal
//! strategy — not a plain binary search — is preserved because it is the
//! documented, tested contract, not an incidental implementation detail.

use core::cmp::Ordering;

use crate::value::Value;

/// Outcome of a grouped search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// An exact match was found; this is the group's starting element index.
    Found(usize),
    /// No exact match; this is the element index a new group would be
    /// inserted at to keep the array sorted.
    NotFound { insertion_index: usize },
}

/// Compares a group's key (or full group) starting at `group_start` against
/// `probe`, using the first `compare_len` elements (1 for key-only search,
/// `n` for full-width search).
fn compare_group(entries: &[Value], group_start: usize, probe: &[Value], compare_len: usize) -> Ordering {
    for i in 0..compare_len {
        let ord = entries[group_start + i].compare(&probe[i]);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Walks `entries` (grouped in runs of `n`) starting at `mid_group`
/// (a group index, i.e. `mid_group * n` is the element index of that
/// group's first element), looking for `probe` compared over the first
/// `compare_len` elements of each group.
///
/// `entries.len()` must be a multiple of `n`. Returns the element index of
/// the matching or insertion-point group.
pub fn find_sorted_group(
    entries: &[Value],
    n: usize,
    mid_group: usize,
    probe: &[Value],
    compare_len: usize,
) -> SearchOutcome {
    let group_count = entries.len() / n;
    if group_count == 0 {
        return SearchOutcome::NotFound { insertion_index: 0 };
    }
    let mid_group = mid_group.min(group_count - 1);
    let mid_start = mid_group * n;
    match compare_group(entries, mid_start, probe, compare_len) {
        Ordering::Equal => SearchOutcome::Found(mid_start),
        Ordering::Less => {
            // probe > mid: walk forward.
            let mut g = mid_group;
            loop {
                if g + 1 >= group_count {
                    return SearchOutcome::NotFound {
                        insertion_index: (g + 1) * n,
                    };
                }
                g += 1;
                let start = g * n;
                match compare_group(entries, start, probe, compare_len) {
                    Ordering::Equal => return SearchOutcome::Found(start),
                    Ordering::Greater => {
                        return SearchOutcome::NotFound {
                            insertion_index: start,
                        }
                    }
                    Ordering::Less => continue,
                }
            }
        }
        Ordering::Greater => {
            // probe < mid: walk backward.
            let mut g = mid_group;
            loop {
                if g == 0 {
                    return SearchOutcome::NotFound { insertion_index: 0 };
                }
                g -= 1;
                let start = g * n;
                match compare_group(entries, start, probe, compare_len) {
                    Ordering::Equal => return SearchOutcome::Found(start),
                    Ordering::Less => {
                        return SearchOutcome::NotFound {
                            insertion_index: start + n,
                        }
                    }
                    Ordering::Greater => continue,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(xs: &[i64]) -> Vec<Value> {
        xs.iter().map(|&x| Value::Int(x)).collect()
    }

    #[test]
    fn finds_exact_match_from_any_midpoint_start() {
        let entries = ints(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        for mid in 0..5 {
            let outcome = find_sorted_group(&entries, 1, mid, &[Value::Int(7)], 1);
            assert_eq!(outcome, SearchOutcome::Found(6));
        }
    }

    #[test]
    fn reports_insertion_point_when_absent() {
        let entries = ints(&[10, 20, 30, 40]);
        let outcome = find_sorted_group(&entries, 1, 0, &[Value::Int(25)], 1);
        assert_eq!(
            outcome,
            SearchOutcome::NotFound { insertion_index: 2 }
        );
    }

    #[test]
    fn empty_array_inserts_at_zero() {
        let entries: Vec<Value> = Vec::new();
        let outcome = find_sorted_group(&entries, 2, 0, &[Value::Int(1)], 1);
        assert_eq!(outcome, SearchOutcome::NotFound { insertion_index: 0 });
    }

    #[test]
    fn grouped_full_width_search() {
        let entries = vec![
            Value::Int(1),
            Value::Bytes(b"a".to_vec()),
            Value::Int(1),
            Value::Bytes(b"b".to_vec()),
            Value::Int(2),
            Value::Bytes(b"a".to_vec()),
        ];
        let probe = [Value::Int(1), Value::Bytes(b"b".to_vec())];
        let outcome = find_sorted_group(&entries, 2, 0, &probe, 2);
        assert_eq!(outcome, SearchOutcome::Found(2));
    }
}
