// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The SortedSet container: a bijection member→score
//! plus an ordered index by `(score asc, member asc)`.
//!
//! The ordered index is a `BTreeSet<(Score, Bytes)>`. `std`'s `BTreeSet`
//! gives insert/remove/contains in `O(log n)` but has no order-statistics
//! support, so rank lookups and rank-range slices walk the tree in
//! `O(rank)` rather than the `O(log n)` a from-scratch skip-list or
//! order-statistics tree would give; this is recorded as a deliberate,
//! documented simplification in DESIGN.md.

use std::{cmp::Ordering, collections::BTreeSet};

use bytes::Bytes;

use crate::error::ServerError;

/// A finite `f64` wrapper giving sorted sets a total order. `ZADD`/`ZINCRBY`
/// reject NaN before it ever reaches this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(pub f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

pub enum AddOutcome {
    Added,
    Updated,
}

#[derive(Debug, Clone, Default)]
pub struct SortedSetValue {
    scores: std::collections::HashMap<Bytes, Score>,
    order: BTreeSet<(Score, Bytes)>,
}

impl SortedSetValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).map(|s| s.0)
    }

    pub fn add(&mut self, score: f64, member: Bytes) -> Result<AddOutcome, ServerError> {
        if score.is_nan() {
            return Err(ServerError::NotAFloat);
        }
        let score = Score(score);
        match self.scores.insert(member.clone(), score) {
            Some(old) => {
                self.order.remove(&(old, member.clone()));
                self.order.insert((score, member));
                Ok(AddOutcome::Updated)
            },
            None => {
                self.order.insert((score, member));
                Ok(AddOutcome::Added)
            },
        }
    }

    pub fn rem(&mut self, members: &[Bytes]) -> usize {
        let mut removed = 0;
        for m in members {
            if let Some(score) = self.scores.remove(m.as_ref()) {
                self.order.remove(&(score, m.clone()));
                removed += 1;
            }
        }
        removed
    }

    pub fn incr_by(&mut self, member: Bytes, delta: f64) -> Result<f64, ServerError> {
        let current = self.scores.get(member.as_ref()).map(|s| s.0).unwrap_or(0.0);
        let next = current + delta;
        if next.is_nan() {
            return Err(ServerError::NotAFloat);
        }
        self.add(next, member)?;
        Ok(next)
    }

    /// Zero-based rank in ascending `(score, member)` order, or the reverse
    /// total order when `reverse` is true.
    pub fn rank(&self, member: &[u8], reverse: bool) -> Option<usize> {
        let score = *self.scores.get(member)?;
        let pos = self
            .order
            .range(..(score, Bytes::copy_from_slice(member)))
            .count();
        if reverse {
            Some(self.order.len() - 1 - pos)
        } else {
            Some(pos)
        }
    }

    /// Inclusive rank-range slice, matching the total (score asc, member
    /// asc) order or its reverse.
    pub fn range_by_rank(
        &self,
        start: i64,
        stop: i64,
        reverse: bool,
    ) -> Vec<(Bytes, f64)> {
        let len = self.order.len();
        if len == 0 {
            return Vec::new();
        }
        let Some((lo, hi)) = clamp_range(len as i64, start, stop) else {
            return Vec::new();
        };
        let iter: Box<dyn Iterator<Item = &(Score, Bytes)>> = if reverse {
            Box::new(self.order.iter().rev())
        } else {
            Box::new(self.order.iter())
        };
        iter.skip(lo)
            .take(hi - lo + 1)
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }

    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(Bytes, f64)> {
        self.order
            .iter()
            .filter(|(s, _)| s.0 >= min && s.0 <= max)
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }

    pub fn count_by_score(&self, min: f64, max: f64) -> usize {
        self.order.iter().filter(|(s, _)| s.0 >= min && s.0 <= max).count()
    }
}

fn clamp_range(len: i64, start: i64, stop: i64) -> Option<(usize, usize)> {
    let s = if start < 0 { (len + start).max(0) } else { start };
    let mut e = if stop < 0 { len + stop } else { stop };
    if s > len - 1 {
        return None;
    }
    if e > len - 1 {
        e = len - 1;
    }
    if e < 0 || s > e {
        return None;
    }
    Some((s as usize, e as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn rank_and_range_follow_score_then_member_order() {
        let mut z = SortedSetValue::new();
        z.add(1.0, b("a")).expect("add");
        z.add(3.0, b("c")).expect("add");
        z.add(2.0, b("b")).expect("add");
        assert_eq!(z.range_by_rank(0, -1, false), vec![
            (b("a"), 1.0),
            (b("b"), 2.0),
            (b("c"), 3.0)
        ]);
        assert_eq!(z.rank(b("b").as_ref(), false), Some(1));
        assert_eq!(z.rank(b("b").as_ref(), true), Some(1));
        assert_eq!(z.rank(b("a").as_ref(), true), Some(2));
    }

    #[test]
    fn tie_break_is_member_lexicographic() {
        let mut z = SortedSetValue::new();
        z.add(1.0, b("b")).expect("add");
        z.add(1.0, b("a")).expect("add");
        assert_eq!(z.range_by_rank(0, -1, false), vec![
            (b("a"), 1.0),
            (b("b"), 1.0)
        ]);
    }

    #[test]
    fn score_map_and_order_index_stay_consistent() {
        let mut z = SortedSetValue::new();
        z.add(5.0, b("m")).expect("add");
        z.add(7.0, b("m")).expect("update");
        assert_eq!(z.score(b("m").as_ref()), Some(7.0));
        assert_eq!(z.range_by_rank(0, -1, false), vec![(b("m"), 7.0)]);
        z.rem(&[b("m")]);
        assert!(z.score(b("m").as_ref()).is_none());
        assert!(z.range_by_rank(0, -1, false).is_empty());
    }

    #[test]
    fn rejects_nan_score() {
        let mut z = SortedSetValue::new();
        assert!(matches!(
            z.add(f64::NAN, b("m")),
            Err(ServerError::NotAFloat)
        ));
    }

    #[test]
    fn count_by_score_matches_range() {
        let mut z = SortedSetValue::new();
        z.add(1.0, b("a")).expect("add");
        z.add(2.0, b("b")).expect("add");
        z.add(3.0, b("c")).expect("add");
        assert_eq!(z.count_by_score(1.5, 3.0), 2);
    }
}
