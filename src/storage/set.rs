// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Set container: a collection of unique members
//! supporting pairwise intersection/union/difference.

use std::collections::HashSet;

use bytes::Bytes;
use rand::seq::IteratorRandom;

#[derive(Debug, Clone, Default)]
pub struct SetValue {
    members: HashSet<Bytes>,
}

impl SetValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn card(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Adds members, returning how many were newly inserted.
    pub fn add(&mut self, members: impl IntoIterator<Item = Bytes>) -> usize {
        members
            .into_iter()
            .filter(|m| self.members.insert(m.clone()))
            .count()
    }

    pub fn rem(&mut self, members: &[Bytes]) -> usize {
        members
            .iter()
            .filter(|m| self.members.remove(m.as_ref()))
            .count()
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.members.contains(member)
    }

    pub fn members(&self) -> impl Iterator<Item = &Bytes> {
        self.members.iter()
    }

    pub fn random_sample(&self, n: usize) -> Vec<Bytes> {
        let mut rng = rand::rng();
        self.members
            .iter()
            .choose_multiple(&mut rng, n)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn pop_random(&mut self) -> Option<Bytes> {
        let mut rng = rand::rng();
        let chosen = self.members.iter().choose(&mut rng).cloned()?;
        self.members.remove(&chosen);
        Some(chosen)
    }

    pub fn inter(&self, other: &SetValue) -> Vec<Bytes> {
        self.members
            .iter()
            .filter(|m| other.members.contains(*m))
            .cloned()
            .collect()
    }

    pub fn union(&self, other: &SetValue) -> Vec<Bytes> {
        self.members.union(&other.members).cloned().collect()
    }

    pub fn diff(&self, other: &SetValue) -> Vec<Bytes> {
        self.members.difference(&other.members).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> SetValue {
        let mut s = SetValue::new();
        s.add(items.iter().map(|i| Bytes::copy_from_slice(i.as_bytes())));
        s
    }

    #[test]
    fn add_reports_new_count() {
        let mut s = SetValue::new();
        assert_eq!(s.add([Bytes::from_static(b"a"), Bytes::from_static(b"b")]), 2);
        assert_eq!(s.add([Bytes::from_static(b"b")]), 0);
        assert_eq!(s.card(), 2);
    }

    #[test]
    fn intersection_is_symmetric() {
        let a = set(&["a", "b", "c"]);
        let b = set(&["b", "c", "d"]);
        let mut i1 = a.inter(&b);
        let mut i2 = b.inter(&a);
        i1.sort();
        i2.sort();
        assert_eq!(i1, i2);
        assert_eq!(i1, vec![Bytes::from_static(b"b"), Bytes::from_static(b"c")]);
    }

    #[test]
    fn union_covers_both_sets() {
        let a = set(&["a", "b"]);
        let b = set(&["b", "c"]);
        let mut u = a.union(&b);
        u.sort();
        assert_eq!(
            u,
            vec![
                Bytes::from_static(b"a"),
                Bytes::from_static(b"b"),
                Bytes::from_static(b"c")
            ]
        );
    }

    #[test]
    fn contains_matches_membership() {
        let s = set(&["x"]);
        assert!(s.contains(b"x"));
        assert!(!s.contains(b"y"));
    }
}
