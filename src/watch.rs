// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! watch.rs
//!
//! Deterministic assignment of watcher candidates.
//!
//! All hostnames of the cluster are sorted into a ring. A host may be watched by the hosts just
//! before it on the ring, and may watch the hosts just after it. Because both directions walk
//! the same ring, host `a` is a watcher candidate of `b` exactly when `b` is a watching candidate
//! of `a`. Nothing here does I/O.

/// Which way to walk the ring.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    /// Towards the successors: the hosts that could be watched.
    Forward,
    /// Towards the predecessors: the hosts that could watch.
    Backward,
}

/// Walk the ring of `sorted` starting next to `hostname`, collecting at most `max_watch` other
/// hosts. Returns `None` if `hostname` is not on the ring.
///
/// `sorted` must be sorted and free of duplicates.
fn ring_walk<'a>(
    sorted: &'a [String],
    hostname: &str,
    max_watch: usize,
    direction: Direction,
) -> Option<Vec<&'a str>> {
    let index = sorted
        .binary_search_by(|name| name.as_str().cmp(hostname))
        .ok()?;
    let len = sorted.len();
    // Never come back around to ourselves, or visit anyone twice.
    let count = max_watch.min(len - 1);

    let candidates = (1..=count)
        .map(|step| {
            let position = match direction {
                Direction::Forward => (index + step) % len,
                Direction::Backward => (index + len - step) % len,
            };
            sorted[position].as_str()
        })
        .collect();

    Some(candidates)
}

/// The hosts that could watch `hostname`, closest predecessor first.
pub fn watcher_candidates<'a>(
    sorted: &'a [String],
    hostname: &str,
    max_watch: usize,
) -> Option<Vec<&'a str>> {
    ring_walk(sorted, hostname, max_watch, Direction::Backward)
}

/// The hosts that `hostname` could watch, closest successor first.
pub fn watching_candidates<'a>(
    sorted: &'a [String],
    hostname: &str,
    max_watch: usize,
) -> Option<Vec<&'a str>> {
    ring_walk(sorted, hostname, max_watch, Direction::Forward)
}

/// Sort and de-duplicate an arbitrary collection of hostnames into a ring.
pub fn sorted_ring<I, S>(hostnames: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ring: Vec<String> = hostnames.into_iter().map(Into::into).collect();
    ring.sort();
    ring.dedup();
    ring
}

/// Merge several candidate lists into one list without duplicates, keeping first-seen order.
pub fn merge_candidates<'a, I>(lists: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = Vec<&'a str>>,
{
    let mut merged: Vec<&str> = Vec::new();
    for name in lists.into_iter().flatten() {
        if !merged.contains(&name) {
            merged.push(name);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(names: &[&str]) -> Vec<String> {
        sorted_ring(names.iter().copied())
    }

    #[test]
    fn walk_from_middle() {
        let s = ring(&["a", "b", "c", "d", "e"]);
        assert_eq!(watching_candidates(&s, "c", 2).unwrap(), vec!["d", "e"]);
        assert_eq!(watcher_candidates(&s, "c", 2).unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn walk_wraps_around() {
        let s = ring(&["e", "d", "c", "b", "a"]);
        assert_eq!(watching_candidates(&s, "e", 2).unwrap(), vec!["a", "b"]);
        assert_eq!(watcher_candidates(&s, "a", 2).unwrap(), vec!["e", "d"]);
    }

    #[test]
    fn unknown_host() {
        let s = ring(&["a", "b"]);
        assert!(watching_candidates(&s, "z", 2).is_none());
        assert!(watcher_candidates(&[], "a", 2).is_none());
    }

    #[test]
    fn merge_keeps_first_seen_order() {
        let merged = merge_candidates(vec![vec!["b", "c"], vec!["c", "a"], vec![]]);
        assert_eq!(merged, vec!["b", "c", "a"]);
    }
}
