// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use clownf_lib::{
        cluster::Member,
        test_env::*,
        watch::{sorted_ring, watcher_candidates, watching_candidates},
    };

    fn ring(names: &[&str]) -> Vec<String> {
        sorted_ring(names.iter().copied())
    }

    #[test]
    fn five_host_ring() {
        let ring = ring(&["e", "c", "a", "d", "b"]);

        assert_eq!(watching_candidates(&ring, "c", 2), Some(vec!["d", "e"]));
        assert_eq!(watcher_candidates(&ring, "c", 2), Some(vec!["b", "a"]));
        assert_eq!(watching_candidates(&ring, "e", 2), Some(vec!["a", "b"]));
        assert_eq!(watcher_candidates(&ring, "a", 2), Some(vec!["e", "d"]));
    }

    #[test]
    fn two_host_ring() {
        let ring = ring(&["b", "a"]);

        assert_eq!(watching_candidates(&ring, "a", 2), Some(vec!["b"]));
        assert_eq!(watcher_candidates(&ring, "a", 2), Some(vec!["b"]));
    }

    #[test]
    fn single_host_ring() {
        let ring = ring(&["a"]);

        assert_eq!(watching_candidates(&ring, "a", 2), Some(vec![]));
        assert_eq!(watcher_candidates(&ring, "a", 2), Some(vec![]));
    }

    #[test]
    fn topology_candidates() {
        let topology = test_topology(
            &["server3", "server1", "server0", "server2"],
            &[
                ("lustre0-MDT0000", &["server1", "server0"]),
                ("lustre0-OST0000", &["server2", "server3"]),
            ],
        );

        assert_eq!(
            topology.watcher_candidates(&Member::host("server0")).unwrap(),
            vec!["server3", "server2"]
        );
        assert_eq!(
            topology
                .watcher_candidates(&Member::service("lustre0-MDT0000"))
                .unwrap(),
            vec!["server1", "server0"]
        );
        assert_eq!(
            topology.watching_candidate_services("server2").unwrap(),
            vec!["lustre0-OST0000"]
        );
        assert_eq!(
            topology
                .possible_watched_hostnames(&["server0".to_string(), "server1".to_string()])
                .unwrap(),
            vec!["server1", "server2", "server3"]
        );
        assert!(topology
            .watcher_candidates(&Member::host("server9"))
            .is_err());
        assert!(topology
            .watcher_candidates(&Member::service("lustre0-OST0009"))
            .is_err());
    }

    fn hostnames() -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set("[a-z]{1,3}[0-9]{0,2}", 1..24)
            .prop_map(|names| names.into_iter().collect())
    }

    proptest! {
        #[test]
        fn never_watches_itself(names in hostnames(), max_watch in 1usize..6) {
            let ring = sorted_ring(names.clone());
            for name in &ring {
                let forward = watching_candidates(&ring, name, max_watch).unwrap();
                let backward = watcher_candidates(&ring, name, max_watch).unwrap();
                prop_assert!(!forward.contains(&name.as_str()));
                prop_assert!(!backward.contains(&name.as_str()));
            }
        }

        #[test]
        fn mirror_symmetry(names in hostnames(), max_watch in 1usize..6) {
            let ring = sorted_ring(names.clone());
            for a in &ring {
                for b in &ring {
                    let a_watches_b = watching_candidates(&ring, a, max_watch)
                        .unwrap()
                        .contains(&b.as_str());
                    let b_watched_by_a = watcher_candidates(&ring, b, max_watch)
                        .unwrap()
                        .contains(&a.as_str());
                    prop_assert_eq!(a_watches_b, b_watched_by_a);
                }
            }
        }

        #[test]
        fn bounded_count(names in hostnames(), max_watch in 1usize..6) {
            let ring = sorted_ring(names.clone());
            let expected = max_watch.min(ring.len() - 1);
            for name in &ring {
                prop_assert_eq!(watching_candidates(&ring, name, max_watch).unwrap().len(), expected);
                prop_assert_eq!(watcher_candidates(&ring, name, max_watch).unwrap().len(), expected);
            }
        }

        #[test]
        fn independent_of_input_order(names in hostnames(), max_watch in 1usize..6) {
            let ring = sorted_ring(names.clone());
            let reversed = sorted_ring(names.iter().rev().cloned());
            for name in &ring {
                prop_assert_eq!(
                    watching_candidates(&ring, name, max_watch),
                    watching_candidates(&reversed, name, max_watch)
                );
                prop_assert_eq!(
                    watcher_candidates(&ring, name, max_watch),
                    watcher_candidates(&reversed, name, max_watch)
                );
            }
        }

        #[test]
        fn no_duplicates(names in hostnames(), max_watch in 1usize..6) {
            let ring = sorted_ring(names.clone());
            for name in &ring {
                let mut forward = watching_candidates(&ring, name, max_watch).unwrap();
                let count = forward.len();
                forward.sort();
                forward.dedup();
                prop_assert_eq!(forward.len(), count);
            }
        }
    }
}
