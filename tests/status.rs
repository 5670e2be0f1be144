// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use {tokio::runtime::Runtime, tokio_util::sync::CancellationToken};

    use clownf_lib::{
        cluster::{ClusterTopology, Member, MemberKind},
        consul::{ConsulCluster, LockStore},
        error::WatchError,
        parallel::BatchOptions,
        status::{CacheState, ClusterStatusCache},
        test_env::*,
    };

    const HOSTS: &[&str] = &["a", "b", "c", "d", "e"];

    fn topology() -> Arc<ClusterTopology> {
        test_topology(
            HOSTS,
            &[
                ("lustre0-MDT0000", &["a", "b"]),
                ("lustre0-OST0000", &["c", "d"]),
            ],
        )
    }

    fn cache(stores: &[Arc<MemoryLockStore>], options: BatchOptions) -> ClusterStatusCache {
        ClusterStatusCache::new(
            topology(),
            memory_cluster(stores),
            options,
            CancellationToken::new(),
        )
    }

    fn fast_options() -> BatchOptions {
        BatchOptions {
            parallelism: 3,
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn resolves_every_host() {
        let store = MemoryLockStore::new("a");
        store.hold_lock(&Member::host("d"), "sess123", "b");
        store.hold_lock(&Member::host("a"), "sess7", "e");
        let mut cache = cache(&[Arc::clone(&store)], fast_options());

        let rt = Runtime::new().unwrap();
        let failed = rt.block_on(cache.resolve_watchers(MemberKind::Host, None));

        assert!(!failed);
        assert!(!cache.failed());
        assert_eq!(cache.state(), CacheState::WatchersResolved);
        assert_eq!(cache.watchers(MemberKind::Host).len(), HOSTS.len());
        assert_eq!(
            cache.watcher(MemberKind::Host, "d"),
            Some(&Ok(Some("b".to_string())))
        );
        assert_eq!(cache.watcher(MemberKind::Host, "c"), Some(&Ok(None)));
        assert_eq!(cache.watched_by(MemberKind::Host, "b"), vec!["d"]);
        assert_eq!(cache.watched_by(MemberKind::Host, "c"), Vec::<&str>::new());
    }

    #[test]
    fn one_failure_is_isolated() {
        let store = MemoryLockStore::new("a");
        store.hold_lock(&Member::host("d"), "sess123", "b");
        store.fail_key(Member::host("c").watch_key().as_str());
        let mut cache = cache(&[Arc::clone(&store)], fast_options());

        let rt = Runtime::new().unwrap();
        let failed = rt.block_on(cache.resolve_watchers(MemberKind::Host, None));

        assert!(failed);
        assert!(cache.failed());
        let watchers = cache.watchers(MemberKind::Host);
        assert_eq!(watchers.len(), HOSTS.len());
        assert_eq!(watchers.values().filter(|w| w.is_ok()).count(), HOSTS.len() - 1);
        assert!(matches!(watchers["c"], Err(WatchError::Lookup { .. })));
        assert_eq!(watchers["d"], Ok(Some("b".to_string())));
    }

    #[test]
    fn unreachable_cluster_makes_no_lookups() {
        let first = MemoryLockStore::new("a");
        let second = MemoryLockStore::new("b");
        first.set_reachable(false);
        second.set_reachable(false);
        let mut cache = cache(&[Arc::clone(&first), Arc::clone(&second)], fast_options());

        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            assert_eq!(cache.resolve_active_node().await, Err(WatchError::Unreachable));
            assert!(cache.resolve_watchers(MemberKind::Host, None).await);
            assert!(cache.resolve_watchers(MemberKind::Service, None).await);
        });

        assert_eq!(cache.state(), CacheState::ActiveNodeUnreachable);
        assert!(cache.failed());
        assert!(cache
            .watchers(MemberKind::Host)
            .values()
            .all(|w| *w == Err(WatchError::Unreachable)));
        assert_eq!(cache.watchers(MemberKind::Service).len(), 2);
        assert_eq!(first.requests() + second.requests(), 0);
        // The probe result is memoized.
        assert_eq!(first.probes(), 1);
        assert_eq!(second.probes(), 1);
    }

    #[test]
    fn first_reachable_agent_is_used() {
        let first = MemoryLockStore::new("a");
        let second = MemoryLockStore::new("b");
        first.set_reachable(false);
        second.hold_lock(&Member::host("c"), "s", "b");
        let mut cache = cache(&[Arc::clone(&first), Arc::clone(&second)], fast_options());

        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            assert_eq!(cache.resolve_active_node().await, Ok("b".to_string()));
            assert!(!cache.resolve_watchers(MemberKind::Host, None).await);
        });

        assert_eq!(cache.active_hostname(), Some("b"));
        assert_eq!(first.requests(), 0);
        assert_eq!(
            cache.watcher(MemberKind::Host, "c"),
            Some(&Ok(Some("b".to_string())))
        );
    }

    #[test]
    fn only_requested_members_are_looked_up() {
        let store = MemoryLockStore::new("a");
        let mut cache = cache(&[Arc::clone(&store)], fast_options());

        let rt = Runtime::new().unwrap();
        let only = vec!["lustre0-OST0000".to_string()];
        rt.block_on(cache.resolve_watchers(MemberKind::Service, Some(&only)));

        assert_eq!(cache.watchers(MemberKind::Service).len(), 1);
        assert_eq!(cache.watcher(MemberKind::Service, "lustre0-MDT0000"), None);
        assert!(cache.watchers(MemberKind::Host).is_empty());
        assert_eq!(store.requests(), 1);
    }

    #[test]
    fn reprocessing_overwrites_only_those_members() {
        let store = MemoryLockStore::new("a");
        store.hold_lock(&Member::host("a"), "s1", "e");
        store.hold_lock(&Member::host("b"), "s2", "a");
        let mut cache = cache(&[Arc::clone(&store)], fast_options());

        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            cache.resolve_watchers(MemberKind::Host, None).await;
            store.hold_lock(&Member::host("a"), "s3", "d");
            store.hold_lock(&Member::host("b"), "s4", "c");
            cache
                .resolve_watchers(MemberKind::Host, Some(&["a".to_string()]))
                .await;
        });

        assert_eq!(
            cache.watcher(MemberKind::Host, "a"),
            Some(&Ok(Some("d".to_string())))
        );
        assert_eq!(
            cache.watcher(MemberKind::Host, "b"),
            Some(&Ok(Some("a".to_string())))
        );
    }

    #[test]
    fn slow_lookup_times_out() {
        let store = MemoryLockStore::new("a");
        store.delay_key(Member::host("b").watch_key().as_str(), Duration::from_secs(10));
        let mut cache = cache(&[Arc::clone(&store)], fast_options());

        let rt = Runtime::new().unwrap();
        let failed = rt.block_on(cache.resolve_watchers(MemberKind::Host, None));

        assert!(failed);
        assert!(matches!(
            cache.watcher(MemberKind::Host, "b"),
            Some(Err(WatchError::Timeout(..)))
        ));
        assert_eq!(cache.watcher(MemberKind::Host, "a"), Some(&Ok(None)));
    }

    #[test]
    fn cancellation_fails_unfinished_members() {
        let store = MemoryLockStore::new("a");
        for host in HOSTS {
            store.delay_key(Member::host(host).watch_key().as_str(), Duration::from_secs(10));
        }
        let cancel = CancellationToken::new();
        let options = BatchOptions {
            parallelism: 10,
            timeout: Duration::from_secs(30),
        };
        let mut cache = ClusterStatusCache::new(
            topology(),
            memory_cluster(&[Arc::clone(&store)]),
            options,
            cancel.clone(),
        );

        let rt = Runtime::new().unwrap();
        let failed = rt.block_on(async {
            let canceller = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                canceller.cancel();
            });
            cache.resolve_watchers(MemberKind::Host, None).await
        });

        assert!(failed);
        let watchers = cache.watchers(MemberKind::Host);
        assert_eq!(watchers.len(), HOSTS.len());
        assert!(watchers
            .values()
            .all(|w| matches!(w, Err(WatchError::Cancelled(_)))));
    }

    #[test]
    fn autostart_batch() {
        let store = MemoryLockStore::new("a");
        store.set_value(
            &Member::service("lustre0-MDT0000").config_key(),
            "autostart: true\n",
        );
        let mut cache = cache(&[Arc::clone(&store)], fast_options());

        let rt = Runtime::new().unwrap();
        let failed = rt.block_on(cache.resolve_autostart(MemberKind::Service, None));

        assert!(!failed);
        assert_eq!(
            cache.autostart(MemberKind::Service, "lustre0-MDT0000"),
            Some(&Ok(true))
        );
        assert_eq!(
            cache.autostart(MemberKind::Service, "lustre0-OST0000"),
            Some(&Ok(false))
        );
    }

    #[test]
    fn local_agent_is_preferred() {
        let a = MemoryLockStore::new("a");
        let c = MemoryLockStore::new("c");
        let agents: Vec<Arc<dyn LockStore>> = vec![
            Arc::clone(&a) as Arc<dyn LockStore>,
            Arc::clone(&c) as Arc<dyn LockStore>,
        ];
        let cluster = ConsulCluster::new(Some("c".to_string()), agents);

        let order: Vec<String> = cluster
            .list_reachable_agents()
            .iter()
            .map(|agent| agent.hostname().to_string())
            .collect();
        assert_eq!(order, vec!["c", "a"]);

        let rt = Runtime::new().unwrap();
        let alive = rt.block_on(cluster.alive_agent()).unwrap();
        assert_eq!(alive.hostname(), "c");
        assert_eq!(a.probes(), 0);
    }

    #[test]
    fn leader_maps_to_server_hostname() {
        let store = MemoryLockStore::new("a");
        store.set_leader("10.0.0.2:8300");
        let mut cluster =
            ConsulCluster::new(None, vec![Arc::clone(&store) as Arc<dyn LockStore>]);
        cluster.add_server("a", "10.0.0.1");
        cluster.add_server("b", "10.0.0.2");

        let rt = Runtime::new().unwrap();
        assert_eq!(rt.block_on(cluster.leader()), Ok("b".to_string()));

        store.set_leader("10.0.0.9:8300");
        assert!(matches!(
            rt.block_on(cluster.leader()),
            Err(WatchError::Protocol { .. })
        ));

        store.set_leader("");
        assert!(matches!(
            rt.block_on(cluster.leader()),
            Err(WatchError::Protocol { .. })
        ));
    }
}
