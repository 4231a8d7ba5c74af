//! Concurrency tests for group finder sessions and the shared stats cache
//!
//! Many users pressing buttons on the same group at once must never break
//! the slot rules: one tank, one healer, at most three DPS, and no user in
//! two roles.

mod fixtures;

use futures::future::join_all;
use keymaster::lfg::{LfgListing, RoleSlots};
use keymaster::storage::Storage;
use keymaster::types::{CharacterStats, Role};
use keymaster::{LfgManager, StatsCache};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fixtures::{memory_storage, ScriptedRanking, REFRESH_TIMEOUT};

const GROUP: u64 = 4_242;

fn assert_slot_rules(slots: &RoleSlots) {
    assert!(slots.count(Role::Tank) <= 1);
    assert!(slots.count(Role::Healer) <= 1);
    assert!(slots.count(Role::Dps) <= 3);

    let members = slots.members();
    let unique: HashSet<_> = members.iter().collect();
    assert_eq!(unique.len(), members.len(), "user holds two slots: {:?}", slots);
}

async fn open_group() -> (Arc<LfgManager>, Arc<keymaster::SqliteStorage>) {
    let storage = memory_storage().await;
    let cache = Arc::new(StatsCache::new(Duration::from_secs(300)));
    let manager = Arc::new(LfgManager::new(
        storage.clone(),
        cache,
        ScriptedRanking::new(),
        REFRESH_TIMEOUT,
    ));
    manager
        .open_session(GROUP, 1, 1, LfgListing::new("Halls of Atonement", 15, None))
        .await
        .unwrap();
    (manager, storage)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_presses_keep_slot_rules() {
    let (manager, storage) = open_group().await;

    let presses = (0..60u64).map(|i| {
        let manager = manager.clone();
        let user = 100 + i % 12;
        let role = Role::ALL[(i % 3) as usize];
        tokio::spawn(async move { manager.press(GROUP, user, role).await })
    });

    for joined in join_all(presses).await {
        joined.unwrap().unwrap();
    }

    let session = manager.session(GROUP).expect("group still open");
    assert_slot_rules(session.slots());

    let stored = storage.get_lfg(GROUP).await.unwrap().expect("group stored");
    assert_slot_rules(&stored.slots);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_race_for_single_tank_slot() {
    let (manager, _storage) = open_group().await;

    let presses = (0..20u64).map(|user| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.press(GROUP, 500 + user, Role::Tank).await })
    });

    let joined = join_all(presses)
        .await
        .into_iter()
        .map(|result| result.unwrap().unwrap())
        .filter(|reply| matches!(reply.outcome, keymaster::lfg::PressOutcome::Joined { .. }))
        .count();

    assert_eq!(joined, 1);
    let session = manager.session(GROUP).unwrap();
    assert!(session.slots().tank().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_announcement_under_contention() {
    let (manager, _storage) = open_group().await;
    manager.press(GROUP, 10, Role::Tank).await.unwrap();
    manager.press(GROUP, 11, Role::Healer).await.unwrap();
    manager.press(GROUP, 12, Role::Dps).await.unwrap();
    manager.press(GROUP, 13, Role::Dps).await.unwrap();

    // Everyone races for the last DPS slot
    let presses = (0..10u64).map(|user| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.press(GROUP, 200 + user, Role::Dps).await })
    });

    let announcements = join_all(presses)
        .await
        .into_iter()
        .filter_map(|result| result.unwrap().unwrap().announcement)
        .count();

    assert_eq!(announcements, 1);
    assert!(manager.session(GROUP).unwrap().slots().is_full());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cache_shared_across_tasks() {
    let cache = Arc::new(StatsCache::new(Duration::from_secs(60)));

    let writers = (0..8u64).map(|worker| {
        let cache = cache.clone();
        tokio::spawn(async move {
            for user in 0..100u64 {
                cache.set(
                    worker * 1_000 + user,
                    CharacterStats {
                        score: user as f64,
                        item_level: None,
                    },
                );
                let _ = cache.get(&(worker * 1_000 + user / 2));
            }
        })
    });
    for joined in join_all(writers).await {
        joined.unwrap();
    }

    assert_eq!(cache.len(), 800);
    assert_eq!(cache.get(&7_099).map(|stats| stats.score), Some(99.0));
}
