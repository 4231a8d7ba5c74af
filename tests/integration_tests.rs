//! Integration tests for the KeyMaster service
//!
//! These tests drive the public API the way the Discord layer does:
//! - Registration through the ranking client and its retry policy
//! - Group finder fill/vacate/refill announcements
//! - Restoring groups after a restart
//! - Periodic profile refresh

mod fixtures;

use keymaster::lfg::{LfgListing, PressOutcome, SessionState};
use keymaster::ranking::HttpResponse;
use keymaster::service::{ProfileService, RegisterOutcome};
use keymaster::storage::Storage;
use keymaster::types::{CharacterRef, Region, Role};
use keymaster::{KeymasterError, LfgManager, RankingClient, StatsCache};
use std::sync::Arc;
use std::time::Duration;

use fixtures::{
    fast_ranking_settings, memory_storage, profile, profile_json, ScriptedRanking,
    ScriptedTransport, REFRESH_TIMEOUT,
};

const GROUP: u64 = 9_000;
const CHANNEL: u64 = 77;
const LEADER: u64 = 1;

fn cache() -> Arc<StatsCache> {
    Arc::new(StatsCache::new(Duration::from_secs(300)))
}

fn listing() -> LfgListing {
    LfgListing::new("The Dawnbreaker", 12, Some("chill run".to_string()))
}

#[tokio::test]
async fn test_register_stores_and_caches_profile() {
    let storage = memory_storage().await;
    let cache = cache();
    let ranking = ScriptedRanking::new().with_character(
        "gordunni",
        Region::Eu,
        profile("Thrall", "Shaman", 3200.0, 620.0),
    );
    let service = ProfileService::new(storage.clone(), cache.clone(), ranking.clone());

    let outcome = service
        .register(42, CharacterRef::new("Thrall", "gordunni", Region::Eu))
        .await
        .unwrap();

    let RegisterOutcome::Registered(record) = outcome else {
        panic!("expected a registration, got {:?}", outcome);
    };
    assert_eq!(record.rio_score, 3200.0);

    let stored = storage.get_user(42).await.unwrap().expect("user stored");
    assert_eq!(stored.character_name, "Thrall");
    assert_eq!(stored.realm_slug, "gordunni");
    assert_eq!(stored.region, Region::Eu);
    assert_eq!(stored.character_class.as_deref(), Some("Shaman"));
    assert_eq!(stored.item_level, Some(620.0));

    let cached = cache.get(&42).expect("stats cached on registration");
    assert_eq!(cached.score, 3200.0);
    assert_eq!(cached.item_level, Some(620.0));
    assert_eq!(ranking.calls(), 1);
}

#[tokio::test]
async fn test_register_retries_through_server_errors() {
    let storage = memory_storage().await;
    let transport = ScriptedTransport::new(vec![
        HttpResponse::new(500, "upstream exploded"),
        HttpResponse::new(503, "maintenance"),
        HttpResponse::new(200, profile_json("Thrall", "Shaman", 2950.5, 615.0)),
    ]);
    let client = RankingClient::with_transport(transport.clone(), &fast_ranking_settings());
    let service = ProfileService::new(storage.clone(), cache(), Arc::new(client));

    let outcome = service
        .register(7, CharacterRef::new("Thrall", "gordunni", Region::Eu))
        .await
        .unwrap();

    assert!(matches!(outcome, RegisterOutcome::Registered(_)));
    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].contains("/characters/profile?"));
    assert!(requests[0].contains("region=eu"));
    assert!(requests[0].contains("realm=gordunni"));
    assert!(requests[0].contains("name=Thrall"));
    assert_eq!(storage.get_user(7).await.unwrap().unwrap().rio_score, 2950.5);
}

#[tokio::test]
async fn test_register_not_found_stores_nothing() {
    let storage = memory_storage().await;
    let transport = ScriptedTransport::new(vec![HttpResponse::new(
        400,
        r#"{"statusCode":400,"error":"Bad Request","message":"Could not find requested character"}"#,
    )]);
    let client = RankingClient::with_transport(transport.clone(), &fast_ranking_settings());
    let service = ProfileService::new(storage.clone(), cache(), Arc::new(client));

    let outcome = service
        .register(7, CharacterRef::new("Nobody", "gordunni", Region::Eu))
        .await
        .unwrap();

    assert_eq!(outcome, RegisterOutcome::CharacterNotFound);
    assert_eq!(transport.requests().len(), 1);
    assert!(storage.get_user(7).await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_fails_when_ranking_unavailable() {
    let storage = memory_storage().await;
    let cache = cache();
    let ranking = ScriptedRanking::new();
    ranking.set_unavailable(true);
    let service = ProfileService::new(storage.clone(), cache.clone(), ranking);

    let err = service
        .register(42, CharacterRef::new("Thrall", "gordunni", Region::Eu))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<KeymasterError>(),
        Some(KeymasterError::RankingUnavailable { .. })
    ));
    assert!(storage.get_user(42).await.unwrap().is_none());
    assert!(cache.get(&42).is_none());
}

#[tokio::test]
async fn test_group_fill_vacate_refill_announces_twice() {
    let storage = memory_storage().await;
    let manager = LfgManager::new(storage.clone(), cache(), ScriptedRanking::new(), REFRESH_TIMEOUT);
    manager
        .open_session(GROUP, CHANNEL, LEADER, listing())
        .await
        .unwrap();

    let roster = [
        (10, Role::Tank),
        (11, Role::Healer),
        (12, Role::Dps),
        (13, Role::Dps),
    ];
    for (user, role) in roster {
        let reply = manager.press(GROUP, user, role).await.unwrap();
        assert!(reply.announcement.is_none());
    }

    let reply = manager.press(GROUP, 14, Role::Dps).await.unwrap();
    assert_eq!(reply.view.state, SessionState::Complete);
    let announcement = reply.announcement.expect("first fill announces");
    for user in 10..=14 {
        assert!(announcement.contains(&format!("<@{}>", user)));
    }

    // Toggling off vacates the slot
    let reply = manager.press(GROUP, 13, Role::Dps).await.unwrap();
    assert_eq!(reply.outcome, PressOutcome::Left { role: Role::Dps });
    assert_eq!(reply.view.state, SessionState::Open);
    assert!(reply.announcement.is_none());

    let reply = manager.press(GROUP, 15, Role::Dps).await.unwrap();
    assert!(reply.announcement.is_some());

    // A full roster rejects further joins without announcing again
    let reply = manager.press(GROUP, 16, Role::Tank).await.unwrap();
    assert_eq!(reply.outcome, PressOutcome::SlotTaken { role: Role::Tank });
    assert!(reply.announcement.is_none());

    let stored = storage.get_lfg(GROUP).await.unwrap().expect("group stored");
    assert_eq!(stored.slots.tank(), Some(10));
    assert_eq!(stored.slots.healer(), Some(11));
    assert_eq!(stored.slots.dps(), &[12, 14, 15]);
}

#[tokio::test]
async fn test_restored_full_group_does_not_reannounce() {
    let storage = memory_storage().await;
    let before = LfgManager::new(storage.clone(), cache(), ScriptedRanking::new(), REFRESH_TIMEOUT);
    before
        .open_session(GROUP, CHANNEL, LEADER, listing())
        .await
        .unwrap();
    for (user, role) in [
        (10, Role::Tank),
        (11, Role::Healer),
        (12, Role::Dps),
        (13, Role::Dps),
        (14, Role::Dps),
    ] {
        before.press(GROUP, user, role).await.unwrap();
    }
    drop(before);

    // Same database, fresh process memory
    let after = LfgManager::new(storage.clone(), cache(), ScriptedRanking::new(), REFRESH_TIMEOUT);
    assert_eq!(after.restore().await.unwrap(), 1);

    let session = after.session(GROUP).expect("group restored");
    assert_eq!(session.listing, listing());
    assert_eq!(session.owner_id, LEADER);
    assert_eq!(session.slots().filled(), 5);

    let reply = after.press(GROUP, 16, Role::Healer).await.unwrap();
    assert_eq!(reply.outcome, PressOutcome::SlotTaken { role: Role::Healer });
    assert!(reply.announcement.is_none());

    after.press(GROUP, 11, Role::Healer).await.unwrap();
    let reply = after.press(GROUP, 16, Role::Healer).await.unwrap();
    assert!(reply.announcement.is_some());
}

#[tokio::test]
async fn test_press_hydrates_group_missing_from_memory() {
    let storage = memory_storage().await;
    let before = LfgManager::new(storage.clone(), cache(), ScriptedRanking::new(), REFRESH_TIMEOUT);
    before
        .open_session(GROUP, CHANNEL, LEADER, listing())
        .await
        .unwrap();
    before.press(GROUP, 10, Role::Tank).await.unwrap();

    let after = LfgManager::new(storage.clone(), cache(), ScriptedRanking::new(), REFRESH_TIMEOUT);
    assert_eq!(after.session_count(), 0);

    let reply = after.press(GROUP, 11, Role::Tank).await.unwrap();
    assert_eq!(reply.outcome, PressOutcome::SlotTaken { role: Role::Tank });
    assert_eq!(reply.view.tank.as_ref().map(|line| line.user_id), Some(10));
    assert_eq!(after.session_count(), 1);
}

#[tokio::test]
async fn test_closed_group_is_gone_after_restart() {
    let storage = memory_storage().await;
    let before = LfgManager::new(storage.clone(), cache(), ScriptedRanking::new(), REFRESH_TIMEOUT);
    before
        .open_session(GROUP, CHANNEL, LEADER, listing())
        .await
        .unwrap();

    let err = before.close(GROUP, 99).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KeymasterError>(),
        Some(KeymasterError::NotSessionOwner { .. })
    ));

    let view = before.close(GROUP, LEADER).await.unwrap();
    assert_eq!(view.state, SessionState::Closed);
    assert!(!view.buttons_enabled());

    let after = LfgManager::new(storage.clone(), cache(), ScriptedRanking::new(), REFRESH_TIMEOUT);
    assert_eq!(after.restore().await.unwrap(), 0);

    let err = after.press(GROUP, 10, Role::Tank).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KeymasterError>(),
        Some(KeymasterError::SessionNotFound { message_id: GROUP })
    ));
}

#[tokio::test]
async fn test_roster_uses_stored_profile_and_warms_cache() {
    let storage = memory_storage().await;
    let cache = cache();
    let ranking = ScriptedRanking::new().with_character(
        "gordunni",
        Region::Eu,
        profile("Thrall", "Shaman", 3200.0, 620.0),
    );
    let service = ProfileService::new(storage.clone(), cache.clone(), ranking.clone());
    service
        .register(10, CharacterRef::new("Thrall", "gordunni", Region::Eu))
        .await
        .unwrap();

    // The character improved since registration and the cache went cold
    ranking.add_character("gordunni", Region::Eu, profile("Thrall", "Shaman", 3300.0, 625.0));
    cache.clear();

    let manager = LfgManager::new(storage.clone(), cache.clone(), ranking.clone(), REFRESH_TIMEOUT);
    manager
        .open_session(GROUP, CHANNEL, LEADER, listing())
        .await
        .unwrap();
    let reply = manager.press(GROUP, 10, Role::Tank).await.unwrap();

    let tank = reply.view.tank.expect("tank line");
    assert_eq!(tank.stats.map(|stats| stats.score), Some(3200.0));

    manager.drain_refreshes().await;
    assert_eq!(cache.get(&10).map(|stats| stats.score), Some(3300.0));
}

#[tokio::test]
async fn test_refresh_all_updates_storage_and_cache() {
    let storage = memory_storage().await;
    let cache = cache();
    let ranking = ScriptedRanking::new()
        .with_character("gordunni", Region::Eu, profile("Thrall", "Shaman", 3000.0, 610.0))
        .with_character("howling-fjord", Region::Eu, profile("Jaina", "Mage", 2800.0, 612.0));
    let service = ProfileService::new(storage.clone(), cache.clone(), ranking.clone());

    service
        .register(1, CharacterRef::new("Thrall", "gordunni", Region::Eu))
        .await
        .unwrap();
    service
        .register(2, CharacterRef::new("Jaina", "howling-fjord", Region::Eu))
        .await
        .unwrap();

    ranking.add_character("gordunni", Region::Eu, profile("Thrall", "Shaman", 3150.0, 618.0));
    cache.clear();

    let summary = service.refresh_all(Duration::ZERO).await.unwrap();
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.missing, 0);
    assert_eq!(summary.failed, 0);

    assert_eq!(storage.get_user(1).await.unwrap().unwrap().rio_score, 3150.0);
    assert_eq!(cache.get(&1).map(|stats| stats.score), Some(3150.0));
    assert_eq!(cache.get(&2).map(|stats| stats.score), Some(2800.0));

    let top = service.leaderboard(10).await.unwrap();
    let names: Vec<_> = top.iter().map(|user| user.character_name.as_str()).collect();
    assert_eq!(names, vec!["Thrall", "Jaina"]);
}
