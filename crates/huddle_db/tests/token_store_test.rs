
use chrono::Duration;
use fixtures::{authorization, fixed_now, memory_db};
use huddle_common::ServiceType;
use huddle_db::{SqlTokenStore, TokenStore};

#[tokio::test]
async fn test_find_returns_none_when_never_authorized() {
    let store = SqlTokenStore::new(memory_db().await);

    let found = store.find(42, ServiceType::Calendar).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_save_then_find_round_trips_record() {
    let store = SqlTokenStore::new(memory_db().await);
    let auth = authorization(42, "access-1", Duration::hours(1));

    let saved = store.save(&auth).await.unwrap();
    assert_eq!(saved, auth);

    let found = store.find(42, ServiceType::Calendar).await.unwrap();
    assert_eq!(found, Some(auth));
}

#[tokio::test]
async fn test_save_replaces_single_record_per_key() {
    let store = SqlTokenStore::new(memory_db().await);
    store
        .save(&authorization(42, "access-1", Duration::hours(1)))
        .await
        .unwrap();

    let refreshed = authorization(42, "access-2", Duration::hours(2));
    store.save(&refreshed).await.unwrap();

    let found = store.find(42, ServiceType::Calendar).await.unwrap().unwrap();
    assert_eq!(found.access_token, "access-2");
    assert_eq!(found.expiry_time, fixed_now() + Duration::hours(2));

    let all = store
        .list_expiring(fixed_now() + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_save_keeps_refresh_token_when_not_rotated() {
    let store = SqlTokenStore::new(memory_db().await);
    store
        .save(&authorization(42, "access-1", Duration::hours(1)))
        .await
        .unwrap();

    let mut refreshed = authorization(42, "access-2", Duration::hours(1));
    refreshed.refresh_token = None;
    refreshed.scope = None;
    let saved = store.save(&refreshed).await.unwrap();

    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-access-1"));
    assert_eq!(saved.scope.as_deref(), Some("calendar"));
}

#[tokio::test]
async fn test_records_are_keyed_by_service_type() {
    let store = SqlTokenStore::new(memory_db().await);
    store
        .save(&authorization(42, "calendar-token", Duration::hours(1)))
        .await
        .unwrap();
    let mut youtube = authorization(42, "youtube-token", Duration::hours(1));
    youtube.service_type = ServiceType::Youtube;
    store.save(&youtube).await.unwrap();

    let calendar = store.find(42, ServiceType::Calendar).await.unwrap().unwrap();
    let found = store.find(42, ServiceType::Youtube).await.unwrap().unwrap();
    assert_eq!(calendar.access_token, "calendar-token");
    assert_eq!(found.access_token, "youtube-token");
}

#[tokio::test]
async fn test_list_expiring_orders_soonest_first() {
    let store = SqlTokenStore::new(memory_db().await);
    store
        .save(&authorization(1, "late", Duration::hours(3)))
        .await
        .unwrap();
    store
        .save(&authorization(2, "soon", Duration::minutes(5)))
        .await
        .unwrap();
    store
        .save(&authorization(3, "never", Duration::days(30)))
        .await
        .unwrap();

    let expiring = store
        .list_expiring(fixed_now() + Duration::hours(4))
        .await
        .unwrap();
    let members: Vec<i64> = expiring.iter().map(|a| a.member_id).collect();
    assert_eq!(members, vec![2, 1]);
}
