
use chrono::Duration;
use fixtures::{fixed_now, memory_db, notification};
use huddle_common::NotificationStatus;
use huddle_db::{MarkReadOutcome, NotificationRepository, SqlNotificationRepository};

#[tokio::test]
async fn test_insert_creates_unread_notification() {
    let repo = SqlNotificationRepository::new(memory_db().await);

    let stored = repo
        .insert(&notification(7, None), fixed_now())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stored.receiver_id, 7);
    assert_eq!(stored.status, NotificationStatus::Unread);
    assert_eq!(stored.created_on, fixed_now());
    assert!(stored.read_on.is_none());
    assert_eq!(stored.payload["title"], "Team sync");
}

#[tokio::test]
async fn test_insert_ignores_duplicate_source_message() {
    let repo = SqlNotificationRepository::new(memory_db().await);

    let first = repo
        .insert(&notification(7, Some("msg-1")), fixed_now())
        .await
        .unwrap();
    let second = repo
        .insert(&notification(7, Some("msg-1")), fixed_now())
        .await
        .unwrap();
    let other_receiver = repo
        .insert(&notification(8, Some("msg-1")), fixed_now())
        .await
        .unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    assert!(other_receiver.is_some());
    assert_eq!(repo.unread_count(7).await.unwrap(), 1);
}

#[tokio::test]
async fn test_mark_read_transitions_once() {
    let repo = SqlNotificationRepository::new(memory_db().await);
    let stored = repo
        .insert(&notification(7, None), fixed_now())
        .await
        .unwrap()
        .unwrap();
    let read_on = fixed_now() + Duration::minutes(5);

    let first = repo.mark_read(stored.notification_id, 7, read_on).await.unwrap();
    let second = repo
        .mark_read(stored.notification_id, 7, read_on + Duration::minutes(1))
        .await
        .unwrap();

    assert_eq!(first, MarkReadOutcome::Updated);
    assert_eq!(second, MarkReadOutcome::AlreadyRead);

    let found = repo.find(stored.notification_id).await.unwrap().unwrap();
    assert_eq!(found.status, NotificationStatus::Read);
    assert_eq!(found.read_on, Some(read_on));
}

#[tokio::test]
async fn test_mark_read_rejects_other_receiver() {
    let repo = SqlNotificationRepository::new(memory_db().await);
    let stored = repo
        .insert(&notification(7, None), fixed_now())
        .await
        .unwrap()
        .unwrap();

    let outcome = repo
        .mark_read(stored.notification_id, 8, fixed_now())
        .await
        .unwrap();
    assert_eq!(outcome, MarkReadOutcome::NotFound);

    let found = repo.find(stored.notification_id).await.unwrap().unwrap();
    assert_eq!(found.status, NotificationStatus::Unread);
}

#[tokio::test]
async fn test_mark_all_read_leaves_other_receivers_untouched() {
    let repo = SqlNotificationRepository::new(memory_db().await);
    for _ in 0..3 {
        repo.insert(&notification(7, None), fixed_now()).await.unwrap();
    }
    repo.insert(&notification(8, None), fixed_now()).await.unwrap();

    let changed = repo.mark_all_read(7, fixed_now()).await.unwrap();
    assert_eq!(changed, 3);
    assert_eq!(repo.mark_all_read(7, fixed_now()).await.unwrap(), 0);

    assert_eq!(repo.unread_count(7).await.unwrap(), 0);
    assert_eq!(repo.unread_count(8).await.unwrap(), 1);
}

#[tokio::test]
async fn test_list_for_receiver_is_newest_first() {
    let repo = SqlNotificationRepository::new(memory_db().await);
    for minutes in [1, 3, 2] {
        repo.insert(
            &notification(7, Some(&format!("msg-{minutes}"))),
            fixed_now() + Duration::minutes(minutes),
        )
        .await
        .unwrap();
    }

    let listed = repo.list_for_receiver(7, 2).await.unwrap();
    let sources: Vec<_> = listed
        .iter()
        .map(|n| n.source_message_id.clone().unwrap())
        .collect();
    assert_eq!(sources, vec!["msg-3", "msg-2"]);
}
