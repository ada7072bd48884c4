#[cfg(test)]
mod tests {
    use crate::registry::ConnectionRegistry;
    use chrono::{TimeZone, Utc};
    use huddle_common::{Notification, NotificationStatus};
    use serde_json::json;

    fn notification(notification_id: i64, receiver_id: i64) -> Notification {
        Notification {
            notification_id,
            receiver_id,
            status: NotificationStatus::Unread,
            created_on: Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).unwrap(),
            read_on: None,
            payload: json!({ "type": "CALENDAR_CREATED" }),
            source_message_id: None,
        }
    }

    #[tokio::test]
    async fn test_push_reaches_every_connection_of_receiver() {
        let registry = ConnectionRegistry::new();
        let mut first = registry.register(7);
        let mut second = registry.register(7);
        let (_other_handle, mut other) = registry.register(8).into_parts();

        assert_eq!(registry.connection_count(7), 2);
        assert_eq!(registry.push(&notification(1, 7)), 2);

        assert_eq!(first.recv().await.unwrap().notification_id, 1);
        assert_eq!(second.recv().await.unwrap().notification_id, 1);
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn test_push_without_connections_delivers_nothing() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.push(&notification(1, 7)), 0);
    }

    #[test]
    fn test_dropping_subscription_deregisters() {
        let registry = ConnectionRegistry::new();
        let subscription = registry.register(7);
        let keep = registry.register(7);
        assert_eq!(registry.connection_count(7), 2);

        drop(subscription);
        assert_eq!(registry.connection_count(7), 1);

        drop(keep);
        assert_eq!(registry.connection_count(7), 0);
    }

    #[test]
    fn test_remove_unknown_connection_is_false() {
        let registry = ConnectionRegistry::new();
        let subscription = registry.register(7);
        let connection_id = subscription.handle().connection_id();

        assert!(!registry.remove(8, connection_id));
        assert!(registry.remove(7, connection_id));
        assert!(!registry.remove(7, connection_id));

        // Dropping after an explicit remove must not panic
        drop(subscription);
        assert_eq!(registry.connection_count(7), 0);
    }

    #[test]
    fn test_closed_connection_is_pruned_on_push() {
        let registry = ConnectionRegistry::new();
        let (_handle, receiver) = registry.register(7).into_parts();
        drop(receiver);

        assert_eq!(registry.push(&notification(1, 7)), 0);
        assert_eq!(registry.connection_count(7), 0);
    }

    #[test]
    fn test_stalled_connection_is_pruned_when_buffer_fills() {
        let registry = ConnectionRegistry::new();
        let _stalled = registry.register(7);

        let mut delivered = 0;
        for id in 0..100 {
            delivered += registry.push(&notification(id, 7));
        }

        assert!(delivered > 0 && delivered < 100);
        assert_eq!(registry.connection_count(7), 0);
    }

    #[tokio::test]
    async fn test_close_all_ends_open_streams_after_buffered_items() {
        let registry = ConnectionRegistry::new();
        let mut first = registry.register(7);
        let _second = registry.register(8);
        registry.push(&notification(1, 7));

        assert_eq!(registry.total_connections(), 2);
        assert_eq!(registry.close_all(), 2);
        assert_eq!(registry.total_connections(), 0);

        assert_eq!(first.recv().await.unwrap().notification_id, 1);
        assert!(first.recv().await.is_none());
    }
}
