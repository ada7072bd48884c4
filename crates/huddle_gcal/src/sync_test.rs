#[cfg(test)]
mod tests {
    use crate::oauth::{MockOAuthTokenProvider, TokenGrant};
    use crate::service::mock::FakeCalendarProvider;
    use crate::sync::{CalendarSyncService, CreateCalendarRequest, CreateEventRequest};
    use crate::token::TokenRefresher;
    use chrono::{Duration, Utc};
    use huddle_common::{CalendarStatus, HuddleError, Oauth2Authorization, ServiceType};
    use huddle_config::{GcalConfig, PublisherConfig, TokenConfig};
    use chrono::DateTime;
    use huddle_common::{Calendar, NewCalendar};
    use huddle_db::{
        init_schemas, CalendarRepository, DbClient, DbError, SqlCalendarRepository,
        SqlTokenStore, TokenStore,
    };
    use huddle_events::{channel, PublisherWorker};
    use std::sync::Arc;

    type Service = CalendarSyncService<SqlTokenStore, SqlCalendarRepository>;

    struct Harness {
        service: Service,
        provider: Arc<FakeCalendarProvider>,
        tokens: Arc<SqlTokenStore>,
        calendars: SqlCalendarRepository,
        worker: PublisherWorker,
    }

    async fn harness_with(provider: FakeCalendarProvider, oauth: MockOAuthTokenProvider) -> Harness {
        let db_client = DbClient::from_url("sqlite::memory:").await.unwrap();
        init_schemas(&db_client).await.unwrap();
        let tokens = Arc::new(SqlTokenStore::new(db_client.clone()));
        let calendars = SqlCalendarRepository::new(db_client);
        let provider = Arc::new(provider);
        let (publisher, worker) = channel(&PublisherConfig::default(), Vec::new());

        let refresher = Arc::new(TokenRefresher::new(
            tokens.clone(),
            Arc::new(oauth),
            &TokenConfig::default(),
        ));
        let service = CalendarSyncService::new(
            refresher,
            calendars.clone(),
            provider.clone(),
            GcalConfig::default(),
        )
        .with_publisher(publisher);

        Harness {
            service,
            provider,
            tokens,
            calendars,
            worker,
        }
    }

    async fn harness(provider: FakeCalendarProvider) -> Harness {
        let mut oauth = MockOAuthTokenProvider::new();
        oauth.expect_refresh().times(0);
        harness_with(provider, oauth).await
    }

    async fn authorize(h: &Harness, member_id: i64, expires_in: Duration) {
        let now = Utc::now();
        h.tokens
            .save(&Oauth2Authorization {
                member_id,
                service_type: ServiceType::Calendar,
                access_token: format!("access-{member_id}"),
                refresh_token: Some("refresh".to_string()),
                expiry_time: now + expires_in,
                scope: None,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn request(owner_id: i64, code: &str) -> CreateCalendarRequest {
        CreateCalendarRequest {
            owner_id,
            title: "Team rides".to_string(),
            code: code.to_string(),
            time_zone: Some("Europe/Zurich".to_string()),
        }
    }

    fn emails(list: &[&str]) -> Vec<String> {
        list.iter().map(|e| e.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_calendar_without_token_makes_no_provider_call() {
        let h = harness(FakeCalendarProvider::default()).await;

        let result = h.service.create_calendar(request(42, "rides")).await;

        assert!(matches!(
            result,
            Err(HuddleError::AuthorizationRequired { member_id: 42, .. })
        ));
        assert_eq!(h.provider.call_count(), 0);
        assert!(h.calendars.find_by_code("rides").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_calendar_stores_external_id_and_publishes() {
        let mut h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;

        let calendar = h.service.create_calendar(request(42, "rides")).await.unwrap();

        assert_eq!(calendar.external_id, "cal-0");
        assert_eq!(calendar.timezone, "Europe/Zurich");
        assert_eq!(calendar.status, CalendarStatus::Active);
        assert_eq!(
            h.provider.tokens_seen.lock().unwrap().as_slice(),
            ["access-42".to_string()]
        );
        assert_eq!(
            h.calendars.find(calendar.calendar_id).await.unwrap(),
            Some(calendar.clone())
        );
        let published = h.worker.try_next().unwrap();
        assert_eq!(published.message_type, "CALENDAR_CREATED");
    }

    #[tokio::test]
    async fn test_create_calendar_uses_configured_default_time_zone() {
        let h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;
        let mut req = request(42, "rides");
        req.time_zone = None;

        let calendar = h.service.create_calendar(req).await.unwrap();

        assert_eq!(calendar.timezone, GcalConfig::default().default_time_zone);
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts_before_provider_call() {
        let h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;
        h.service.create_calendar(request(42, "rides")).await.unwrap();

        let result = h.service.create_calendar(request(42, "rides")).await;

        assert!(matches!(result, Err(HuddleError::Conflict(_))));
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_requests_fail_validation_without_calls() {
        let h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;

        let mut bad_zone = request(42, "rides");
        bad_zone.time_zone = Some("Mars/Olympus".to_string());
        let mut blank_title = request(42, "rides");
        blank_title.title = "   ".to_string();

        for req in [bad_zone, blank_title, request(42, "")] {
            let result = h.service.create_calendar(req).await;
            assert!(matches!(result, Err(HuddleError::Validation(_))));
        }
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_external_service_error() {
        let h = harness(FakeCalendarProvider::failing(503)).await;
        authorize(&h, 42, Duration::hours(1)).await;

        let result = h.service.create_calendar(request(42, "rides")).await;

        assert!(matches!(
            result,
            Err(HuddleError::ExternalService {
                status: Some(503),
                ..
            })
        ));
        assert!(h.calendars.find_by_code("rides").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_before_provider_call() {
        let mut oauth = MockOAuthTokenProvider::new();
        oauth.expect_refresh().times(1).returning(|_| {
            Ok(TokenGrant {
                access_token: "fresh-access".to_string(),
                expires_in: 3600,
                refresh_token: None,
                scope: None,
                token_type: None,
            })
        });
        let h = harness_with(FakeCalendarProvider::default(), oauth).await;
        authorize(&h, 42, Duration::seconds(-1)).await;

        h.service.create_calendar(request(42, "rides")).await.unwrap();

        assert_eq!(
            h.provider.tokens_seen.lock().unwrap().as_slice(),
            ["fresh-access".to_string()]
        );
    }

    #[tokio::test]
    async fn test_share_unknown_calendar_is_not_found() {
        let h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;

        let result = h.service.share_calendar(999, "friend@example.com", None).await;

        assert!(matches!(result, Err(HuddleError::CalendarNotFound(999))));
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_share_grants_configured_role() {
        let mut h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;
        let calendar = h.service.create_calendar(request(42, "rides")).await.unwrap();
        h.worker.try_next();

        h.service
            .share_calendar(calendar.calendar_id, " friend@example.com ", Some(7))
            .await
            .unwrap();

        assert_eq!(
            h.provider.shares.lock().unwrap().as_slice(),
            [(
                "cal-0".to_string(),
                "friend@example.com".to_string(),
                "reader".to_string()
            )]
        );
        let published = h.worker.try_next().unwrap();
        assert_eq!(published.message_type, "CALENDAR_SHARED");
        assert_eq!(published.payload["target_member_id"], 7);
    }

    #[tokio::test]
    async fn test_share_with_malformed_email_is_rejected() {
        let h = harness(FakeCalendarProvider::default()).await;

        for email in ["", "no-at-sign", "a@b", "two@@example.com", "sp ace@example.com"] {
            let result = h.service.share_calendar(1, email, None).await;
            assert!(matches!(result, Err(HuddleError::Validation(_))), "{email}");
        }
    }

    #[tokio::test]
    async fn test_add_attendees_reports_partial_failure() {
        let mut h = harness(FakeCalendarProvider::rejecting(&["two@example.com"])).await;
        authorize(&h, 42, Duration::hours(1)).await;
        let calendar = h.service.create_calendar(request(42, "rides")).await.unwrap();
        h.worker.try_next();

        let result = h
            .service
            .add_attendees(
                calendar.calendar_id,
                "evt-1",
                &emails(&["one@example.com", "two@example.com", "three@example.com"]),
            )
            .await;

        match result {
            Err(HuddleError::PartialFailure { succeeded, failed }) => {
                assert_eq!(succeeded, emails(&["one@example.com", "three@example.com"]));
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].item, "two@example.com");
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        let published = h.worker.try_next().unwrap();
        assert_eq!(published.message_type, "ATTENDEES_ADDED");
        assert_eq!(published.payload["attendees"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_attendees_all_rejected_is_still_partial_failure() {
        let mut h = harness(FakeCalendarProvider::rejecting(&["one@example.com"])).await;
        authorize(&h, 42, Duration::hours(1)).await;
        let calendar = h.service.create_calendar(request(42, "rides")).await.unwrap();
        h.worker.try_next();

        let result = h
            .service
            .add_attendees(calendar.calendar_id, "evt-1", &emails(&["one@example.com"]))
            .await;

        assert!(matches!(
            result,
            Err(HuddleError::PartialFailure { ref succeeded, .. }) if succeeded.is_empty()
        ));
        assert!(h.worker.try_next().is_none());
    }

    #[tokio::test]
    async fn test_add_attendees_all_accepted() {
        let h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;
        let calendar = h.service.create_calendar(request(42, "rides")).await.unwrap();

        let added = h
            .service
            .add_attendees(
                calendar.calendar_id,
                "evt-1",
                &emails(&["one@example.com", "two@example.com"]),
            )
            .await
            .unwrap();

        assert_eq!(added.len(), 2);
    }

    #[tokio::test]
    async fn test_create_event_returns_external_id() {
        let h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;
        let calendar = h.service.create_calendar(request(42, "rides")).await.unwrap();
        let start = Utc::now() + Duration::days(1);

        let event_id = h
            .service
            .create_event(
                calendar.calendar_id,
                CreateEventRequest {
                    summary: "Hill repeats".to_string(),
                    description: None,
                    start,
                    end: start + Duration::hours(2),
                    time_zone: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(event_id, "evt-1");
    }

    #[tokio::test]
    async fn test_create_event_rejects_inverted_range() {
        let h = harness(FakeCalendarProvider::default()).await;
        let start = Utc::now();

        let result = h
            .service
            .create_event(
                1,
                CreateEventRequest {
                    summary: "Backwards".to_string(),
                    description: None,
                    start,
                    end: start - Duration::minutes(5),
                    time_zone: None,
                },
            )
            .await;

        assert!(matches!(result, Err(HuddleError::Validation(_))));
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_deactivate_and_activate() {
        let h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;
        let calendar = h.service.create_calendar(request(42, "rides")).await.unwrap();

        h.service.deactivate(calendar.calendar_id).await.unwrap();
        let stored = h.calendars.find(calendar.calendar_id).await.unwrap().unwrap();
        assert_eq!(stored.status, CalendarStatus::Inactive);

        h.service.activate(calendar.calendar_id).await.unwrap();
        let stored = h.calendars.find(calendar.calendar_id).await.unwrap().unwrap();
        assert_eq!(stored.status, CalendarStatus::Active);

        assert!(matches!(
            h.service.deactivate(999).await,
            Err(HuddleError::CalendarNotFound(999))
        ));
    }

    /// Reads from SQLite but fails every insert.
    struct FailingInserts(SqlCalendarRepository);

    impl CalendarRepository for FailingInserts {
        async fn init_schema(&self) -> Result<(), DbError> {
            self.0.init_schema().await
        }

        async fn insert(
            &self,
            _calendar: &NewCalendar,
            _created_on: DateTime<Utc>,
        ) -> Result<Calendar, DbError> {
            Err(DbError::QueryError("disk I/O error".to_string()))
        }

        async fn find(&self, calendar_id: i64) -> Result<Option<Calendar>, DbError> {
            self.0.find(calendar_id).await
        }

        async fn find_by_code(&self, code: &str) -> Result<Option<Calendar>, DbError> {
            self.0.find_by_code(code).await
        }

        async fn set_status(
            &self,
            calendar_id: i64,
            status: CalendarStatus,
        ) -> Result<bool, DbError> {
            self.0.set_status(calendar_id, status).await
        }
    }

    #[tokio::test]
    async fn test_failed_local_write_after_provider_success_is_reported() {
        let h = harness(FakeCalendarProvider::default()).await;
        authorize(&h, 42, Duration::hours(1)).await;
        let refresher = Arc::new(TokenRefresher::new(
            h.tokens.clone(),
            Arc::new(MockOAuthTokenProvider::new()),
            &TokenConfig::default(),
        ));
        let (publisher, mut worker) = channel(&PublisherConfig::default(), Vec::new());
        let service = CalendarSyncService::new(
            refresher,
            FailingInserts(h.calendars.clone()),
            h.provider.clone(),
            GcalConfig::default(),
        )
        .with_publisher(publisher);

        let result = service.create_calendar(request(42, "rides")).await;

        assert!(matches!(result, Err(HuddleError::Database(_))));
        assert_eq!(h.provider.call_count(), 1);
        assert!(h.calendars.find_by_code("rides").await.unwrap().is_none());
        assert!(worker.try_next().is_none());
    }

    #[tokio::test]
    async fn test_missing_attendee_outcomes_are_an_invalid_response() {
        let mut h = harness(FakeCalendarProvider {
            attendee_outcomes: Some(1),
            ..Default::default()
        })
        .await;
        authorize(&h, 42, Duration::hours(1)).await;
        let calendar = h.service.create_calendar(request(42, "rides")).await.unwrap();
        h.worker.try_next();

        let result = h
            .service
            .add_attendees(
                calendar.calendar_id,
                "evt-1",
                &emails(&["one@example.com", "two@example.com"]),
            )
            .await;

        assert!(matches!(
            result,
            Err(HuddleError::ExternalService { ref service, .. }) if service == "google_calendar"
        ));
        assert!(h.worker.try_next().is_none());
    }
}
