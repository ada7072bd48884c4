#[cfg(test)]
mod tests {
    use crate::{apply_env_overrides_from_marker, AppConfig, GoogleOAuthConfig, SECRET_MARKER};

    fn google_with_markers() -> GoogleOAuthConfig {
        GoogleOAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: SECRET_MARKER.to_string(),
            redirect_uri: "http://localhost:8086/api/oauth/callback".to_string(),
            auth_url: "https://accounts.example.com/auth".to_string(),
            token_url: "https://accounts.example.com/token".to_string(),
            scopes: vec!["calendar".to_string()],
            state_secret: SECRET_MARKER.to_string(),
        }
    }

    #[test]
    fn test_marker_replaced_from_env() {
        std::env::set_var("GOOGLE_CLIENT_SECRET", "s3cr3t");
        let config = AppConfig {
            google: Some(google_with_markers()),
            ..Default::default()
        };

        let resolved = apply_env_overrides_from_marker(config).unwrap();
        let google = resolved.google.unwrap();
        assert_eq!(google.client_secret, "s3cr3t");
        assert_eq!(google.client_id, "client-id");
    }

    #[test]
    fn test_marker_kept_when_env_missing() {
        std::env::remove_var("GOOGLE_STATE_SECRET");
        let config = AppConfig {
            google: Some(google_with_markers()),
            ..Default::default()
        };

        let resolved = apply_env_overrides_from_marker(config).unwrap();
        assert_eq!(resolved.google.unwrap().state_secret, SECRET_MARKER);
    }

    #[test]
    fn test_unresolved_secrets_are_reported() {
        let mut google = google_with_markers();
        assert_eq!(
            google.unresolved_secrets(),
            vec!["client_secret", "state_secret"]
        );

        google.client_secret = "s3cr3t".to_string();
        google.state_secret = "  ".to_string();
        assert_eq!(google.unresolved_secrets(), vec!["state_secret"]);

        google.state_secret = "signing-key".to_string();
        assert!(google.unresolved_secrets().is_empty());
    }

    #[test]
    fn test_defaults_for_optional_sections() {
        let config: AppConfig = serde_json::from_str(r#"{"server":{"host":"0.0.0.0","port":9000}}"#).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.tokens.refresh_margin_seconds, 60);
        assert_eq!(config.publisher.channel_capacity, 1024);
        assert_eq!(config.publisher.max_attempts, 3);
        assert!(config.database.is_none());
        assert!(!config.use_sqs);
    }
}
