#[cfg(test)]
mod tests {
    use crate::oauth::{sign_state, verify_state};
    use chrono::{DateTime, Duration};
    use huddle_common::ServiceType;
    use proptest::prelude::*;

    fn service_type() -> impl Strategy<Value = ServiceType> {
        prop_oneof![
            Just(ServiceType::Calendar),
            Just(ServiceType::Youtube),
            Just(ServiceType::Slack),
        ]
    }

    proptest! {
        #[test]
        fn prop_signed_state_round_trips(
            member_id in any::<i64>(),
            service in service_type(),
            issued_secs in 0i64..4_000_000_000,
            age_secs in 0i64..600,
        ) {
            let issued = DateTime::from_timestamp(issued_secs, 0).unwrap();
            let state = sign_state(member_id, service, issued, "secret").unwrap();

            let verified = verify_state(&state, "secret", issued + Duration::seconds(age_secs));
            prop_assert_eq!(verified.unwrap(), (member_id, service));
        }

        #[test]
        fn prop_any_signature_change_is_rejected(
            member_id in any::<i64>(),
            position in 0usize..64,
        ) {
            let issued = DateTime::from_timestamp(1_746_446_400, 0).unwrap();
            let state = sign_state(member_id, ServiceType::Calendar, issued, "secret").unwrap();

            // The signature is the last 64 hex characters
            let index = state.len() - 64 + position;
            let original = state.as_bytes()[index];
            let replacement = if original == b'0' { '1' } else { '0' };
            let mut tampered = state.clone();
            tampered.replace_range(index..=index, &replacement.to_string());

            prop_assert!(verify_state(&tampered, "secret", issued).is_err());
        }
    }
}
