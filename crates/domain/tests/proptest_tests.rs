//! Property-based tests for domain types
//!
//! These tests use proptest to verify invariants across many random inputs.

use domain::{CallClass, ChaosFault, CircuitKey, CircuitState, FaultType, InboundMessage};
use proptest::prelude::*;

// ============================================================================
// CallClass Property Tests
// ============================================================================

mod call_class_tests {
    use super::*;

    proptest! {
        #[test]
        fn server_errors_are_retryable(status in 500u16..600u16) {
            prop_assert_eq!(CallClass::from_status(status), CallClass::RetryableFailure);
        }

        #[test]
        fn client_errors_are_permanent(status in 400u16..500u16) {
            let class = CallClass::from_status(status);
            prop_assert!(class.is_failure());
            prop_assert!(!class.is_retryable());
        }

        #[test]
        fn other_statuses_succeed(
            status in prop_oneof![(100u16..400u16), (600u16..1000u16)]
        ) {
            prop_assert!(CallClass::from_status(status).is_success());
        }
    }
}

// ============================================================================
// ChaosFault Property Tests
// ============================================================================

mod chaos_fault_tests {
    use super::*;

    proptest! {
        #[test]
        fn probability_toxicity_accepted(toxicity in 0.0f64..=1.0f64) {
            let fault = ChaosFault::new("f", FaultType::Latency)
                .unwrap()
                .with_toxicity(toxicity);
            prop_assert!(fault.is_ok());
            prop_assert!((fault.unwrap().toxicity - toxicity).abs() < f64::EPSILON);
        }

        #[test]
        fn out_of_range_toxicity_rejected(
            toxicity in prop_oneof![(-100.0f64..-0.001f64), (1.001f64..100.0f64)]
        ) {
            let fault = ChaosFault::new("f", FaultType::Latency)
                .unwrap()
                .with_toxicity(toxicity);
            prop_assert!(fault.is_err());
        }

        #[test]
        fn packet_loss_rate_becomes_toxicity(rate in 0.0f64..=1.0f64) {
            let fault = ChaosFault::packet_loss("loss", rate).unwrap();
            prop_assert_eq!(fault.fault_type.wire_type(), "timeout");
            prop_assert!((fault.toxicity - rate).abs() < f64::EPSILON);
        }

        #[test]
        fn non_empty_names_accepted(name in "[a-z][a-z0-9_]{0,20}") {
            let fault = ChaosFault::new(name.clone(), FaultType::Bandwidth).unwrap();
            prop_assert_eq!(fault.name, name);
            prop_assert!(!fault.active);
        }
    }
}

// ============================================================================
// CircuitKey / CircuitState Property Tests
// ============================================================================

mod circuit_tests {
    use super::*;

    fn any_state() -> impl Strategy<Value = CircuitState> {
        prop_oneof![
            Just(CircuitState::Closed),
            Just(CircuitState::Open),
            Just(CircuitState::HalfOpen),
        ]
    }

    proptest! {
        #[test]
        fn key_round_trips_through_display(raw in "\\PC{1,40}") {
            let key = CircuitKey::new(raw.clone());
            prop_assert_eq!(key.to_string(), raw.clone());
            prop_assert_eq!(CircuitKey::from(raw.as_str()), key);
        }

        #[test]
        fn no_state_transitions_to_itself(state in any_state()) {
            prop_assert!(!state.can_transition_to(state));
        }

        #[test]
        fn closed_is_only_reached_from_half_open(from in any_state()) {
            prop_assert_eq!(
                from.can_transition_to(CircuitState::Closed),
                from == CircuitState::HalfOpen
            );
        }
    }
}

// ============================================================================
// InboundMessage Property Tests
// ============================================================================

mod inbound_message_tests {
    use super::*;

    proptest! {
        #[test]
        fn arbitrary_text_never_panics(raw in "\\PC{0,64}") {
            let _ = InboundMessage::parse(&raw);
        }

        #[test]
        fn timestamp_survives_any_type(kind in "[a-z-]{1,16}", ts in 0i64..4_000_000_000_000i64) {
            let raw = format!(r#"{{"type":"{kind}","timestamp":{ts}}}"#);
            let msg = InboundMessage::parse(&raw).unwrap();
            prop_assert_eq!(msg.timestamp_ms(), Some(ts));
        }
    }
}
