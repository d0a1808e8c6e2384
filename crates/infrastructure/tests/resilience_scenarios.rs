//! End-to-end resilience scenarios
//!
//! Tests cover:
//! - Breaker opening, blocking and recovering around a transport
//! - Half-open probe budget under concurrent calls
//! - Full call chain with fallback data
//! - Chaos faults drained when a run is aborted mid-way
//! - Breaker state machine against a reference model

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use application::{TransportPort, TransportRequest, TransportResponse, TransportStatus};
use async_trait::async_trait;
use domain::{CallClass, ChaosFault, CircuitKey, CircuitState, MetricKind};
use mockall::mock;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use infrastructure::{
    ChaosController, ChaosControllerConfig, CircuitBreakerConfig, CircuitBreakerRegistry,
    FallbackConfig, FallbackProvider, FallbackReason, Guarded, RecordingSink, ResilientCall,
    ResilientOutcome, RetryConfig, RetryPolicy, RunEnd, RunScope, SubstituteOrigin,
    ToxiproxyClient, ToxiproxyConfig, default_products,
};

mock! {
    pub Transport {}

    #[async_trait]
    impl TransportPort for Transport {
        async fn call(&self, request: TransportRequest) -> TransportResponse;
    }
}

fn answer(code: u16) -> TransportResponse {
    TransportResponse::new(TransportStatus::Http(code), "", Duration::from_millis(5))
}

/// Transport failing its first `failures` calls with 503, then answering 200
fn flaky_transport(failures: u32, total_calls: usize) -> (Arc<MockTransport>, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let mut transport = MockTransport::new();
    transport
        .expect_call()
        .times(total_calls)
        .returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < failures { answer(503) } else { answer(200) }
        });
    (Arc::new(transport), calls)
}

fn products() -> TransportRequest {
    TransportRequest::get("http://shopstack/api/products")
}

// ============================================================================
// Circuit Breaker Scenarios
// ============================================================================

mod breaker_scenarios {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn opens_blocks_and_recovers() {
        let sink = Arc::new(RecordingSink::new());
        let registry = CircuitBreakerRegistry::new(
            CircuitBreakerConfig::custom(5, Duration::from_secs(10), 1),
            sink.clone(),
        )
        .unwrap();
        let key = CircuitKey::new("K");
        let (transport, calls) = flaky_transport(5, 6);

        for _ in 0..5 {
            let guarded = registry
                .guard(&key, || transport.call(products()), |r| r.classify().is_failure())
                .await;
            assert!(!guarded.is_blocked());
        }
        assert_eq!(registry.state(&key), CircuitState::Open);

        // within the open window nothing reaches the transport
        tokio::time::advance(Duration::from_secs(9)).await;
        let guarded = registry
            .guard(&key, || transport.call(products()), |r| r.classify().is_failure())
            .await;
        assert!(guarded.is_blocked());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(sink.count(MetricKind::CircuitOpen), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let guarded = registry
            .guard(&key, || transport.call(products()), |r| r.classify().is_failure())
            .await;

        let response = guarded.into_admitted().unwrap();
        assert_eq!(response.status, TransportStatus::Http(200));
        assert_eq!(registry.state(&key), CircuitState::Closed);
        assert_eq!(registry.snapshot(&key).unwrap().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_only_the_probe_budget() {
        let sink = Arc::new(RecordingSink::new());
        let registry = CircuitBreakerRegistry::new(
            CircuitBreakerConfig::custom(1, Duration::from_secs(10), 1),
            sink,
        )
        .unwrap();
        let key = CircuitKey::new("K");

        registry.guard(&key, || async { 503u16 }, |s| *s >= 500).await;
        assert_eq!(registry.state(&key), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(10)).await;

        let slow_probe = registry.guard(
            &key,
            || async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                200u16
            },
            |s| *s >= 500,
        );
        let competing = async {
            tokio::task::yield_now().await;
            registry.guard(&key, || async { 200u16 }, |s| *s >= 500).await
        };

        let (probe, other) = tokio::join!(slow_probe, competing);

        assert_eq!(probe, Guarded::Admitted(200));
        assert!(other.is_blocked());
        assert_eq!(registry.state(&key), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_reopens_with_fresh_window() {
        let sink = Arc::new(RecordingSink::new());
        let registry = CircuitBreakerRegistry::new(
            CircuitBreakerConfig::custom(2, Duration::from_secs(10), 1),
            sink,
        )
        .unwrap();
        let key = CircuitKey::new("K");

        for _ in 0..2 {
            registry.guard(&key, || async { 500u16 }, |s| *s >= 500).await;
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        registry.guard(&key, || async { 500u16 }, |s| *s >= 500).await;

        let snapshot = registry.snapshot(&key).unwrap();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.open_remaining, Some(Duration::from_secs(10)));
    }
}

// ============================================================================
// Full Call Chain
// ============================================================================

mod call_chain_scenarios {
    use super::*;

    fn chain(sink: &Arc<RecordingSink>, max_attempts: u32) -> ResilientCall {
        let breakers = CircuitBreakerRegistry::new(
            CircuitBreakerConfig::custom(5, Duration::from_secs(10), 1),
            sink.clone(),
        )
        .unwrap();
        let retry =
            RetryPolicy::new(RetryConfig::new(max_attempts, 100, 2.0), sink.clone()).unwrap();
        let fallback = FallbackProvider::new(FallbackConfig::default(), sink.clone())
            .with_dataset("K", default_products());

        ResilientCall::new(
            Arc::new(breakers),
            Arc::new(retry),
            Arc::new(fallback),
            sink.clone(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn failing_dependency_degrades_to_fallback() {
        let sink = Arc::new(RecordingSink::new());
        let call = chain(&sink, 1);
        let key = CircuitKey::new("K");
        let (transport, calls) = flaky_transport(u32::MAX, 5);

        for _ in 0..5 {
            let outcome = call
                .call(&key, || transport.call(products()), TransportResponse::classify)
                .await;
            assert_eq!(
                outcome.fallback_reason(),
                Some(FallbackReason::RetriesExhausted)
            );
        }

        let outcome = call
            .call(&key, || transport.call(products()), TransportResponse::classify)
            .await;

        match outcome {
            ResilientOutcome::Substituted { data, reason } => {
                assert_eq!(reason, FallbackReason::CircuitOpen);
                assert_eq!(data.origin, SubstituteOrigin::Static);
                assert_eq!(data.data[0]["name"], "Fallback Product 1");
            },
            other => panic!("expected fallback, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(sink.count(MetricKind::Fallback), 6);
        assert_eq!(sink.resilience_rate(), Some(0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_recover_through_retry() {
        let sink = Arc::new(RecordingSink::new());
        let call = chain(&sink, 3);
        let key = CircuitKey::new("K");
        let (transport, _) = flaky_transport(2, 3);

        let outcome = call
            .call(&key, || transport.call(products()), TransportResponse::classify)
            .await;

        assert!(outcome.is_live());
        assert_eq!(sink.count(MetricKind::Retry), 2);
        let recovery = sink.values(MetricKind::RecoveryTime);
        assert_eq!(recovery.len(), 1);
        assert!((recovery[0] - 300.0).abs() < 1.0);
        assert_eq!(sink.count(MetricKind::Fallback), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_surface_immediately() {
        let sink = Arc::new(RecordingSink::new());
        let call = chain(&sink, 3);
        let key = CircuitKey::new("K");
        let mut transport = MockTransport::new();
        transport.expect_call().times(1).returning(|_| answer(404));

        let outcome = call
            .call(&key, || transport.call(products()), TransportResponse::classify)
            .await;

        assert!(matches!(outcome, ResilientOutcome::Rejected(ref r) if r.status.code() == Some(404)));
        assert_eq!(call.breakers().state(&key), CircuitState::Closed);
        assert_eq!(sink.count(MetricKind::Retry), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn classify_closure_is_respected() {
        let sink = Arc::new(RecordingSink::new());
        let call = chain(&sink, 2);
        let key = CircuitKey::new("K");

        let outcome = call
            .call(
                &key,
                || async { Err::<u16, _>("connection reset") },
                |r: &Result<u16, &'static str>| {
                    if r.is_ok() { CallClass::Success } else { CallClass::RetryableFailure }
                },
            )
            .await;

        assert!(outcome.is_substituted());
        assert_eq!(sink.count(MetricKind::Retry), 1);
    }
}

// ============================================================================
// Chaos Run Scenarios
// ============================================================================

mod chaos_scenarios {
    use super::*;

    #[tokio::test]
    async fn aborted_run_still_removes_faults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/proxies/P/toxics"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/proxies/P/toxics/lat1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::new());
        let client = ToxiproxyClient::new(&ToxiproxyConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let chaos = Arc::new(
            ChaosController::new(
                Arc::new(client),
                sink.clone(),
                ChaosControllerConfig::default(),
            )
            .unwrap(),
        );
        let scope = RunScope::new(Arc::clone(&chaos));

        let fault =
            ChaosFault::latency("lat1", Duration::from_millis(1000), Duration::from_millis(500))
                .unwrap();
        assert!(chaos.inject("P", fault).await);

        let iterations = Arc::new(AtomicU32::new(0));
        let workload = {
            let iterations = Arc::clone(&iterations);
            let token = scope.token();
            async move {
                while !token.is_cancelled() {
                    iterations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        };

        let aborter = {
            let token = scope.token();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            }
        };

        let (report, ()) = tokio::join!(scope.run(workload), aborter);

        assert_eq!(report.end, RunEnd::Aborted);
        assert!(report.drain.is_ok());
        assert_eq!(report.run_id, scope.run_id());
        assert!(iterations.load(Ordering::SeqCst) > 0);
        assert!(chaos.active_faults().is_empty());
        assert_eq!(sink.count(MetricKind::ChaosInjected), 1);

        server.verify().await;
    }

    #[tokio::test(start_paused = true)]
    async fn timed_fault_expires_on_its_own() {
        struct Plane;

        #[async_trait]
        impl application::ChaosControlPort for Plane {
            async fn create_toxic(
                &self,
                _proxy: &str,
                _fault: &ChaosFault,
            ) -> Result<(), application::ApplicationError> {
                Ok(())
            }

            async fn delete_toxic(
                &self,
                _proxy: &str,
                _name: &str,
            ) -> Result<(), application::ApplicationError> {
                Ok(())
            }
        }

        let chaos = Arc::new(
            ChaosController::new(
                Arc::new(Plane),
                Arc::new(RecordingSink::new()),
                ChaosControllerConfig::default(),
            )
            .unwrap(),
        );
        let fault = ChaosFault::timeout("stall", Duration::from_secs(2)).unwrap();

        assert!(chaos.inject_for("P", fault, Duration::from_secs(30)).await);
        assert!(chaos.is_active("P", "stall"));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!chaos.is_active("P", "stall"));
    }
}

// ============================================================================
// Property-based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    /// Reference model: counts consecutive failures and stays open once the
    /// threshold is reached, since time never advances
    fn model(threshold: u32, outcomes: &[bool]) -> (u32, bool) {
        let mut failures = 0;
        let mut invoked = 0;
        for failed in outcomes {
            if failures >= threshold {
                continue;
            }
            invoked += 1;
            failures = if *failed { failures + 1 } else { 0 };
        }
        (invoked, failures >= threshold)
    }

    proptest! {
        #[test]
        fn breaker_matches_reference_model(
            threshold in 1u32..6u32,
            outcomes in proptest::collection::vec(any::<bool>(), 0..40)
        ) {
            let (invoked, open) = tokio_test::block_on(async {
                let registry = CircuitBreakerRegistry::new(
                    CircuitBreakerConfig::custom(threshold, Duration::from_secs(10), 1),
                    Arc::new(RecordingSink::new()),
                )
                .unwrap();
                let key = CircuitKey::new("K");
                let mut invoked = 0u32;

                for failed in &outcomes {
                    registry
                        .guard(
                            &key,
                            || {
                                invoked += 1;
                                std::future::ready(*failed)
                            },
                            |failed| *failed,
                        )
                        .await;
                }
                (invoked, registry.state(&key) == CircuitState::Open)
            });

            let (expected_invoked, expected_open) = model(threshold, &outcomes);
            prop_assert_eq!(invoked, expected_invoked);
            prop_assert_eq!(open, expected_open);
        }

        #[test]
        fn blocked_calls_never_reach_the_operation(
            extra in 1usize..20usize
        ) {
            let calls = tokio_test::block_on(async {
                let registry = CircuitBreakerRegistry::new(
                    CircuitBreakerConfig::custom(1, Duration::from_secs(10), 1),
                    Arc::new(RecordingSink::new()),
                )
                .unwrap();
                let key = CircuitKey::new("K");
                let calls = AtomicU32::new(0);

                for _ in 0..=extra {
                    registry
                        .guard(
                            &key,
                            || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                std::future::ready(true)
                            },
                            |failed| *failed,
                        )
                        .await;
                }
                calls.load(Ordering::SeqCst)
            });

            prop_assert_eq!(calls, 1);
        }
    }
}
