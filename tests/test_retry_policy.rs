//! Backoff and retry decision properties

use hublink::{
    classify, BackoffPolicy, ClientError, ErrorClass, ExponentialBackoff, FixedIntervalBackoff,
    RetryController, RetryDecision,
};
use proptest::prelude::*;
use std::time::Duration;

fn fatal_errors() -> Vec<ClientError> {
    vec![
        ClientError::AuthenticationRejected {
            message: "401".to_string(),
        },
        ClientError::bad_credential("rejected"),
        ClientError::DeviceDisabled {
            message: "disabled".to_string(),
        },
        ClientError::MalformedConfig {
            message: "bad".to_string(),
        },
    ]
}

#[test]
fn test_every_fatal_error_gives_up_immediately() {
    for error in fatal_errors() {
        let mut retry = RetryController::new(
            Box::new(ExponentialBackoff::with_seed(
                Duration::from_millis(1),
                Duration::from_secs(1),
                0,
            )),
            Duration::from_secs(3600),
        );
        assert_eq!(
            retry.decide(&error, Duration::ZERO),
            RetryDecision::GiveUp,
            "{error}"
        );
        assert_eq!(retry.attempt_count(), 0);
    }
}

#[test]
fn test_recoverable_and_fatal_buckets_are_disjoint() {
    for error in fatal_errors() {
        assert_eq!(classify(&error), ErrorClass::Fatal);
    }
    for error in [
        ClientError::cancelled("c"),
        ClientError::timeout("t"),
        ClientError::service_fault("s"),
        ClientError::connection_failed("cf"),
        ClientError::connection_dropped("cd"),
        ClientError::no_network("n"),
        ClientError::client_fault("g"),
    ] {
        assert_eq!(classify(&error), ErrorClass::Recoverable);
    }
}

#[test]
fn test_successive_delays_never_decrease() {
    // doubling base with jitter bounded by half the base keeps successive
    // samples non-decreasing until the cap, then flat at the cap
    let mut policy =
        ExponentialBackoff::with_seed(Duration::from_millis(100), Duration::from_secs(30), 11);
    let mut previous = Duration::ZERO;
    for attempt in 1..=24 {
        let delay = policy.next_delay(attempt);
        assert!(
            delay >= previous,
            "delay decreased at attempt {attempt}: {previous:?} -> {delay:?}"
        );
        previous = delay;
    }
}

#[test]
fn test_fixed_interval_is_flat() {
    let mut policy = FixedIntervalBackoff::new(Duration::from_millis(750));
    for attempt in 1..=10 {
        assert_eq!(policy.next_delay(attempt), Duration::from_millis(750));
    }
}

#[test]
fn test_controller_series_survives_give_up_decision_boundary() {
    let mut retry = RetryController::new(
        Box::new(FixedIntervalBackoff::new(Duration::from_millis(100))),
        Duration::from_millis(250),
    );
    let error = ClientError::connection_failed("refused");

    assert!(matches!(
        retry.decide(&error, Duration::from_millis(0)),
        RetryDecision::Retry(_)
    ));
    assert!(matches!(
        retry.decide(&error, Duration::from_millis(100)),
        RetryDecision::Retry(_)
    ));
    // 200ms elapsed + 100ms delay exceeds the 250ms ceiling
    assert_eq!(
        retry.decide(&error, Duration::from_millis(200)),
        RetryDecision::GiveUp
    );
}

proptest! {
    #[test]
    fn prop_delay_never_exceeds_cap(seed in any::<u64>(), attempt in 1u32..100) {
        let mut policy = ExponentialBackoff::with_seed(
            Duration::from_millis(100),
            Duration::from_secs(60),
            seed,
        );
        prop_assert!(policy.next_delay(attempt) <= Duration::from_secs(60));
    }

    #[test]
    fn prop_first_attempt_stays_near_initial(seed in any::<u64>()) {
        let mut policy = ExponentialBackoff::with_seed(
            Duration::from_millis(200),
            Duration::from_secs(60),
            seed,
        );
        let delay = policy.next_delay(1);
        prop_assert!(delay >= Duration::from_millis(200));
        prop_assert!(delay < Duration::from_millis(300));
    }

    #[test]
    fn prop_retry_ceiling_always_terminates(seed in any::<u64>()) {
        let ceiling = Duration::from_millis(500);
        let mut retry = RetryController::new(
            Box::new(ExponentialBackoff::with_seed(
                Duration::from_millis(50),
                Duration::from_millis(200),
                seed,
            )),
            ceiling,
        );
        let error = ClientError::timeout("no ConnAck");

        let mut elapsed = Duration::ZERO;
        let mut decisions = 0;
        loop {
            match retry.decide(&error, elapsed) {
                RetryDecision::Retry(delay) => {
                    elapsed += delay;
                    decisions += 1;
                    prop_assert!(decisions <= 64, "retry loop did not terminate");
                }
                RetryDecision::GiveUp => break,
            }
        }
        prop_assert!(elapsed <= ceiling);
    }
}
