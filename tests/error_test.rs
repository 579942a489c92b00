use std::time::Duration;

use heimdall::{ErrorKind, FallbackStrategy, HeimdallError, Result};

#[test]
fn test_error_display() {
    let err = HeimdallError::ImageNotFound("albums/cat.jpg".to_string());
    assert!(err.to_string().contains("albums/cat.jpg"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(HeimdallError::EmptyResponse)
    }
    assert!(returns_error().is_err());
}

// ============================================================================
// Transient error classification
// ============================================================================

#[test]
fn transient_errors() {
    assert!(HeimdallError::RateLimited { retry_after: None }.is_transient());
    assert!(HeimdallError::Http("connection reset".into()).is_transient());
    assert!(HeimdallError::Timeout(Duration::from_secs(120)).is_transient());
    assert!(HeimdallError::EmptyResponse.is_transient());
    assert!(HeimdallError::Unclassified("???".into()).is_transient());
    for status in [500, 502, 503, 504] {
        assert!(
            HeimdallError::Api {
                status,
                message: "upstream".into()
            }
            .is_transient()
        );
    }
}

#[test]
fn permanent_errors() {
    assert!(!HeimdallError::AuthenticationFailed.is_transient());
    assert!(!HeimdallError::DeploymentNotFound("gpt-4o".into()).is_transient());
    assert!(!HeimdallError::InvalidResponse("not json".into()).is_transient());
    assert!(!HeimdallError::ContentFiltered { reason: "x".into() }.is_transient());
    assert!(
        !HeimdallError::CircuitOpen {
            retry_in: Duration::from_secs(5)
        }
        .is_transient()
    );
    assert!(
        !HeimdallError::Api {
            status: 400,
            message: "bad request".into()
        }
        .is_transient()
    );
}

#[test]
fn retry_after_extraction() {
    let err = HeimdallError::RateLimited {
        retry_after: Some(Duration::from_secs(30)),
    };
    assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    assert_eq!(HeimdallError::Http("x".into()).retry_after(), None);
}

// ============================================================================
// Boundary mapping
// ============================================================================

#[test]
fn kinds_and_statuses() {
    let cases = [
        (HeimdallError::InvalidInput("x".into()), ErrorKind::Validation, 400),
        (HeimdallError::ImageNotFound("x".into()), ErrorKind::Validation, 404),
        (
            HeimdallError::Moderation {
                reason: "x".into(),
                fallback: None,
            },
            ErrorKind::Moderation,
            451,
        ),
        (
            HeimdallError::ContentFiltered { reason: "x".into() },
            ErrorKind::ContentFiltered,
            451,
        ),
        (HeimdallError::Timeout(Duration::ZERO), ErrorKind::Timeout, 504),
        (
            HeimdallError::CircuitOpen {
                retry_in: Duration::ZERO,
            },
            ErrorKind::BreakerOpen,
            503,
        ),
        (HeimdallError::RateLimited { retry_after: None }, ErrorKind::Network, 429),
        (HeimdallError::AuthenticationFailed, ErrorKind::Network, 502),
        (HeimdallError::Configuration("x".into()), ErrorKind::Configuration, 502),
    ];
    for (err, kind, status) in cases {
        assert_eq!(err.kind(), kind, "{err}");
        assert_eq!(err.status(), status, "{err}");
    }
}

#[test]
fn every_kind_has_a_distinct_label() {
    let mut labels: Vec<_> = ErrorKind::ALL.iter().map(|k| k.as_str()).collect();
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(labels.len(), ErrorKind::ALL.len());
}

#[test]
fn report_serializes_fallback_only_when_present() {
    let err = HeimdallError::Moderation {
        reason: "classifier unavailable for a minor".into(),
        fallback: Some(FallbackStrategy::Blocked),
    };
    let report = serde_json::to_value(err.report()).unwrap();
    assert_eq!(report["kind"], "moderation");
    assert_eq!(report["status"], 451);
    assert_eq!(report["retryable"], false);
    assert_eq!(report["fallback"], "blocked");

    let report = serde_json::to_value(HeimdallError::Http("reset".into()).report()).unwrap();
    assert_eq!(report["kind"], "network");
    assert_eq!(report["retryable"], true);
    assert!(report.get("fallback").is_none());
}

#[test]
fn unclassified_does_not_rewrap_heimdall_errors() {
    let err = HeimdallError::unclassified(HeimdallError::AuthenticationFailed);
    assert!(matches!(err, HeimdallError::AuthenticationFailed));

    let io = std::io::Error::other("disk on fire");
    let err = HeimdallError::unclassified(io);
    assert!(matches!(err, HeimdallError::Unclassified(msg) if msg.contains("disk on fire")));
}
