//! Moderation gate run before any paid inference call.
//!
//! Decision order:
//!
//! 1. Moderation disabled in the request options: skip.
//! 2. Ask the classifier.
//! 3. Classifier failed: minors (target age under 18) and strict mode
//!    without the fail-open override get a blocking
//!    [`HeimdallError::Moderation`]. Everyone else proceeds unmoderated.
//! 4. Classifier recommends `block`: [`GateDecision::Blocked`].
//! 5. Age check when a target age is given.
//!
//! The minor rule in step 3 has no configuration switch.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FallbackStrategy;
use crate::providers::ModerationProvider;
use crate::telemetry;
use crate::types::{
    AnalysisOptions, ImageData, ModerationResult, RecommendedAction, SafetyFlags, Severity,
};
use crate::{HeimdallError, Result};

/// Age under which any flag at all filters the content.
const YOUNG_CHILD_AGE: u8 = 13;
/// Age of majority for the fail-closed rule.
const ADULT_AGE: u8 = 18;

/// Adult-facing moderation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationPolicy {
    /// Treat classifier failures as blocking. Default: false.
    pub strict: bool,
    /// Override `strict` and proceed when the classifier fails. Default: true.
    pub fail_open: bool,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            strict: false,
            fail_open: true,
        }
    }
}

impl ModerationPolicy {
    fn blocks_on_failure(&self) -> bool {
        self.strict && !self.fail_open
    }
}

/// Outcome of the gate for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Moderation did not run for this request.
    Skipped,
    /// Content may proceed to inference.
    Passed(ModerationResult),
    /// Content must not reach inference; answer with a blocked description.
    Blocked(ModerationResult),
}

impl GateDecision {
    /// Flags to merge into the model's own safety flags.
    pub fn flags(&self) -> SafetyFlags {
        match self {
            GateDecision::Skipped => SafetyFlags::default(),
            GateDecision::Passed(result) | GateDecision::Blocked(result) => result.flags,
        }
    }
}

fn record(outcome: &'static str) {
    metrics::counter!(telemetry::MODERATION_TOTAL, "outcome" => outcome).increment(1);
}

/// Classifier plus policy.
pub struct ModerationGate {
    provider: Option<Arc<dyn ModerationProvider>>,
    policy: ModerationPolicy,
    timeout: Duration,
}

impl ModerationGate {
    pub fn new(
        provider: Option<Arc<dyn ModerationProvider>>,
        policy: ModerationPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> ModerationPolicy {
        self.policy
    }

    /// Run the gate over the images of one request.
    pub async fn check(
        &self,
        images: &[ImageData],
        options: &AnalysisOptions,
    ) -> Result<GateDecision> {
        if !options.moderation {
            record("skipped");
            return Ok(GateDecision::Skipped);
        }

        let result = match self.classify(images).await {
            Ok(result) => result,
            Err(e) => return self.on_classifier_failure(e, options),
        };

        if result.recommended_action == RecommendedAction::Block {
            record("blocked");
            debug!(severity = ?result.severity, "moderation blocked content");
            return Ok(GateDecision::Blocked(result));
        }

        if let Some(age) = options.target_age {
            check_age(age, &result)?;
        }

        record("allowed");
        Ok(GateDecision::Passed(result))
    }

    async fn classify(&self, images: &[ImageData]) -> Result<ModerationResult> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            HeimdallError::Configuration("no moderation provider configured".into())
        })?;
        tokio::time::timeout(self.timeout, provider.moderate(images))
            .await
            .map_err(|_| HeimdallError::Timeout(self.timeout))?
    }

    fn on_classifier_failure(
        &self,
        error: HeimdallError,
        options: &AnalysisOptions,
    ) -> Result<GateDecision> {
        if options.targets_minor() || self.policy.blocks_on_failure() {
            record("fail_closed");
            let reason = if options.targets_minor() {
                format!("moderation unavailable for content aimed at a minor: {error}")
            } else {
                format!("moderation unavailable in strict mode: {error}")
            };
            return Err(HeimdallError::Moderation {
                reason,
                fallback: Some(FallbackStrategy::Blocked),
            });
        }
        record("fail_open");
        warn!(error = %error, "moderation unavailable, continuing without it");
        Ok(GateDecision::Skipped)
    }
}

/// Age-appropriateness check on a classifier verdict that did not block.
fn check_age(age: u8, result: &ModerationResult) -> Result<()> {
    let filtered = if age < YOUNG_CHILD_AGE {
        !result.safe || result.flags.any()
    } else if age < ADULT_AGE {
        !result.safe || result.severity == Severity::Critical
    } else {
        !result.safe
    };
    if filtered {
        record("filtered");
        let categories = result.flags.active().join(", ");
        return Err(HeimdallError::ContentFiltered {
            reason: format!(
                "content not suitable for target age {age} (severity {:?}, flags [{categories}])",
                result.severity
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(safe: bool, severity: Severity, flags: SafetyFlags) -> ModerationResult {
        ModerationResult {
            safe,
            severity,
            flags,
            recommended_action: RecommendedAction::Allow,
            description: String::new(),
        }
    }

    fn one_flag() -> SafetyFlags {
        SafetyFlags {
            drugs: true,
            ..Default::default()
        }
    }

    #[test]
    fn young_children_filter_any_flag() {
        assert!(check_age(10, &verdict(true, Severity::Low, one_flag())).is_err());
        assert!(check_age(10, &verdict(true, Severity::None, SafetyFlags::default())).is_ok());
    }

    #[test]
    fn teens_filter_unsafe_or_critical() {
        assert!(check_age(15, &verdict(true, Severity::Low, one_flag())).is_ok());
        assert!(check_age(15, &verdict(true, Severity::Critical, one_flag())).is_err());
        assert!(check_age(15, &verdict(false, Severity::Low, one_flag())).is_err());
    }

    #[test]
    fn adults_filter_only_unsafe() {
        assert!(check_age(30, &verdict(true, Severity::Critical, one_flag())).is_ok());
        let err = check_age(30, &verdict(false, Severity::High, one_flag())).unwrap_err();
        assert!(matches!(err, HeimdallError::ContentFiltered { .. }));
    }

    #[test]
    fn default_policy_fails_open() {
        let policy = ModerationPolicy::default();
        assert!(!policy.blocks_on_failure());
        let strict = ModerationPolicy {
            strict: true,
            fail_open: false,
        };
        assert!(strict.blocks_on_failure());
    }

    #[tokio::test]
    async fn missing_classifier_fails_closed_for_minors() {
        let gate = ModerationGate::new(None, ModerationPolicy::default(), Duration::from_secs(1));
        let err = gate
            .check(&[], &AnalysisOptions::default().target_age(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HeimdallError::Moderation {
                fallback: Some(FallbackStrategy::Blocked),
                ..
            }
        ));

        let adult = gate.check(&[], &AnalysisOptions::default()).await.unwrap();
        assert_eq!(adult, GateDecision::Skipped);
    }
}
