//! Content-safety verdict types

use serde::{Deserialize, Serialize};

/// Severity reported by the safety classifier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// What the classifier recommends doing with the content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    #[default]
    Allow,
    Warn,
    Block,
}

impl RecommendedAction {
    /// The more restrictive of two actions.
    pub fn stricter(self, other: RecommendedAction) -> RecommendedAction {
        match (self, other) {
            (RecommendedAction::Block, _) | (_, RecommendedAction::Block) => RecommendedAction::Block,
            (RecommendedAction::Warn, _) | (_, RecommendedAction::Warn) => RecommendedAction::Warn,
            _ => RecommendedAction::Allow,
        }
    }
}

/// The six safety categories shared by the classifier and the model output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SafetyFlags {
    pub violence: bool,
    pub sexual: bool,
    pub hate: bool,
    pub self_harm: bool,
    pub drugs: bool,
    pub weapons: bool,
}

impl SafetyFlags {
    /// Whether any category is set.
    pub fn any(&self) -> bool {
        self.violence || self.sexual || self.hate || self.self_harm || self.drugs || self.weapons
    }

    /// Category-wise OR. Merging can only add caution.
    pub fn merge(&self, other: &SafetyFlags) -> SafetyFlags {
        SafetyFlags {
            violence: self.violence || other.violence,
            sexual: self.sexual || other.sexual,
            hate: self.hate || other.hate,
            self_harm: self.self_harm || other.self_harm,
            drugs: self.drugs || other.drugs,
            weapons: self.weapons || other.weapons,
        }
    }

    /// Names of the categories that are set.
    pub fn active(&self) -> Vec<&'static str> {
        [
            ("violence", self.violence),
            ("sexual", self.sexual),
            ("hate", self.hate),
            ("self_harm", self.self_harm),
            ("drugs", self.drugs),
            ("weapons", self.weapons),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

/// Verdict from the external safety classifier for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub safe: bool,
    pub severity: Severity,
    pub flags: SafetyFlags,
    pub recommended_action: RecommendedAction,
    pub description: String,
}

impl ModerationResult {
    /// A clean verdict.
    pub fn allow() -> Self {
        Self {
            safe: true,
            description: "no safety concerns detected".to_string(),
            ..Self::default()
        }
    }

    /// Fold several per-image verdicts into the worst case.
    pub fn combine(results: impl IntoIterator<Item = ModerationResult>) -> Self {
        let mut combined = Self::allow();
        let mut notes = Vec::new();
        for result in results {
            combined.safe &= result.safe;
            combined.severity = combined.severity.max(result.severity);
            combined.flags = combined.flags.merge(&result.flags);
            combined.recommended_action = combined
                .recommended_action
                .stricter(result.recommended_action);
            if !result.safe {
                notes.push(result.description);
            }
        }
        if !notes.is_empty() {
            combined.description = notes.join("; ");
        }
        combined
    }
}
