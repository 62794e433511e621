// Posture decision rule
//
// Pure: takes the readiness flags and one pose estimate, returns what the
// status surface should show. Writing it out is the validation loop's job.

use crate::core::config::Config;
use crate::models::pose::{KeypointName, PoseEstimate, REQUIRED_KEYPOINTS};
use crate::models::status::Decision;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const SUCCESS_MESSAGE: &str = "You are sitting properly!";
pub const PROMPT_MESSAGE: &str = "Please sit properly to visit the home page.";

/// How repeated entries for the same part are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointCounting {
    /// Each part counts once no matter how often the model reports it
    #[default]
    Distinct,
    /// Every matching entry counts, duplicates included
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Criteria {
    pub min_confidence: f32,
    pub counting: KeypointCounting,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            min_confidence: crate::models::pose::DEFAULT_MIN_CONFIDENCE,
            counting: KeypointCounting::Distinct,
        }
    }
}

impl From<&Config> for Criteria {
    fn from(config: &Config) -> Self {
        Self {
            min_confidence: config.min_confidence,
            counting: config.keypoint_counting,
        }
    }
}

/// Result of applying the rule to one estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub matched: usize,
    pub required: usize,
}

impl Verdict {
    pub fn percentage(&self) -> f64 {
        (self.matched as f64 / self.required as f64) * 100.0
    }

    pub fn progress_text(&self) -> String {
        format!("Completion: {:.2}%", self.percentage())
    }

    /// Exact equality: a literal count above the requirement is not a success
    pub fn is_sitting_properly(&self) -> bool {
        self.matched == self.required
    }

    pub fn message(&self) -> &'static str {
        if self.is_sitting_properly() {
            SUCCESS_MESSAGE
        } else {
            PROMPT_MESSAGE
        }
    }

    pub fn decision(&self) -> Decision {
        if self.is_sitting_properly() {
            Decision::SittingProperly
        } else {
            Decision::NotSittingProperly
        }
    }
}

fn is_required(part: KeypointName) -> bool {
    REQUIRED_KEYPOINTS.contains(&part)
}

/// Count required keypoints detected with at least `min_confidence`
pub fn count_matches(estimate: &PoseEstimate, criteria: &Criteria) -> usize {
    let matching = estimate
        .keypoints
        .iter()
        .filter(|k| is_required(k.part) && k.is_confident(criteria.min_confidence));

    match criteria.counting {
        KeypointCounting::Literal => matching.count(),
        KeypointCounting::Distinct => matching.map(|k| k.part).collect::<HashSet<_>>().len(),
    }
}

pub fn assess(estimate: &PoseEstimate, criteria: &Criteria) -> Verdict {
    Verdict {
        matched: count_matches(estimate, criteria),
        required: REQUIRED_KEYPOINTS.len(),
    }
}

/// Full rule including the readiness guard.
/// `None` means the surface must not be touched this cycle.
pub fn validate(
    model_ready: bool,
    camera_on: bool,
    estimate: Option<&PoseEstimate>,
    criteria: &Criteria,
) -> Option<Verdict> {
    if !model_ready || !camera_on {
        return None;
    }
    estimate.map(|estimate| assess(estimate, criteria))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pose::Keypoint;

    fn estimate(parts: &[(KeypointName, f32)]) -> PoseEstimate {
        PoseEstimate::from_keypoints(
            parts
                .iter()
                .map(|(part, score)| Keypoint::new(*part, *score, 100.0, 100.0))
                .collect(),
        )
    }

    fn all_required(score: f32) -> PoseEstimate {
        estimate(&REQUIRED_KEYPOINTS.map(|part| (part, score)))
    }

    #[test]
    fn test_percentage_for_every_count() {
        let expected = [
            "Completion: 0.00%",
            "Completion: 20.00%",
            "Completion: 40.00%",
            "Completion: 60.00%",
            "Completion: 80.00%",
            "Completion: 100.00%",
        ];
        for (k, text) in expected.iter().enumerate() {
            let parts: Vec<_> = REQUIRED_KEYPOINTS[..k].iter().map(|p| (*p, 0.9)).collect();
            let verdict = assess(&estimate(&parts), &Criteria::default());
            assert_eq!(verdict.matched, k);
            assert_eq!(&verdict.progress_text(), text);
        }
    }

    #[test]
    fn test_one_low_confidence_keypoint_prompts() {
        let pose = estimate(&[
            (KeypointName::Nose, 0.9),
            (KeypointName::LeftEye, 0.6),
            (KeypointName::RightEye, 0.4),
            (KeypointName::LeftShoulder, 0.7),
            (KeypointName::RightShoulder, 0.8),
        ]);
        let verdict = assess(&pose, &Criteria::default());
        assert_eq!(verdict.matched, 4);
        assert_eq!(verdict.progress_text(), "Completion: 80.00%");
        assert_eq!(verdict.message(), PROMPT_MESSAGE);
        assert_eq!(verdict.decision(), Decision::NotSittingProperly);
    }

    #[test]
    fn test_three_of_five_scenario() {
        let pose = estimate(&[
            (KeypointName::Nose, 0.9),
            (KeypointName::LeftEye, 0.6),
            (KeypointName::RightEye, 0.4),
            (KeypointName::LeftShoulder, 0.7),
            (KeypointName::LeftHip, 0.8),
        ]);
        let verdict = assess(&pose, &Criteria::default());
        assert_eq!(verdict.matched, 3);
        assert_eq!(verdict.progress_text(), "Completion: 60.00%");
        assert_eq!(verdict.message(), PROMPT_MESSAGE);
    }

    #[test]
    fn test_all_required_present_succeeds() {
        let verdict = assess(&all_required(0.5), &Criteria::default());
        assert_eq!(verdict.progress_text(), "Completion: 100.00%");
        assert!(verdict.is_sitting_properly());
        assert_eq!(verdict.message(), SUCCESS_MESSAGE);
    }

    #[test]
    fn test_non_required_parts_are_ignored() {
        let mut pose = all_required(0.9);
        pose.keypoints
            .push(Keypoint::new(KeypointName::LeftKnee, 0.99, 0.0, 0.0));
        let verdict = assess(&pose, &Criteria::default());
        assert_eq!(verdict.matched, 5);
        assert!(verdict.is_sitting_properly());
    }

    #[test]
    fn test_duplicate_parts_distinct_counting() {
        let mut pose = all_required(0.9);
        pose.keypoints
            .push(Keypoint::new(KeypointName::Nose, 0.95, 0.0, 0.0));
        let verdict = assess(&pose, &Criteria::default());
        assert_eq!(verdict.matched, 5);
        assert!(verdict.is_sitting_properly());
    }

    #[test]
    fn test_duplicate_parts_literal_counting() {
        let mut pose = all_required(0.9);
        pose.keypoints
            .push(Keypoint::new(KeypointName::Nose, 0.95, 0.0, 0.0));
        let criteria = Criteria {
            counting: KeypointCounting::Literal,
            ..Criteria::default()
        };
        let verdict = assess(&pose, &criteria);
        assert_eq!(verdict.matched, 6);
        assert_eq!(verdict.progress_text(), "Completion: 120.00%");
        assert!(!verdict.is_sitting_properly());
        assert_eq!(verdict.message(), PROMPT_MESSAGE);
    }

    #[test]
    fn test_readiness_guard() {
        let pose = all_required(0.9);
        let criteria = Criteria::default();
        assert!(validate(false, true, Some(&pose), &criteria).is_none());
        assert!(validate(true, false, Some(&pose), &criteria).is_none());
        assert!(validate(false, false, Some(&pose), &criteria).is_none());
        assert!(validate(true, true, None, &criteria).is_none());
        assert!(validate(true, true, Some(&pose), &criteria).is_some());
    }

    #[test]
    fn test_custom_threshold() {
        let criteria = Criteria {
            min_confidence: 0.95,
            ..Criteria::default()
        };
        let verdict = assess(&all_required(0.9), &criteria);
        assert_eq!(verdict.matched, 0);
    }
}
