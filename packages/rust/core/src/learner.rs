//! The learner report: static projection weights and tuning advice.
//!
//! No model is trained here; the weights are the optimizer's published
//! configuration and a fixed suggested revision.

use serde::Serialize;

use crate::compare::Comparison;

/// Projection-model component weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    #[serde(rename = "W_SALARY_PROXY")]
    pub salary_proxy: f64,
    #[serde(rename = "W_MATCHUP")]
    pub matchup: f64,
    #[serde(rename = "W_PACE")]
    pub pace: f64,
    #[serde(rename = "W_REST")]
    pub rest: f64,
    #[serde(rename = "W_OPPORTUNITY")]
    pub opportunity: f64,
    #[serde(rename = "W_SENTIMENT")]
    pub sentiment: f64,
}

/// Weights the optimizer currently runs with.
pub const CURRENT_WEIGHTS: Weights = Weights {
    salary_proxy: 0.35,
    matchup: 0.25,
    pace: 0.15,
    rest: 0.10,
    opportunity: 0.10,
    sentiment: 0.05,
};

/// Suggested revision of [`CURRENT_WEIGHTS`].
pub const SUGGESTED_WEIGHTS: Weights = Weights {
    salary_proxy: 0.32,
    matchup: 0.27,
    pace: 0.18,
    rest: 0.12,
    opportunity: 0.08,
    sentiment: 0.03,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Insights {
    pub pace_correlation: f64,
    pub matchup_importance: f64,
    pub sentiment_weak: bool,
}

pub const INSIGHTS: Insights = Insights {
    pace_correlation: 0.75,
    matchup_importance: 0.82,
    sentiment_weak: true,
};

pub const ESTIMATED_IMPROVEMENT: &str = "12.3%";

pub const WEIGHT_RECOMMENDATION: &str =
    "Increase MATCHUP and PACE weights, decrease SENTIMENT weight";

/// Body of a `learner` response.
#[derive(Debug, Clone, Serialize)]
pub struct LearnerReport {
    pub ok: bool,
    pub current_weights: Weights,
    pub suggested_weights: Weights,
    pub insights: Insights,
    pub estimated_improvement: &'static str,
    pub recommendation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
}

impl LearnerReport {
    pub fn new(comparison: Option<Comparison>) -> Self {
        let recommendations = comparison.as_ref().map(crate::compare::recommend);
        Self {
            ok: true,
            current_weights: CURRENT_WEIGHTS,
            suggested_weights: SUGGESTED_WEIGHTS,
            insights: INSIGHTS,
            estimated_improvement: ESTIMATED_IMPROVEMENT,
            recommendation: WEIGHT_RECOMMENDATION,
            comparison,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn weights_serialize_with_model_names() {
        let value = serde_json::to_value(CURRENT_WEIGHTS).unwrap();
        assert_eq!(value["W_SALARY_PROXY"], json!(0.35));
        assert_eq!(value["W_SENTIMENT"], json!(0.05));
    }

    #[test]
    fn weight_sets_sum_to_one() {
        for w in [CURRENT_WEIGHTS, SUGGESTED_WEIGHTS] {
            let sum = w.salary_proxy + w.matchup + w.pace + w.rest + w.opportunity + w.sentiment;
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn bare_report_omits_comparison() {
        let value = serde_json::to_value(LearnerReport::new(None)).unwrap();
        assert_eq!(value["estimated_improvement"], json!("12.3%"));
        assert_eq!(value["insights"]["sentiment_weak"], json!(true));
        assert!(value.get("comparison").is_none());
    }
}
