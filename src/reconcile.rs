//! Deterministic reconciliation of model output
//!
//! Rules-based, total over any decoded object: malformed fields become missing
//! fields or warnings, never errors. The CET1 ratio is recomputed whenever the
//! inputs allow it.

use crate::coerce::to_optional_float;
use crate::models::{push_unique, CorepResult, RawModelOutput};
use serde_json::Value;
use tracing::{debug, info};

pub const DEFAULT_TEMPLATE_NAME: &str = "COREP Own Funds (prototype)";
pub const DEFAULT_EXPLANATION: &str =
    "Explanation not provided by the model. This is an automatically generated prototype output.";

/// Minimum CET1 ratio (4.5% of RWA)
pub const MIN_CET1_RATIO: f64 = 0.045;

/// Absolute tolerance for comparing the model's ratio with the recomputed one
pub const RATIO_TOLERANCE: f64 = 1e-6;

pub const RATIO_DISAGREEMENT_WARNING: &str =
    "Model-proposed CET1_ratio differed from deterministic CET1/RWA. The deterministic value has been used instead.";

pub const NON_FINITE_RATIO_WARNING: &str =
    "CET1/RWA does not produce a finite number for the reported amounts. CET1_ratio has been left empty.";

/// Amount fields reported as missing, in reporting order
pub const AMOUNT_FIELDS: [&str; 4] = ["CET1", "AT1", "Tier2", "RWA"];

/// Coerced figures a rule looks at
#[derive(Debug, Clone, Copy)]
pub struct Figures {
    pub cet1: Option<f64>,
    pub rwa: Option<f64>,
    /// What the model claimed
    pub proposed_ratio: Option<f64>,
    /// What will be reported. `None` when a derived quotient overflowed.
    pub ratio: Option<f64>,
}

impl Figures {
    /// True when the ratio was recomputed from CET1 / RWA
    pub fn ratio_is_derived(&self) -> bool {
        matches!((self.cet1, self.rwa), (Some(_), Some(rwa)) if rwa > 0.0)
    }
}

/// Trait for deterministic checks producing warnings
pub trait ReconciliationRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Warning text if the check fails
    fn check(&self, figures: &Figures) -> Option<String>;
}

pub struct Reconciler {
    rules: Vec<Box<dyn ReconciliationRule>>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn ReconciliationRule>) {
        self.rules.push(rule);
    }

    pub fn reconcile(&self, raw: &RawModelOutput) -> CorepResult {
        let template_name = non_blank_string(raw.get("template_name"))
            .unwrap_or_else(|| DEFAULT_TEMPLATE_NAME.to_string());
        let explanation = non_blank_string(raw.get("explanation"))
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());

        let cet1 = to_optional_float(raw.get("CET1"));
        let at1 = to_optional_float(raw.get("AT1"));
        let tier2 = to_optional_float(raw.get("Tier2"));
        let rwa = to_optional_float(raw.get("RWA"));
        let proposed_ratio = to_optional_float(raw.get("CET1_ratio"));

        let mut missing_fields: Vec<String> = AMOUNT_FIELDS
            .iter()
            .zip([cet1, at1, tier2, rwa])
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.to_string())
            .collect();

        let ratio = match (cet1, rwa) {
            (Some(cet1), Some(rwa)) if rwa > 0.0 => Some(cet1 / rwa).filter(|r| r.is_finite()),
            _ => proposed_ratio,
        };

        let figures = Figures {
            cet1,
            rwa,
            proposed_ratio,
            ratio,
        };

        let mut validation_warnings = Vec::new();
        for rule in &self.rules {
            if let Some(warning) = rule.check(&figures) {
                debug!(rule = rule.name(), "Rule raised warning");
                push_unique(&mut validation_warnings, warning);
            }
        }
        let deterministic_warnings = validation_warnings.len();

        let mut rules_used = Vec::new();
        for rule in string_entries(raw.get("rules_used")) {
            push_unique(&mut rules_used, rule);
        }
        for field in string_entries(raw.get("missing_fields")) {
            push_unique(&mut missing_fields, field);
        }
        for warning in string_entries(raw.get("validation_warnings")) {
            push_unique(&mut validation_warnings, warning);
        }

        info!(
            ratio_derived = figures.ratio_is_derived(),
            missing = missing_fields.len(),
            deterministic_warnings,
            total_warnings = validation_warnings.len(),
            "Reconciliation completed"
        );

        CorepResult {
            template_name,
            cet1,
            at1,
            tier2,
            rwa,
            cet1_ratio: ratio,
            missing_fields,
            validation_warnings,
            rules_used,
            explanation,
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        create_default_reconciler()
    }
}

fn non_blank_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if s.trim().is_empty() => None,
        other => string_form(other),
    }
}

/// String form of a scalar; null and containers have none.
fn string_form(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Entries of a model-declared list. A lone scalar counts as a one-item list.
fn string_entries(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(string_form).collect(),
        Some(other) => string_form(other).into_iter().collect(),
        None => Vec::new(),
    }
}

//
// ========== Rules ==========
//

/// Rule: the model's ratio must agree with CET1 / RWA when that is computable.
///
/// The proposal is also accepted when it equals raw CET1. With CET1 in the
/// millions that second comparison almost never matches, so in practice the
/// rule reduces to the ratio comparison.
pub struct RatioDisagreementRule;

impl ReconciliationRule for RatioDisagreementRule {
    fn name(&self) -> &'static str {
        "ratio_disagreement"
    }

    fn check(&self, figures: &Figures) -> Option<String> {
        if !figures.ratio_is_derived() {
            return None;
        }
        let (proposed, cet1, ratio) = (figures.proposed_ratio?, figures.cet1?, figures.ratio?);

        let differs_from_cet1 = (proposed - cet1).abs() > RATIO_TOLERANCE;
        let differs_from_ratio = (proposed - ratio).abs() > RATIO_TOLERANCE;

        (differs_from_cet1 && differs_from_ratio).then(|| RATIO_DISAGREEMENT_WARNING.to_string())
    }
}

/// Rule: a derived ratio must be a finite number.
pub struct NonFiniteRatioRule;

impl ReconciliationRule for NonFiniteRatioRule {
    fn name(&self) -> &'static str {
        "non_finite_ratio"
    }

    fn check(&self, figures: &Figures) -> Option<String> {
        (figures.ratio_is_derived() && figures.ratio.is_none())
            .then(|| NON_FINITE_RATIO_WARNING.to_string())
    }
}

/// Rule: the reported ratio must be at least 4.5%. Exactly 4.5% passes.
pub struct MinimumCet1RatioRule;

impl ReconciliationRule for MinimumCet1RatioRule {
    fn name(&self) -> &'static str {
        "minimum_cet1_ratio"
    }

    fn check(&self, figures: &Figures) -> Option<String> {
        let ratio = figures.ratio?;
        (ratio < MIN_CET1_RATIO).then(|| {
            format!(
                "CET1_ratio of {:.4} is below the minimum requirement of {:.4} (4.5%).",
                ratio, MIN_CET1_RATIO
            )
        })
    }
}

/// Reconciler with the disagreement and finiteness checks followed by the threshold check
pub fn create_default_reconciler() -> Reconciler {
    let mut reconciler = Reconciler::new();
    reconciler.add_rule(Box::new(RatioDisagreementRule));
    reconciler.add_rule(Box::new(NonFiniteRatioRule));
    reconciler.add_rule(Box::new(MinimumCet1RatioRule));
    reconciler
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reconcile(value: Value) -> CorepResult {
        let raw = match value {
            Value::Object(map) => map,
            other => panic!("test input must be an object, got {other}"),
        };
        create_default_reconciler().reconcile(&raw)
    }

    fn threshold_warnings(result: &CorepResult) -> Vec<&String> {
        result
            .validation_warnings
            .iter()
            .filter(|w| w.contains("below the minimum"))
            .collect()
    }

    #[test]
    fn test_defaults_for_empty_object() {
        let result = reconcile(json!({}));
        assert_eq!(result.template_name, DEFAULT_TEMPLATE_NAME);
        assert_eq!(result.explanation, DEFAULT_EXPLANATION);
        assert_eq!(result.missing_fields, vec!["CET1", "AT1", "Tier2", "RWA"]);
        assert!(result.cet1_ratio.is_none());
        assert!(result.validation_warnings.is_empty());
        assert!(result.rules_used.is_empty());
    }

    #[test]
    fn test_blank_template_and_null_explanation_get_defaults() {
        let result = reconcile(json!({"template_name": "  ", "explanation": null}));
        assert_eq!(result.template_name, DEFAULT_TEMPLATE_NAME);
        assert_eq!(result.explanation, DEFAULT_EXPLANATION);
    }

    #[test]
    fn test_ratio_is_recomputed_regardless_of_proposal() {
        for (cet1, rwa, proposed) in [
            (300.0, 5000.0, json!(0.9)),
            (1250.0, 10000.0, json!("12.5%")),
            (7.0, 3.0, json!(null)),
            (450.0, 10000.0, json!([0.1])),
        ] {
            let result = reconcile(json!({"CET1": cet1, "RWA": rwa, "CET1_ratio": proposed}));
            let ratio = result.cet1_ratio.unwrap();
            assert!((ratio - cet1 / rwa).abs() < 1e-9, "cet1={cet1} rwa={rwa}");
        }
    }

    #[test]
    fn test_disagreement_warning() {
        let result = reconcile(json!({"CET1": 300, "RWA": 5000, "CET1_ratio": 0.9}));
        assert_eq!(result.cet1_ratio, Some(0.06));
        assert!(result
            .validation_warnings
            .contains(&RATIO_DISAGREEMENT_WARNING.to_string()));
    }

    #[test]
    fn test_agreeing_proposal_has_no_warning() {
        let result = reconcile(json!({"CET1": 300, "RWA": 5000, "CET1_ratio": 0.06}));
        assert!(result.validation_warnings.is_empty());
    }

    #[test]
    fn test_proposal_equal_to_cet1_is_not_flagged() {
        // model conflated the ratio with the CET1 amount
        let result = reconcile(json!({"CET1": 300, "RWA": 5000, "CET1_ratio": 300}));
        assert_eq!(result.cet1_ratio, Some(0.06));
        assert!(result.validation_warnings.is_empty());
    }

    #[test]
    fn test_pass_through_when_ratio_not_computable() {
        for raw in [
            json!({"CET1": 300, "CET1_ratio": 0.07}),
            json!({"CET1": 300, "RWA": 0, "CET1_ratio": 0.07}),
            json!({"CET1": 300, "RWA": -5000, "CET1_ratio": 0.07}),
            json!({"RWA": 5000, "CET1_ratio": "7%"}),
        ] {
            let result = reconcile(raw.clone());
            let expected = to_optional_float(raw.get("CET1_ratio"));
            assert_eq!(result.cet1_ratio, expected, "input {raw}");
            assert!(!result
                .validation_warnings
                .contains(&RATIO_DISAGREEMENT_WARNING.to_string()));
        }
    }

    #[test]
    fn test_pass_through_of_absent_ratio() {
        let result = reconcile(json!({"CET1": 300}));
        assert!(result.cet1_ratio.is_none());
    }

    #[test]
    fn test_non_positive_rwa_is_still_present() {
        let result = reconcile(json!({"CET1": 300, "AT1": 1, "Tier2": 2, "RWA": 0}));
        assert_eq!(result.rwa, Some(0.0));
        assert!(result.missing_fields.is_empty());
        assert!(result.cet1_ratio.is_none());
    }

    #[test]
    fn test_default_rule_order() {
        let names: Vec<_> = create_default_reconciler()
            .rules
            .iter()
            .map(|rule| rule.name())
            .collect();
        assert_eq!(
            names,
            vec!["ratio_disagreement", "non_finite_ratio", "minimum_cet1_ratio"]
        );
    }

    #[test]
    fn test_overflowing_ratio_is_left_empty_with_warning() {
        let result = reconcile(json!({"CET1": 1e300, "RWA": 1e-300, "CET1_ratio": 0.06}));
        assert_eq!(result.cet1, Some(1e300));
        assert!(result.cet1_ratio.is_none());
        assert_eq!(result.validation_warnings, vec![NON_FINITE_RATIO_WARNING]);

        let body = serde_json::to_value(&result).unwrap();
        assert!(body["CET1_ratio"].is_null());
    }

    #[test]
    fn test_threshold_breach() {
        let result = reconcile(json!({"CET1": 300, "RWA": 10000}));
        assert_eq!(result.cet1_ratio, Some(0.03));
        let warnings = threshold_warnings(&result);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("0.0300"));
        assert!(warnings[0].contains("4.5%"));
    }

    #[test]
    fn test_threshold_boundary_passes() {
        let result = reconcile(json!({"CET1": 450, "RWA": 10000}));
        assert_eq!(result.cet1_ratio, Some(0.045));
        assert!(threshold_warnings(&result).is_empty());
    }

    #[test]
    fn test_threshold_applies_to_passed_through_ratio() {
        let result = reconcile(json!({"CET1_ratio": "2%"}));
        // "2%" coerces to 2.0, which is not below 0.045
        assert!(threshold_warnings(&result).is_empty());

        let result = reconcile(json!({"CET1_ratio": 0.02}));
        assert_eq!(threshold_warnings(&result).len(), 1);
    }

    #[test]
    fn test_missing_field_detection_order() {
        let result = reconcile(json!({"CET1": 300, "AT1": null, "Tier2": "n/a", "RWA": 5000}));
        assert_eq!(result.missing_fields, vec!["AT1", "Tier2"]);
    }

    #[test]
    fn test_booleans_and_lists_are_missing() {
        let result = reconcile(json!({"CET1": true, "AT1": [50], "Tier2": {"v": 1}, "RWA": "5000"}));
        assert!(result.cet1.is_none());
        assert!(result.at1.is_none());
        assert_eq!(result.rwa, Some(5000.0));
        assert_eq!(result.missing_fields, vec!["CET1", "AT1", "Tier2"]);
    }

    #[test]
    fn test_model_declared_missing_fields_are_unioned() {
        let result = reconcile(json!({
            "CET1": 300, "RWA": 5000,
            "missing_fields": ["Tier2", "leverage_exposure", "leverage_exposure", "AT1"]
        }));
        assert_eq!(
            result.missing_fields,
            vec!["AT1", "Tier2", "leverage_exposure"]
        );
    }

    #[test]
    fn test_model_warnings_follow_deterministic_ones() {
        let result = reconcile(json!({
            "CET1": 300, "RWA": 10000,
            "validation_warnings": ["Check AT1 eligibility", "Check AT1 eligibility"]
        }));
        assert_eq!(result.validation_warnings.len(), 2);
        assert!(result.validation_warnings[0].contains("0.0300"));
        assert_eq!(result.validation_warnings[1], "Check AT1 eligibility");
    }

    #[test]
    fn test_rules_used_keep_model_order_without_duplicates() {
        let result = reconcile(json!({
            "rules_used": ["CRR Art. 92", 7, null, ["nested"], "CRR Art. 92", "ITS COREP"]
        }));
        assert_eq!(result.rules_used, vec!["CRR Art. 92", "7", "ITS COREP"]);
    }

    #[test]
    fn test_scalar_rules_used() {
        let result = reconcile(json!({"rules_used": "CRR Art. 92"}));
        assert_eq!(result.rules_used, vec!["CRR Art. 92"]);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let result = reconcile(json!({"CET1": 300, "RWA": 5000, "leverage_ratio": 0.05}));
        assert_eq!(result.cet1_ratio, Some(0.06));
    }
}
