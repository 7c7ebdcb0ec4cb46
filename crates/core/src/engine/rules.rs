//! Business-rule application stage. Rules run in ascending (priority, code)
//! order; each rule's delta is computed against its declared basis and the
//! trace records which basis was used. A single bad rule is isolated and the
//! rest continue.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::calculation::AppliedRule;
use crate::domain::context::CalculationContext;
use crate::domain::rule::{BusinessRule, ModificationKind, RuleBasis, RuleCode};
use crate::domain::tariff::CalculationMethod;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvaluationFailure {
    #[serde(rename = "codigo")]
    pub code: RuleCode,
    #[serde(rename = "mensaje")]
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuleOutcome {
    pub total: Decimal,
    pub applied: Vec<AppliedRule>,
    pub warnings: Vec<String>,
    pub failures: Vec<RuleEvaluationFailure>,
}

/// Applies `rules` to `base`. The caller has already decided the stage runs
/// at all (`aplicarReglas=false` skips it wholly, which is distinct from
/// zero rules matching).
pub fn apply_rules(
    base: Decimal,
    rules: &[BusinessRule],
    context: &CalculationContext,
    method: CalculationMethod,
) -> RuleOutcome {
    let mut ordered: Vec<&BusinessRule> = rules.iter().filter(|rule| rule.active).collect();
    ordered.sort_by(|left, right| (left.priority, &left.code).cmp(&(right.priority, &right.code)));

    let mut running = base;
    let mut applied = Vec::new();
    let mut warnings = Vec::new();
    let mut failures = Vec::new();

    for rule in ordered {
        let matched = match rule.matches(context, method) {
            Ok(matched) => matched,
            Err(error) => {
                failures.push(RuleEvaluationFailure {
                    code: rule.code.clone(),
                    message: error.to_string(),
                });
                warnings.push(format!("rule {} skipped: condition failed to evaluate", rule.code));
                continue;
            }
        };
        if !matched {
            continue;
        }

        let basis_amount = match rule.basis {
            RuleBasis::RunningTotal => running,
            RuleBasis::Base => base,
        };
        let delta = match rule.modification {
            ModificationKind::Percentage => basis_amount * rule.magnitude / Decimal::from(100),
            ModificationKind::Absolute => rule.magnitude,
        };

        running += delta;
        applied.push(AppliedRule {
            code: rule.code.clone(),
            name: rule.name.clone(),
            delta,
            basis: rule.basis,
        });

        // No clamping; the anomaly is surfaced as a warning instead.
        if running < Decimal::ZERO {
            warnings.push(format!("running total went negative after rule {}", rule.code));
        }
    }

    RuleOutcome { total: running, applied, warnings, failures }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::domain::context::{CalculationContext, Urgency};
    use crate::domain::rule::{BusinessRule, ModificationKind, RuleBasis, RuleCode};
    use crate::domain::tariff::{CalculationMethod, ClientId, RouteKind, SiteId};

    use super::apply_rules;

    fn context() -> CalculationContext {
        CalculationContext {
            client: ClientId("c-1".to_owned()),
            origin: SiteId("s-1".to_owned()),
            destination: SiteId("s-2".to_owned()),
            date: NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"),
            route_kind_hint: RouteKind::Trmc,
            vehicle_type: "rampla".to_owned(),
            pallets: 10,
            weight_kg: None,
            volume_m3: None,
            package_count: None,
            urgency: Urgency::Normal,
            extras: Vec::new(),
            apply_rules: true,
            use_cache: true,
            include_breakdown: false,
        }
    }

    fn rule(
        code: &str,
        priority: i32,
        modification: ModificationKind,
        magnitude: Decimal,
        basis: RuleBasis,
    ) -> BusinessRule {
        BusinessRule {
            code: RuleCode(code.to_owned()),
            name: format!("rule {code}"),
            condition: json!({}),
            modification,
            magnitude,
            basis,
            priority,
            active: true,
        }
    }

    #[test]
    fn percentage_then_flat_compounds_on_the_running_total() {
        let rules = vec![
            rule("R-10PCT", 1, ModificationKind::Percentage, Decimal::new(10, 0), RuleBasis::RunningTotal),
            rule("R-FLAT50", 2, ModificationKind::Absolute, Decimal::new(50, 0), RuleBasis::RunningTotal),
        ];

        let outcome =
            apply_rules(Decimal::new(100, 0), &rules, &context(), CalculationMethod::Fixed);

        // 100 * 1.10 + 50 = 160
        assert_eq!(outcome.total, Decimal::new(160, 0));
        assert_eq!(outcome.applied.len(), 2);
        assert_eq!(outcome.applied[0].code.0, "R-10PCT");
        assert_eq!(outcome.applied[0].delta, Decimal::new(10, 0));
        assert_eq!(outcome.applied[1].delta, Decimal::new(50, 0));
    }

    #[test]
    fn swapped_priorities_change_the_running_total_interpretation() {
        // Flat +50 first, then +10% of the running total: (100+50) * 1.10 = 165.
        let rules = vec![
            rule("R-10PCT", 2, ModificationKind::Percentage, Decimal::new(10, 0), RuleBasis::RunningTotal),
            rule("R-FLAT50", 1, ModificationKind::Absolute, Decimal::new(50, 0), RuleBasis::RunningTotal),
        ];

        let outcome =
            apply_rules(Decimal::new(100, 0), &rules, &context(), CalculationMethod::Fixed);
        assert_eq!(outcome.total, Decimal::new(165, 0));
    }

    #[test]
    fn base_relative_rule_is_insensitive_to_ordering() {
        // +10% of the original base stays 10 regardless of the flat rule
        // landing first: 100 + 50 + 10 = 160.
        let rules = vec![
            rule("R-10PCT", 2, ModificationKind::Percentage, Decimal::new(10, 0), RuleBasis::Base),
            rule("R-FLAT50", 1, ModificationKind::Absolute, Decimal::new(50, 0), RuleBasis::RunningTotal),
        ];

        let outcome =
            apply_rules(Decimal::new(100, 0), &rules, &context(), CalculationMethod::Fixed);
        assert_eq!(outcome.total, Decimal::new(160, 0));
        assert_eq!(outcome.applied[1].basis, RuleBasis::Base);
        assert_eq!(outcome.applied[1].delta, Decimal::new(10, 0));
    }

    #[test]
    fn equal_priorities_tie_break_by_code() {
        let rules = vec![
            rule("R-B", 1, ModificationKind::Absolute, Decimal::new(5, 0), RuleBasis::RunningTotal),
            rule("R-A", 1, ModificationKind::Absolute, Decimal::new(7, 0), RuleBasis::RunningTotal),
        ];

        let outcome =
            apply_rules(Decimal::new(100, 0), &rules, &context(), CalculationMethod::Fixed);
        assert_eq!(outcome.applied[0].code.0, "R-A");
        assert_eq!(outcome.applied[1].code.0, "R-B");
    }

    #[test]
    fn negative_running_total_warns_without_clamping() {
        let rules = vec![rule(
            "R-BIGDISC",
            1,
            ModificationKind::Absolute,
            Decimal::new(-150, 0),
            RuleBasis::RunningTotal,
        )];

        let outcome =
            apply_rules(Decimal::new(100, 0), &rules, &context(), CalculationMethod::Fixed);
        assert_eq!(outcome.total, Decimal::new(-50, 0));
        assert!(outcome.warnings.iter().any(|warning| warning.contains("negative")));
    }

    #[test]
    fn a_bad_rule_degrades_gracefully() {
        let mut broken = rule(
            "R-BROKEN",
            1,
            ModificationKind::Percentage,
            Decimal::new(5, 0),
            RuleBasis::RunningTotal,
        );
        broken.condition = json!({ "palletsMinimos": "muchos" });
        let rules = vec![
            broken,
            rule("R-FLAT50", 2, ModificationKind::Absolute, Decimal::new(50, 0), RuleBasis::RunningTotal),
        ];

        let outcome =
            apply_rules(Decimal::new(100, 0), &rules, &context(), CalculationMethod::Fixed);

        assert_eq!(outcome.total, Decimal::new(150, 0));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].code.0, "R-BROKEN");
        assert_eq!(outcome.applied.len(), 1);
    }

    #[test]
    fn inactive_rules_are_never_evaluated() {
        let mut dormant =
            rule("R-OFF", 1, ModificationKind::Absolute, Decimal::new(999, 0), RuleBasis::RunningTotal);
        dormant.active = false;

        let outcome =
            apply_rules(Decimal::new(100, 0), &[dormant], &context(), CalculationMethod::Fixed);
        assert_eq!(outcome.total, Decimal::new(100, 0));
        assert!(outcome.applied.is_empty());
    }
}
