use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::context::{CalculationContext, Urgency};
use crate::domain::tariff::{CalculationMethod, ClientId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleCode(pub String);

impl std::fmt::Display for RuleCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationKind {
    Percentage,
    Absolute,
}

/// Which amount a rule's magnitude is computed against. Running-total is the
/// default; base-relative rules must be flagged explicitly, and the trace
/// records which basis was used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleBasis {
    RunningTotal,
    Base,
}

impl RuleBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunningTotal => "total",
            Self::Base => "base",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "total" | "running_total" => Some(Self::RunningTotal),
            "base" => Some(Self::Base),
            _ => None,
        }
    }
}

/// An ordered, possibly-conditional price modifier. The condition is carried
/// as raw JSON because upstream stores it loosely typed: a malformed
/// condition must fail that single rule's evaluation, never the whole
/// calculation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusinessRule {
    #[serde(rename = "codigo")]
    pub code: RuleCode,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "condicion")]
    pub condition: Value,
    #[serde(rename = "tipoModificacion")]
    pub modification: ModificationKind,
    #[serde(rename = "magnitud")]
    pub magnitude: Decimal,
    #[serde(rename = "baseCalculo")]
    pub basis: RuleBasis,
    #[serde(rename = "prioridad")]
    pub priority: i32,
    #[serde(rename = "activa")]
    pub active: bool,
}

/// Typed shape of the condition JSON. Every present criterion must hold
/// (conjunction); an absent criterion matches anything.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleCondition {
    #[serde(rename = "clientes")]
    pub clients: Option<Vec<ClientId>>,
    #[serde(rename = "palletsMinimos")]
    pub min_pallets: Option<u32>,
    #[serde(rename = "pesoMinimoKg")]
    pub min_weight_kg: Option<Decimal>,
    #[serde(rename = "urgenciaMinima")]
    pub min_urgency: Option<Urgency>,
    /// ISO weekday numbers, 1 = Monday .. 7 = Sunday.
    #[serde(rename = "diasSemana")]
    pub weekdays: Option<Vec<u8>>,
    #[serde(rename = "vigenciaDesde")]
    pub valid_from: Option<NaiveDate>,
    #[serde(rename = "vigenciaHasta")]
    pub valid_until: Option<NaiveDate>,
    #[serde(rename = "metodos")]
    pub methods: Option<Vec<String>>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("rule condition does not parse: {0}")]
    Malformed(String),
    #[error("rule condition references unknown method `{0}`")]
    UnknownMethod(String),
    #[error("rule condition weekday `{0}` is outside 1..=7")]
    WeekdayOutOfRange(u8),
}

impl BusinessRule {
    /// Evaluates this rule's condition against a normalized context and the
    /// method actually used for the base price.
    pub fn matches(
        &self,
        context: &CalculationContext,
        method: CalculationMethod,
    ) -> Result<bool, ConditionError> {
        let condition: RuleCondition = serde_json::from_value(self.condition.clone())
            .map_err(|error| ConditionError::Malformed(error.to_string()))?;

        if let Some(clients) = &condition.clients {
            if !clients.contains(&context.client) {
                return Ok(false);
            }
        }

        if let Some(min_pallets) = condition.min_pallets {
            if context.pallets < min_pallets {
                return Ok(false);
            }
        }

        if let Some(min_weight) = condition.min_weight_kg {
            match context.weight_kg {
                Some(weight) if weight >= min_weight => {}
                _ => return Ok(false),
            }
        }

        if let Some(min_urgency) = condition.min_urgency {
            if context.urgency.rank() < min_urgency.rank() {
                return Ok(false);
            }
        }

        if let Some(weekdays) = &condition.weekdays {
            for day in weekdays {
                if !(1..=7).contains(day) {
                    return Err(ConditionError::WeekdayOutOfRange(*day));
                }
            }
            let today = context.date.weekday().number_from_monday() as u8;
            if !weekdays.contains(&today) {
                return Ok(false);
            }
        }

        if let Some(from) = condition.valid_from {
            if context.date < from {
                return Ok(false);
            }
        }
        if let Some(until) = condition.valid_until {
            if context.date > until {
                return Ok(false);
            }
        }

        if let Some(methods) = &condition.methods {
            let mut matched = false;
            for raw in methods {
                let parsed = CalculationMethod::parse(raw)
                    .ok_or_else(|| ConditionError::UnknownMethod(raw.clone()))?;
                if parsed == method {
                    matched = true;
                }
            }
            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::domain::context::{CalculationContext, Urgency};
    use crate::domain::tariff::{CalculationMethod, ClientId, RouteKind, SiteId};

    use super::{BusinessRule, ConditionError, ModificationKind, RuleBasis, RuleCode};

    fn context() -> CalculationContext {
        CalculationContext {
            client: ClientId("c-1".to_owned()),
            origin: SiteId("s-1".to_owned()),
            destination: SiteId("s-2".to_owned()),
            date: "2026-03-04".parse().expect("date"), // a Wednesday
            route_kind_hint: RouteKind::Trmc,
            vehicle_type: "rampla".to_owned(),
            pallets: 12,
            weight_kg: Some(Decimal::new(8_500, 0)),
            volume_m3: None,
            package_count: None,
            urgency: Urgency::Urgente,
            extras: Vec::new(),
            apply_rules: true,
            use_cache: true,
            include_breakdown: false,
        }
    }

    fn rule(condition: serde_json::Value) -> BusinessRule {
        BusinessRule {
            code: RuleCode("R-URG".to_owned()),
            name: "Recargo urgencia".to_owned(),
            condition,
            modification: ModificationKind::Percentage,
            magnitude: Decimal::new(10, 0),
            basis: RuleBasis::RunningTotal,
            priority: 1,
            active: true,
        }
    }

    #[test]
    fn empty_condition_matches_everything() {
        let matches =
            rule(json!({})).matches(&context(), CalculationMethod::Pallet).expect("evaluate");
        assert!(matches);
    }

    #[test]
    fn conjunction_requires_every_present_criterion() {
        let rule = rule(json!({
            "clientes": ["c-1"],
            "palletsMinimos": 10,
            "urgenciaMinima": "urgente",
        }));
        assert!(rule.matches(&context(), CalculationMethod::Pallet).expect("evaluate"));

        let mut smaller = context();
        smaller.pallets = 4;
        assert!(!rule.matches(&smaller, CalculationMethod::Pallet).expect("evaluate"));
    }

    #[test]
    fn urgency_floor_uses_severity_ordering() {
        let rule = rule(json!({ "urgenciaMinima": "urgente" }));
        let mut critical = context();
        critical.urgency = Urgency::Critica;
        assert!(rule.matches(&critical, CalculationMethod::Fixed).expect("evaluate"));

        let mut normal = context();
        normal.urgency = Urgency::Normal;
        assert!(!rule.matches(&normal, CalculationMethod::Fixed).expect("evaluate"));
    }

    #[test]
    fn weekday_window_uses_iso_numbers() {
        // 2026-03-04 is a Wednesday (3).
        let rule = rule(json!({ "diasSemana": [3, 6] }));
        assert!(rule.matches(&context(), CalculationMethod::Pallet).expect("evaluate"));

        let weekend_only = super::BusinessRule {
            condition: json!({ "diasSemana": [6, 7] }),
            ..rule.clone()
        };
        assert!(!weekend_only.matches(&context(), CalculationMethod::Pallet).expect("evaluate"));
    }

    #[test]
    fn malformed_condition_is_a_per_rule_error() {
        let error = rule(json!({ "palletsMinimos": "doce" }))
            .matches(&context(), CalculationMethod::Pallet)
            .expect_err("malformed condition must error");
        assert!(matches!(error, ConditionError::Malformed(_)));

        let unknown_field = rule(json!({ "campoDesconocido": 1 }))
            .matches(&context(), CalculationMethod::Pallet)
            .expect_err("unknown field must error");
        assert!(matches!(unknown_field, ConditionError::Malformed(_)));
    }

    #[test]
    fn method_restriction_rejects_unknown_method_names() {
        let error = rule(json!({ "metodos": ["hora"] }))
            .matches(&context(), CalculationMethod::Pallet)
            .expect_err("unknown method");
        assert_eq!(error, ConditionError::UnknownMethod("hora".to_owned()));

        let restricted = rule(json!({ "metodos": ["kilometro", "pallet"] }));
        assert!(restricted.matches(&context(), CalculationMethod::Pallet).expect("evaluate"));
        assert!(!restricted.matches(&context(), CalculationMethod::Fixed).expect("evaluate"));
    }
}
