//! Calculation method strategies. The resolved record's declared method
//! selects one of three interchangeable implementations through a dispatch
//! table; toll is rule-exempt and added by the engine after rules run.

use rust_decimal::Decimal;

use crate::domain::context::CalculationContext;
use crate::domain::tariff::{CalculationMethod, TariffRecord};
use crate::errors::EngineError;

/// Floor applied to the pallet count so a zero-pallet request never prices
/// at zero.
pub const MINIMUM_PALLETS: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyOutput {
    pub base_value: Decimal,
    pub formula_applied: String,
    pub warnings: Vec<String>,
}

pub trait CalculationStrategy: Send + Sync {
    /// `distance_km` is pre-resolved by the engine; only the kilometer
    /// strategy consumes it.
    fn compute(
        &self,
        record: &TariffRecord,
        context: &CalculationContext,
        distance_km: Option<Decimal>,
    ) -> Result<StrategyOutput, EngineError>;
}

#[derive(Default)]
pub struct KilometerStrategy;

impl CalculationStrategy for KilometerStrategy {
    fn compute(
        &self,
        record: &TariffRecord,
        context: &CalculationContext,
        distance_km: Option<Decimal>,
    ) -> Result<StrategyOutput, EngineError> {
        let distance = distance_km.ok_or_else(|| EngineError::MissingDistance {
            origin: context.origin.0.clone(),
            destination: context.destination.0.clone(),
        })?;

        let base_value = record.unit_value * distance;
        Ok(StrategyOutput {
            base_value,
            formula_applied: format!(
                "{} x {} km = {}",
                record.unit_value.normalize(),
                distance.normalize(),
                base_value.normalize()
            ),
            warnings: Vec::new(),
        })
    }
}

#[derive(Default)]
pub struct PalletStrategy;

impl CalculationStrategy for PalletStrategy {
    fn compute(
        &self,
        record: &TariffRecord,
        context: &CalculationContext,
        _distance_km: Option<Decimal>,
    ) -> Result<StrategyOutput, EngineError> {
        let effective_pallets = context.pallets.max(MINIMUM_PALLETS);
        let base_value = record.unit_value * Decimal::from(effective_pallets);

        let mut warnings = Vec::new();
        if context.pallets < MINIMUM_PALLETS {
            warnings.push(format!(
                "pallet count {} is below the minimum of {MINIMUM_PALLETS}; the minimum was billed",
                context.pallets
            ));
        }

        Ok(StrategyOutput {
            base_value,
            formula_applied: format!(
                "{} x {} pallets = {}",
                record.unit_value.normalize(),
                effective_pallets,
                base_value.normalize()
            ),
            warnings,
        })
    }
}

#[derive(Default)]
pub struct FixedStrategy;

impl CalculationStrategy for FixedStrategy {
    fn compute(
        &self,
        record: &TariffRecord,
        context: &CalculationContext,
        _distance_km: Option<Decimal>,
    ) -> Result<StrategyOutput, EngineError> {
        let mut warnings = Vec::new();
        if context.pallets > 0 || context.weight_kg.is_some() {
            warnings.push("quantities ignored for fixed-price method".to_owned());
        }

        Ok(StrategyOutput {
            base_value: record.unit_value,
            formula_applied: format!("fixed = {}", record.unit_value.normalize()),
            warnings,
        })
    }
}

pub fn strategy_for(method: CalculationMethod) -> &'static dyn CalculationStrategy {
    static KILOMETER: KilometerStrategy = KilometerStrategy;
    static PALLET: PalletStrategy = PalletStrategy;
    static FIXED: FixedStrategy = FixedStrategy;

    match method {
        CalculationMethod::Kilometer => &KILOMETER,
        CalculationMethod::Pallet => &PALLET,
        CalculationMethod::Fixed => &FIXED,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::domain::context::{CalculationContext, Urgency};
    use crate::domain::tariff::{
        CalculationMethod, ClientId, RouteKind, SiteId, TariffRecord, TariffRecordId,
    };

    use super::strategy_for;

    fn record(method: CalculationMethod, unit_value: Decimal) -> TariffRecord {
        TariffRecord {
            id: TariffRecordId("t-1".to_owned()),
            client: ClientId("c-1".to_owned()),
            origin: SiteId("s-1".to_owned()),
            destination: SiteId("s-2".to_owned()),
            route_kind: "TRMC".to_owned(),
            calculation_method: method,
            unit_value,
            toll_value: Decimal::ZERO,
            valid_from: NaiveDate::from_ymd_opt(2026, 1, 1).expect("date"),
            valid_until: NaiveDate::from_ymd_opt(2026, 12, 31).expect("date"),
        }
    }

    fn context(pallets: u32, weight_kg: Option<Decimal>) -> CalculationContext {
        CalculationContext {
            client: ClientId("c-1".to_owned()),
            origin: SiteId("s-1".to_owned()),
            destination: SiteId("s-2".to_owned()),
            date: NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"),
            route_kind_hint: RouteKind::Trmc,
            vehicle_type: "rampla".to_owned(),
            pallets,
            weight_kg,
            volume_m3: None,
            package_count: None,
            urgency: Urgency::Normal,
            extras: Vec::new(),
            apply_rules: true,
            use_cache: true,
            include_breakdown: false,
        }
    }

    #[test]
    fn kilometer_multiplies_unit_value_by_distance() {
        let output = strategy_for(CalculationMethod::Kilometer)
            .compute(
                &record(CalculationMethod::Kilometer, Decimal::new(1_250, 2)),
                &context(0, None),
                Some(Decimal::new(80, 0)),
            )
            .expect("compute");

        assert_eq!(output.base_value, Decimal::new(100_000, 2));
        assert!(output.formula_applied.contains("80 km"));
    }

    #[test]
    fn kilometer_without_distance_is_a_calculation_error() {
        let error = strategy_for(CalculationMethod::Kilometer)
            .compute(
                &record(CalculationMethod::Kilometer, Decimal::new(1_250, 2)),
                &context(0, None),
                None,
            )
            .expect_err("distance is required");
        assert_eq!(error.code(), "missing_distance");
    }

    #[test]
    fn pallet_floors_at_the_minimum() {
        let output = strategy_for(CalculationMethod::Pallet)
            .compute(
                &record(CalculationMethod::Pallet, Decimal::new(3_000, 2)),
                &context(0, None),
                None,
            )
            .expect("compute");

        assert_eq!(output.base_value, Decimal::new(3_000, 2));
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn pallet_scales_with_the_supplied_count() {
        let output = strategy_for(CalculationMethod::Pallet)
            .compute(
                &record(CalculationMethod::Pallet, Decimal::new(3_000, 2)),
                &context(14, None),
                None,
            )
            .expect("compute");

        assert_eq!(output.base_value, Decimal::new(42_000, 2));
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn fixed_ignores_quantities_with_a_warning() {
        let output = strategy_for(CalculationMethod::Fixed)
            .compute(
                &record(CalculationMethod::Fixed, Decimal::new(50_000, 2)),
                &context(20, Some(Decimal::new(900, 0))),
                None,
            )
            .expect("compute");

        assert_eq!(output.base_value, Decimal::new(50_000, 2));
        assert_eq!(output.warnings, vec!["quantities ignored for fixed-price method".to_owned()]);
    }

    #[test]
    fn fixed_without_quantities_is_warning_free() {
        let output = strategy_for(CalculationMethod::Fixed)
            .compute(
                &record(CalculationMethod::Fixed, Decimal::new(50_000, 2)),
                &context(0, None),
                None,
            )
            .expect("compute");

        assert!(output.warnings.is_empty());
    }
}
