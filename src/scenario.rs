use crate::config::{ConfidenceWeights, ScenarioMultipliers};
use crate::money::Money;
use crate::schema::{Inflows, Outflows, Scenarios};

/// Best/worst-case closing balances from fixed inflow and outflow multipliers.
pub fn scenario_bands(
    opening_balance: Money,
    inflows: &Inflows,
    outflows: &Outflows,
    multipliers: &ScenarioMultipliers,
) -> Scenarios {
    Scenarios {
        best_case: opening_balance + inflows.total * multipliers.best_inflow
            - outflows.total * multipliers.best_outflow,
        worst_case: opening_balance + inflows.total * multipliers.worst_inflow
            - outflows.total * multipliers.worst_outflow,
    }
}

/// Value-weighted confidence of a day's flows, rounded to two decimals.
///
/// Invoices, bills and taxes carry the confirmed-invoice weight; repeating
/// transactions the repeating weight; pattern and budget outflows their own.
/// A day with no flows is fully certain.
pub fn confidence_level(inflows: &Inflows, outflows: &Outflows, weights: &ConfidenceWeights) -> f64 {
    let components = [
        (inflows.from_invoices, weights.confirmed_invoice),
        (inflows.from_repeating, weights.repeating_invoice),
        (outflows.to_bills, weights.confirmed_invoice),
        (outflows.to_repeating, weights.repeating_invoice),
        (outflows.to_taxes, weights.confirmed_invoice),
        (outflows.to_patterns, weights.inferred_pattern),
        (outflows.to_budgets, weights.budgeted),
    ];

    let total: f64 = components.iter().map(|(amount, _)| amount.value().abs()).sum();
    if total == 0.0 || !total.is_finite() {
        return 1.0;
    }

    let weighted: f64 = components
        .iter()
        .map(|(amount, weight)| amount.value().abs() * weight)
        .sum();

    let confidence = (weighted / total).clamp(0.0, 1.0);
    (confidence * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(v: f64) -> Money {
        Money::new(v)
    }

    #[test]
    fn test_scenario_bands_use_fixed_multipliers() {
        let inflows = Inflows::new(m(1000.0), m(0.0), m(0.0));
        let outflows = Outflows::new(m(500.0), m(0.0), m(0.0), m(0.0), m(0.0));
        let bands = scenario_bands(m(10_000.0), &inflows, &outflows, &ScenarioMultipliers::default());

        assert!((bands.best_case.value() - (10_000.0 + 1200.0 - 450.0)).abs() < 1e-9);
        assert!((bands.worst_case.value() - (10_000.0 + 800.0 - 550.0)).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_defaults_to_one_without_flows() {
        let weights = ConfidenceWeights::default();
        assert_eq!(
            confidence_level(&Inflows::default(), &Outflows::default(), &weights),
            1.0
        );
    }

    #[test]
    fn test_confidence_is_value_weighted() {
        let weights = ConfidenceWeights::default();

        let invoices_only = Inflows::new(m(1000.0), m(0.0), m(0.0));
        assert_eq!(confidence_level(&invoices_only, &Outflows::default(), &weights), 0.95);

        // 1000 * 0.95 + 1000 * 0.60 over 2000 = 0.775, rounds to 0.78
        let outflows = Outflows::new(m(0.0), m(0.0), m(0.0), m(0.0), m(1000.0));
        assert_eq!(confidence_level(&invoices_only, &outflows, &weights), 0.78);

        let repeating = Inflows::new(m(0.0), m(300.0), m(0.0));
        let level = confidence_level(&repeating, &Outflows::default(), &weights);
        assert_eq!(level, 0.98);
        assert!((0.0..=1.0).contains(&level));
    }
}
