//! Capital-gains tax over a projection: gains accumulate unrealized until a
//! realization year sells everything, and each year without a sale adds to an
//! exemption carryover that the next sale consumes.

use super::types::{
    ScenarioProjection, TaxProjection, TaxRules, TaxSettings, TaxYearResult, pct_fraction,
    saturate,
};

/// State carried from one tax year to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaxState {
    pub cumulative_unrealized_gains: f64,
    pub carryover_exemption: f64,
}

impl TaxState {
    /// Applies one year's gain. A realization year with a positive balance
    /// sells everything and clears both balance and carryover. A year without
    /// realization grows the carryover up to the cap. A realization year on a
    /// non-positive balance leaves the carryover untouched.
    pub fn advance(
        self,
        year: u32,
        yearly_gain: f64,
        is_realization_year: bool,
        tax_rate_pct: f64,
        rules: &TaxRules,
    ) -> (TaxState, TaxYearResult) {
        let cumulative = saturate(self.cumulative_unrealized_gains + yearly_gain);
        let available_exemption = rules.base_exemption + self.carryover_exemption;

        let mut result = TaxYearResult {
            year,
            yearly_gain,
            cumulative_unrealized_gains: cumulative,
            carryover_exemption: self.carryover_exemption,
            available_exemption,
            is_realization_year,
            realized_gains: 0.0,
            taxable_gains: 0.0,
            tax_due: 0.0,
            exemption_used: 0.0,
        };

        let next = if is_realization_year && cumulative > 0.0 {
            let realized_gains = cumulative;
            let taxable_gains = (realized_gains - available_exemption).max(0.0);
            result.realized_gains = realized_gains;
            result.exemption_used = realized_gains.min(available_exemption);
            result.taxable_gains = taxable_gains;
            result.tax_due = taxable_gains * pct_fraction(tax_rate_pct);
            result.cumulative_unrealized_gains = 0.0;

            tracing::trace!(
                year,
                realized_gains,
                taxable_gains,
                tax_due = result.tax_due,
                "realized gains"
            );
            TaxState::default()
        } else if is_realization_year {
            TaxState {
                cumulative_unrealized_gains: cumulative,
                carryover_exemption: self.carryover_exemption,
            }
        } else {
            TaxState {
                cumulative_unrealized_gains: cumulative,
                carryover_exemption: (self.carryover_exemption + rules.carryover_per_year)
                    .min(rules.max_carryover)
                    .max(0.0),
            }
        };

        result.carryover_exemption = next.carryover_exemption;
        (next, result)
    }
}

/// Tax projection over `(year, gain)` pairs, independent of how the gains were produced.
pub fn project_tax_from_gains(
    gains: impl IntoIterator<Item = (u32, f64)>,
    settings: &TaxSettings,
    rules: &TaxRules,
) -> TaxProjection {
    let (_, projection) = gains.into_iter().fold(
        (TaxState::default(), TaxProjection::default()),
        |(state, mut projection), (year, gain)| {
            let (next, result) = state.advance(
                year,
                gain,
                settings.is_realization_year(year),
                settings.tax_rate_pct,
                rules,
            );
            projection.total_tax_paid = saturate(projection.total_tax_paid + result.tax_due);
            projection.total_exemption_used += result.exemption_used;
            projection.years.push(result);
            (next, projection)
        },
    );
    projection
}

pub fn project_tax_with_rules(
    projection: &ScenarioProjection,
    settings: &TaxSettings,
    rules: &TaxRules,
) -> TaxProjection {
    let gains = projection.years.iter().map(|y| (y.year, y.total_net_return));
    let tax = project_tax_from_gains(gains, settings, rules);
    tracing::debug!(
        scenario = %projection.scenario_id,
        realization_years = settings.realization_years.len(),
        total_tax_paid = tax.total_tax_paid,
        "projected tax"
    );
    tax
}

pub fn project_tax(projection: &ScenarioProjection, settings: &TaxSettings) -> TaxProjection {
    project_tax_with_rules(projection, settings, &TaxRules::default())
}
