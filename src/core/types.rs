use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MAX_SCENARIOS: usize = 3;
pub const MAX_FUNDS_PER_SCENARIO: usize = 5;
pub const MIN_TIME_HORIZON: u32 = 5;
pub const MAX_TIME_HORIZON: u32 = 30;
pub const MIN_YEARLY_RETURN_PCT: f64 = -100.0;
pub const MAX_YEARLY_RETURN_PCT: f64 = 1_000.0;

/// Percentage rate as a fraction, with negative, NaN and infinite rates read as zero.
pub(crate) fn pct_fraction(pct: f64) -> f64 {
    if pct.is_finite() && pct > 0.0 {
        pct / 100.0
    } else {
        0.0
    }
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Overflowed amounts are pinned to the largest finite value of the same sign.
pub(crate) fn saturate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(f64::MIN, f64::MAX)
    }
}

/// Cost rates of a fund, all in percentage points (0-100).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FundCosts {
    pub entry_fee_pct: f64,
    pub management_fee_pct: f64,
    pub ter_pct: f64,
    pub transaction_cost_pct: f64,
    pub performance_fee_pct: f64,
}

impl FundCosts {
    /// Copy with every negative or non-finite rate replaced by zero.
    pub fn sanitized(self) -> Self {
        let clamp = |pct: f64| if pct.is_finite() { pct.max(0.0) } else { 0.0 };
        Self {
            entry_fee_pct: clamp(self.entry_fee_pct),
            management_fee_pct: clamp(self.management_fee_pct),
            ter_pct: clamp(self.ter_pct),
            transaction_cost_pct: clamp(self.transaction_cost_pct),
            performance_fee_pct: clamp(self.performance_fee_pct),
        }
    }

    pub fn total_pct(&self) -> f64 {
        self.entry_fee_pct
            + self.management_fee_pct
            + self.ter_pct
            + self.transaction_cost_pct
            + self.performance_fee_pct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitCostEntry {
    pub year: u32,
    pub exit_fee_pct: f64,
}

/// Sparse year -> exit fee percentage mapping. Years without an entry cost nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ExitCostEntry>", into = "Vec<ExitCostEntry>")]
pub struct ExitCostSchedule {
    fees: BTreeMap<u32, f64>,
}

impl ExitCostSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fee(mut self, year: u32, exit_fee_pct: f64) -> Self {
        self.set(year, exit_fee_pct);
        self
    }

    pub fn set(&mut self, year: u32, exit_fee_pct: f64) {
        self.fees.insert(year, exit_fee_pct);
    }

    pub fn pct_for_year(&self, year: u32) -> f64 {
        self.fees
            .get(&year)
            .copied()
            .filter(|pct| pct.is_finite() && *pct > 0.0)
            .unwrap_or(0.0)
    }

    /// Dense schedule covering `1..=horizon`: existing fees are kept, gaps become 0%
    /// and years past the horizon are dropped.
    pub fn resized(&self, horizon: u32) -> Self {
        let fees = (1..=horizon)
            .map(|year| (year, self.fees.get(&year).copied().unwrap_or(0.0)))
            .collect();
        Self { fees }
    }

    pub fn entries(&self) -> impl Iterator<Item = ExitCostEntry> + '_ {
        self.fees.iter().map(|(&year, &exit_fee_pct)| ExitCostEntry {
            year,
            exit_fee_pct,
        })
    }

    pub fn len(&self) -> usize {
        self.fees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fees.is_empty()
    }
}

impl From<Vec<ExitCostEntry>> for ExitCostSchedule {
    fn from(entries: Vec<ExitCostEntry>) -> Self {
        let fees = entries
            .into_iter()
            .map(|entry| (entry.year, entry.exit_fee_pct))
            .collect();
        Self { fees }
    }
}

impl From<ExitCostSchedule> for Vec<ExitCostEntry> {
    fn from(schedule: ExitCostSchedule) -> Self {
        schedule.entries().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fund {
    pub id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: f64,
    pub yearly_return_pct: f64,
    #[serde(default)]
    pub costs: FundCosts,
    /// Per-fund schedule; when absent the scenario schedule applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_costs: Option<ExitCostSchedule>,
}

impl Fund {
    pub fn allocation(&self) -> f64 {
        self.unit_price * self.quantity
    }

    pub fn total_cost_pct(&self) -> f64 {
        self.costs.total_pct()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSettings {
    pub tax_rate_pct: f64,
    /// Distinct years in ascending order.
    pub realization_years: Vec<u32>,
}

impl Default for TaxSettings {
    fn default() -> Self {
        Self {
            tax_rate_pct: 30.0,
            realization_years: Vec::new(),
        }
    }
}

impl TaxSettings {
    pub fn is_realization_year(&self, year: u32) -> bool {
        self.realization_years.contains(&year)
    }
}

/// Exemption regime applied by the tax engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRules {
    pub base_exemption: f64,
    pub carryover_per_year: f64,
    pub max_carryover: f64,
}

impl Default for TaxRules {
    fn default() -> Self {
        Self {
            base_exemption: 10_000.0,
            carryover_per_year: 1_000.0,
            max_carryover: 5_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub funds: Vec<Fund>,
    #[serde(default)]
    pub exit_costs: ExitCostSchedule,
    #[serde(default)]
    pub tax_settings: TaxSettings,
}

impl Scenario {
    pub fn total_allocated(&self) -> f64 {
        self.funds
            .iter()
            .fold(0.0, |acc, fund| acc + fund.allocation())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    /// Only used for allocation summaries; the engine starts from fund allocations.
    pub initial_capital: f64,
    pub time_horizon: u32,
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub tax_rules: TaxRules,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyCosts {
    pub entry_fee: f64,
    pub management_fee: f64,
    pub ter: f64,
    pub transaction_cost: f64,
    pub performance_fee: f64,
    pub total_costs: f64,
}

impl YearlyCosts {
    pub(crate) fn accumulate(&mut self, other: &YearlyCosts) {
        self.entry_fee = saturate(self.entry_fee + other.entry_fee);
        self.management_fee = saturate(self.management_fee + other.management_fee);
        self.ter = saturate(self.ter + other.ter);
        self.transaction_cost = saturate(self.transaction_cost + other.transaction_cost);
        self.performance_fee = saturate(self.performance_fee + other.performance_fee);
        self.total_costs = saturate(self.total_costs + other.total_costs);
    }
}

/// Cost rates echoed back for display; `total` is total costs relative to the start value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostPercentages {
    pub entry_fee: f64,
    pub management_fee: f64,
    pub ter: f64,
    pub transaction_cost: f64,
    pub performance_fee: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundYearResult {
    pub year: u32,
    pub fund_id: String,
    pub fund_name: String,
    pub start_value: f64,
    pub gross_return: f64,
    pub gross_return_pct: f64,
    pub costs: YearlyCosts,
    pub costs_pct: CostPercentages,
    pub end_value_before_costs: f64,
    pub end_value_after_costs: f64,
    pub net_return: f64,
    pub net_return_pct: f64,
    pub exit_cost: f64,
    pub exit_cost_pct: f64,
    pub value_after_exit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioYearResult {
    pub year: u32,
    pub funds: Vec<FundYearResult>,
    pub total_start_value: f64,
    pub total_gross_return: f64,
    pub total_costs: YearlyCosts,
    pub total_end_value_before_costs: f64,
    pub total_end_value_after_costs: f64,
    pub total_net_return: f64,
    pub cumulative_value: f64,
    pub exit_cost: f64,
    /// Weighted exit fee for display only.
    pub exit_cost_pct: f64,
    pub value_after_exit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioProjection {
    pub scenario_id: String,
    pub scenario_name: String,
    pub initial_investment: f64,
    pub years: Vec<ScenarioYearResult>,
    pub final_value: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub total_costs_paid: f64,
}

impl ScenarioProjection {
    pub fn year(&self, year: u32) -> Option<&ScenarioYearResult> {
        self.years.iter().find(|y| y.year == year)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitValue {
    pub value: f64,
    pub exit_cost: f64,
    pub net_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxYearResult {
    pub year: u32,
    pub yearly_gain: f64,
    pub cumulative_unrealized_gains: f64,
    pub carryover_exemption: f64,
    pub available_exemption: f64,
    pub is_realization_year: bool,
    pub realized_gains: f64,
    pub taxable_gains: f64,
    pub tax_due: f64,
    pub exemption_used: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxProjection {
    pub years: Vec<TaxYearResult>,
    pub total_tax_paid: f64,
    pub total_exemption_used: f64,
}

impl TaxProjection {
    pub fn year(&self, year: u32) -> Option<&TaxYearResult> {
        self.years.iter().find(|y| y.year == year)
    }

    /// Tax paid relative to everything realized (exempt part plus taxable part).
    pub fn effective_rate_pct(&self) -> f64 {
        let taxable_realized = self
            .years
            .iter()
            .filter(|y| y.is_realization_year)
            .fold(0.0, |acc, y| acc + y.taxable_gains);
        let base = self.total_exemption_used + taxable_realized;
        if base > 0.0 {
            self.total_tax_paid / base * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    pub projection: ScenarioProjection,
    pub tax: TaxProjection,
}
