mod engine;
mod series;
mod tax;
mod types;

pub use engine::{compute_fund_year, exit_value_at, project_scenario, project_simulation};
pub use series::{
    AllocationSummary, ChartData, FundCostSummary, FundSeries, YearlyRow, allocation_summary,
    chart_data, fund_cost_summaries, yearly_rows,
};
pub use tax::{TaxState, project_tax, project_tax_from_gains, project_tax_with_rules};
pub use types::{
    CostPercentages, ExitCostEntry, ExitCostSchedule, ExitValue, Fund, FundCosts,
    FundYearResult, MAX_FUNDS_PER_SCENARIO, MAX_SCENARIOS, MAX_TIME_HORIZON,
    MAX_YEARLY_RETURN_PCT, MIN_TIME_HORIZON, MIN_YEARLY_RETURN_PCT, Scenario, ScenarioOutcome,
    ScenarioProjection, ScenarioYearResult, Simulation, TaxProjection, TaxRules, TaxSettings,
    TaxYearResult, YearlyCosts,
};
