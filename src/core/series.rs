//! Reshapes projection output into chart series and table rows.

use serde::Serialize;

use super::types::{Scenario, ScenarioProjection, Simulation, TaxProjection};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundSeries {
    pub fund_id: String,
    pub fund_name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub labels: Vec<String>,
    pub total_values: Vec<f64>,
    pub fund_values: Vec<FundSeries>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyRow {
    pub year: u32,
    pub start_value: f64,
    pub gross_return: f64,
    pub total_costs: f64,
    pub end_value_after_costs: f64,
    pub net_return: f64,
    pub exit_cost: f64,
    pub value_after_exit: f64,
    pub is_realization_year: bool,
    pub realized_gains: f64,
    pub tax_due: f64,
    pub net_after_tax: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSummary {
    pub initial_capital: f64,
    pub allocated: f64,
    pub remaining: f64,
    pub allocation_pct: f64,
    pub over_allocated: bool,
    pub fully_allocated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundCostSummary {
    pub fund_id: String,
    pub fund_name: String,
    pub allocation: f64,
    pub total_cost_pct: f64,
}

const FULLY_ALLOCATED_TOLERANCE: f64 = 0.01;

/// Value series starting at the initial investment, one point per year end.
/// Per-fund series start at the fund's year 1 start value.
pub fn chart_data(projection: &ScenarioProjection) -> ChartData {
    let labels = std::iter::once("Start".to_string())
        .chain(projection.years.iter().map(|y| format!("Year {}", y.year)))
        .collect();

    let total_values = std::iter::once(projection.initial_investment)
        .chain(projection.years.iter().map(|y| y.cumulative_value))
        .collect();

    let mut fund_values: Vec<FundSeries> = Vec::new();
    for year in &projection.years {
        for fund in &year.funds {
            let idx = match fund_values.iter().position(|s| s.fund_id == fund.fund_id) {
                Some(idx) => idx,
                None => {
                    let opening = projection
                        .years
                        .first()
                        .and_then(|first| first.funds.iter().find(|f| f.fund_id == fund.fund_id))
                        .map_or(0.0, |f| f.start_value);
                    fund_values.push(FundSeries {
                        fund_id: fund.fund_id.clone(),
                        fund_name: fund.fund_name.clone(),
                        values: vec![opening],
                    });
                    fund_values.len() - 1
                }
            };
            fund_values[idx].values.push(fund.end_value_after_costs);
        }
    }

    ChartData {
        labels,
        total_values,
        fund_values,
    }
}

/// One flattened row per projected year, joined with the tax year when there is one.
pub fn yearly_rows(projection: &ScenarioProjection, tax: Option<&TaxProjection>) -> Vec<YearlyRow> {
    projection
        .years
        .iter()
        .map(|y| {
            let tax_year = tax.and_then(|t| t.year(y.year));
            let tax_due = tax_year.map_or(0.0, |t| t.tax_due);
            YearlyRow {
                year: y.year,
                start_value: y.total_start_value,
                gross_return: y.total_gross_return,
                total_costs: y.total_costs.total_costs,
                end_value_after_costs: y.total_end_value_after_costs,
                net_return: y.total_net_return,
                exit_cost: y.exit_cost,
                value_after_exit: y.value_after_exit,
                is_realization_year: tax_year.is_some_and(|t| t.is_realization_year),
                realized_gains: tax_year.map_or(0.0, |t| t.realized_gains),
                tax_due,
                net_after_tax: y.value_after_exit - tax_due,
            }
        })
        .collect()
}

pub fn allocation_summary(simulation: &Simulation, scenario_index: usize) -> AllocationSummary {
    let allocated = simulation
        .scenarios
        .get(scenario_index)
        .map_or(0.0, |s| s.total_allocated());
    let initial_capital = simulation.initial_capital;
    let remaining = initial_capital - allocated;

    AllocationSummary {
        initial_capital,
        allocated,
        remaining,
        allocation_pct: if initial_capital > 0.0 {
            allocated / initial_capital * 100.0
        } else {
            0.0
        },
        over_allocated: remaining < 0.0,
        fully_allocated: remaining.abs() < FULLY_ALLOCATED_TOLERANCE,
    }
}

/// Allocation and summed cost rate of each fund, in scenario order.
pub fn fund_cost_summaries(scenario: &Scenario) -> Vec<FundCostSummary> {
    scenario
        .funds
        .iter()
        .map(|fund| FundCostSummary {
            fund_id: fund.id.clone(),
            fund_name: fund.name.clone(),
            allocation: fund.allocation(),
            total_cost_pct: fund.total_cost_pct(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::project_scenario;
    use crate::core::tax::project_tax;
    use crate::core::types::{ExitCostSchedule, Fund, FundCosts, Scenario, TaxRules, TaxSettings};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn fund(id: &str, unit_price: f64, quantity: f64, yearly_return_pct: f64) -> Fund {
        Fund {
            id: id.to_string(),
            name: id.to_uppercase(),
            unit_price,
            quantity,
            yearly_return_pct,
            costs: FundCosts::default(),
            exit_costs: None,
        }
    }

    fn two_fund_scenario() -> Scenario {
        Scenario {
            id: "s1".to_string(),
            name: "Balanced".to_string(),
            funds: vec![fund("eq", 100.0, 700.0, 10.0), fund("bd", 50.0, 1_000.0, 0.0)],
            exit_costs: ExitCostSchedule::new().with_fee(1, 1.0),
            tax_settings: TaxSettings {
                tax_rate_pct: 30.0,
                realization_years: vec![2],
            },
        }
    }

    fn simulation(scenario: Scenario, initial_capital: f64) -> Simulation {
        Simulation {
            initial_capital,
            time_horizon: 5,
            scenarios: vec![scenario],
            tax_rules: TaxRules::default(),
        }
    }

    #[test]
    fn chart_data_starts_from_initial_values() {
        let projection = project_scenario(&two_fund_scenario(), 5);
        let chart = chart_data(&projection);

        assert_eq!(chart.labels.len(), 6);
        assert_eq!(chart.labels[0], "Start");
        assert_eq!(chart.labels[5], "Year 5");
        assert_approx(chart.total_values[0], 120_000.0);
        assert_approx(chart.total_values[1], 127_000.0);

        assert_eq!(chart.fund_values.len(), 2);
        assert_eq!(chart.fund_values[0].fund_id, "eq");
        assert_eq!(chart.fund_values[0].fund_name, "EQ");
        assert_eq!(chart.fund_values[0].values.len(), 6);
        assert_approx(chart.fund_values[0].values[0], 70_000.0);
        assert_approx(chart.fund_values[0].values[1], 77_000.0);
        assert_approx(chart.fund_values[1].values[5], 50_000.0);
    }

    #[test]
    fn chart_data_for_empty_projection_has_only_start_point() {
        let mut scenario = two_fund_scenario();
        scenario.funds.clear();
        let chart = chart_data(&project_scenario(&scenario, 0));

        assert_eq!(chart.labels, vec!["Start".to_string()]);
        assert_eq!(chart.total_values, vec![0.0]);
        assert!(chart.fund_values.is_empty());
    }

    #[test]
    fn yearly_rows_subtract_exit_cost_and_tax() {
        let scenario = two_fund_scenario();
        let projection = project_scenario(&scenario, 5);
        let tax = project_tax(&projection, &scenario.tax_settings);
        let rows = yearly_rows(&projection, Some(&tax));

        assert_eq!(rows.len(), 5);
        assert_approx(rows[0].exit_cost, 1_270.0);
        assert_approx(rows[0].net_after_tax, 125_730.0);
        assert!(!rows[0].is_realization_year);

        // gains 7_000 + 7_700 against an 11_000 exemption
        assert!(rows[1].is_realization_year);
        assert_approx(rows[1].realized_gains, 14_700.0);
        assert_approx(rows[1].tax_due, 1_110.0);
        assert_approx(rows[1].net_after_tax, rows[1].value_after_exit - 1_110.0);

        let untaxed = yearly_rows(&projection, None);
        assert_approx(untaxed[1].net_after_tax, untaxed[1].value_after_exit);
    }

    #[test]
    fn fund_cost_summaries_sum_the_five_rates() {
        let mut scenario = two_fund_scenario();
        scenario.funds[0].costs = FundCosts {
            entry_fee_pct: 1.0,
            management_fee_pct: 0.75,
            ter_pct: 0.2,
            transaction_cost_pct: 0.05,
            performance_fee_pct: 10.0,
        };
        let summaries = fund_cost_summaries(&scenario);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].fund_id, "eq");
        assert_eq!(summaries[0].fund_name, "EQ");
        assert_approx(summaries[0].allocation, 70_000.0);
        assert_approx(summaries[0].total_cost_pct, 12.0);
        assert_approx(summaries[1].total_cost_pct, 0.0);
    }

    #[test]
    fn allocation_summary_flags_exact_and_over_allocation() {
        let exact = allocation_summary(&simulation(two_fund_scenario(), 120_000.0), 0);
        assert_approx(exact.remaining, 0.0);
        assert_approx(exact.allocation_pct, 100.0);
        assert!(exact.fully_allocated);
        assert!(!exact.over_allocated);

        let over = allocation_summary(&simulation(two_fund_scenario(), 100_000.0), 0);
        assert_approx(over.remaining, -20_000.0);
        assert!(over.over_allocated);
        assert!(!over.fully_allocated);

        let no_capital = allocation_summary(&simulation(two_fund_scenario(), 0.0), 0);
        assert_approx(no_capital.allocation_pct, 0.0);
    }
}
