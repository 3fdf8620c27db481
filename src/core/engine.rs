use rayon::prelude::*;

use super::tax::project_tax_with_rules;
use super::types::{
    CostPercentages, ExitCostSchedule, ExitValue, Fund, FundYearResult, Scenario,
    ScenarioOutcome, ScenarioProjection, ScenarioYearResult, Simulation, YearlyCosts,
    finite_or_zero, pct_fraction, saturate,
};

/// Value of every fund at the start of a year, aligned with `Scenario::funds`.
#[derive(Debug, Clone)]
struct ProjectionState {
    fund_values: Vec<f64>,
    total_costs_paid: f64,
}

impl ProjectionState {
    fn opening(scenario: &Scenario) -> Self {
        Self {
            fund_values: scenario
                .funds
                .iter()
                .map(|fund| saturate(fund.allocation()))
                .collect(),
            total_costs_paid: 0.0,
        }
    }
}

/// One fund over one year. Costs are taken in a fixed order because each one
/// has a different base: the entry fee is charged on the start value before
/// growth, ongoing costs on the grown value, the performance fee on the
/// positive gross return only.
pub fn compute_fund_year(
    fund: &Fund,
    year: u32,
    start_value: f64,
    scenario_exit_costs: &ExitCostSchedule,
) -> FundYearResult {
    let costs = &fund.costs;
    let start_value = finite_or_zero(start_value);
    let yearly_return_pct = finite_or_zero(fund.yearly_return_pct);

    let entry_fee = if year == 1 {
        charge(start_value, costs.entry_fee_pct)
    } else {
        0.0
    };
    let value_after_entry = saturate(start_value - entry_fee);

    let gross_return = saturate(value_after_entry * (yearly_return_pct / 100.0));
    let end_value_before_costs = saturate(value_after_entry + gross_return);

    let management_fee = charge(end_value_before_costs, costs.management_fee_pct);
    let ter = charge(end_value_before_costs, costs.ter_pct);
    let transaction_cost = charge(end_value_before_costs, costs.transaction_cost_pct);
    let performance_fee = if gross_return > 0.0 {
        charge(gross_return, costs.performance_fee_pct)
    } else {
        0.0
    };

    let total_costs =
        saturate(entry_fee + management_fee + ter + transaction_cost + performance_fee);
    // Entry fee already left the position before growth.
    let end_value_after_costs = saturate(
        end_value_before_costs - management_fee - ter - transaction_cost - performance_fee,
    );

    let net_return = saturate(end_value_after_costs - start_value);
    let net_return_pct = relative_pct(net_return, start_value);

    let exit_cost_pct = fund
        .exit_costs
        .as_ref()
        .unwrap_or(scenario_exit_costs)
        .pct_for_year(year);
    let exit_cost = charge(end_value_after_costs, exit_cost_pct);
    let value_after_exit = saturate(end_value_after_costs - exit_cost);

    FundYearResult {
        year,
        fund_id: fund.id.clone(),
        fund_name: fund.name.clone(),
        start_value,
        gross_return,
        gross_return_pct: yearly_return_pct,
        costs: YearlyCosts {
            entry_fee,
            management_fee,
            ter,
            transaction_cost,
            performance_fee,
            total_costs,
        },
        costs_pct: CostPercentages {
            entry_fee: costs.entry_fee_pct,
            management_fee: costs.management_fee_pct,
            ter: costs.ter_pct,
            transaction_cost: costs.transaction_cost_pct,
            performance_fee: costs.performance_fee_pct,
            total: relative_pct(total_costs, start_value),
        },
        end_value_before_costs,
        end_value_after_costs,
        net_return,
        net_return_pct,
        exit_cost,
        exit_cost_pct,
        value_after_exit,
    }
}

/// Year-by-year projection of every fund in the scenario over `time_horizon` years.
///
/// Years are folded in increasing order; each fund's end value after costs
/// becomes its start value for the following year.
pub fn project_scenario(scenario: &Scenario, time_horizon: u32) -> ScenarioProjection {
    let initial_investment = scenario.total_allocated();

    let mut years = Vec::with_capacity(time_horizon as usize);
    let state = (1..=time_horizon).fold(ProjectionState::opening(scenario), |state, year| {
        let (year_result, next) = advance_year(scenario, year, state);
        years.push(year_result);
        next
    });

    let final_value = years
        .last()
        .map_or(0.0, |y| y.total_end_value_after_costs);
    let total_return = saturate(final_value - initial_investment);

    tracing::debug!(
        scenario = %scenario.id,
        horizon = time_horizon,
        funds = scenario.funds.len(),
        final_value,
        total_costs_paid = state.total_costs_paid,
        "projected scenario"
    );

    ScenarioProjection {
        scenario_id: scenario.id.clone(),
        scenario_name: scenario.name.clone(),
        initial_investment,
        years,
        final_value,
        total_return,
        total_return_pct: relative_pct(total_return, initial_investment),
        total_costs_paid: state.total_costs_paid,
    }
}

fn advance_year(
    scenario: &Scenario,
    year: u32,
    state: ProjectionState,
) -> (ScenarioYearResult, ProjectionState) {
    let funds = scenario
        .funds
        .iter()
        .zip(&state.fund_values)
        .map(|(fund, &start_value)| compute_fund_year(fund, year, start_value, &scenario.exit_costs))
        .collect::<Vec<_>>();

    let year_result = aggregate_year(year, funds);
    let next = ProjectionState {
        fund_values: year_result
            .funds
            .iter()
            .map(|f| f.end_value_after_costs)
            .collect(),
        total_costs_paid: saturate(state.total_costs_paid + year_result.total_costs.total_costs),
    };
    (year_result, next)
}

fn aggregate_year(year: u32, funds: Vec<FundYearResult>) -> ScenarioYearResult {
    let mut total_costs = YearlyCosts::default();
    let mut total_start_value = 0.0;
    let mut total_gross_return = 0.0;
    let mut total_end_value_before_costs = 0.0;
    let mut total_end_value_after_costs = 0.0;
    let mut exit_cost = 0.0;
    let mut value_after_exit = 0.0;

    for fund in &funds {
        total_costs.accumulate(&fund.costs);
        total_start_value = saturate(total_start_value + fund.start_value);
        total_gross_return = saturate(total_gross_return + fund.gross_return);
        total_end_value_before_costs =
            saturate(total_end_value_before_costs + fund.end_value_before_costs);
        total_end_value_after_costs =
            saturate(total_end_value_after_costs + fund.end_value_after_costs);
        exit_cost = saturate(exit_cost + fund.exit_cost);
        value_after_exit = saturate(value_after_exit + fund.value_after_exit);
    }

    let exit_cost_pct = if total_end_value_after_costs > 0.0 {
        exit_cost / total_end_value_after_costs * 100.0
    } else {
        0.0
    };

    ScenarioYearResult {
        year,
        funds,
        total_start_value,
        total_gross_return,
        total_costs,
        total_end_value_before_costs,
        total_end_value_after_costs,
        total_net_return: saturate(total_end_value_after_costs - total_start_value),
        cumulative_value: total_end_value_after_costs,
        exit_cost,
        exit_cost_pct,
        value_after_exit,
    }
}

/// What the portfolio is worth if everything is withdrawn at the end of `year`.
pub fn exit_value_at(projection: &ScenarioProjection, year: u32) -> ExitValue {
    projection
        .year(year)
        .map(|y| ExitValue {
            value: y.total_end_value_after_costs,
            exit_cost: y.exit_cost,
            net_value: y.value_after_exit,
        })
        .unwrap_or_default()
}

/// Projects and taxes every scenario of the simulation. Scenarios share no
/// state, so they run in parallel; the output keeps the input order.
pub fn project_simulation(simulation: &Simulation) -> Vec<ScenarioOutcome> {
    simulation
        .scenarios
        .par_iter()
        .map(|scenario| {
            let projection = project_scenario(scenario, simulation.time_horizon);
            let tax = project_tax_with_rules(
                &projection,
                &scenario.tax_settings,
                &simulation.tax_rules,
            );
            ScenarioOutcome { projection, tax }
        })
        .collect()
}

/// `base` charged at `pct` percent; a rate that reads as zero charges exactly zero.
fn charge(base: f64, pct: f64) -> f64 {
    let fraction = pct_fraction(pct);
    if fraction > 0.0 {
        saturate(base * fraction)
    } else {
        0.0
    }
}

fn relative_pct(amount: f64, base: f64) -> f64 {
    if base > 0.0 {
        saturate(amount / base * 100.0)
    } else {
        0.0
    }
}
