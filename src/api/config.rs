use std::collections::HashSet;

use clap::Args;
use serde::Deserialize;

use super::error::ConfigError;
use crate::core::{
    ExitCostEntry, ExitCostSchedule, Fund, FundCosts, MAX_FUNDS_PER_SCENARIO, MAX_SCENARIOS,
    MAX_TIME_HORIZON, MAX_YEARLY_RETURN_PCT, MIN_TIME_HORIZON, MIN_YEARLY_RETURN_PCT, Scenario,
    Simulation, TaxRules, TaxSettings,
};

const DEFAULT_INITIAL_CAPITAL: f64 = 120_000.0;
const DEFAULT_TIME_HORIZON: u32 = 10;
const DEFAULT_TAX_RATE: f64 = 30.0;
const DEFAULT_BASE_EXEMPTION: f64 = 10_000.0;
const DEFAULT_CARRYOVER_PER_YEAR: f64 = 1_000.0;
const DEFAULT_MAX_CARRYOVER: f64 = 5_000.0;
const DEFAULT_FUND_UNIT_PRICE: f64 = 100.0;
const DEFAULT_FUND_YEARLY_RETURN: f64 = 5.0;

/// Simulation defaults applied to anything a payload leaves out.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct Cli {
    #[arg(
        long,
        default_value_t = DEFAULT_INITIAL_CAPITAL,
        help = "Capital available for allocation across funds"
    )]
    pub initial_capital: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_TIME_HORIZON,
        help = "Projection length in years (5-30)"
    )]
    pub time_horizon: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_TAX_RATE,
        help = "Flat capital gains tax rate in percent for scenarios that do not set one"
    )]
    pub tax_rate: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_BASE_EXEMPTION,
        help = "Tax-free realized gains per realization year"
    )]
    pub base_exemption: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_CARRYOVER_PER_YEAR,
        help = "Exemption carried over for each year without realization"
    )]
    pub carryover_per_year: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CARRYOVER,
        help = "Cap on the exemption carryover"
    )]
    pub max_carryover: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_FUND_UNIT_PRICE,
        help = "Unit price for funds that do not set one"
    )]
    pub fund_unit_price: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_FUND_YEARLY_RETURN,
        help = "Expected yearly return in percent for funds that do not set one"
    )]
    pub fund_yearly_return: f64,
}

pub fn default_cli() -> Cli {
    Cli {
        initial_capital: DEFAULT_INITIAL_CAPITAL,
        time_horizon: DEFAULT_TIME_HORIZON,
        tax_rate: DEFAULT_TAX_RATE,
        base_exemption: DEFAULT_BASE_EXEMPTION,
        carryover_per_year: DEFAULT_CARRYOVER_PER_YEAR,
        max_carryover: DEFAULT_MAX_CARRYOVER,
        fund_unit_price: DEFAULT_FUND_UNIT_PRICE,
        fund_yearly_return: DEFAULT_FUND_YEARLY_RETURN,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectPayload {
    pub initial_capital: Option<f64>,
    pub time_horizon: Option<u32>,
    pub base_exemption: Option<f64>,
    pub carryover_per_year: Option<f64>,
    pub max_carryover: Option<f64>,
    pub scenarios: Option<Vec<ScenarioPayload>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub funds: Option<Vec<FundPayload>>,
    pub exit_costs: Option<Vec<ExitCostEntry>>,
    pub tax_settings: Option<TaxSettingsPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxSettingsPayload {
    pub tax_rate_pct: Option<f64>,
    pub realization_years: Option<Vec<u32>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FundPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub unit_price: Option<f64>,
    pub quantity: Option<f64>,
    pub yearly_return_pct: Option<f64>,
    pub costs: Option<FundCosts>,
    pub exit_costs: Option<Vec<ExitCostEntry>>,
}

pub fn build_simulation(cli: &Cli, payload: ProjectPayload) -> Result<Simulation, ConfigError> {
    let time_horizon = payload.time_horizon.unwrap_or(cli.time_horizon);
    if !(MIN_TIME_HORIZON..=MAX_TIME_HORIZON).contains(&time_horizon) {
        return Err(ConfigError::TimeHorizonOutOfRange {
            value: time_horizon,
            min: MIN_TIME_HORIZON,
            max: MAX_TIME_HORIZON,
        });
    }

    let initial_capital = payload.initial_capital.unwrap_or(cli.initial_capital);
    non_negative("initialCapital", initial_capital)?;
    percent("taxRate", cli.tax_rate)?;

    let tax_rules = TaxRules {
        base_exemption: payload.base_exemption.unwrap_or(cli.base_exemption),
        carryover_per_year: payload
            .carryover_per_year
            .unwrap_or(cli.carryover_per_year),
        max_carryover: payload.max_carryover.unwrap_or(cli.max_carryover),
    };
    non_negative("baseExemption", tax_rules.base_exemption)?;
    non_negative("carryoverPerYear", tax_rules.carryover_per_year)?;
    non_negative("maxCarryover", tax_rules.max_carryover)?;

    let scenario_payloads = payload
        .scenarios
        .unwrap_or_else(|| vec![ScenarioPayload::default()]);
    if scenario_payloads.is_empty() {
        return Err(ConfigError::NoScenarios);
    }
    if scenario_payloads.len() > MAX_SCENARIOS {
        return Err(ConfigError::TooManyScenarios {
            count: scenario_payloads.len(),
            max: MAX_SCENARIOS,
        });
    }

    let mut seen_ids = HashSet::new();
    let mut scenarios = Vec::with_capacity(scenario_payloads.len());
    for (idx, scenario_payload) in scenario_payloads.into_iter().enumerate() {
        let scenario = build_scenario(cli, idx, scenario_payload, time_horizon)?;
        if !seen_ids.insert(scenario.id.clone()) {
            return Err(ConfigError::DuplicateScenarioId(scenario.id));
        }
        scenarios.push(scenario);
    }

    Ok(Simulation {
        initial_capital,
        time_horizon,
        scenarios,
        tax_rules,
    })
}

fn build_scenario(
    cli: &Cli,
    idx: usize,
    payload: ScenarioPayload,
    time_horizon: u32,
) -> Result<Scenario, ConfigError> {
    let id = payload
        .id
        .unwrap_or_else(|| format!("scenario-{}", idx + 1));
    let name = payload.name.unwrap_or_else(|| {
        if idx == 0 {
            "Realistic Scenario".to_string()
        } else {
            format!("Scenario {}", idx + 1)
        }
    });
    let field = format!("scenarios[{idx}]");

    let fund_payloads = payload.funds.unwrap_or_default();
    if fund_payloads.len() > MAX_FUNDS_PER_SCENARIO {
        return Err(ConfigError::TooManyFunds {
            scenario: id,
            count: fund_payloads.len(),
            max: MAX_FUNDS_PER_SCENARIO,
        });
    }

    let mut seen_funds = HashSet::new();
    let mut funds = Vec::with_capacity(fund_payloads.len());
    for (fund_idx, fund_payload) in fund_payloads.into_iter().enumerate() {
        let fund = build_fund(
            cli,
            &format!("{field}.funds[{fund_idx}]"),
            fund_idx,
            fund_payload,
            time_horizon,
        )?;
        if !seen_funds.insert(fund.id.clone()) {
            return Err(ConfigError::DuplicateFundId {
                scenario: id,
                fund: fund.id,
            });
        }
        funds.push(fund);
    }

    let exit_costs = exit_schedule(
        &format!("{field}.exitCosts"),
        payload.exit_costs.unwrap_or_default(),
        time_horizon,
    )?
    .resized(time_horizon);

    let tax_payload = payload.tax_settings.unwrap_or_default();
    let tax_rate_pct = tax_payload.tax_rate_pct.unwrap_or(cli.tax_rate);
    percent(&format!("{field}.taxSettings.taxRatePct"), tax_rate_pct)?;

    let mut realization_years = tax_payload.realization_years.unwrap_or_default();
    for &year in &realization_years {
        year_in_horizon(
            &format!("{field}.taxSettings.realizationYears"),
            year,
            time_horizon,
        )?;
    }
    realization_years.sort_unstable();
    realization_years.dedup();

    Ok(Scenario {
        id,
        name,
        funds,
        exit_costs,
        tax_settings: TaxSettings {
            tax_rate_pct,
            realization_years,
        },
    })
}

fn build_fund(
    cli: &Cli,
    field: &str,
    idx: usize,
    payload: FundPayload,
    time_horizon: u32,
) -> Result<Fund, ConfigError> {
    let unit_price = payload.unit_price.unwrap_or(cli.fund_unit_price);
    let quantity = payload.quantity.unwrap_or(0.0);
    let yearly_return_pct = payload.yearly_return_pct.unwrap_or(cli.fund_yearly_return);
    non_negative(&format!("{field}.unitPrice"), unit_price)?;
    non_negative(&format!("{field}.quantity"), quantity)?;
    yearly_return(&format!("{field}.yearlyReturnPct"), yearly_return_pct)?;

    let raw_costs = payload.costs.unwrap_or_default();
    let costs = raw_costs.sanitized();
    if costs != raw_costs {
        tracing::debug!(fund = field, "clamped negative or non-finite fund costs to zero");
    }

    let exit_costs = payload
        .exit_costs
        .map(|entries| exit_schedule(&format!("{field}.exitCosts"), entries, time_horizon))
        .transpose()?;

    Ok(Fund {
        id: payload.id.unwrap_or_else(|| format!("fund-{}", idx + 1)),
        name: payload.name.unwrap_or_else(|| "New Fund".to_string()),
        unit_price,
        quantity,
        yearly_return_pct,
        costs,
        exit_costs,
    })
}

fn exit_schedule(
    field: &str,
    entries: Vec<ExitCostEntry>,
    time_horizon: u32,
) -> Result<ExitCostSchedule, ConfigError> {
    for entry in &entries {
        year_in_horizon(field, entry.year, time_horizon)?;
        percent(&format!("{field}[year {}]", entry.year), entry.exit_fee_pct)?;
    }
    Ok(ExitCostSchedule::from(entries))
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidAmount {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

fn yearly_return(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(MIN_YEARLY_RETURN_PCT..=MAX_YEARLY_RETURN_PCT).contains(&value) {
        return Err(ConfigError::ReturnOutOfRange {
            field: field.to_string(),
            value,
            min: MIN_YEARLY_RETURN_PCT,
            max: MAX_YEARLY_RETURN_PCT,
        });
    }
    Ok(())
}

fn percent(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::PercentOutOfRange {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

fn year_in_horizon(field: &str, year: u32, horizon: u32) -> Result<(), ConfigError> {
    if year == 0 || year > horizon {
        return Err(ConfigError::YearOutOfRange {
            field: field.to_string(),
            year,
            horizon,
        });
    }
    Ok(())
}
