use fundcast::api::{ProjectPayload, build_simulation, default_cli};
use fundcast::core::{
    ExitCostSchedule, Fund, FundCosts, Scenario, TaxSettings, allocation_summary, exit_value_at,
    project_scenario, project_simulation, project_tax,
};

fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual}, tolerance {tol}"
    );
}

fn index_fund(id: &str, quantity: f64) -> Fund {
    Fund {
        id: id.to_string(),
        name: format!("Index {id}"),
        unit_price: 100.0,
        quantity,
        yearly_return_pct: 5.0,
        costs: FundCosts::default(),
        exit_costs: None,
    }
}

fn index_scenario(realization_years: Vec<u32>) -> Scenario {
    Scenario {
        id: "index".to_string(),
        name: "Index only".to_string(),
        funds: vec![index_fund("a", 1_000.0)],
        exit_costs: ExitCostSchedule::new().resized(10),
        tax_settings: TaxSettings {
            tax_rate_pct: 30.0,
            realization_years,
        },
    }
}

#[test]
fn ten_year_compounding_with_single_sale() {
    let scenario = index_scenario(vec![10]);
    let projection = project_scenario(&scenario, 10);

    assert_approx_tol(projection.initial_investment, 100_000.0, 1e-9);
    assert_approx_tol(projection.final_value, 162_889.46, 0.01);
    assert_approx_tol(projection.total_return, 62_889.46, 0.01);
    assert_eq!(projection.total_costs_paid, 0.0);

    let tax = project_tax(&projection, &scenario.tax_settings);
    assert_eq!(tax.years.len(), 10);
    assert_eq!(tax.years[8].carryover_exemption, 5_000.0);
    assert_eq!(tax.years[9].available_exemption, 15_000.0);
    assert_approx_tol(tax.years[9].taxable_gains, 47_889.46, 0.01);
    assert_approx_tol(tax.total_tax_paid, 14_366.84, 0.01);
    assert_approx_tol(tax.total_exemption_used, 15_000.0, 1e-9);

    let exit = exit_value_at(&projection, 10);
    assert_eq!(exit.value, projection.final_value);
    assert_eq!(exit.exit_cost, 0.0);
}

#[test]
fn no_sales_means_no_tax_even_with_large_gains() {
    let mut scenario = index_scenario(Vec::new());
    scenario.funds[0].yearly_return_pct = 40.0;
    let projection = project_scenario(&scenario, 10);
    let tax = project_tax(&projection, &scenario.tax_settings);

    assert!(projection.total_return > 1_000_000.0);
    assert_eq!(tax.total_tax_paid, 0.0);
    assert_eq!(tax.total_exemption_used, 0.0);
}

#[test]
fn two_funds_filling_initial_capital_leave_nothing_remaining() {
    let payload = serde_json::from_str::<ProjectPayload>(
        r#"{
          "initialCapital": 80000,
          "scenarios": [{
            "funds": [
              { "id": "eq", "unitPrice": 120, "quantity": 500 },
              { "id": "bd", "unitPrice": 40, "quantity": 500 }
            ]
          }]
        }"#,
    )
    .expect("payload parses");
    let simulation = build_simulation(&default_cli(), payload).expect("valid payload");

    let summary = allocation_summary(&simulation, 0);
    assert_eq!(summary.allocated, 80_000.0);
    assert_eq!(summary.remaining, 0.0);
    assert!(summary.fully_allocated);

    let outcomes = project_simulation(&simulation);
    assert_eq!(outcomes[0].projection.initial_investment, 80_000.0);
    assert_eq!(outcomes[0].projection.years[0].total_start_value, 80_000.0);
}

#[test]
fn repeated_runs_are_identical() {
    let mut scenario = index_scenario(vec![3, 7]);
    scenario.funds.push(Fund {
        costs: FundCosts {
            entry_fee_pct: 2.5,
            management_fee_pct: 0.8,
            ter_pct: 0.3,
            transaction_cost_pct: 0.1,
            performance_fee_pct: 15.0,
        },
        yearly_return_pct: -4.0,
        ..index_fund("b", 300.0)
    });

    let first = project_scenario(&scenario, 10);
    let second = project_scenario(&scenario, 10);
    assert_eq!(first, second);
    assert_eq!(
        project_tax(&first, &scenario.tax_settings),
        project_tax(&second, &scenario.tax_settings)
    );
}
