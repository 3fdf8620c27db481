mod config;
mod error;

use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::net::TcpListener;

pub use config::{
    Cli, FundPayload, ProjectPayload, ScenarioPayload, TaxSettingsPayload, build_simulation,
    default_cli,
};
pub use error::{ConfigError, ServeError};

use crate::core::{
    AllocationSummary, ChartData, FundCostSummary, ScenarioProjection, Simulation, TaxProjection,
    TaxRules, YearlyRow, allocation_summary, chart_data, fund_cost_summaries, project_simulation,
    yearly_rows,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub projection: ScenarioProjection,
    pub tax: TaxProjection,
    pub effective_tax_rate_pct: f64,
    pub allocation: AllocationSummary,
    pub funds: Vec<FundCostSummary>,
    pub chart: ChartData,
    pub rows: Vec<YearlyRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub initial_capital: f64,
    pub time_horizon: u32,
    pub tax_rules: TaxRules,
    pub scenarios: Vec<ScenarioReport>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn build_project_response(simulation: &Simulation) -> ProjectResponse {
    let scenarios = project_simulation(simulation)
        .into_iter()
        .zip(&simulation.scenarios)
        .enumerate()
        .map(|(idx, (outcome, scenario))| ScenarioReport {
            effective_tax_rate_pct: outcome.tax.effective_rate_pct(),
            allocation: allocation_summary(simulation, idx),
            funds: fund_cost_summaries(scenario),
            chart: chart_data(&outcome.projection),
            rows: yearly_rows(&outcome.projection, Some(&outcome.tax)),
            projection: outcome.projection,
            tax: outcome.tax,
        })
        .collect();

    ProjectResponse {
        initial_capital: simulation.initial_capital,
        time_horizon: simulation.time_horizon,
        tax_rules: simulation.tax_rules,
        scenarios,
    }
}

/// Parses a payload, projects it and returns the response as JSON.
pub fn project_json(cli: &Cli, json: &str, pretty: bool) -> Result<String, ServeError> {
    let payload = serde_json::from_str::<ProjectPayload>(json)?;
    let simulation = build_simulation(cli, payload)?;
    let response = build_project_response(&simulation);
    let body = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    Ok(body)
}

/// Same as [`project_json`] reading the payload from `path`, or stdin when `path` is `-`.
pub fn project_file(cli: &Cli, path: &Path, pretty: bool) -> Result<String, ServeError> {
    let json = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    tracing::info!(input = %path.display(), bytes = json.len(), "projecting payload");
    project_json(cli, &json, pretty)
}

pub fn router(cli: Cli) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/defaults", get(defaults_handler))
        .route("/api/project", post(project_handler))
        .fallback(not_found_handler)
        .with_state(Arc::new(cli))
}

pub async fn run_http_server(port: u16, cli: Cli) -> Result<(), ServeError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "fundcast HTTP API listening");
    tracing::info!("Local access: http://127.0.0.1:{port}/api/defaults");

    axum::serve(listener, router(cli)).await?;
    Ok(())
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn defaults_handler(State(cli): State<Arc<Cli>>) -> Response {
    match build_simulation(&cli, ProjectPayload::default()) {
        Ok(simulation) => json_response(StatusCode::OK, simulation),
        Err(e) => {
            tracing::error!(error = %e, "server defaults do not form a valid simulation");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn project_handler(
    State(cli): State<Arc<Cli>>,
    Json(payload): Json<ProjectPayload>,
) -> Response {
    project_handler_impl(&cli, payload)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn project_handler_impl(cli: &Cli, payload: ProjectPayload) -> Response {
    let simulation = match build_simulation(cli, payload) {
        Ok(simulation) => simulation,
        Err(e) => {
            tracing::warn!(error = %e, "rejected projection payload");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    tracing::info!(
        scenarios = simulation.scenarios.len(),
        horizon = simulation.time_horizon,
        "projecting simulation"
    );
    json_response(StatusCode::OK, build_project_response(&simulation))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    const TWO_SCENARIO_JSON: &str = r#"{
      "initialCapital": 100000,
      "timeHorizon": 10,
      "scenarios": [
        {
          "id": "cheap",
          "name": "Index",
          "funds": [{ "id": "idx", "name": "Index", "unitPrice": 100, "quantity": 1000, "yearlyReturnPct": 5 }],
          "taxSettings": { "taxRatePct": 30, "realizationYears": [10] }
        },
        {
          "id": "active",
          "name": "Active",
          "funds": [{
            "id": "act", "name": "Active", "unitPrice": 100, "quantity": 1000, "yearlyReturnPct": 5,
            "costs": { "entryFeePct": 3, "managementFeePct": 1.5, "performanceFeePct": 20 }
          }],
          "exitCosts": [{ "year": 1, "exitFeePct": 5 }]
        }
      ]
    }"#;

    #[test]
    fn project_json_reports_every_scenario() {
        let json = project_json(&default_cli(), TWO_SCENARIO_JSON, false).expect("valid payload");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

        let scenarios = value["scenarios"].as_array().expect("scenarios array");
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0]["projection"]["scenarioId"], "cheap");
        assert_eq!(scenarios[1]["projection"]["scenarioId"], "active");

        let final_value = scenarios[0]["projection"]["finalValue"]
            .as_f64()
            .expect("finalValue");
        assert!((final_value - 162_889.46).abs() < 0.01);
        let tax_paid = scenarios[0]["tax"]["totalTaxPaid"].as_f64().expect("tax");
        assert!((tax_paid - 14_366.84).abs() < 0.01);

        let active_costs = scenarios[1]["projection"]["totalCostsPaid"]
            .as_f64()
            .expect("totalCostsPaid");
        assert!(active_costs > 0.0);
        assert_eq!(scenarios[1]["chart"]["labels"][0], "Start");
        assert_eq!(scenarios[1]["rows"].as_array().map(Vec::len), Some(10));
    }

    #[test]
    fn response_serialization_contains_expected_fields() {
        let json = project_json(&default_cli(), TWO_SCENARIO_JSON, false).expect("valid payload");
        for key in [
            "\"initialCapital\"",
            "\"taxRules\"",
            "\"baseExemption\"",
            "\"endValueAfterCosts\"",
            "\"totalNetReturn\"",
            "\"cumulativeValue\"",
            "\"exitCostPct\"",
            "\"costsPct\"",
            "\"cumulativeUnrealizedGains\"",
            "\"isRealizationYear\"",
            "\"effectiveTaxRatePct\"",
            "\"fullyAllocated\"",
            "\"fundValues\"",
            "\"totalCostPct\"",
            "\"netAfterTax\"",
        ] {
            assert!(json.contains(key), "missing {key}");
        }
    }

    #[test]
    fn build_project_response_carries_allocation_summary() {
        let payload =
            serde_json::from_str::<ProjectPayload>(TWO_SCENARIO_JSON).expect("payload parses");
        let simulation = build_simulation(&default_cli(), payload).expect("valid payload");
        let response = build_project_response(&simulation);

        assert_eq!(response.time_horizon, 10);
        assert_eq!(response.tax_rules, TaxRules::default());
        let allocation = response.scenarios[0].allocation;
        assert_approx(allocation.allocated, 100_000.0);
        assert_approx(allocation.remaining, 0.0);
        assert!(allocation.fully_allocated);

        let active_funds = &response.scenarios[1].funds;
        assert_eq!(active_funds.len(), 1);
        assert_eq!(active_funds[0].fund_id, "act");
        assert_approx(active_funds[0].total_cost_pct, 24.5);

        // 97_000 after entry fee, +4_850 growth, -1_527.75 management, -970 performance
        let first_row = response.scenarios[1].rows[0];
        assert_approx(first_row.end_value_after_costs, 99_352.25);
        assert_approx(first_row.exit_cost, 4_967.6125);
        assert_approx(first_row.net_after_tax, first_row.value_after_exit);
    }

    #[test]
    fn project_json_rejects_invalid_json_and_config() {
        let err = project_json(&default_cli(), "{ not json", false).expect_err("bad json");
        assert!(matches!(err, ServeError::Json(_)));

        let err = project_json(&default_cli(), r#"{ "timeHorizon": 2 }"#, false)
            .expect_err("bad horizon");
        assert!(matches!(
            err,
            ServeError::Config(ConfigError::TimeHorizonOutOfRange { value: 2, .. })
        ));
    }

    #[test]
    fn project_handler_maps_config_errors_to_bad_request() {
        let payload = ProjectPayload {
            time_horizon: Some(40),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(&default_cli(), payload);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );

        let response = project_handler_impl(&default_cli(), ProjectPayload::default());
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn fallback_and_health_handlers_respond() {
        assert_eq!(not_found_handler().await.status(), StatusCode::NOT_FOUND);
        assert_eq!(health_handler().await.status(), StatusCode::OK);
        let defaults = defaults_handler(State(Arc::new(default_cli()))).await;
        assert_eq!(defaults.status(), StatusCode::OK);
    }
}
