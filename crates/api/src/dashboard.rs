use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use extraction::PipelineError;
use models::{ExtractionResult, MonitorConfig, PieSeries, SummaryView, TrendSeries};
use sheets_client::{SheetsClient, SheetsError};

use crate::{auth::authenticate, error::ApiError, AppState, Result, SharedState};

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub worksheet: Option<String>,
}

/// Everything one dashboard render needs. The response is always complete:
/// when the pipeline fails, the metrics are the zeroed defaults and `error`
/// explains why.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub config_id: i64,
    pub worksheet: String,
    pub worksheets: Vec<String>,
    pub summary: SummaryView,
    pub summary_clean: SummaryView,
    pub trend: TrendSeries,
    pub trend_clean: TrendSeries,
    pub pie_income: PieSeries,
    pub pie_expense: PieSeries,
    pub pie_income_clean: PieSeries,
    pub pie_expense_clean: PieSeries,
    pub error: Option<String>,
}

impl DashboardResponse {
    fn new(
        config: &MonitorConfig,
        worksheet: String,
        result: ExtractionResult,
        error: Option<String>,
    ) -> Self {
        Self {
            config_id: config.id,
            worksheet,
            worksheets: config.worksheet_list(),
            summary: result.summary.formatted(),
            summary_clean: result.summary_clean.formatted(),
            trend: result.trend,
            trend_clean: result.trend_clean,
            pie_income: result.pie_income,
            pie_expense: result.pie_expense,
            pie_income_clean: result.pie_income_clean,
            pie_expense_clean: result.pie_expense_clean,
            error,
        }
    }
}

/// GET /api/configs/:id/dashboard?worksheet=<name>
///
/// One request-scoped fetch-and-extract. Only an unknown config id or a
/// broken session produce a non-200; every pipeline failure is folded into
/// a complete zeroed response with its message in `error`.
pub async fn dashboard(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>> {
    let user = authenticate(&state, &jar)?;
    let config = state
        .store
        .get_config(id, user.id)?
        .ok_or_else(|| ApiError::NotFound(format!("configuration {} not found", id)))?;

    let worksheet = query
        .worksheet
        .filter(|w| !w.trim().is_empty())
        .or_else(|| config.worksheet_list().into_iter().next())
        .unwrap_or_else(|| "Sheet1".to_string());

    let (result, error) = match fetch_and_extract(&state, &config, &worksheet).await {
        Ok(result) => (result, None),
        Err(e) => {
            tracing::warn!(config_id = config.id, worksheet = %worksheet, "extraction failed: {}", e);
            (ExtractionResult::default(), Some(e.to_string()))
        }
    };

    Ok(Json(DashboardResponse::new(&config, worksheet, result, error)))
}

/// The full pipeline for one worksheet: credentials → client → grid →
/// extract. Every failure is typed so the caller can fold it into the
/// response's single error string.
async fn fetch_and_extract(
    state: &AppState,
    config: &MonitorConfig,
    worksheet: &str,
) -> std::result::Result<ExtractionResult, PipelineError> {
    let encrypted = state
        .store
        .credentials()
        .map_err(internal)?
        .ok_or(PipelineError::CredentialsNotConfigured)?;
    let raw = state.cipher.decrypt(&encrypted).map_err(internal)?;

    let client = SheetsClient::from_service_account_json(&raw).map_err(sheets_error)?;
    let spreadsheet = sheets_client::spreadsheet_id(&config.spreadsheet_url);
    let grid = client
        .fetch_grid(&spreadsheet, worksheet)
        .await
        .map_err(sheets_error)?;

    let categories = state.store.list_categories(config.id).map_err(internal)?;
    Ok(extraction::extract(&grid, &config.mapping, &categories)?)
}

fn internal(e: anyhow::Error) -> PipelineError {
    PipelineError::Unexpected(e.to_string())
}

fn sheets_error(e: SheetsError) -> PipelineError {
    match e {
        SheetsError::WorksheetNotFound(name) => PipelineError::WorksheetNotFound(name),
        other => PipelineError::Unexpected(other.to_string()),
    }
}
