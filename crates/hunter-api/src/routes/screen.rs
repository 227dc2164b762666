//! 스크리닝 / 유니버스 조회 endpoint.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use hunter_core::domain::{Market, ScreeningCondition, ScreeningResult};
use hunter_core::error::HunterError;
use hunter_data::us_universe;
use hunter_screener::{KrMarketAdapter, ScreeningEngine, UsMarketAdapter};

use crate::routes::ApiError;
use crate::state::AppState;

/// 국내 스크리닝 실행.
///
/// 본문은 조건 집합이며 자격 증명을 포함합니다. 저장소가 비어 있으면
/// 400(`NotInitialised`)입니다.
#[utoipa::path(
    post,
    path = "/api/v1/screen",
    request_body = ScreeningCondition,
    responses(
        (status = 200, description = "스크리닝 결과", body = ScreeningResult),
        (status = 400, description = "잘못된 조건 또는 미초기화 저장소")
    ),
    tag = "screening"
)]
pub async fn screen_kr(
    State(state): State<Arc<AppState>>,
    Json(condition): Json<ScreeningCondition>,
) -> Result<Json<ScreeningResult>, ApiError> {
    condition.validate()?;

    if !state.store.has_any_bars().await? {
        return Err(HunterError::NotInitialised(
            "일봉 저장소가 비어 있습니다. /api/v1/database/initialize를 먼저 실행하세요".to_string(),
        )
        .into());
    }

    info!(
        ma112 = condition.ma112_enabled,
        bb = condition.bb_enabled,
        targets = condition.target_codes.len(),
        "국내 스크리닝 요청"
    );

    let client = state.interactive_client(
        &condition.app_key,
        &condition.app_secret,
        condition.is_production,
    )?;
    let adapter = Arc::new(KrMarketAdapter::new(
        state.store.clone(),
        state.master.clone(),
        client,
    ));

    let result = ScreeningEngine::new(adapter).run(&condition).await?;
    info!(
        matched = result.matched_count,
        scanned = result.total_scanned,
        elapsed_ms = result.execution_ms,
        "국내 스크리닝 완료"
    );
    Ok(Json(result))
}

/// 미국 스크리닝 쿼리.
#[derive(Debug, Deserialize, IntoParams)]
pub struct UsScreenQuery {
    /// 거래소 코드 (NAS | NYS | AMS, 기본 NAS)
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

fn default_exchange() -> String {
    "NAS".to_string()
}

/// 미국 스크리닝 실행.
#[utoipa::path(
    post,
    path = "/api/v1/us/screen",
    params(UsScreenQuery),
    request_body = ScreeningCondition,
    responses(
        (status = 200, description = "스크리닝 결과", body = ScreeningResult),
        (status = 400, description = "잘못된 조건")
    ),
    tag = "screening"
)]
pub async fn screen_us(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsScreenQuery>,
    Json(condition): Json<ScreeningCondition>,
) -> Result<Json<ScreeningResult>, ApiError> {
    condition.validate()?;
    let market = parse_us_exchange(&query.exchange)?;

    info!(exchange = %query.exchange, "미국 스크리닝 요청");

    let client = state.interactive_client(
        &condition.app_key,
        &condition.app_secret,
        condition.is_production,
    )?;
    let adapter = Arc::new(UsMarketAdapter::new(state.store.clone(), client, market)?);

    let result = ScreeningEngine::new(adapter).run(&condition).await?;
    info!(
        matched = result.matched_count,
        scanned = result.total_scanned,
        "미국 스크리닝 완료"
    );
    Ok(Json(result))
}

/// 국내 유니버스 코드 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockCodesResponse {
    pub codes: Vec<String>,
    pub total: usize,
}

/// 국내 유니버스 코드 목록.
#[utoipa::path(
    get,
    path = "/api/v1/stock-codes",
    responses((status = 200, description = "유니버스 코드", body = StockCodesResponse)),
    tag = "screening"
)]
pub async fn stock_codes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StockCodesResponse>, ApiError> {
    state.master.ensure_populated().await?;
    let codes: Vec<String> = state
        .master
        .all_active()
        .await?
        .into_iter()
        .map(|s| s.code)
        .filter(|code| hunter_core::is_korean_code(code))
        .collect();

    Ok(Json(StockCodesResponse {
        total: codes.len(),
        codes,
    }))
}

/// 미국 유니버스 쿼리.
#[derive(Debug, Deserialize, IntoParams)]
pub struct UsSymbolsQuery {
    /// 거래소 코드 (NAS | NYS | AMS)
    pub exchange: String,
}

/// 미국 유니버스 심볼 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsSymbolsResponse {
    pub exchange: String,
    pub symbols: Vec<UsSymbol>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsSymbol {
    pub code: String,
    pub name: String,
}

/// 미국 유니버스 조회.
#[utoipa::path(
    get,
    path = "/api/v1/us/symbols",
    params(UsSymbolsQuery),
    responses(
        (status = 200, description = "거래소 심볼 목록", body = UsSymbolsResponse),
        (status = 400, description = "지원하지 않는 거래소")
    ),
    tag = "screening"
)]
pub async fn us_symbols(
    Query(query): Query<UsSymbolsQuery>,
) -> Result<Json<UsSymbolsResponse>, ApiError> {
    let market = parse_us_exchange(&query.exchange)?;
    let symbols = us_universe(market)
        .into_iter()
        .map(|s| UsSymbol {
            code: s.code,
            name: s.name,
        })
        .collect();

    Ok(Json(UsSymbolsResponse {
        exchange: query.exchange,
        symbols,
    }))
}

/// 거래소 코드 파싱 (`NAS` / `NYS` / `AMS`).
fn parse_us_exchange(exchange: &str) -> Result<Market, HunterError> {
    match exchange.to_uppercase().as_str() {
        "NAS" => Ok(Market::Nasdaq),
        "NYS" => Ok(Market::Nyse),
        "AMS" => Ok(Market::Amex),
        other => Err(HunterError::InvalidInput(format!(
            "지원하지 않는 거래소 코드: {} (NAS | NYS | AMS)",
            other
        ))),
    }
}
