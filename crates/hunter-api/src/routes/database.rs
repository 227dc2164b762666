//! 저장소 운영 endpoint.
//!
//! 전체 초기화와 증분 업데이트는 오래 걸리므로 백그라운드 태스크로
//! 시작하고 202를 반환합니다. 진행 상황은 `/database/progress`로
//! 조회합니다.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use hunter_collector::{CollectorService, ProgressSnapshot};
use hunter_core::error::HunterError;
use hunter_data::{
    MasterStats, StoreStatistics, UploadStats, META_LAST_DAILY_UPDATE, META_LAST_FULL_INIT,
};
use hunter_exchange::{KisClient, KisConfig, KisEnvironment, COLLECTOR_RATE_PER_SEC};

use crate::routes::ApiError;
use crate::state::AppState;

/// 저장소 상태 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatusResponse {
    pub statistics: StoreStatistics,
    pub master: MasterStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_full_init: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_daily_update: Option<String>,
}

/// 저장소 상태.
#[utoipa::path(
    get,
    path = "/api/v1/database/status",
    responses((status = 200, description = "저장소 통계", body = DatabaseStatusResponse)),
    tag = "database"
)]
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DatabaseStatusResponse>, ApiError> {
    Ok(Json(DatabaseStatusResponse {
        statistics: state.store.statistics().await?,
        master: state.master.stats().await?,
        last_full_init: state.store.get_meta(META_LAST_FULL_INIT).await?,
        last_daily_update: state.store.get_meta(META_LAST_DAILY_UPDATE).await?,
    }))
}

/// 수집 진행률.
#[utoipa::path(
    get,
    path = "/api/v1/database/progress",
    responses((status = 200, description = "진행률 스냅샷", body = ProgressSnapshot)),
    tag = "database"
)]
pub async fn progress(State(state): State<Arc<AppState>>) -> Json<ProgressSnapshot> {
    Json(state.progress.snapshot())
}

/// 전체 초기화 요청.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub app_key: String,
    pub app_secret: String,
    #[serde(default)]
    pub is_production: bool,
    #[serde(default)]
    pub force_rebuild: bool,
}

/// 작업 시작 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub started: bool,
    pub message: String,
}

/// 전체 초기화 시작.
///
/// 이미 초기화된 저장소에 `forceRebuild` 없이 요청하면 409입니다.
/// 수집은 백그라운드에서 진행되며 즉시 202를 반환합니다.
#[utoipa::path(
    post,
    path = "/api/v1/database/initialize",
    request_body = InitializeRequest,
    responses(
        (status = 202, description = "초기화 시작", body = AcceptedResponse),
        (status = 409, description = "이미 초기화됨 / 작업 진행 중")
    ),
    tag = "database"
)]
pub async fn initialize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InitializeRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    if state.progress.is_running() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "수집 작업이 이미 진행 중입니다",
        ));
    }

    // 백그라운드 시작 전에 409 조건을 먼저 확인 (브로커 호출 없음)
    if !request.force_rebuild && state.store.has_any_bars().await? {
        let stats = state.store.statistics().await?;
        return Err(HunterError::AlreadyInitialised(format!(
            "종목 {}개, 일봉 {}건 보유",
            stats.instrument_count, stats.bar_count
        ))
        .into());
    }

    let service = collector_service(&state, &request.app_key, &request.app_secret, request.is_production)?;
    let force = request.force_rebuild;

    tokio::spawn(async move {
        match service.full_backfill(force).await {
            Ok(stats) => info!(
                success = stats.success,
                failed = stats.failed,
                "전체 초기화 백그라운드 완료"
            ),
            Err(e) => {
                error!(error = %e, "전체 초기화 실패");
                service.progress().fail(e.to_string());
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            started: true,
            message: "전체 초기화를 시작했습니다. /api/v1/database/progress로 확인하세요".to_string(),
        }),
    ))
}

/// 증분 업데이트 요청.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub app_key: String,
    pub app_secret: String,
    #[serde(default)]
    pub is_production: bool,
}

/// 증분 업데이트 시작.
#[utoipa::path(
    post,
    path = "/api/v1/database/update",
    request_body = UpdateRequest,
    responses(
        (status = 202, description = "업데이트 시작", body = AcceptedResponse),
        (status = 409, description = "작업 진행 중")
    ),
    tag = "database"
)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    if state.progress.is_running() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "수집 작업이 이미 진행 중입니다",
        ));
    }

    let service = collector_service(&state, &request.app_key, &request.app_secret, request.is_production)?;

    tokio::spawn(async move {
        match service.incremental_update().await {
            Ok(stats) => info!(
                success = stats.success,
                failed = stats.failed,
                bars = stats.bars_saved,
                "증분 업데이트 백그라운드 완료"
            ),
            Err(e) => {
                error!(error = %e, "증분 업데이트 실패");
                service.progress().fail(e.to_string());
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            started: true,
            message: "증분 업데이트를 시작했습니다".to_string(),
        }),
    ))
}

/// 종목명 보완 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncNamesResponse {
    pub candidates: usize,
    pub updated: usize,
    pub failed: usize,
}

/// 종목명 보완.
///
/// 이름이 비어 있는 마스터 행을 브로커 종목 조회로 채웁니다.
#[utoipa::path(
    post,
    path = "/api/v1/database/sync-stock-names",
    request_body = UpdateRequest,
    responses((status = 200, description = "보완 결과", body = SyncNamesResponse)),
    tag = "database"
)]
pub async fn sync_stock_names(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<SyncNamesResponse>, ApiError> {
    let client = state.interactive_client(
        &request.app_key,
        &request.app_secret,
        request.is_production,
    )?;

    let candidates = state.master.codes_missing_name().await?;
    let mut updated = 0;
    let mut failed = 0;

    for code in &candidates {
        match client.lookup_name(code).await {
            Ok(name) if !name.is_empty() => {
                state.master.set_name(code, &name).await?;
                updated += 1;
            }
            Ok(_) => failed += 1,
            Err(e) => {
                // 종목 하나의 실패는 나머지 보완을 막지 않음
                tracing::warn!(code = %code, error = %e, "종목명 조회 실패");
                failed += 1;
            }
        }
    }

    info!(candidates = candidates.len(), updated, failed, "종목명 보완 완료");
    Ok(Json(SyncNamesResponse {
        candidates: candidates.len(),
        updated,
        failed,
    }))
}

/// 상장 목록 업로드 (multipart).
///
/// KRX 고정폭 목록 파일을 받아 마스터를 교체합니다. 시장은 파일명으로
/// 판별합니다 (`kospi*` / `kosdaq*`).
#[utoipa::path(
    post,
    path = "/api/v1/database/upload-stock-master",
    responses(
        (status = 200, description = "업로드 결과", body = UploadStats),
        (status = 400, description = "파싱 실패 / 알 수 없는 파일명")
    ),
    tag = "database"
)]
pub async fn upload_stock_master(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadStats>, ApiError> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("multipart 파싱 실패: {}", e)))?
    {
        let filename = field
            .file_name()
            .map(str::to_string)
            .or_else(|| field.name().map(str::to_string))
            .unwrap_or_default();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("본문 수신 실패: {}", e)))?;

        if !data.is_empty() {
            files.push((filename, data.to_vec()));
        }
    }

    if files.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "업로드된 파일이 없습니다",
        ));
    }

    let stats = state.master.upload_master_files(&files).await?;
    info!(files = stats.files, parsed = stats.parsed, "상장 목록 업로드 완료");
    Ok(Json(stats))
}

/// 수집 경로용 서비스 구성 (15/s 레이트 리밋).
fn collector_service(
    state: &Arc<AppState>,
    app_key: &str,
    app_secret: &str,
    is_production: bool,
) -> Result<CollectorService, ApiError> {
    let config = KisConfig::new(
        app_key,
        app_secret,
        KisEnvironment::from_is_production(is_production),
    );
    let client = Arc::new(KisClient::new(config, COLLECTOR_RATE_PER_SEC)?);

    Ok(CollectorService::new(
        client,
        state.store.clone(),
        state.master.clone(),
        Arc::clone(&state.progress),
    ))
}
