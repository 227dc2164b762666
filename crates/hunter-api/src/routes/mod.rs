//! HTTP 라우트.
//!
//! # 엔드포인트
//!
//! - `GET  /health` — 생존 확인
//! - `POST /api/v1/screen` — 국내 스크리닝
//! - `POST /api/v1/validate-credentials` — 자격 증명 검증
//! - `GET  /api/v1/stock-codes` — 국내 유니버스 코드
//! - `POST /api/v1/us/screen` — 미국 스크리닝
//! - `GET  /api/v1/us/symbols` — 미국 유니버스
//! - `GET  /api/v1/database/status` — 저장소 통계
//! - `GET  /api/v1/database/progress` — 수집 진행률
//! - `POST /api/v1/database/initialize` — 전체 초기화 (202/409)
//! - `POST /api/v1/database/update` — 증분 업데이트 (202)
//! - `POST /api/v1/database/sync-stock-names` — 종목명 보완
//! - `POST /api/v1/database/upload-stock-master` — 상장 목록 업로드

pub mod credentials;
pub mod database;
pub mod screen;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use hunter_core::error::HunterError;

use crate::state::AppState;

/// API 라우터 구성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/screen", post(screen::screen_kr))
        .route("/api/v1/validate-credentials", post(credentials::validate))
        .route("/api/v1/stock-codes", get(screen::stock_codes))
        .route("/api/v1/us/screen", post(screen::screen_us))
        .route("/api/v1/us/symbols", get(screen::us_symbols))
        .route("/api/v1/database/status", get(database::status))
        .route("/api/v1/database/progress", get(database::progress))
        .route("/api/v1/database/initialize", post(database::initialize))
        .route("/api/v1/database/update", post(database::update))
        .route(
            "/api/v1/database/sync-stock-names",
            post(database::sync_stock_names),
        )
        .route(
            "/api/v1/database/upload-stock-master",
            post(database::upload_stock_master),
        )
}

/// 생존 확인 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// 생존 확인.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "서비스 정상", body = HealthResponse)),
    tag = "health"
)]
pub async fn health(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: state.version,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// 에러 응답 본문.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub timestamp: String,
}

/// HTTP 에러.
///
/// 코어 에러 종류를 상태 코드로 매핑합니다. 처리되지 않은 에러는 로그를
/// 남기고 정제된 500으로 내려갑니다.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<HunterError> for ApiError {
    fn from(err: HunterError) -> Self {
        let status = match &err {
            HunterError::InvalidInput(_) | HunterError::NotInitialised(_) => {
                StatusCode::BAD_REQUEST
            }
            // 자격 증명 검증 경로는 핸들러에서 401로 별도 매핑
            HunterError::AuthFailure(_) => StatusCode::BAD_REQUEST,
            HunterError::AlreadyInitialised(_) => StatusCode::CONFLICT,
            HunterError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HunterError::Transport(_) | HunterError::BrokerError { .. } => StatusCode::BAD_GATEWAY,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "내부 오류");
        } else {
            tracing::warn!(error = %err, status = %status, "요청 실패");
        }

        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            timestamp: Utc::now().to_rfc3339(),
        };
        (self.status, Json(body)).into_response()
    }
}
