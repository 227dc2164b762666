//! 자격 증명 검증 endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use hunter_core::error::HunterError;

use crate::routes::ApiError;
use crate::state::AppState;

/// 자격 증명 검증 요청.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub app_key: String,
    pub app_secret: String,
    /// 실전투자 여부 (기본: 모의투자)
    #[serde(default)]
    pub is_production: bool,
}

/// 자격 증명 검증 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsResponse {
    pub valid: bool,
    pub message: String,
}

/// 자격 증명 검증.
///
/// 토큰 확보에 성공하면 200, 발급 거부면 401입니다. 캐시가 없을 때만
/// 실제 발급이 일어납니다.
#[utoipa::path(
    post,
    path = "/api/v1/validate-credentials",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "유효한 자격 증명", body = CredentialsResponse),
        (status = 401, description = "인증 실패", body = CredentialsResponse)
    ),
    tag = "credentials"
)]
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<CredentialsResponse>, ApiError> {
    if request.app_key.trim().is_empty() || request.app_secret.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "appKey / appSecret은 필수입니다",
        ));
    }

    let client = state.interactive_client(
        &request.app_key,
        &request.app_secret,
        request.is_production,
    )?;

    match client.validate_credentials().await {
        Ok(()) => {
            info!("자격 증명 검증 성공");
            Ok(Json(CredentialsResponse {
                valid: true,
                message: "인증 성공".to_string(),
            }))
        }
        Err(HunterError::AuthFailure(message)) => {
            info!(message = %message, "자격 증명 검증 실패");
            Err(ApiError::new(StatusCode::UNAUTHORIZED, message))
        }
        Err(other) => Err(other.into()),
    }
}
