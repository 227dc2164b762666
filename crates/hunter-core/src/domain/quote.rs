//! 현재가 스냅샷 타입.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 브로커 현재가 조회 결과.
///
/// 재무 필드는 브로커가 제공하지 않는 종목(신규 상장, ETF 등)에서
/// 비어 있을 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSnapshot {
    pub current_price: f64,
    /// 시가총액 (원)
    pub market_cap: Option<i64>,
    pub per: Option<f64>,
    pub pbr: Option<f64>,
    pub eps: Option<f64>,
    pub bps: Option<f64>,
}
