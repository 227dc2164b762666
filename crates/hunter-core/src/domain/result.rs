//! 스크리닝 결과 타입.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::instrument::Market;

/// 조건에 부합한 종목 하나 (지표 값 포함).
///
/// 스칼라 지표는 소수 둘째 자리까지 반올림합니다. 가격은 원화 종목이면
/// 정수, 달러 종목이면 소수 둘째 자리까지입니다.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchedStock {
    pub code: String,
    pub name: String,
    pub market: Market,

    pub current_price: f64,
    /// 전일 대비 등락률 (%)
    pub change_pct: f64,
    pub volume: u64,
    /// 20일 평균 대비 거래량 배수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_ratio: Option<f64>,

    // 이동평균
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma5: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma20: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma60: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma112: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma224: Option<f64>,

    // 현재가 / 이동평균 비율 (%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma60_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma112_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma224_ratio: Option<f64>,

    // 볼린저 밴드
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bb_upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bb_middle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bb_lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bb_position: Option<String>,

    // 재무 (게이트가 켜진 경우에만 조회)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bps: Option<f64>,
}

/// 스크리닝 실행 결과.
///
/// 생성 이후 불변입니다. `matches` 순서는 청크 완료 순서이며 입력 순서를
/// 보장하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResult {
    pub matches: Vec<MatchedStock>,
    /// 평가 대상 종목 수
    pub total_scanned: usize,
    pub matched_count: usize,
    /// 실행 시간 (ms)
    pub execution_ms: u64,
    pub captured_at: DateTime<Utc>,
    /// 유니버스 라벨 (예: "KR", "US-NAS")
    pub universe_label: String,
}

/// 소수 `digits`자리 반올림.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// 시장별 가격 반올림 (원화: 정수, 달러: 둘째 자리).
pub fn round_price(value: f64, market: Market) -> f64 {
    if market.is_korean() {
        value.round()
    } else {
        round_to(value, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(103.7735, 2), 103.77);
        assert_eq!(round_to(103.775, 2), 103.78);
        assert_eq!(round_to(0.0, 2), 0.0);
    }

    #[test]
    fn test_round_price_by_market() {
        assert_eq!(round_price(71234.6, Market::Kospi), 71235.0);
        assert_eq!(round_price(153.237, Market::Nasdaq), 153.24);
    }
}
