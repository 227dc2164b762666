//! 일봉(OHLCV) 타입.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 일봉 하나.
///
/// 식별자는 `(종목, 거래일)` 쌍이며, 같은 쌍의 재삽입은 덮어쓰기입니다.
/// 저장소의 조회 표면은 항상 최신순으로 반환합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyBar {
    /// 거래일
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl DailyBar {
    pub fn new(trade_date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            trade_date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// KIS 날짜 형식(`YYYYMMDD`) 파싱.
pub fn parse_trade_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}
