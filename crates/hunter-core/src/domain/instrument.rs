//! 종목 메타데이터 타입.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 시장 구분.
///
/// 국내(KOSPI/KOSDAQ)와 미국(NASDAQ/NYSE/AMEX)을 하나의 enum으로 다룹니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Kospi,
    Kosdaq,
    Nasdaq,
    Nyse,
    Amex,
}

impl Market {
    /// DB 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Kospi => "KOSPI",
            Market::Kosdaq => "KOSDAQ",
            Market::Nasdaq => "NASDAQ",
            Market::Nyse => "NYSE",
            Market::Amex => "AMEX",
        }
    }

    /// 국내 시장 여부.
    pub fn is_korean(&self) -> bool {
        matches!(self, Market::Kospi | Market::Kosdaq)
    }

    /// KIS 해외 API 거래소 코드 (`EXCD`).
    ///
    /// 국내 시장은 `None`.
    pub fn us_exchange_code(&self) -> Option<&'static str> {
        match self {
            Market::Nasdaq => Some("NAS"),
            Market::Nyse => Some("NYS"),
            Market::Amex => Some("AMS"),
            _ => None,
        }
    }
}

impl std::str::FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "KOSPI" => Ok(Market::Kospi),
            "KOSDAQ" => Ok(Market::Kosdaq),
            "NASDAQ" | "NAS" => Ok(Market::Nasdaq),
            "NYSE" | "NYS" => Ok(Market::Nyse),
            "AMEX" | "AMS" => Ok(Market::Amex),
            other => Err(format!("알 수 없는 시장 코드: {}", other)),
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 종목 메타데이터.
///
/// 식별자는 `(market, code)` 쌍입니다. 상장폐지 시 삭제하지 않고
/// `is_active = false`로만 전환하여 과거 봉 조회를 보존합니다.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockInfo {
    /// 종목 코드 (국내: 6자리 숫자, 미국: 티커)
    pub code: String,
    /// 종목명
    pub name: String,
    /// 시장 구분
    pub market: Market,
    /// ETF 여부
    pub is_etf: bool,
    /// ETN 여부
    pub is_etn: bool,
    /// 거래 가능 여부
    pub is_active: bool,
}

impl StockInfo {
    /// 활성 일반 종목 생성.
    pub fn new(code: impl Into<String>, name: impl Into<String>, market: Market) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            market,
            is_etf: false,
            is_etn: false,
            is_active: true,
        }
    }
}

/// 국내 종목 코드 형식 확인 (6자리 숫자).
pub fn is_korean_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_korean_code() {
        assert!(is_korean_code("005930")); // 삼성전자
        assert!(is_korean_code("000660")); // SK하이닉스

        assert!(!is_korean_code("AAPL"));
        assert!(!is_korean_code("00593")); // 5자리
        assert!(!is_korean_code("0059300")); // 7자리
        assert!(!is_korean_code("A05930")); // 문자 포함
    }

    #[test]
    fn test_market_roundtrip() {
        for m in [
            Market::Kospi,
            Market::Kosdaq,
            Market::Nasdaq,
            Market::Nyse,
            Market::Amex,
        ] {
            let parsed: Market = m.as_str().parse().unwrap();
            assert_eq!(parsed, m);
        }
    }

    #[test]
    fn test_us_exchange_code() {
        assert_eq!(Market::Nasdaq.us_exchange_code(), Some("NAS"));
        assert_eq!(Market::Nyse.us_exchange_code(), Some("NYS"));
        assert_eq!(Market::Amex.us_exchange_code(), Some("AMS"));
        assert_eq!(Market::Kospi.us_exchange_code(), None);
    }
}
