//! KIS 해외(미국) 주식 시세 클라이언트.
//!
//! 미국 주식은 거래소 코드(`EXCD`)와 티커(`SYMB`)로 조회합니다.
//! NAS(나스닥), NYS(뉴욕), AMS(아멕스)를 지원합니다.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use hunter_core::domain::{parse_trade_date, DailyBar, QuoteSnapshot};
use hunter_core::error::{HunterError, Result};

use crate::auth::KisSession;
use crate::client_kr::{check_rt_cd, parse_f64, parse_positive_f64, parse_u64};
use crate::rate_limit::RateLimiter;

/// 해외 일봉 레코드.
#[derive(Debug, Deserialize)]
struct UsDailyRow {
    /// 거래일 (YYYYMMDD)
    #[serde(default)]
    xymd: String,
    #[serde(default)]
    open: String,
    #[serde(default)]
    high: String,
    #[serde(default)]
    low: String,
    #[serde(default)]
    clos: String,
    #[serde(default)]
    tvol: String,
}

#[derive(Debug, Deserialize)]
struct UsDailyResponse {
    rt_cd: String,
    #[serde(default)]
    msg_cd: String,
    #[serde(default)]
    msg1: String,
    #[serde(default)]
    output2: Vec<UsDailyRow>,
}

#[derive(Debug, Deserialize)]
struct UsPriceDetailResponse {
    rt_cd: String,
    #[serde(default)]
    msg_cd: String,
    #[serde(default)]
    msg1: String,
    output: Option<UsPriceDetailOutput>,
}

#[derive(Debug, Deserialize)]
struct UsPriceDetailOutput {
    /// 현재가
    #[serde(default)]
    last: String,
    /// 시가총액
    #[serde(default)]
    tomv: String,
    #[serde(default)]
    perx: String,
    #[serde(default)]
    pbrx: String,
    #[serde(default)]
    epsx: String,
    #[serde(default)]
    bpsx: String,
}

/// 미국 주식 클라이언트.
pub struct KisUsClient {
    http: reqwest::Client,
    session: Arc<KisSession>,
    limiter: Arc<RateLimiter>,
}

impl KisUsClient {
    pub fn new(session: Arc<KisSession>, limiter: Arc<RateLimiter>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HunterError::Transport(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            http,
            session,
            limiter,
        })
    }

    /// 미국 일봉 조회 (최신순, 최대 약 100건).
    ///
    /// `exchange_code`는 `NAS` / `NYS` / `AMS`.
    pub async fn daily(&self, symbol: &str, exchange_code: &str) -> Result<Vec<DailyBar>> {
        validate_us_symbol(symbol)?;
        validate_exchange_code(exchange_code)?;

        let response: UsDailyResponse = self
            .get_json(
                "/uapi/overseas-price/v1/quotations/dailyprice",
                "HHDFS76240000",
                &[
                    ("AUTH", ""),
                    ("EXCD", exchange_code),
                    ("SYMB", symbol),
                    ("GUBN", "0"),
                    ("BYMD", ""),
                    ("MODP", "0"),
                ],
            )
            .await?;

        check_rt_cd(&response.rt_cd, &response.msg_cd, &response.msg1)?;

        let mut bars: Vec<DailyBar> = response
            .output2
            .into_iter()
            .filter_map(|row| {
                let trade_date = parse_trade_date(row.xymd.trim())?;
                let close = parse_f64(&row.clos);
                if close <= 0.0 {
                    return None;
                }
                Some(DailyBar {
                    trade_date,
                    open: parse_f64(&row.open),
                    high: parse_f64(&row.high),
                    low: parse_f64(&row.low),
                    close,
                    volume: parse_u64(&row.tvol),
                })
            })
            .collect();
        bars.sort_by(|a, b| b.trade_date.cmp(&a.trade_date));

        debug!(
            symbol = symbol,
            exchange = exchange_code,
            count = bars.len(),
            "미국 일봉 조회"
        );
        Ok(bars)
    }

    /// 미국 현재가 + 재무 스냅샷 조회.
    pub async fn current_quote(&self, symbol: &str, exchange_code: &str) -> Result<QuoteSnapshot> {
        validate_us_symbol(symbol)?;
        validate_exchange_code(exchange_code)?;

        let response: UsPriceDetailResponse = self
            .get_json(
                "/uapi/overseas-price/v1/quotations/price-detail",
                "HHDFS76200200",
                &[("AUTH", ""), ("EXCD", exchange_code), ("SYMB", symbol)],
            )
            .await?;

        check_rt_cd(&response.rt_cd, &response.msg_cd, &response.msg1)?;

        let output = response
            .output
            .ok_or_else(|| HunterError::broker("", "현재가 응답에 output 없음"))?;

        Ok(QuoteSnapshot {
            current_price: parse_f64(&output.last),
            market_cap: {
                let tomv = parse_f64(&output.tomv);
                (tomv > 0.0).then_some(tomv as i64)
            },
            per: parse_positive_f64(&output.perx),
            pbr: parse_positive_f64(&output.pbrx),
            eps: parse_positive_f64(&output.epsx),
            bps: parse_positive_f64(&output.bpsx),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        tr_id: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        self.limiter.acquire().await;
        let token = self.session.access_token().await?;

        let config = self.session.config();
        let url = format!("{}{}", config.base_url, path);

        let response = self
            .http
            .get(&url)
            .query(params)
            .header("authorization", format!("Bearer {}", token))
            .header("appkey", &config.app_key)
            .header("appsecret", &config.app_secret)
            .header("tr_id", tr_id)
            .header("Content-Type", "application/json; charset=utf-8")
            .send()
            .await
            .map_err(|e| HunterError::Transport(format!("{}: {}", path, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HunterError::Transport(format!("{}: 본문 수신 실패: {}", path, e)))?;

        if !status.is_success() {
            return Err(HunterError::broker(status.as_str(), text));
        }

        serde_json::from_str(&text)
            .map_err(|e| HunterError::Transport(format!("{}: 응답 파싱 실패: {}", path, e)))
    }
}

/// 미국 티커 형식 검증.
fn validate_us_symbol(symbol: &str) -> Result<()> {
    let valid = !symbol.is_empty()
        && symbol.len() <= 10
        && symbol.chars().any(|c| c.is_ascii_alphabetic())
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(HunterError::InvalidInput(format!(
            "미국 티커 형식이 아닙니다: {}",
            symbol
        )))
    }
}

fn validate_exchange_code(exchange_code: &str) -> Result<()> {
    match exchange_code {
        "NAS" | "NYS" | "AMS" => Ok(()),
        other => Err(HunterError::InvalidInput(format!(
            "지원하지 않는 거래소 코드: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_us_symbol() {
        assert!(validate_us_symbol("AAPL").is_ok());
        assert!(validate_us_symbol("BRK.B").is_ok());
        assert!(validate_us_symbol("005930").is_err()); // 숫자만
        assert!(validate_us_symbol("").is_err());
        assert!(validate_us_symbol("TOO-LONG-SYMBOL").is_err());
    }

    #[test]
    fn test_validate_exchange_code() {
        assert!(validate_exchange_code("NAS").is_ok());
        assert!(validate_exchange_code("NYS").is_ok());
        assert!(validate_exchange_code("AMS").is_ok());
        assert!(validate_exchange_code("KRX").is_err());
    }

    #[test]
    fn test_us_daily_response_shape() {
        let raw = r#"{
            "rt_cd": "0",
            "msg_cd": "MCA00000",
            "msg1": "정상처리 되었습니다.",
            "output2": [
                {"xymd": "20260102", "open": "150.1", "high": "153.9",
                 "low": "149.2", "clos": "153.2", "tvol": "51234567"}
            ]
        }"#;
        let parsed: UsDailyResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.output2.len(), 1);
        assert_eq!(parsed.output2[0].clos, "153.2");
    }
}
