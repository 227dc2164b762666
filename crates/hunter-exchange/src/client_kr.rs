//! KIS 국내 주식 시세 클라이언트.
//!
//! 스크리너가 쓰는 조회 계열 엔드포인트의 타입 래퍼입니다. 모든 호출은
//! 레이트 리미터 허가 → 토큰 획득 → HTTP 요청 순서로 나갑니다.
//! 이 레이어는 재시도하지 않습니다. 재시도 여부는 수집기가 결정합니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use hunter_core::domain::{parse_trade_date, DailyBar, QuoteSnapshot};
use hunter_core::error::{HunterError, Result};
use hunter_core::is_korean_code;

use crate::auth::KisSession;
use crate::rate_limit::RateLimiter;

/// 일봉 조회 응답 공통 봉 레코드.
#[derive(Debug, Deserialize)]
struct KrDailyRow {
    #[serde(default)]
    stck_bsop_date: String,
    #[serde(default)]
    stck_oprc: String,
    #[serde(default)]
    stck_hgpr: String,
    #[serde(default)]
    stck_lwpr: String,
    #[serde(default)]
    stck_clpr: String,
    #[serde(default)]
    acml_vol: String,
}

/// `inquire-daily-price` 응답.
#[derive(Debug, Deserialize)]
struct RecentDailyResponse {
    rt_cd: String,
    #[serde(default)]
    msg_cd: String,
    #[serde(default)]
    msg1: String,
    #[serde(default)]
    output: Vec<KrDailyRow>,
}

/// `inquire-daily-itemchartprice` 응답.
#[derive(Debug, Deserialize)]
struct PeriodDailyResponse {
    rt_cd: String,
    #[serde(default)]
    msg_cd: String,
    #[serde(default)]
    msg1: String,
    #[serde(default)]
    output2: Vec<KrDailyRow>,
}

/// `inquire-price` 응답.
#[derive(Debug, Deserialize)]
struct CurrentPriceResponse {
    rt_cd: String,
    #[serde(default)]
    msg_cd: String,
    #[serde(default)]
    msg1: String,
    output: Option<CurrentPriceOutput>,
}

#[derive(Debug, Deserialize)]
struct CurrentPriceOutput {
    /// 현재가
    #[serde(default)]
    stck_prpr: String,
    /// 시가총액 (억원)
    #[serde(default)]
    hts_avls: String,
    #[serde(default)]
    per: String,
    #[serde(default)]
    pbr: String,
    #[serde(default)]
    eps: String,
    #[serde(default)]
    bps: String,
}

/// `search-info` 응답.
#[derive(Debug, Deserialize)]
struct SearchInfoResponse {
    rt_cd: String,
    #[serde(default)]
    msg_cd: String,
    #[serde(default)]
    msg1: String,
    output: Option<SearchInfoOutput>,
}

#[derive(Debug, Deserialize)]
struct SearchInfoOutput {
    /// 종목 약어명
    #[serde(default)]
    prdt_abrv_name: String,
    #[serde(default)]
    prdt_name: String,
}

/// 국내 주식 클라이언트.
pub struct KisKrClient {
    http: reqwest::Client,
    session: Arc<KisSession>,
    limiter: Arc<RateLimiter>,
}

impl KisKrClient {
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

    /// 최근 일봉 조회 (최대 30건 — 브로커 제한).
    ///
    /// `days`가 30보다 작으면 앞에서 잘라 반환합니다. 과거 구간 수집은
    /// 이 엔드포인트 대신 [`period_daily`](Self::period_daily)를 사용하세요.
    pub async fn recent_daily(&self, code: &str, days: usize) -> Result<Vec<DailyBar>> {
        validate_kr_code(code)?;

        let response: RecentDailyResponse = self
            .get_json(
                "/uapi/domestic-stock/v1/quotations/inquire-daily-price",
                "FHKST01010400",
                None,
                &[
                    ("fid_cond_mrkt_div_code", "J"),
                    ("fid_input_iscd", code),
                    ("fid_period_div_code", "D"),
                    ("fid_org_adj_prc", "0"),
                ],
            )
            .await?;

        check_rt_cd(&response.rt_cd, &response.msg_cd, &response.msg1)?;

        let mut bars = rows_to_bars(response.output);
        bars.truncate(days);
        debug!(code = code, count = bars.len(), "최근 일봉 조회");
        Ok(bars)
    }

    /// 기간별 일봉 조회 (구간당 최대 약 100건).
    pub async fn period_daily(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        validate_kr_code(code)?;

        let start_str = start.format("%Y%m%d").to_string();
        let end_str = end.format("%Y%m%d").to_string();

        let response: PeriodDailyResponse = self
            .get_json(
                "/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice",
                "FHKST03010100",
                None,
                &[
                    ("FID_COND_MRKT_DIV_CODE", "J"),
                    ("FID_INPUT_ISCD", code),
                    ("FID_INPUT_DATE_1", &start_str),
                    ("FID_INPUT_DATE_2", &end_str),
                    ("FID_PERIOD_DIV_CODE", "D"),
                    ("FID_ORG_ADJ_PRC", "0"),
                ],
            )
            .await?;

        check_rt_cd(&response.rt_cd, &response.msg_cd, &response.msg1)?;

        let bars = rows_to_bars(response.output2);
        debug!(
            code = code,
            start = %start_str,
            end = %end_str,
            count = bars.len(),
            "기간 일봉 조회"
        );
        Ok(bars)
    }

    /// 현재가 + 재무 스냅샷 조회.
    pub async fn current_quote(&self, code: &str) -> Result<QuoteSnapshot> {
        validate_kr_code(code)?;

        let response: CurrentPriceResponse = self
            .get_json(
                "/uapi/domestic-stock/v1/quotations/inquire-price",
                "FHKST01010100",
                None,
                &[("fid_cond_mrkt_div_code", "J"), ("fid_input_iscd", code)],
            )
            .await?;

        check_rt_cd(&response.rt_cd, &response.msg_cd, &response.msg1)?;

        let output = response
            .output
            .ok_or_else(|| HunterError::broker("", "현재가 응답에 output 없음"))?;

        Ok(QuoteSnapshot {
            current_price: parse_f64(&output.stck_prpr),
            // hts_avls는 억원 단위
            market_cap: parse_positive_i64(&output.hts_avls).map(|v| v * 100_000_000),
            per: parse_positive_f64(&output.per),
            pbr: parse_positive_f64(&output.pbr),
            eps: parse_positive_f64(&output.eps),
            bps: parse_positive_f64(&output.bps),
        })
    }

    /// 종목명 조회.
    pub async fn lookup_name(&self, code: &str) -> Result<String> {
        validate_kr_code(code)?;

        let response: SearchInfoResponse = self
            .get_json(
                "/uapi/domestic-stock/v1/quotations/search-info",
                "CTPF1604R",
                Some("P"),
                &[("PRDT_TYPE_CD", "300"), ("PDNO", code)],
            )
            .await?;

        check_rt_cd(&response.rt_cd, &response.msg_cd, &response.msg1)?;

        let output = response
            .output
            .ok_or_else(|| HunterError::broker("", "종목 조회 응답에 output 없음"))?;

        let name = if output.prdt_abrv_name.trim().is_empty() {
            output.prdt_name.trim().to_string()
        } else {
            output.prdt_abrv_name.trim().to_string()
        };
        Ok(name)
    }

    /// 공통 GET 요청.
    ///
    /// 레이트 리밋 허가와 토큰 획득을 거친 뒤 호출합니다.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        tr_id: &str,
        custtype: Option<&str>,
        params: &[(&str, &str)],
    ) -> Result<T> {
        self.limiter.acquire().await;
        let token = self.session.access_token().await?;

        let config = self.session.config();
        let url = format!("{}{}", config.base_url, path);

        let mut builder = self
            .http
            .get(&url)
            .query(params)
            .header("authorization", format!("Bearer {}", token))
            .header("appkey", &config.app_key)
            .header("appsecret", &config.app_secret)
            .header("tr_id", tr_id)
            .header("Content-Type", "application/json; charset=utf-8");
        if let Some(custtype) = custtype {
            builder = builder.header("custtype", custtype);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HunterError::Transport(format!("{}: {}", path, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HunterError::Transport(format!("{}: 본문 수신 실패: {}", path, e)))?;

        if !status.is_success() {
            return Err(HunterError::broker(
                status.as_str(),
                truncate_body(&text),
            ));
        }

        serde_json::from_str(&text).map_err(|e| {
            HunterError::Transport(format!("{}: 응답 파싱 실패: {} ({})", path, e, truncate_body(&text)))
        })
    }
}

// =============================================================================
// 헬퍼
// =============================================================================

/// 국내 종목 코드 검증 (6자리 숫자).
pub(crate) fn validate_kr_code(code: &str) -> Result<()> {
    if is_korean_code(code) {
        Ok(())
    } else {
        Err(HunterError::InvalidInput(format!(
            "국내 종목 코드가 아닙니다: {}",
            code
        )))
    }
}

/// 브로커 응답 코드 검사. `rt_cd != "0"`이면 코드/메시지를 그대로 보존합니다.
pub(crate) fn check_rt_cd(rt_cd: &str, msg_cd: &str, msg1: &str) -> Result<()> {
    if rt_cd == "0" {
        Ok(())
    } else {
        Err(HunterError::broker(
            if msg_cd.is_empty() { rt_cd } else { msg_cd },
            msg1.trim(),
        ))
    }
}

/// 봉 레코드 변환. 비어있는 행(휴장일 등)은 건너뜁니다.
fn rows_to_bars(rows: Vec<KrDailyRow>) -> Vec<DailyBar> {
    let mut bars: Vec<DailyBar> = rows
        .into_iter()
        .filter_map(|row| {
            let trade_date = parse_trade_date(row.stck_bsop_date.trim())?;
            let close = parse_f64(&row.stck_clpr);
            if close <= 0.0 {
                return None;
            }
            Some(DailyBar {
                trade_date,
                open: parse_f64(&row.stck_oprc),
                high: parse_f64(&row.stck_hgpr),
                low: parse_f64(&row.stck_lwpr),
                close,
                volume: parse_u64(&row.acml_vol),
            })
        })
        .collect();
    // 최신순 보장
    bars.sort_by(|a, b| b.trade_date.cmp(&a.trade_date));
    bars
}

/// KIS 숫자 문자열 파싱 (빈 값/형식 오류는 0).
pub(crate) fn parse_f64(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}

pub(crate) fn parse_u64(s: &str) -> u64 {
    s.trim().parse().unwrap_or(0)
}

/// 0 이하를 결측으로 취급하는 파싱 (PER, PBR 등 재무 필드용).
pub(crate) fn parse_positive_f64(s: &str) -> Option<f64> {
    let value: f64 = s.trim().parse().ok()?;
    (value > 0.0).then_some(value)
}

pub(crate) fn parse_positive_i64(s: &str) -> Option<i64> {
    let value: i64 = s.trim().parse().ok()?;
    (value > 0).then_some(value)
}

fn truncate_body(text: &str) -> String {
    const LIMIT: usize = 300;
    if text.len() > LIMIT {
        let mut end = LIMIT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}

// =============================================================================
// 테스트
// =============================================================================
