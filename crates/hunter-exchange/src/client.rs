//! KIS 통합 클라이언트.
//!
//! 국내(KR)와 미국(US) 조회 API를 하나의 퍼사드로 묶습니다. 토큰 세션과
//! 레이트 리미터는 KR/US 클라이언트가 공유합니다 — KIS는 토큰 발급과
//! 호출 건수를 앱키 단위로 제한하기 때문입니다.

use std::sync::Arc;

use chrono::NaiveDate;

use hunter_core::domain::{DailyBar, QuoteSnapshot};
use hunter_core::error::Result;

use crate::auth::KisSession;
use crate::client_kr::KisKrClient;
use crate::client_us::KisUsClient;
use crate::config::KisConfig;
use crate::rate_limit::RateLimiter;

/// KIS 통합 클라이언트.
pub struct KisClient {
    session: Arc<KisSession>,
    limiter: Arc<RateLimiter>,
    kr: KisKrClient,
    us: KisUsClient,
}

impl KisClient {
    /// 지정한 초당 허용량으로 클라이언트 생성.
    ///
    /// 수집 경로는 [`COLLECTOR_RATE_PER_SEC`](crate::rate_limit::COLLECTOR_RATE_PER_SEC),
    /// 대화형 경로는 [`INTERACTIVE_RATE_PER_SEC`](crate::rate_limit::INTERACTIVE_RATE_PER_SEC)를
    /// 사용하세요.
    pub fn new(config: KisConfig, rate_per_sec: f64) -> Result<Self> {
        let session = KisSession::new(config)?;
        let limiter = Arc::new(RateLimiter::new(rate_per_sec));
        let kr = KisKrClient::new(Arc::clone(&session), Arc::clone(&limiter))?;
        let us = KisUsClient::new(Arc::clone(&session), Arc::clone(&limiter))?;

        Ok(Self {
            session,
            limiter,
            kr,
            us,
        })
    }

    /// 토큰 세션 참조.
    pub fn session(&self) -> &Arc<KisSession> {
        &self.session
    }

    /// 레이트 리미터 참조.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// 자격 증명 검증.
    ///
    /// 유효한 토큰을 확보할 수 있으면 성공입니다. 캐시가 없으면 실제 발급이
    /// 일어나므로 과도하게 호출하지 마세요.
    pub async fn validate_credentials(&self) -> Result<()> {
        self.session.access_token().await.map(|_| ())
    }

    // ========================================
    // 국내
    // ========================================

    /// 국내 최근 일봉 (최대 30건 — 브로커 제한).
    pub async fn recent_daily(&self, code: &str, days: usize) -> Result<Vec<DailyBar>> {
        self.kr.recent_daily(code, days).await
    }

    /// 국내 기간 일봉.
    pub async fn period_daily(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        self.kr.period_daily(code, start, end).await
    }

    /// 국내 현재가 + 재무.
    pub async fn current_quote(&self, code: &str) -> Result<QuoteSnapshot> {
        self.kr.current_quote(code).await
    }

    /// 국내 종목명.
    pub async fn lookup_name(&self, code: &str) -> Result<String> {
        self.kr.lookup_name(code).await
    }

    // ========================================
    // 미국
    // ========================================

    /// 미국 일봉 (최신순, 최대 약 100건).
    pub async fn us_daily(&self, symbol: &str, exchange_code: &str) -> Result<Vec<DailyBar>> {
        self.us.daily(symbol, exchange_code).await
    }

    /// 미국 현재가 + 재무.
    pub async fn us_current_quote(
        &self,
        symbol: &str,
        exchange_code: &str,
    ) -> Result<QuoteSnapshot> {
        self.us.current_quote(symbol, exchange_code).await
    }
}
