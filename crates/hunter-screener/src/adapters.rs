//! 시장별 `MarketAdapter` 구현.
//!
//! 국내는 저장소 + 마스터 + KIS 국내 API를, 미국은 하드코딩 유니버스 +
//! KIS 해외 API를 조합합니다. 엔진은 구현 차이를 모릅니다.

use std::sync::Arc;

use async_trait::async_trait;

use hunter_core::domain::{DailyBar, Market, QuoteSnapshot, StockInfo};
use hunter_core::error::{HunterError, Result};
use hunter_core::{is_korean_code, MarketAdapter};
use hunter_data::{us_universe, PriceStore, StockMasterCache};
use hunter_exchange::KisClient;

use crate::filters::{is_etf_name, is_us_etf_symbol};

/// 국내 시장 어댑터.
pub struct KrMarketAdapter {
    store: PriceStore,
    master: StockMasterCache,
    client: Arc<KisClient>,
}

impl KrMarketAdapter {
    pub fn new(store: PriceStore, master: StockMasterCache, client: Arc<KisClient>) -> Self {
        Self {
            store,
            master,
            client,
        }
    }
}

#[async_trait]
impl MarketAdapter for KrMarketAdapter {
    fn label(&self) -> &str {
        "KR"
    }

    async fn universe(&self) -> Result<Vec<StockInfo>> {
        self.master.ensure_populated().await?;
        Ok(self
            .master
            .all_active()
            .await?
            .into_iter()
            .filter(|s| is_korean_code(&s.code))
            .collect())
    }

    async fn daily_bars(&self, code: &str, limit: usize) -> Result<Vec<DailyBar>> {
        self.store.bars(code, limit).await
    }

    async fn current_quote(&self, code: &str) -> Result<QuoteSnapshot> {
        self.client.current_quote(code).await
    }

    async fn lookup_name(&self, code: &str) -> Result<String> {
        if let Some(name) = self.master.name_of(code).await? {
            return Ok(name);
        }
        self.client.lookup_name(code).await
    }

    fn validate_id(&self, code: &str) -> Result<()> {
        if is_korean_code(code) {
            Ok(())
        } else {
            Err(HunterError::InvalidInput(format!(
                "국내 종목 코드가 아닙니다: {}",
                code
            )))
        }
    }

    fn is_etf_like(&self, _code: &str, name: &str) -> bool {
        is_etf_name(name)
    }
}

/// 미국 시장 어댑터.
///
/// 일봉은 저장소를 우선 조회하고, 비어 있으면 브로커에서 직접 받습니다
/// (해외 일봉은 1회 응답 약 100건 한도).
pub struct UsMarketAdapter {
    store: PriceStore,
    client: Arc<KisClient>,
    market: Market,
    exchange_code: &'static str,
}

impl UsMarketAdapter {
    pub fn new(store: PriceStore, client: Arc<KisClient>, market: Market) -> Result<Self> {
        let exchange_code = market.us_exchange_code().ok_or_else(|| {
            HunterError::InvalidInput(format!("미국 거래소가 아닙니다: {}", market))
        })?;
        Ok(Self {
            store,
            client,
            market,
            exchange_code,
        })
    }

    pub fn market(&self) -> Market {
        self.market
    }
}

#[async_trait]
impl MarketAdapter for UsMarketAdapter {
    fn label(&self) -> &str {
        match self.market {
            Market::Nasdaq => "US-NAS",
            Market::Nyse => "US-NYS",
            Market::Amex => "US-AMS",
            _ => "US",
        }
    }

    async fn universe(&self) -> Result<Vec<StockInfo>> {
        Ok(us_universe(self.market))
    }

    async fn daily_bars(&self, code: &str, limit: usize) -> Result<Vec<DailyBar>> {
        let stored = self.store.bars(code, limit).await?;
        if !stored.is_empty() {
            return Ok(stored);
        }

        let mut live = self.client.us_daily(code, self.exchange_code).await?;
        live.truncate(limit);
        Ok(live)
    }

    async fn current_quote(&self, code: &str) -> Result<QuoteSnapshot> {
        self.client.us_current_quote(code, self.exchange_code).await
    }

    async fn lookup_name(&self, code: &str) -> Result<String> {
        Ok(us_universe(self.market)
            .into_iter()
            .find(|s| s.code == code)
            .map(|s| s.name)
            .unwrap_or_else(|| code.to_string()))
    }

    fn validate_id(&self, code: &str) -> Result<()> {
        let valid = !code.is_empty()
            && code.len() <= 10
            && code.chars().any(|c| c.is_ascii_alphabetic())
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if valid {
            Ok(())
        } else {
            Err(HunterError::InvalidInput(format!(
                "미국 티커 형식이 아닙니다: {}",
                code
            )))
        }
    }

    fn is_etf_like(&self, code: &str, name: &str) -> bool {
        is_us_etf_symbol(code) || name.to_uppercase().contains("ETF")
    }
}
