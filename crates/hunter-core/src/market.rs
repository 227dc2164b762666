//! 시장별 능력 인터페이스.
//!
//! 스크리닝 엔진은 국내/미국 시장을 구분하지 않고 이 trait만 사용합니다.
//! 구체 구현은 유니버스 소스, 봉 저장소, 브로커 클라이언트를 시장에 맞게
//! 조합합니다.

use async_trait::async_trait;

use crate::domain::{DailyBar, QuoteSnapshot, StockInfo};
use crate::error::Result;

/// 시장 능력 집합.
///
/// `{유니버스, 봉 조회, 현재가, 종목명, 식별자 검증, ETF 휴리스틱}`을
/// 하나의 seam으로 묶습니다.
#[async_trait]
pub trait MarketAdapter: Send + Sync {
    /// 유니버스 라벨 (예: "KR", "US-NAS").
    fn label(&self) -> &str;

    /// 스크리닝 대상 종목 목록.
    async fn universe(&self) -> Result<Vec<StockInfo>>;

    /// 최신순 일봉 조회 (저장소 기반).
    async fn daily_bars(&self, code: &str, limit: usize) -> Result<Vec<DailyBar>>;

    /// 현재가 + 재무 스냅샷 (브로커 호출).
    async fn current_quote(&self, code: &str) -> Result<QuoteSnapshot>;

    /// 종목명 조회.
    async fn lookup_name(&self, code: &str) -> Result<String>;

    /// 식별자 형식 검증.
    fn validate_id(&self, code: &str) -> Result<()>;

    /// ETF/ETN성 종목 휴리스틱.
    ///
    /// 국내는 종목명 토큰, 미국은 대표 ETF 심볼 목록으로 판정합니다.
    fn is_etf_like(&self, code: &str, name: &str) -> bool;
}
