//! StockHunter 공용 코어.
//!
//! 도메인 타입, 에러, 기술적 지표 커널, 시장 능력 인터페이스를 제공합니다.
//! 이 크레이트는 I/O를 하지 않습니다. 브로커/저장소 접근은 상위 크레이트가
//! `MarketAdapter` 뒤에서 조합합니다.

pub mod domain;
pub mod error;
pub mod indicators;
pub mod market;

pub use domain::{
    is_korean_code, parse_trade_date, round_price, round_to, BandGate, DailyBar, Market,
    MatchedStock, QuoteSnapshot, ScreeningCondition, ScreeningResult, StockInfo,
};
pub use error::{HunterError, Result};
pub use market::MarketAdapter;
