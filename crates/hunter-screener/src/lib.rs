//! StockHunter 스크리닝 엔진.
//!
//! 저장소의 일봉으로 기술적 지표를 계산하고, 선언적 조건 집합에 부합하는
//! 종목만 골라냅니다. 시장 구분(국내/미국)은 `MarketAdapter` 구현 뒤에
//! 숨어 있어 엔진 코드는 하나입니다.

pub mod adapters;
pub mod engine;
pub mod filters;

pub use adapters::{KrMarketAdapter, UsMarketAdapter};
pub use engine::ScreeningEngine;
pub use filters::US_ETF_SYMBOLS;
