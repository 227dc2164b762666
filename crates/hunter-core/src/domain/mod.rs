//! 도메인 타입 모듈.

mod bar;
mod condition;
mod instrument;
mod quote;
mod result;

pub use bar::{parse_trade_date, DailyBar};
pub use condition::{BandGate, ScreeningCondition};
pub use instrument::{is_korean_code, Market, StockInfo};
pub use quote::QuoteSnapshot;
pub use result::{round_price, round_to, MatchedStock, ScreeningResult};
