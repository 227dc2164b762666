//! StockHunter 로컬 저장소.
//!
//! `~/.stockhunter/price_data.db` SQLite 파일 하나에 일봉 캐시
//! (`daily_prices`), 종목 마스터(`stock_master`), 운영 메타
//! (`db_metadata`)를 보관합니다.
//!
//! 쓰기는 수집기 하나만 수행하고(단일 작성자), 읽기는 동시 접근을
//! 허용합니다.

pub mod db;
pub mod price_store;
pub mod stock_master;

use std::path::PathBuf;

pub use db::{Database, DatabaseConfig};
pub use price_store::{
    PriceStore, StoreStatistics, META_LAST_DAILY_UPDATE, META_LAST_FULL_INIT,
    META_MASTER_REFRESHED_AT,
};
pub use stock_master::{
    us_universe, MarketCount, MasterStats, StockMasterCache, UploadStats, MASTER_TTL_DAYS,
};

/// 기본 데이터 디렉토리 (`~/.stockhunter`).
pub fn default_data_dir() -> PathBuf {
    std::env::var_os("STOCKHUNTER_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".stockhunter")))
        .unwrap_or_else(|| PathBuf::from(".stockhunter"))
}
