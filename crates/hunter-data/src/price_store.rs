//! 일봉 저장소.
//!
//! 종목별 일봉을 `(instrument, trade_date)` 기본키로 보관합니다.
//! 같은 키의 재삽입은 덮어쓰기이며(멱등), 쓰기는 수집기 하나만 수행합니다.
//! 읽기는 동시 다중 접근을 허용합니다.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tokio::sync::Mutex;
use tracing::{debug, info};
use utoipa::ToSchema;

use hunter_core::domain::DailyBar;
use hunter_core::error::Result;

use crate::db::{store_err, Database};

/// 운영 메타 키: 마지막 전체 초기화 일자.
pub const META_LAST_FULL_INIT: &str = "last_full_init";
/// 운영 메타 키: 마지막 증분 업데이트 일자.
pub const META_LAST_DAILY_UPDATE: &str = "last_daily_update";
/// 운영 메타 키: 종목 마스터 갱신 시각.
pub const META_MASTER_REFRESHED_AT: &str = "stock_master_refreshed_at";

/// 저장소 통계.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatistics {
    pub instrument_count: i64,
    pub bar_count: i64,
    pub oldest_date: Option<NaiveDate>,
    pub newest_date: Option<NaiveDate>,
}

/// 일봉 저장소.
///
/// 업서트는 내부 뮤텍스로 직렬화되어 부분 배치가 노출되지 않습니다.
#[derive(Clone)]
pub struct PriceStore {
    db: Database,
    writer: std::sync::Arc<Mutex<()>>,
}

impl PriceStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            writer: std::sync::Arc::new(Mutex::new(())),
        }
    }

    /// 일봉 배치 업서트 (종목 단위 원자적).
    ///
    /// 기존 행과 겹치는 배치도 안전합니다. 같은 배치를 두 번 적용해도
    /// 행 수와 값이 변하지 않습니다.
    pub async fn upsert_batch(&self, instrument: &str, bars: &[DailyBar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let _write_guard = self.writer.lock().await;
        let now = Utc::now();

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| store_err("트랜잭션 시작", e))?;

        for bar in bars {
            sqlx::query(
                r#"
                INSERT INTO daily_prices
                    (instrument, trade_date, open, high, low, close, volume, inserted_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (instrument, trade_date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(instrument)
            .bind(bar.trade_date)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume as i64)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_err("일봉 업서트", e))?;
        }

        tx.commit().await.map_err(|e| store_err("커밋", e))?;

        debug!(instrument = instrument, count = bars.len(), "일봉 배치 저장");
        Ok(bars.len())
    }

    /// 최신순 일봉 조회.
    pub async fn bars(&self, instrument: &str, limit: usize) -> Result<Vec<DailyBar>> {
        let rows = sqlx::query(
            r#"
            SELECT trade_date, open, high, low, close, volume
            FROM daily_prices
            WHERE instrument = ?
            ORDER BY trade_date DESC
            LIMIT ?
            "#,
        )
        .bind(instrument)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| store_err("일봉 조회", e))?;

        Ok(rows
            .into_iter()
            .map(|row| DailyBar {
                trade_date: row.get("trade_date"),
                open: row.get("open"),
                high: row.get("high"),
                low: row.get("low"),
                close: row.get("close"),
                volume: row.get::<i64, _>("volume") as u64,
            })
            .collect())
    }

    /// 종목의 최신 거래일.
    pub async fn latest_date(&self, instrument: &str) -> Result<Option<NaiveDate>> {
        let row = sqlx::query(
            "SELECT MAX(trade_date) AS latest FROM daily_prices WHERE instrument = ?",
        )
        .bind(instrument)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| store_err("최신 거래일 조회", e))?;

        Ok(row.get("latest"))
    }

    /// 봉이 하나라도 있는 종목 목록 (증분 업데이트 순회용).
    pub async fn all_instruments_with_bars(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT instrument FROM daily_prices ORDER BY instrument")
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| store_err("종목 목록 조회", e))?;

        Ok(rows.into_iter().map(|row| row.get("instrument")).collect())
    }

    /// 저장소에 봉이 하나라도 있는지.
    pub async fn has_any_bars(&self) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM daily_prices) AS has_bars")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| store_err("저장소 확인", e))?;
        Ok(row.get::<i64, _>("has_bars") != 0)
    }

    /// 보존 기간을 지난 일봉 삭제.
    ///
    /// 전체 초기화 마무리 단계에서만 호출합니다. 증분 업데이트 중에는
    /// 호출하지 않습니다.
    pub async fn prune_older_than(&self, horizon_days: i64) -> Result<u64> {
        let _write_guard = self.writer.lock().await;
        let cutoff = Utc::now().date_naive() - chrono::Duration::days(horizon_days);

        let result = sqlx::query("DELETE FROM daily_prices WHERE trade_date < ?")
            .bind(cutoff)
            .execute(self.db.pool())
            .await
            .map_err(|e| store_err("보존 기간 정리", e))?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(cutoff = %cutoff, deleted = deleted, "오래된 일봉 삭제");
        }
        Ok(deleted)
    }

    /// 운영 메타 저장.
    pub async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO db_metadata (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await
        .map_err(|e| store_err("메타 저장", e))?;
        Ok(())
    }

    /// 운영 메타 조회.
    pub async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM db_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| store_err("메타 조회", e))?;
        Ok(row.map(|r| r.get("value")))
    }

    /// 메타 갱신 시각 조회.
    pub async fn meta_updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT updated_at FROM db_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| store_err("메타 조회", e))?;
        Ok(row.map(|r| r.get("updated_at")))
    }

    /// 저장소 통계.
    pub async fn statistics(&self) -> Result<StoreStatistics> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(DISTINCT instrument) AS instrument_count,
                COUNT(*) AS bar_count,
                MIN(trade_date) AS oldest_date,
                MAX(trade_date) AS newest_date
            FROM daily_prices
            "#,
        )
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| store_err("통계 조회", e))?;

        Ok(StoreStatistics {
            instrument_count: row.get("instrument_count"),
            bar_count: row.get("bar_count"),
            oldest_date: row.get("oldest_date"),
            newest_date: row.get("newest_date"),
        })
    }
}

// =============================================================================
// 테스트
// =============================================================================
