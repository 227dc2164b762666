//! 증분 업데이트 (갭 채우기).
//!
//! 저장소의 각 종목에 대해 마지막 거래일 이후 빠진 일봉만 받아
//! 추가합니다. 보존 기간 정리는 하지 않습니다 — 정리는 전체 초기화의
//! 마무리 단계에서만 수행됩니다.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use hunter_core::error::Result;
use hunter_data::{PriceStore, META_LAST_DAILY_UPDATE};

use crate::progress::{ProgressPhase, ProgressTracker};
use crate::source::DailyBarSource;
use crate::stats::CollectStats;

/// 증분 요청 최대 폭 (브로커 1회 응답 한도).
const MAX_UPDATE_WINDOW: i64 = 100;

/// 증분 업데이트 실행.
pub async fn run_incremental_update(
    source: &dyn DailyBarSource,
    store: &PriceStore,
    progress: &Arc<ProgressTracker>,
) -> Result<CollectStats> {
    let instruments = store.all_instruments_with_bars().await?;
    info!(total = instruments.len(), "증분 업데이트 시작");
    progress.begin(ProgressPhase::DailyUpdate, instruments.len());

    let today = Utc::now().date_naive();
    let mut stats = CollectStats::default();

    for code in &instruments {
        let latest = store.latest_date(code).await?;

        // 빠진 일수 + 1 (당일 포함), 브로커 한도로 절단
        let window = match latest {
            Some(latest) => ((today - latest).num_days() + 1).clamp(1, MAX_UPDATE_WINDOW),
            None => 1,
        } as usize;

        let bars = match source.recent_daily(code, window).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!(code = %code, error = %e, "증분 조회 실패, 다음 종목으로");
                stats.failed += 1;
                progress.record_failure(code);
                continue;
            }
        };

        // 이미 보유한 구간보다 새 봉만 추가
        let fresh: Vec<_> = match latest {
            Some(latest) => bars
                .into_iter()
                .filter(|bar| bar.trade_date > latest)
                .collect(),
            None => bars,
        };

        if fresh.is_empty() {
            debug!(code = %code, "새 일봉 없음");
            stats.skipped += 1;
            progress.advance(code);
            continue;
        }

        match store.upsert_batch(code, &fresh).await {
            Ok(saved) => {
                stats.success += 1;
                stats.bars_saved += saved;
                progress.advance(code);
            }
            Err(e) => {
                warn!(code = %code, error = %e, "증분 저장 실패");
                stats.failed += 1;
                progress.record_failure(code);
            }
        }
    }

    store
        .set_meta(
            META_LAST_DAILY_UPDATE,
            &today.format("%Y%m%d").to_string(),
        )
        .await?;

    progress.complete();
    stats.log_summary("증분 업데이트");
    Ok(stats)
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests_support::StubSource;
    use chrono::NaiveDate;
    use hunter_core::domain::DailyBar;
    use hunter_data::Database;

    async fn store_with_latest(days_behind: i64) -> (PriceStore, NaiveDate) {
        let db = Database::connect_in_memory().await.unwrap();
        let store = PriceStore::new(db);
        let latest = Utc::now().date_naive() - chrono::Duration::days(days_behind);
        let mut bars = Vec::new();
        for offset in 0..5 {
            let date = latest - chrono::Duration::days(offset);
            bars.push(DailyBar::new(date, 99.0, 101.0, 98.0, 100.0, 1000));
        }
        store.upsert_batch("005930", &bars).await.unwrap();
        (store, latest)
    }

    #[tokio::test]
    async fn test_gap_fill_requests_exact_window() {
        // 시나리오: 최신 보유일이 D-10, 오늘이 D → 폭 11의 단일 호출
        let (store, _latest) = store_with_latest(10).await;
        let source = StubSource::with_history(450);
        let progress = Arc::new(ProgressTracker::new());

        let stats = run_incremental_update(&source, &store, &progress)
            .await
            .unwrap();

        assert_eq!(source.recent_calls(), 1);
        assert_eq!(source.last_recent_window(), Some(11));
        assert_eq!(stats.success, 1);

        // 최신일이 오늘로 전진
        let today = Utc::now().date_naive();
        assert_eq!(store.latest_date("005930").await.unwrap(), Some(today));
    }

    #[tokio::test]
    async fn test_update_preserves_existing_bars() {
        let (store, latest) = store_with_latest(10).await;
        let before = store.bars("005930", 1000).await.unwrap();
        let source = StubSource::with_history(450);
        let progress = Arc::new(ProgressTracker::new());

        run_incremental_update(&source, &store, &progress)
            .await
            .unwrap();

        // 업데이트 전 최신일보다 오래된 봉은 삭제되지 않는다
        let after = store.bars("005930", 1000).await.unwrap();
        assert!(after.len() > before.len());
        for bar in &before {
            assert!(after.iter().any(|b| b.trade_date == bar.trade_date));
        }
        assert!(store.latest_date("005930").await.unwrap().unwrap() >= latest);
    }

    #[tokio::test]
    async fn test_up_to_date_store_adds_nothing() {
        let (store, _) = store_with_latest(0).await; // 오늘까지 보유
        let count_before = store.statistics().await.unwrap().bar_count;
        let source = StubSource::with_history(450);
        let progress = Arc::new(ProgressTracker::new());

        let stats = run_incremental_update(&source, &store, &progress)
            .await
            .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(store.statistics().await.unwrap().bar_count, count_before);
    }

    #[tokio::test]
    async fn test_window_is_capped_at_broker_limit() {
        let (store, _) = store_with_latest(250).await;
        let source = StubSource::with_history(450);
        let progress = Arc::new(ProgressTracker::new());

        run_incremental_update(&source, &store, &progress)
            .await
            .unwrap();

        assert_eq!(source.last_recent_window(), Some(100));
    }

    #[tokio::test]
    async fn test_per_instrument_failure_is_isolated() {
        let db = Database::connect_in_memory().await.unwrap();
        let store = PriceStore::new(db);
        let stale = Utc::now().date_naive() - chrono::Duration::days(3);
        store
            .upsert_batch("005930", &[DailyBar::new(stale, 99.0, 101.0, 98.0, 100.0, 1)])
            .await
            .unwrap();
        store
            .upsert_batch("000660", &[DailyBar::new(stale, 99.0, 101.0, 98.0, 100.0, 1)])
            .await
            .unwrap();

        let source = StubSource::with_history(450).failing_code("005930");
        let progress = Arc::new(ProgressTracker::new());

        let stats = run_incremental_update(&source, &store, &progress)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success, 1);
        // 실패 종목은 그대로, 성공 종목은 전진
        assert_eq!(store.latest_date("005930").await.unwrap(), Some(stale));
        assert_eq!(
            store.latest_date("000660").await.unwrap(),
            Some(Utc::now().date_naive())
        );
    }
}
