//! 전체 초기화 (백필).
//!
//! 유니버스의 각 종목에 대해 100일 구간 기간조회 6회로 약 400일치
//! 일봉을 수집합니다. 종목 단위로 실패를 격리하며, 이 안에서 재시도하지
//! 않습니다 — 다음 증분 업데이트가 빈 구간을 다시 덮습니다.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use hunter_core::domain::DailyBar;
use hunter_core::error::{HunterError, Result};
use hunter_core::is_korean_code;
use hunter_data::{PriceStore, StockMasterCache, META_LAST_FULL_INIT};

use crate::progress::{ProgressPhase, ProgressTracker};
use crate::source::DailyBarSource;
use crate::stats::CollectStats;

/// 보존/수집 지평 (달력일).
pub const BACKFILL_HORIZON_DAYS: i64 = 400;

/// 구간당 달력일 수.
const BATCH_WINDOW_DAYS: i64 = 100;

/// 종목당 구간 조회 횟수. 6회 × 100일로 지평을 덮습니다.
const BATCH_COUNT: i64 = 6;

/// 구간 사이 의도적 대기. 정확성은 레이트 리미터가 보장합니다.
const INTER_BATCH_DELAY: Duration = Duration::from_millis(50);

/// 전체 초기화 실행.
///
/// `force_rebuild`가 아니고 저장소에 이미 봉이 있으면
/// `AlreadyInitialised`를 반환하며 브로커를 호출하지 않습니다.
pub async fn run_full_backfill(
    source: &dyn DailyBarSource,
    store: &PriceStore,
    master: &StockMasterCache,
    progress: &Arc<ProgressTracker>,
    force_rebuild: bool,
) -> Result<CollectStats> {
    if !force_rebuild && store.has_any_bars().await? {
        let stats = store.statistics().await?;
        return Err(HunterError::AlreadyInitialised(format!(
            "종목 {}개, 일봉 {}건 보유",
            stats.instrument_count, stats.bar_count
        )));
    }

    master.ensure_populated().await?;
    let universe: Vec<String> = master
        .all_active()
        .await?
        .into_iter()
        .map(|s| s.code)
        .filter(|code| is_korean_code(code))
        .collect();

    info!(total = universe.len(), force_rebuild, "전체 초기화 시작");
    progress.begin(ProgressPhase::FullInit, universe.len());

    let mut stats = CollectStats::default();

    for code in &universe {
        // 재수집이 아니면 이미 봉이 있는 종목은 건너뜀
        if !force_rebuild && store.latest_date(code).await?.is_some() {
            stats.skipped += 1;
            progress.advance(code);
            continue;
        }

        match collect_instrument(source, code).await {
            Ok(bars) if bars.is_empty() => {
                // 6개 구간 전부 빈 응답 — 행을 쓰지 않고 넘어감
                warn!(code = %code, "수집된 일봉 없음, 건너뜀");
                stats.skipped += 1;
                progress.advance(code);
            }
            Ok(bars) => {
                store.upsert_batch(code, &bars).await?;
                stats.success += 1;
                stats.bars_saved += bars.len();
                progress.advance(code);
            }
            Err(e) => {
                warn!(code = %code, error = %e, "종목 수집 실패, 다음 종목으로");
                stats.failed += 1;
                progress.record_failure(code);
            }
        }
    }

    // 보존 기간 정리는 전체 초기화 마무리에만 수행
    store.prune_older_than(BACKFILL_HORIZON_DAYS).await?;
    store
        .set_meta(
            META_LAST_FULL_INIT,
            &Utc::now().date_naive().format("%Y%m%d").to_string(),
        )
        .await?;

    progress.complete();
    stats.log_summary("전체 초기화");
    Ok(stats)
}

/// 종목 하나의 지평 전체 수집.
///
/// 오늘부터 100일씩 뒤로 물러나며 6개 구간을 순서대로 조회합니다.
/// 첫 구간 실패는 종목 전체 실패, 이후 구간 실패는 수집분만 유지합니다.
/// 구간 간 중복 날짜는 제거합니다.
async fn collect_instrument(source: &dyn DailyBarSource, code: &str) -> Result<Vec<DailyBar>> {
    let today = Utc::now().date_naive();
    let mut collected: BTreeMap<chrono::NaiveDate, DailyBar> = BTreeMap::new();

    for k in 0..BATCH_COUNT {
        let end = today - chrono::Duration::days(BATCH_WINDOW_DAYS * k);
        let start = end - chrono::Duration::days(BATCH_WINDOW_DAYS - 1);

        match source.period_daily(code, start, end).await {
            Ok(batch) => {
                // 휴장일이 섞이므로 100건 미만도 정상
                for bar in batch {
                    collected.insert(bar.trade_date, bar);
                }
            }
            Err(e) if k == 0 => return Err(e),
            Err(e) => {
                warn!(
                    code = %code,
                    batch = k + 1,
                    error = %e,
                    "후속 구간 실패, 수집분만 저장"
                );
                break;
            }
        }

        if k + 1 < BATCH_COUNT {
            tokio::time::sleep(INTER_BATCH_DELAY).await;
        }
    }

    Ok(collected.into_values().collect())
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests_support::StubSource;
    use hunter_core::domain::{Market, StockInfo};
    use hunter_data::Database;

    async fn setup() -> (PriceStore, StockMasterCache, Arc<ProgressTracker>) {
        let db = Database::connect_in_memory().await.unwrap();
        let store = PriceStore::new(db.clone());
        let master = StockMasterCache::new(db);
        master
            .replace_all(&[
                StockInfo::new("005930", "삼성전자", Market::Kospi),
                StockInfo::new("000660", "SK하이닉스", Market::Kospi),
            ])
            .await
            .unwrap();
        (store, master, Arc::new(ProgressTracker::new()))
    }

    #[tokio::test]
    async fn test_backfill_collects_horizon() {
        let (store, master, progress) = setup().await;
        let source = StubSource::with_history(450);

        let stats = run_full_backfill(&source, &store, &master, &progress, true)
            .await
            .unwrap();

        assert_eq!(stats.success, 2);
        assert_eq!(stats.failed, 0);

        // 종목당 6회 구간 조회
        assert_eq!(source.period_calls(), 12);

        // 보존 지평(400일) 밖 봉은 정리됨
        let statistics = store.statistics().await.unwrap();
        assert_eq!(statistics.instrument_count, 2);
        let today = Utc::now().date_naive();
        let oldest = statistics.oldest_date.unwrap();
        assert!((today - oldest).num_days() <= BACKFILL_HORIZON_DAYS);

        assert!(store.get_meta(META_LAST_FULL_INIT).await.unwrap().is_some());
        assert_eq!(
            progress.snapshot().phase,
            crate::progress::ProgressPhase::Completed
        );
    }

    #[tokio::test]
    async fn test_backfill_deduplicates_overlapping_batches() {
        let (store, master, progress) = setup().await;
        // 구간 경계가 겹치게 응답하는 스텁
        let source = StubSource::with_history(450).overlapping(5);

        run_full_backfill(&source, &store, &master, &progress, true)
            .await
            .unwrap();

        // 같은 (종목, 날짜) 쌍은 한 행만 존재해야 함
        let bars = store.bars("005930", 1000).await.unwrap();
        let mut dates: Vec<_> = bars.iter().map(|b| b.trade_date).collect();
        let before = dates.len();
        dates.dedup();
        assert_eq!(dates.len(), before);
    }

    #[tokio::test]
    async fn test_second_backfill_without_force_is_rejected() {
        let (store, master, progress) = setup().await;
        let source = StubSource::with_history(450);

        run_full_backfill(&source, &store, &master, &progress, true)
            .await
            .unwrap();
        let stats_before = store.statistics().await.unwrap();
        let calls_before = source.period_calls();

        // 두 번째 실행: 브로커 호출 없이 AlreadyInitialised
        let err = run_full_backfill(&source, &store, &master, &progress, false)
            .await
            .unwrap_err();
        assert!(matches!(err, HunterError::AlreadyInitialised(_)));
        assert_eq!(source.period_calls(), calls_before);

        let stats_after = store.statistics().await.unwrap();
        assert_eq!(stats_before.bar_count, stats_after.bar_count);
    }

    #[tokio::test]
    async fn test_first_batch_failure_skips_instrument() {
        let (store, master, progress) = setup().await;
        let source = StubSource::with_history(450).failing_code("005930");

        let stats = run_full_backfill(&source, &store, &master, &progress, true)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success, 1);
        assert_eq!(store.latest_date("005930").await.unwrap(), None);
        assert!(store.latest_date("000660").await.unwrap().is_some());
        assert_eq!(progress.snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_zero_bars_instrument_writes_nothing() {
        let (store, master, progress) = setup().await;
        let source = StubSource::with_history(0); // 전 구간 빈 응답

        let stats = run_full_backfill(&source, &store, &master, &progress, true)
            .await
            .unwrap();

        assert_eq!(stats.success, 0);
        assert_eq!(stats.skipped, 2);
        assert!(!store.has_any_bars().await.unwrap());
    }
}
