//! StockHunter 일봉 수집기.
//!
//! 두 가지 작업을 제공합니다.
//!
//! - **전체 초기화** — 유니버스 전 종목의 약 400일치 일봉을 구축
//! - **증분 업데이트** — 마지막 수집일 이후의 빈 구간만 채움
//!
//! 진행 상황은 프로세스 전역 [`ProgressTracker`] 하나로 발행되며 HTTP
//! 어댑터가 읽습니다.

pub mod backfill;
pub mod progress;
pub mod source;
pub mod stats;
pub mod update;

use std::sync::Arc;

use hunter_core::error::Result;
use hunter_data::{PriceStore, StockMasterCache};

pub use backfill::{run_full_backfill, BACKFILL_HORIZON_DAYS};
pub use progress::{ProgressPhase, ProgressSnapshot, ProgressTracker};
pub use source::DailyBarSource;
pub use stats::CollectStats;
pub use update::run_incremental_update;

/// 수집기 서비스.
///
/// 소스/저장소/마스터/진행률을 묶어 백그라운드 태스크에서 실행하기 좋은
/// 형태로 제공합니다.
#[derive(Clone)]
pub struct CollectorService {
    source: Arc<dyn DailyBarSource>,
    store: PriceStore,
    master: StockMasterCache,
    progress: Arc<ProgressTracker>,
}

impl CollectorService {
    pub fn new(
        source: Arc<dyn DailyBarSource>,
        store: PriceStore,
        master: StockMasterCache,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            source,
            store,
            master,
            progress,
        }
    }

    /// 전체 초기화.
    pub async fn full_backfill(&self, force_rebuild: bool) -> Result<CollectStats> {
        run_full_backfill(
            self.source.as_ref(),
            &self.store,
            &self.master,
            &self.progress,
            force_rebuild,
        )
        .await
    }

    /// 증분 업데이트.
    pub async fn incremental_update(&self) -> Result<CollectStats> {
        run_incremental_update(self.source.as_ref(), &self.store, &self.progress).await
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }
}
