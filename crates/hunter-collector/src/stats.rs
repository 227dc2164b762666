//! 수집 통계.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 수집 작업 결과 요약.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectStats {
    /// 수집 성공 종목 수
    pub success: usize,
    /// 실패 종목 수
    pub failed: usize,
    /// 건너뛴 종목 수 (기수집 / 빈 응답)
    pub skipped: usize,
    /// 저장된 일봉 수
    pub bars_saved: usize,
}

impl CollectStats {
    /// 요약 로그 출력.
    pub fn log_summary(&self, label: &str) {
        tracing::info!(
            success = self.success,
            failed = self.failed,
            skipped = self.skipped,
            bars = self.bars_saved,
            "{} 완료",
            label
        );
    }
}
