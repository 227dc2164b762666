//! 일봉 소스 인터페이스.
//!
//! 수집기는 브로커 구현이 아니라 이 trait에만 의존합니다. 테스트는
//! 스텁 소스로 대체합니다.

use async_trait::async_trait;
use chrono::NaiveDate;

use hunter_core::domain::DailyBar;
use hunter_core::error::Result;
use hunter_exchange::KisClient;

/// 일봉 조회 소스.
#[async_trait]
pub trait DailyBarSource: Send + Sync {
    /// 기간 일봉 (과거 구간 수집용, 최신순).
    async fn period_daily(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>>;

    /// 최근 일봉 (증분 업데이트용, 최신순).
    async fn recent_daily(&self, code: &str, days: usize) -> Result<Vec<DailyBar>>;
}

#[async_trait]
impl DailyBarSource for KisClient {
    async fn period_daily(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        KisClient::period_daily(self, code, start, end).await
    }

    async fn recent_daily(&self, code: &str, days: usize) -> Result<Vec<DailyBar>> {
        KisClient::recent_daily(self, code, days).await
    }
}

// =============================================================================
// 테스트 지원
// =============================================================================

#[cfg(test)]
pub mod tests_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::{Datelike, Utc};

    use hunter_core::error::HunterError;

    use super::*;

    /// 합성 일봉을 반환하는 스텁 소스.
    ///
    /// 오늘부터 `history_days`일 전까지 매 달력일에 봉이 있다고 가정합니다.
    /// 호출 횟수와 마지막 증분 요청 폭을 기록합니다.
    pub struct StubSource {
        history_days: i64,
        overlap_days: i64,
        failing_code: Option<String>,
        period_calls: AtomicUsize,
        recent_calls: AtomicUsize,
        last_recent_window: Mutex<Option<usize>>,
    }

    impl StubSource {
        pub fn with_history(history_days: i64) -> Self {
            Self {
                history_days,
                overlap_days: 0,
                failing_code: None,
                period_calls: AtomicUsize::new(0),
                recent_calls: AtomicUsize::new(0),
                last_recent_window: Mutex::new(None),
            }
        }

        /// 요청 구간보다 `days`일 더 과거까지 응답 (구간 중복 시뮬레이션).
        pub fn overlapping(mut self, days: i64) -> Self {
            self.overlap_days = days;
            self
        }

        /// 특정 종목의 모든 조회를 실패시킴.
        pub fn failing_code(mut self, code: &str) -> Self {
            self.failing_code = Some(code.to_string());
            self
        }

        pub fn period_calls(&self) -> usize {
            self.period_calls.load(Ordering::SeqCst)
        }

        pub fn recent_calls(&self) -> usize {
            self.recent_calls.load(Ordering::SeqCst)
        }

        pub fn last_recent_window(&self) -> Option<usize> {
            *self.last_recent_window.lock().unwrap()
        }

        fn bar_at(date: NaiveDate) -> DailyBar {
            // 날짜에서 결정적으로 가격 생성
            let seed = date.ordinal() as f64;
            let close = 10_000.0 + (seed % 500.0) * 10.0;
            DailyBar::new(date, close - 50.0, close + 100.0, close - 100.0, close, 1_000_000)
        }

        fn history_start(&self) -> NaiveDate {
            Utc::now().date_naive() - chrono::Duration::days(self.history_days - 1)
        }

        fn check_failure(&self, code: &str) -> Result<()> {
            if self.failing_code.as_deref() == Some(code) {
                Err(HunterError::Transport(format!("stub failure for {}", code)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DailyBarSource for StubSource {
        async fn period_daily(
            &self,
            code: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DailyBar>> {
            self.period_calls.fetch_add(1, Ordering::SeqCst);
            self.check_failure(code)?;

            if self.history_days <= 0 {
                return Ok(Vec::new());
            }

            let today = Utc::now().date_naive();
            let effective_start = (start - chrono::Duration::days(self.overlap_days))
                .max(self.history_start());
            let effective_end = end.min(today);

            let mut bars = Vec::new();
            let mut date = effective_end;
            while date >= effective_start {
                bars.push(Self::bar_at(date));
                date -= chrono::Duration::days(1);
            }
            Ok(bars)
        }

        async fn recent_daily(&self, code: &str, days: usize) -> Result<Vec<DailyBar>> {
            self.recent_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_recent_window.lock().unwrap() = Some(days);
            self.check_failure(code)?;

            if self.history_days <= 0 {
                return Ok(Vec::new());
            }

            let today = Utc::now().date_naive();
            let mut bars = Vec::new();
            let mut date = today;
            while bars.len() < days && date >= self.history_start() {
                bars.push(Self::bar_at(date));
                date -= chrono::Duration::days(1);
            }
            Ok(bars)
        }
    }
}
