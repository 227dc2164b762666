//! 수집 진행률 추적.
//!
//! 프로세스 전체에 하나만 존재하는 단일 작성자 레코드입니다. 수집기가
//! 쓰고, HTTP 어댑터가 스냅샷을 읽습니다. 읽기는 약간 뒤처진 스냅샷을
//! 허용합니다.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 진행 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Idle,
    FullInit,
    DailyUpdate,
    Completed,
    Failed,
}

/// 진행 상태 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub phase: ProgressPhase,
    /// 대상 종목 수
    pub total: usize,
    /// 처리 완료 종목 수
    pub current: usize,
    /// 현재 처리 중인 종목
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stock: Option<String>,
    /// 실패 종목 수
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            phase: ProgressPhase::Idle,
            total: 0,
            current: 0,
            current_stock: None,
            failed: 0,
            started_at: None,
            finished_at: None,
            message: None,
        }
    }
}

/// 진행률 추적기.
pub struct ProgressTracker {
    inner: RwLock<ProgressSnapshot>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ProgressSnapshot::default()),
        }
    }

    /// 작업 시작.
    pub fn begin(&self, phase: ProgressPhase, total: usize) {
        let mut guard = self.inner.write().expect("progress lock poisoned");
        *guard = ProgressSnapshot {
            phase,
            total,
            started_at: Some(Utc::now()),
            ..ProgressSnapshot::default()
        };
    }

    /// 종목 하나 처리 완료.
    pub fn advance(&self, code: &str) {
        let mut guard = self.inner.write().expect("progress lock poisoned");
        guard.current += 1;
        guard.current_stock = Some(code.to_string());
    }

    /// 종목 하나 실패 기록.
    pub fn record_failure(&self, code: &str) {
        let mut guard = self.inner.write().expect("progress lock poisoned");
        guard.failed += 1;
        guard.current_stock = Some(code.to_string());
    }

    /// 작업 정상 종료.
    pub fn complete(&self) {
        let mut guard = self.inner.write().expect("progress lock poisoned");
        guard.phase = ProgressPhase::Completed;
        guard.finished_at = Some(Utc::now());
        guard.current_stock = None;
    }

    /// 작업 실패 종료.
    pub fn fail(&self, message: impl Into<String>) {
        let mut guard = self.inner.write().expect("progress lock poisoned");
        guard.phase = ProgressPhase::Failed;
        guard.finished_at = Some(Utc::now());
        guard.message = Some(message.into());
    }

    /// 현재 스냅샷.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.read().expect("progress lock poisoned").clone()
    }

    /// 작업이 진행 중인지.
    pub fn is_running(&self) -> bool {
        matches!(
            self.snapshot().phase,
            ProgressPhase::FullInit | ProgressPhase::DailyUpdate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.snapshot().phase, ProgressPhase::Idle);
        assert!(!tracker.is_running());

        tracker.begin(ProgressPhase::FullInit, 100);
        assert!(tracker.is_running());
        assert_eq!(tracker.snapshot().total, 100);

        tracker.advance("005930");
        tracker.advance("000660");
        tracker.record_failure("035720");

        let snap = tracker.snapshot();
        assert_eq!(snap.current, 2);
        assert_eq!(snap.failed, 1);

        tracker.complete();
        let snap = tracker.snapshot();
        assert_eq!(snap.phase, ProgressPhase::Completed);
        assert!(snap.finished_at.is_some());
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_begin_resets_previous_run() {
        let tracker = ProgressTracker::new();
        tracker.begin(ProgressPhase::FullInit, 10);
        tracker.advance("005930");
        tracker.complete();

        tracker.begin(ProgressPhase::DailyUpdate, 5);
        let snap = tracker.snapshot();
        assert_eq!(snap.phase, ProgressPhase::DailyUpdate);
        assert_eq!(snap.current, 0);
        assert_eq!(snap.failed, 0);
        assert!(snap.finished_at.is_none());
    }
}
