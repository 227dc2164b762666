//! 토큰 버킷 레이트 리미터.
//!
//! KIS OpenAPI는 초당 호출 건수를 제한합니다. 모든 아웃바운드 호출은
//! `acquire()`로 허가를 받은 뒤에만 나갑니다. 리미터는 브로커 클라이언트
//! 인스턴스 단위이며 전역이 아닙니다.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// 수집 경로 기본 허용량 (초당). 무거운 루프를 위한 여유분입니다.
pub const COLLECTOR_RATE_PER_SEC: f64 = 15.0;

/// 대화형 조회 경로 기본 허용량 (초당).
pub const INTERACTIVE_RATE_PER_SEC: f64 = 20.0;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// 토큰 버킷.
///
/// 버킷 용량은 1초 분량입니다. 허가가 없으면 보충 시점까지 협조적으로
/// 대기합니다.
pub struct RateLimiter {
    rate_per_sec: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(rate_per_sec: f64) -> Self {
        Self {
            rate_per_sec,
            burst: rate_per_sec,
            state: Mutex::new(BucketState {
                tokens: rate_per_sec,
                last_refill: Instant::now(),
            }),
        }
    }

    /// 허가 1건 획득. 허가가 생길 때까지 대기합니다.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.burst);
                state.last_refill = Instant::now();

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate_per_sec)
            };
            tokio::time::sleep(wait).await;
        }
    }

    pub fn rate_per_sec(&self) -> f64 {
        self.rate_per_sec
    }
}
