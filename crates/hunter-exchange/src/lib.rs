//! 한국투자증권 OpenAPI 클라이언트.
//!
//! # 구성
//!
//! ```text
//! KisClient (통합 퍼사드)
//! ├── KisSession    — 토큰 발급/재사용 (메모리 + 파일 캐시)
//! ├── RateLimiter   — 토큰 버킷 (클라이언트 인스턴스 단위)
//! ├── KisKrClient   — 국내: 일봉 2종, 현재가, 종목명
//! └── KisUsClient   — 미국: 일봉, 현재가
//! ```
//!
//! 이 레이어는 재시도하지 않습니다. 실패 처리는 호출자(수집기/엔진)의
//! 정책을 따릅니다.

pub mod auth;
pub mod client;
pub mod client_kr;
pub mod client_us;
pub mod config;
pub mod rate_limit;

pub use auth::{CachedToken, KisSession};
pub use client::KisClient;
pub use client_kr::KisKrClient;
pub use client_us::KisUsClient;
pub use config::{default_cache_dir, KisConfig, KisEnvironment};
pub use rate_limit::{RateLimiter, COLLECTOR_RATE_PER_SEC, INTERACTIVE_RATE_PER_SEC};
