//! StockHunter HTTP API.
//!
//! 코어 파이프라인(수집기/저장소/스크리닝 엔진) 위의 얇은 어댑터입니다.
//! 모든 런타임 오류는 HTTP 응답으로 보고되고, 프로세스는 바인드 실패
//! 같은 치명적 시작 오류에서만 0이 아닌 코드로 종료합니다.

pub mod openapi;
pub mod routes;
pub mod state;

pub use routes::create_api_router;
pub use state::AppState;
