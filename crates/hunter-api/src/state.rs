//! 애플리케이션 공유 상태.

use std::sync::Arc;

use hunter_collector::ProgressTracker;
use hunter_core::error::Result;
use hunter_data::{PriceStore, StockMasterCache};
use hunter_exchange::{KisClient, KisConfig, KisEnvironment, INTERACTIVE_RATE_PER_SEC};

/// 모든 핸들러가 공유하는 상태.
///
/// 진행률 레코드는 프로세스 전역 하나이며, 수집기가 쓰고 HTTP가 읽습니다.
#[derive(Clone)]
pub struct AppState {
    pub store: PriceStore,
    pub master: StockMasterCache,
    pub progress: Arc<ProgressTracker>,
    pub version: &'static str,
}

impl AppState {
    pub fn new(store: PriceStore, master: StockMasterCache) -> Self {
        Self {
            store,
            master,
            progress: Arc::new(ProgressTracker::new()),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// 요청 단위 자격 증명으로 대화형 KIS 클라이언트 생성.
    ///
    /// 토큰은 파일 캐시를 통해 요청 간에 재사용되므로, 클라이언트를 요청마다
    /// 만들어도 발급 횟수는 늘지 않습니다.
    pub fn interactive_client(
        &self,
        app_key: &str,
        app_secret: &str,
        is_production: bool,
    ) -> Result<Arc<KisClient>> {
        let config = KisConfig::new(
            app_key,
            app_secret,
            KisEnvironment::from_is_production(is_production),
        );
        Ok(Arc::new(KisClient::new(config, INTERACTIVE_RATE_PER_SEC)?))
    }
}
