//! StockHunter API 서버.
//!
//! Axum 기반 REST 서버를 시작합니다. 스크리닝, 자격 증명 검증, 저장소
//! 초기화/업데이트 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use hunter_api::openapi::swagger_ui_router;
use hunter_api::{create_api_router, AppState};
use hunter_data::{Database, DatabaseConfig, PriceStore, StockMasterCache};

/// 서버 설정.
struct ServerConfig {
    host: String,
    port: u16,
    /// DB 파일 경로
    db_path: std::path::PathBuf,
    /// 요청 전역 타임아웃 (스크리닝은 유니버스 크기에 따라 오래 걸림)
    request_timeout: Duration,
}

impl ServerConfig {
    /// 환경 변수에서 설정 로드.
    ///
    /// - `API_HOST` (기본 0.0.0.0)
    /// - `API_PORT` (기본 3000)
    /// - `STOCKHUNTER_DB` (기본 `~/.stockhunter/price_data.db`)
    /// - `REQUEST_TIMEOUT_SECS` (기본 300)
    fn from_env() -> Self {
        let host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let db_path = std::env::var("STOCKHUNTER_DB")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| DatabaseConfig::default_path());
        let request_timeout = Duration::from_secs(
            std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        );

        Self {
            host,
            port,
            db_path,
            request_timeout,
        }
    }

    fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, timeout: Duration) -> Router {
    Router::new()
        .merge(create_api_router().with_state(state))
        .merge(swagger_ui_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        // 게이트웨이가 앞단에 있으므로 origin 제한은 두지 않음
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hunter_api=info,hunter_collector=info,hunter_data=info,hunter_exchange=info,tower_http=warn"
                    .into()
            }),
        )
        .init();

    info!("StockHunter API 서버 시작");

    let config = ServerConfig::from_env();
    let addr = config.socket_addr().map_err(|e| {
        error!(
            host = %config.host,
            port = config.port,
            error = %e,
            "소켓 주소가 유효하지 않습니다. API_HOST / API_PORT를 확인하세요"
        );
        e
    })?;

    // 저장소 연결 (파일이 없으면 생성)
    let db = Database::connect(&DatabaseConfig::new(&config.db_path)).await?;
    let store = PriceStore::new(db.clone());
    let master = StockMasterCache::new(db);

    // 마스터 초기 적재 — 실패해도 서버는 뜬다 (스크리닝 요청 시 재시도)
    if let Err(e) = master.ensure_populated().await {
        warn!(error = %e, "종목 마스터 초기 적재 실패");
    }

    let state = Arc::new(AppState::new(store, master));
    info!(version = state.version, db = %config.db_path.display(), "상태 초기화 완료");

    let app = create_router(state, config.request_timeout);

    // 바인드 실패는 치명적 — 0이 아닌 코드로 종료
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(%addr, error = %e, "포트 바인드 실패");
        e
    })?;

    info!(%addr, "API 서버 수신 대기");
    info!("Swagger UI: http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("서버 정상 종료");
    Ok(())
}

/// 종료 시그널 대기 (Ctrl+C / SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Ctrl+C 핸들러 설치 실패");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("시그널 핸들러 설치 실패")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Ctrl+C 수신, 종료 시작");
        }
        _ = terminate => {
            warn!("SIGTERM 수신, 종료 시작");
        }
    }
}
