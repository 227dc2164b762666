//! OpenAPI 문서.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use hunter_collector::{ProgressPhase, ProgressSnapshot};
use hunter_core::domain::{BandGate, Market, MatchedStock, ScreeningCondition, ScreeningResult};
use hunter_data::{MarketCount, MasterStats, StoreStatistics, UploadStats};

use crate::routes;

/// API 문서 정의.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "StockHunter API",
        description = "주식 스크리닝 서비스 (KIS OpenAPI 기반)"
    ),
    paths(
        routes::health,
        routes::screen::screen_kr,
        routes::screen::screen_us,
        routes::screen::stock_codes,
        routes::screen::us_symbols,
        routes::credentials::validate,
        routes::database::status,
        routes::database::progress,
        routes::database::initialize,
        routes::database::update,
        routes::database::sync_stock_names,
        routes::database::upload_stock_master,
    ),
    components(schemas(
        ScreeningCondition,
        ScreeningResult,
        MatchedStock,
        Market,
        BandGate,
        ProgressSnapshot,
        ProgressPhase,
        StoreStatistics,
        MasterStats,
        MarketCount,
        UploadStats,
        routes::HealthResponse,
        routes::ErrorBody,
        routes::screen::StockCodesResponse,
        routes::screen::UsSymbolsResponse,
        routes::screen::UsSymbol,
        routes::credentials::CredentialsRequest,
        routes::credentials::CredentialsResponse,
        routes::database::DatabaseStatusResponse,
        routes::database::InitializeRequest,
        routes::database::UpdateRequest,
        routes::database::AcceptedResponse,
        routes::database::SyncNamesResponse,
    )),
    tags(
        (name = "health", description = "생존 확인"),
        (name = "screening", description = "스크리닝 실행 / 유니버스 조회"),
        (name = "credentials", description = "자격 증명 검증"),
        (name = "database", description = "저장소 운영")
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터.
pub fn swagger_ui_router() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
