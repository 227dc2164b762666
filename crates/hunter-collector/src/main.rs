//! 수집기 운영 CLI.
//!
//! HTTP 서버 없이 전체 초기화 / 증분 업데이트를 실행할 때 사용합니다.
//! 자격 증명은 플래그 또는 환경변수(`KIS_APP_KEY`, `KIS_APP_SECRET`)로
//! 전달합니다.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hunter_collector::{CollectorService, ProgressTracker};
use hunter_data::{Database, DatabaseConfig, PriceStore, StockMasterCache};
use hunter_exchange::{KisClient, KisConfig, KisEnvironment, COLLECTOR_RATE_PER_SEC};

#[derive(Parser)]
#[command(name = "hunter-collector")]
#[command(about = "StockHunter 일봉 수집기", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// KIS 앱키 (기본: KIS_APP_KEY 환경변수)
    #[arg(long)]
    app_key: Option<String>,

    /// KIS 앱시크릿 (기본: KIS_APP_SECRET 환경변수)
    #[arg(long)]
    app_secret: Option<String>,

    /// 실전투자 환경 사용 (기본: 모의투자)
    #[arg(long)]
    production: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 전체 초기화 (유니버스 전 종목 약 400일치 수집)
    Init {
        /// 기존 데이터가 있어도 재수집
        #[arg(long)]
        force: bool,
    },

    /// 증분 업데이트 (마지막 수집일 이후 갭 채우기)
    Update,

    /// 저장소 상태 출력
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "hunter_collector={},hunter_data={},hunter_exchange={}",
                cli.log_level, cli.log_level, cli.log_level
            )
            .into()
        }))
        .init();

    let db = Database::connect(&DatabaseConfig::new(DatabaseConfig::default_path())).await?;
    let store = PriceStore::new(db.clone());
    let master = StockMasterCache::new(db);

    match &cli.command {
        Commands::Init { force } => {
            let force = *force;
            let service = build_service(&cli, store, master)?;
            let stats = service.full_backfill(force).await?;
            println!(
                "전체 초기화 완료: 성공 {} / 실패 {} / 건너뜀 {} (일봉 {}건)",
                stats.success, stats.failed, stats.skipped, stats.bars_saved
            );
        }
        Commands::Update => {
            let service = build_service(&cli, store, master)?;
            let stats = service.incremental_update().await?;
            println!(
                "증분 업데이트 완료: 성공 {} / 실패 {} / 건너뜀 {} (일봉 {}건)",
                stats.success, stats.failed, stats.skipped, stats.bars_saved
            );
        }
        Commands::Status => {
            let statistics = store.statistics().await?;
            let master_stats = master.stats().await?;

            println!("저장소 상태:");
            println!("  종목 수: {}", statistics.instrument_count);
            println!("  일봉 수: {}", statistics.bar_count);
            if let (Some(oldest), Some(newest)) = (statistics.oldest_date, statistics.newest_date)
            {
                println!("  보유 구간: {} ~ {}", oldest, newest);
            }
            println!("  마스터 종목 수: {}", master_stats.total);
            for entry in &master_stats.per_market {
                println!("    {}: {}", entry.market, entry.count);
            }
            if let Some(last_init) = store.get_meta(hunter_data::META_LAST_FULL_INIT).await? {
                println!("  마지막 전체 초기화: {}", last_init);
            }
            if let Some(last_update) = store.get_meta(hunter_data::META_LAST_DAILY_UPDATE).await? {
                println!("  마지막 증분 업데이트: {}", last_update);
            }
        }
    }

    Ok(())
}

/// 자격 증명과 저장소로 수집 서비스 구성.
fn build_service(
    cli: &Cli,
    store: PriceStore,
    master: StockMasterCache,
) -> Result<CollectorService, Box<dyn std::error::Error>> {
    let app_key = cli
        .app_key
        .clone()
        .or_else(|| std::env::var("KIS_APP_KEY").ok())
        .ok_or("KIS 앱키가 없습니다 (--app-key 또는 KIS_APP_KEY)")?;
    let app_secret = cli
        .app_secret
        .clone()
        .or_else(|| std::env::var("KIS_APP_SECRET").ok())
        .ok_or("KIS 앱시크릿이 없습니다 (--app-secret 또는 KIS_APP_SECRET)")?;

    let environment = KisEnvironment::from_is_production(cli.production);
    let client = KisClient::new(
        KisConfig::new(app_key, app_secret, environment),
        COLLECTOR_RATE_PER_SEC,
    )?;

    Ok(CollectorService::new(
        Arc::new(client),
        store,
        master,
        Arc::new(ProgressTracker::new()),
    ))
}
