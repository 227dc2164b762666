//! SQLite 데이터베이스 핸들.
//!
//! 저장소 파일은 기본적으로 `~/.stockhunter/price_data.db`입니다.
//! 스키마는 시작 시 멱등하게 생성됩니다.

use std::path::PathBuf;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use hunter_core::error::{HunterError, Result};

/// 데이터베이스 설정.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// DB 파일 경로
    pub path: PathBuf,
    /// 커넥션 풀 크기
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 5,
        }
    }

    /// 기본 경로 (`~/.stockhunter/price_data.db`).
    pub fn default_path() -> PathBuf {
        crate::default_data_dir().join("price_data.db")
    }
}

/// 데이터베이스 핸들.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// DB 파일 열기 (없으면 생성) + 스키마 보장.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HunterError::StoreFailure(format!("데이터 디렉토리 생성 실패: {}", e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| HunterError::StoreFailure(format!("DB 연결 실패: {}", e)))?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %config.path.display(), "데이터베이스 연결 완료");
        Ok(db)
    }

    /// 테스트용 인메모리 DB.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| HunterError::StoreFailure(format!("DB 연결 실패: {}", e)))?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 스키마 생성 (멱등).
    async fn ensure_schema(&self) -> Result<()> {
        const SCHEMA: &[&str] = &[
            r#"
            CREATE TABLE IF NOT EXISTS daily_prices (
                instrument  TEXT NOT NULL,
                trade_date  TEXT NOT NULL,
                open        REAL NOT NULL,
                high        REAL NOT NULL,
                low         REAL NOT NULL,
                close       REAL NOT NULL,
                volume      INTEGER NOT NULL,
                inserted_at TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (instrument, trade_date)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_daily_prices_instrument_date
               ON daily_prices (instrument, trade_date DESC)",
            "CREATE INDEX IF NOT EXISTS idx_daily_prices_date
               ON daily_prices (trade_date DESC)",
            r#"
            CREATE TABLE IF NOT EXISTS stock_master (
                code       TEXT PRIMARY KEY,
                market     TEXT NOT NULL,
                name       TEXT NOT NULL,
                is_etf     INTEGER NOT NULL DEFAULT 0,
                is_etn     INTEGER NOT NULL DEFAULT 0,
                is_active  INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS db_metadata (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        ];

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| HunterError::StoreFailure(format!("스키마 생성 실패: {}", e)))?;
        }
        Ok(())
    }
}

/// sqlx 에러 → 저장소 에러 변환 헬퍼.
pub(crate) fn store_err(context: &str, e: sqlx::Error) -> HunterError {
    HunterError::StoreFailure(format!("{}: {}", context, e))
}
