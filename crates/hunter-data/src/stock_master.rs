//! 종목 마스터 캐시.
//!
//! 스크리닝 유니버스의 원천입니다. 소스 우선순위:
//!
//! 1. DB의 `stock_master` 테이블 (TTL 이내 갱신분)
//! 2. 운영자가 업로드한 KRX 고정폭 상장 목록 파일
//! 3. 바이너리에 내장된 CSV 폴백
//! 4. 하드코딩된 최소 유니버스
//!
//! 전체 갱신은 트랜잭션으로 수행되어 부분 쓰기가 이전 스냅샷을 깨뜨리지
//! 않습니다. 상장폐지 종목은 삭제하지 않고 `is_active = 0`으로만
//! 전환합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{info, warn};
use utoipa::ToSchema;

use hunter_core::domain::{Market, StockInfo};
use hunter_core::error::{HunterError, Result};

use crate::db::{store_err, Database};
use crate::price_store::META_MASTER_REFRESHED_AT;

/// 마스터 갱신 TTL (일).
pub const MASTER_TTL_DAYS: i64 = 7;

/// 바이너리에 내장된 CSV 폴백 (`code,name,market[,sector]`).
const PACKAGED_CSV: &str = include_str!("../assets/krx_master.csv");

/// KRX 고정폭 상장 파일의 종목명 필드 오프셋 (바이트).
const MASTER_NAME_OFFSET: usize = 21;
/// 종목명 필드 길이 (바이트).
const MASTER_NAME_WIDTH: usize = 40;

/// 마스터 통계.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MasterStats {
    pub total: i64,
    pub per_market: Vec<MarketCount>,
    pub last_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketCount {
    pub market: String,
    pub count: i64,
}

/// 업로드 처리 결과.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadStats {
    pub files: usize,
    pub parsed: usize,
    pub saved: usize,
}

/// 종목 마스터 캐시.
#[derive(Clone)]
pub struct StockMasterCache {
    db: Database,
}

impl StockMasterCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 마스터가 비어 있거나 TTL을 지났으면 폴백 소스로 채웁니다.
    ///
    /// 업로드본이 이미 있으면 건드리지 않습니다.
    pub async fn ensure_populated(&self) -> Result<()> {
        let total = self.count_all().await?;
        if total > 0 && !self.refresh_needed().await? {
            return Ok(());
        }

        if total > 0 {
            // TTL은 지났지만 데이터는 있음 — 운영자 업로드 전까지 기존 스냅샷 유지
            info!(total = total, "종목 마스터 TTL 경과 (기존 스냅샷 유지)");
            return Ok(());
        }

        let stocks = packaged_universe();
        let stocks = if stocks.is_empty() {
            warn!("내장 CSV 파싱 실패 — 하드코딩 유니버스로 폴백");
            minimal_universe()
        } else {
            stocks
        };

        info!(count = stocks.len(), "종목 마스터 초기 적재");
        self.replace_all(&stocks).await
    }

    /// TTL 기준 갱신 필요 여부.
    pub async fn refresh_needed(&self) -> Result<bool> {
        let refreshed_at = self.last_refresh().await?;
        Ok(match refreshed_at {
            Some(at) => (Utc::now() - at).num_days() >= MASTER_TTL_DAYS,
            None => true,
        })
    }

    /// 마지막 갱신 시각.
    pub async fn last_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT updated_at FROM db_metadata WHERE key = ?")
            .bind(META_MASTER_REFRESHED_AT)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| store_err("마스터 갱신 시각 조회", e))?;
        Ok(row.map(|r| r.get("updated_at")))
    }

    /// 전체 교체 (트랜잭션).
    ///
    /// 기존 행은 갱신, 새 행은 삽입합니다. 목록에 없는 기존 종목은
    /// 비활성으로 전환합니다.
    pub async fn replace_all(&self, stocks: &[StockInfo]) -> Result<()> {
        if stocks.is_empty() {
            return Err(HunterError::InvalidInput(
                "빈 종목 목록으로는 마스터를 교체할 수 없습니다".to_string(),
            ));
        }

        let now = Utc::now();
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| store_err("트랜잭션 시작", e))?;

        // 갱신 대상 시장의 기존 종목을 일단 비활성 처리
        let markets: std::collections::HashSet<&str> =
            stocks.iter().map(|s| s.market.as_str()).collect();
        for market in &markets {
            sqlx::query("UPDATE stock_master SET is_active = 0, updated_at = ? WHERE market = ?")
                .bind(now)
                .bind(market)
                .execute(&mut *tx)
                .await
                .map_err(|e| store_err("마스터 비활성화", e))?;
        }

        for stock in stocks {
            sqlx::query(
                r#"
                INSERT INTO stock_master
                    (code, market, name, is_etf, is_etn, is_active, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (code) DO UPDATE SET
                    market = excluded.market,
                    name = excluded.name,
                    is_etf = excluded.is_etf,
                    is_etn = excluded.is_etn,
                    is_active = excluded.is_active,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&stock.code)
            .bind(stock.market.as_str())
            .bind(&stock.name)
            .bind(stock.is_etf)
            .bind(stock.is_etn)
            .bind(stock.is_active)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_err("마스터 업서트", e))?;
        }

        sqlx::query(
            r#"
            INSERT INTO db_metadata (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(META_MASTER_REFRESHED_AT)
        .bind(now.to_rfc3339())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| store_err("마스터 메타 저장", e))?;

        tx.commit().await.map_err(|e| store_err("커밋", e))?;
        info!(count = stocks.len(), "종목 마스터 교체 완료");
        Ok(())
    }

    /// 운영자 업로드 처리.
    ///
    /// `files`는 `(파일명, 내용)` 쌍입니다. 시장은 파일명에서 추론합니다
    /// (`kospi` 포함 → KOSPI, `kosdaq` 포함 → KOSDAQ).
    pub async fn upload_master_files(&self, files: &[(String, Vec<u8>)]) -> Result<UploadStats> {
        let mut all: Vec<StockInfo> = Vec::new();
        for (filename, content) in files {
            let market = market_from_filename(filename).ok_or_else(|| {
                HunterError::InvalidInput(format!(
                    "파일명에서 시장을 알 수 없습니다 (kospi/kosdaq 필요): {}",
                    filename
                ))
            })?;

            let text = String::from_utf8_lossy(content);
            let parsed = parse_master_file(&text, market);
            info!(file = %filename, market = %market, count = parsed.len(), "상장 목록 파싱");
            all.extend(parsed);
        }

        if all.is_empty() {
            return Err(HunterError::InvalidInput(
                "업로드된 파일에서 종목을 찾지 못했습니다".to_string(),
            ));
        }

        let parsed = all.len();
        self.replace_all(&all).await?;
        Ok(UploadStats {
            files: files.len(),
            parsed,
            saved: parsed,
        })
    }

    // ========================================
    // 조회
    // ========================================

    /// 활성 종목 전체.
    pub async fn all_active(&self) -> Result<Vec<StockInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT code, market, name, is_etf, is_etn, is_active
            FROM stock_master
            WHERE is_active = 1
            ORDER BY code
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| store_err("활성 종목 조회", e))?;

        rows.into_iter().map(row_to_stock).collect()
    }

    /// 시장별 활성 종목.
    pub async fn by_market(&self, market: Market) -> Result<Vec<StockInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT code, market, name, is_etf, is_etn, is_active
            FROM stock_master
            WHERE is_active = 1 AND market = ?
            ORDER BY code
            "#,
        )
        .bind(market.as_str())
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| store_err("시장별 종목 조회", e))?;

        rows.into_iter().map(row_to_stock).collect()
    }

    /// 종목명 조회.
    pub async fn name_of(&self, code: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT name FROM stock_master WHERE code = ?")
            .bind(code)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| store_err("종목명 조회", e))?;
        Ok(row.map(|r| r.get("name")))
    }

    /// 종목명 갱신 (sync-stock-names 경로).
    pub async fn set_name(&self, code: &str, name: &str) -> Result<()> {
        sqlx::query("UPDATE stock_master SET name = ?, updated_at = ? WHERE code = ?")
            .bind(name)
            .bind(Utc::now())
            .bind(code)
            .execute(self.db.pool())
            .await
            .map_err(|e| store_err("종목명 갱신", e))?;
        Ok(())
    }

    /// 이름이 비어 있거나 코드와 같은 종목 (브로커 조회로 보완 대상).
    pub async fn codes_missing_name(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT code FROM stock_master
            WHERE is_active = 1 AND (name = '' OR name = code)
            ORDER BY code
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| store_err("미보완 종목 조회", e))?;
        Ok(rows.into_iter().map(|r| r.get("code")).collect())
    }

    /// 마스터 통계.
    pub async fn stats(&self) -> Result<MasterStats> {
        let total = self.count_all().await?;

        let rows = sqlx::query(
            r#"
            SELECT market, COUNT(*) AS count
            FROM stock_master
            WHERE is_active = 1
            GROUP BY market
            ORDER BY market
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| store_err("시장별 통계", e))?;

        Ok(MasterStats {
            total,
            per_market: rows
                .into_iter()
                .map(|r| MarketCount {
                    market: r.get("market"),
                    count: r.get("count"),
                })
                .collect(),
            last_refresh: self.last_refresh().await?,
        })
    }

    async fn count_all(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM stock_master WHERE is_active = 1")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| store_err("종목 수 조회", e))?;
        Ok(row.get("count"))
    }
}

fn row_to_stock(row: sqlx::sqlite::SqliteRow) -> Result<StockInfo> {
    let market_str: String = row.get("market");
    let market: Market = market_str
        .parse()
        .map_err(|e: String| HunterError::StoreFailure(e))?;
    Ok(StockInfo {
        code: row.get("code"),
        name: row.get("name"),
        market,
        is_etf: row.get("is_etf"),
        is_etn: row.get("is_etn"),
        is_active: row.get("is_active"),
    })
}

// =============================================================================
// 파싱 / 폴백 소스
// =============================================================================

/// 파일명에서 시장 추론.
fn market_from_filename(filename: &str) -> Option<Market> {
    let lower = filename.to_lowercase();
    if lower.contains("kosdaq") {
        Some(Market::Kosdaq)
    } else if lower.contains("kospi") {
        Some(Market::Kospi)
    } else {
        None
    }
}

/// KRX 고정폭 상장 파일 한 줄 파싱.
///
/// 앞 6바이트가 숫자 코드, 오프셋 21부터 40바이트가 종목명입니다.
fn parse_master_line(line: &str) -> Option<(String, String)> {
    let bytes = line.as_bytes();
    if bytes.len() < MASTER_NAME_OFFSET {
        return None;
    }

    let code = std::str::from_utf8(&bytes[..6]).ok()?.trim().to_string();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let end = (MASTER_NAME_OFFSET + MASTER_NAME_WIDTH).min(bytes.len());
    let name = String::from_utf8_lossy(&bytes[MASTER_NAME_OFFSET..end])
        .trim()
        .to_string();
    if name.is_empty() {
        return None;
    }

    Some((code, name))
}

/// 고정폭 파일 전체 파싱.
fn parse_master_file(text: &str, market: Market) -> Vec<StockInfo> {
    text.lines()
        .filter_map(parse_master_line)
        .map(|(code, name)| build_stock(code, name, market))
        .collect()
}

/// 내장 CSV에서 유니버스 로드.
fn packaged_universe() -> Vec<StockInfo> {
    PACKAGED_CSV
        .lines()
        .skip(1) // 헤더
        .filter_map(|line| {
            let mut parts = line.split(',');
            let code = parts.next()?.trim();
            let name = parts.next()?.trim();
            let market: Market = parts.next()?.trim().parse().ok()?;
            if code.is_empty() || name.is_empty() {
                return None;
            }
            Some(build_stock(code.to_string(), name.to_string(), market))
        })
        .collect()
}

/// 최후의 폴백 유니버스 (대표 종목 40개 미만).
fn minimal_universe() -> Vec<StockInfo> {
    const MINIMAL: &[(&str, &str, Market)] = &[
        ("005930", "삼성전자", Market::Kospi),
        ("000660", "SK하이닉스", Market::Kospi),
        ("373220", "LG에너지솔루션", Market::Kospi),
        ("207940", "삼성바이오로직스", Market::Kospi),
        ("005380", "현대차", Market::Kospi),
        ("000270", "기아", Market::Kospi),
        ("068270", "셀트리온", Market::Kospi),
        ("005490", "POSCO홀딩스", Market::Kospi),
        ("035420", "NAVER", Market::Kospi),
        ("051910", "LG화학", Market::Kospi),
        ("006400", "삼성SDI", Market::Kospi),
        ("035720", "카카오", Market::Kospi),
        ("028260", "삼성물산", Market::Kospi),
        ("012330", "현대모비스", Market::Kospi),
        ("066570", "LG전자", Market::Kospi),
        ("105560", "KB금융", Market::Kospi),
        ("055550", "신한지주", Market::Kospi),
        ("032830", "삼성생명", Market::Kospi),
        ("017670", "SK텔레콤", Market::Kospi),
        ("030200", "KT", Market::Kospi),
        ("247540", "에코프로비엠", Market::Kosdaq),
        ("086520", "에코프로", Market::Kosdaq),
        ("091990", "셀트리온헬스케어", Market::Kosdaq),
        ("066970", "엘앤에프", Market::Kosdaq),
        ("196170", "알테오젠", Market::Kosdaq),
        ("058470", "리노공업", Market::Kosdaq),
        ("035900", "JYP엔터테인먼트", Market::Kosdaq),
        ("293490", "카카오게임즈", Market::Kosdaq),
        ("263750", "펄어비스", Market::Kosdaq),
        ("068760", "셀트리온제약", Market::Kosdaq),
    ];

    MINIMAL
        .iter()
        .map(|(code, name, market)| build_stock(code.to_string(), name.to_string(), *market))
        .collect()
}

fn build_stock(code: String, name: String, market: Market) -> StockInfo {
    let upper = name.to_uppercase();
    StockInfo {
        is_etf: upper.contains("ETF"),
        is_etn: upper.contains("ETN"),
        code,
        name,
        market,
        is_active: true,
    }
}

// =============================================================================
// 미국 유니버스
// =============================================================================

/// 미국 거래소별 하드코딩 유니버스.
///
/// 유니버스 소스는 `MarketAdapter` 뒤에 있으므로, 외부 상장 피드로
/// 교체해도 엔진은 변경되지 않습니다.
pub fn us_universe(market: Market) -> Vec<StockInfo> {
    let symbols: &[(&str, &str)] = match market {
        Market::Nasdaq => &[
            ("AAPL", "Apple Inc"),
            ("MSFT", "Microsoft Corp"),
            ("NVDA", "NVIDIA Corp"),
            ("GOOGL", "Alphabet Inc Class A"),
            ("AMZN", "Amazon.com Inc"),
            ("META", "Meta Platforms Inc"),
            ("TSLA", "Tesla Inc"),
            ("AVGO", "Broadcom Inc"),
            ("COST", "Costco Wholesale Corp"),
            ("NFLX", "Netflix Inc"),
            ("AMD", "Advanced Micro Devices"),
            ("ADBE", "Adobe Inc"),
            ("PEP", "PepsiCo Inc"),
            ("CSCO", "Cisco Systems Inc"),
            ("INTC", "Intel Corp"),
            ("QCOM", "Qualcomm Inc"),
            ("TXN", "Texas Instruments Inc"),
            ("AMAT", "Applied Materials Inc"),
            ("MU", "Micron Technology Inc"),
            ("PLTR", "Palantir Technologies"),
        ],
        Market::Nyse => &[
            ("BRK.B", "Berkshire Hathaway B"),
            ("JPM", "JPMorgan Chase & Co"),
            ("V", "Visa Inc"),
            ("UNH", "UnitedHealth Group"),
            ("XOM", "Exxon Mobil Corp"),
            ("JNJ", "Johnson & Johnson"),
            ("WMT", "Walmart Inc"),
            ("PG", "Procter & Gamble Co"),
            ("MA", "Mastercard Inc"),
            ("HD", "Home Depot Inc"),
            ("CVX", "Chevron Corp"),
            ("KO", "Coca-Cola Co"),
            ("BAC", "Bank of America Corp"),
            ("PFE", "Pfizer Inc"),
            ("DIS", "Walt Disney Co"),
            ("MCD", "McDonald's Corp"),
            ("CAT", "Caterpillar Inc"),
            ("GE", "GE Aerospace"),
            ("BA", "Boeing Co"),
            ("NKE", "Nike Inc"),
        ],
        Market::Amex => &[
            ("BTG", "B2Gold Corp"),
            ("IMO", "Imperial Oil Ltd"),
            ("SIM", "Grupo Simec"),
            ("LNG", "Cheniere Energy Inc"),
            ("UAVS", "AgEagle Aerial Systems"),
        ],
        _ => &[],
    };

    symbols
        .iter()
        .map(|(code, name)| StockInfo::new(*code, *name, market))
        .collect()
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn test_cache() -> StockMasterCache {
        StockMasterCache::new(Database::connect_in_memory().await.unwrap())
    }

    #[test]
    fn test_parse_master_line() {
        // 코드 6바이트 + 패딩 + 오프셋 21부터 종목명
        let line = format!("005930KR7005930003   {:<40}나머지필드", "삼성전자");
        let (code, name) = parse_master_line(&line).unwrap();
        assert_eq!(code, "005930");
        assert_eq!(name, "삼성전자");
    }

    #[test]
    fn test_parse_master_line_rejects_non_numeric() {
        assert_eq!(parse_master_line("ABCDEF padding       name"), None);
        assert_eq!(parse_master_line("short"), None);
        assert_eq!(parse_master_line(""), None);
    }

    #[test]
    fn test_market_from_filename() {
        assert_eq!(market_from_filename("kospi_code.mst"), Some(Market::Kospi));
        assert_eq!(
            market_from_filename("KOSDAQ_listing_20260101.txt"),
            Some(Market::Kosdaq)
        );
        assert_eq!(market_from_filename("nasdaq.txt"), None);
    }

    #[test]
    fn test_packaged_universe_parses() {
        let stocks = packaged_universe();
        assert!(stocks.len() >= 40);
        assert!(stocks.iter().any(|s| s.code == "005930"));
        assert!(stocks.iter().any(|s| s.market == Market::Kosdaq));
    }

    #[test]
    fn test_minimal_universe_is_bounded() {
        let stocks = minimal_universe();
        assert!(!stocks.is_empty());
        assert!(stocks.len() <= 40);
    }

    #[test]
    fn test_us_universe_exchanges() {
        assert!(!us_universe(Market::Nasdaq).is_empty());
        assert!(!us_universe(Market::Nyse).is_empty());
        assert!(!us_universe(Market::Amex).is_empty());
        assert!(us_universe(Market::Kospi).is_empty());
    }

    #[tokio::test]
    async fn test_ensure_populated_loads_packaged_csv() {
        let cache = test_cache().await;
        cache.ensure_populated().await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert!(stats.total >= 40);
        assert!(stats.last_refresh.is_some());

        assert_eq!(
            cache.name_of("005930").await.unwrap(),
            Some("삼성전자".to_string())
        );
    }

    #[tokio::test]
    async fn test_ensure_populated_is_idempotent() {
        let cache = test_cache().await;
        cache.ensure_populated().await.unwrap();
        let before = cache.stats().await.unwrap().total;

        cache.ensure_populated().await.unwrap();
        assert_eq!(cache.stats().await.unwrap().total, before);
    }

    #[tokio::test]
    async fn test_replace_all_deactivates_missing() {
        let cache = test_cache().await;
        cache
            .replace_all(&[
                StockInfo::new("005930", "삼성전자", Market::Kospi),
                StockInfo::new("000660", "SK하이닉스", Market::Kospi),
            ])
            .await
            .unwrap();

        // 한 종목만 남긴 새 스냅샷 — 빠진 종목은 비활성
        cache
            .replace_all(&[StockInfo::new("005930", "삼성전자", Market::Kospi)])
            .await
            .unwrap();

        let active = cache.all_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, "005930");

        // 비활성 종목도 이름은 조회 가능 (과거 데이터 보존)
        assert_eq!(
            cache.name_of("000660").await.unwrap(),
            Some("SK하이닉스".to_string())
        );
    }

    #[tokio::test]
    async fn test_upload_master_files() {
        let cache = test_cache().await;
        let line = format!("005930KR7005930003   {:<40}etc", "삼성전자");
        let files = vec![("kospi_code.mst".to_string(), line.into_bytes())];

        let stats = cache.upload_master_files(&files).await.unwrap();
        assert_eq!(stats.parsed, 1);

        let active = cache.all_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].market, Market::Kospi);
    }

    #[tokio::test]
    async fn test_upload_rejects_unknown_market() {
        let cache = test_cache().await;
        let files = vec![("unknown.mst".to_string(), b"005930".to_vec())];
        assert!(matches!(
            cache.upload_master_files(&files).await,
            Err(HunterError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_by_market_and_missing_names() {
        let cache = test_cache().await;
        cache
            .replace_all(&[
                StockInfo::new("005930", "삼성전자", Market::Kospi),
                StockInfo::new("247540", "247540", Market::Kosdaq), // 이름 미보완
            ])
            .await
            .unwrap();

        let kosdaq = cache.by_market(Market::Kosdaq).await.unwrap();
        assert_eq!(kosdaq.len(), 1);

        let missing = cache.codes_missing_name().await.unwrap();
        assert_eq!(missing, vec!["247540"]);

        cache.set_name("247540", "에코프로비엠").await.unwrap();
        assert!(cache.codes_missing_name().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_etf_flag_from_name() {
        let cache = test_cache().await;
        cache
            .replace_all(&[
                build_stock("069500".to_string(), "KODEX 200 ETF".to_string(), Market::Kospi),
                StockInfo::new("005930", "삼성전자", Market::Kospi),
            ])
            .await
            .unwrap();

        let active = cache.all_active().await.unwrap();
        let etf = active.iter().find(|s| s.code == "069500").unwrap();
        assert!(etf.is_etf);
    }
}
