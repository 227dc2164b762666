//! KIS 접근 토큰 세션 관리자.
//!
//! KIS는 토큰 발급을 하루 1회 수준으로 제한하므로, 프로세스 재시작이나
//! 동시 요청 폭주가 발급 횟수를 늘리면 안 됩니다. 이를 위해 토큰을
//! 2단계로 캐시합니다.
//!
//! 1. 메모리 캐시 — 같은 세션 인스턴스의 호출 간 공유
//! 2. 파일 캐시 — `~/.stockhunter/token_{env}_{hash}.json`, 재시작 간 공유
//!
//! 발급/로드는 세션 인스턴스별 critical section 안에서만 일어납니다.
//! 동시 `access_token()` 호출은 첫 호출자가 발급(또는 로드)한 결과를
//! 재사용합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use hunter_core::error::{HunterError, Result};

use crate::config::KisConfig;

/// 만료 안전 여유 (5분). 이 여유를 남기고 갱신합니다.
const EXPIRY_SAFETY_MARGIN_SECS: i64 = 300;

/// 캐시된 토큰.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub token: String,
    /// 발급 시각 (epoch 초)
    pub issued_at: i64,
    /// 만료 시각 (epoch 초)
    pub expires_at: i64,
}

impl CachedToken {
    /// 안전 여유를 감안한 유효성.
    pub fn is_valid(&self, now_epoch: i64) -> bool {
        now_epoch + EXPIRY_SAFETY_MARGIN_SECS < self.expires_at
    }
}

/// 토큰 발급 응답.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    /// 실패 시 에러 설명 (KIS는 200이 아닌 코드로도 JSON을 반환)
    error_description: Option<String>,
}

/// KIS 토큰 세션.
///
/// `(환경, 앱키)` 쌍 하나를 담당합니다. 여러 태스크가 `Arc`로 공유합니다.
pub struct KisSession {
    http: reqwest::Client,
    config: KisConfig,
    cache_file: PathBuf,
    inner: Mutex<Option<CachedToken>>,
}

impl KisSession {
    pub fn new(config: KisConfig) -> Result<Arc<Self>> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HunterError::Transport(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        let cache_file = token_cache_path(
            &config.cache_dir,
            config.environment.label(),
            &config.app_key,
        );

        Ok(Arc::new(Self {
            http,
            config,
            cache_file,
            inner: Mutex::new(None),
        }))
    }

    pub fn config(&self) -> &KisConfig {
        &self.config
    }

    /// 만료되지 않은 접근 토큰 반환.
    ///
    /// 시도 순서: 메모리 캐시 → 파일 캐시 → 신규 발급.
    /// 발급 실패는 `AuthFailure`로 전파하며 이 안에서 재시도하지 않습니다.
    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.inner.lock().await;
        let now = Utc::now().timestamp();

        if let Some(cached) = guard.as_ref() {
            if cached.is_valid(now) {
                return Ok(cached.token.clone());
            }
        }

        // 파일 캐시 확인 (만료된 파일은 삭제)
        if let Some(cached) = load_cached_token(&self.cache_file, now) {
            debug!(path = %self.cache_file.display(), "토큰 파일 캐시 적중");
            let token = cached.token.clone();
            *guard = Some(cached);
            return Ok(token);
        }

        // 신규 발급
        let cached = self.mint().await?;
        if let Err(e) = persist_cached_token(&self.cache_file, &cached) {
            // 파일 저장 실패는 치명적이지 않음 — 재시작 시 재발급될 뿐
            warn!("토큰 파일 저장 실패: {}", e);
        }
        let token = cached.token.clone();
        *guard = Some(cached);
        Ok(token)
    }

    /// 토큰 발급 (`POST /oauth2/tokenP`).
    async fn mint(&self) -> Result<CachedToken> {
        let url = format!("{}/oauth2/tokenP", self.config.base_url);
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "appkey": self.config.app_key,
            "appsecret": self.config.app_secret,
        });

        info!(environment = ?self.config.environment, "KIS 접근 토큰 발급 요청");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| HunterError::AuthFailure(format!("토큰 발급 요청 실패: {}", e)))?;

        let status = response.status();
        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| HunterError::AuthFailure(format!("토큰 응답 파싱 실패: {}", e)))?;

        let token = parsed.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            HunterError::AuthFailure(format!(
                "토큰 발급 거부 ({}): {}",
                status,
                parsed
                    .error_description
                    .unwrap_or_else(|| "응답에 access_token 없음".to_string())
            ))
        })?;

        let now = Utc::now().timestamp();
        // KIS 토큰 유효기간은 24시간 이내
        let expires_in = parsed.expires_in.unwrap_or(86_400).clamp(1, 86_400);

        Ok(CachedToken {
            token,
            issued_at: now,
            expires_at: now + expires_in,
        })
    }

    /// 캐시 완전 삭제 (메모리 + 파일).
    ///
    /// 앱키 교체 시에만 사용합니다.
    pub async fn purge(&self) {
        let mut guard = self.inner.lock().await;
        *guard = None;
        if self.cache_file.exists() {
            if let Err(e) = std::fs::remove_file(&self.cache_file) {
                warn!("토큰 파일 삭제 실패: {}", e);
            }
        }
    }
}

/// 토큰 캐시 파일 경로.
///
/// 앱키를 평문으로 쓰지 않도록 SHA-256 해시의 앞 16자리만 사용합니다.
pub fn token_cache_path(cache_dir: &Path, env_label: &str, app_key: &str) -> PathBuf {
    let digest = Sha256::digest(app_key.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    cache_dir.join(format!("token_{}_{}.json", env_label, &hex[..16]))
}

/// 파일 캐시에서 토큰 로드.
///
/// 만료된(안전 여유 포함) 파일은 삭제하고 `None`을 반환합니다.
fn load_cached_token(path: &Path, now_epoch: i64) -> Option<CachedToken> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<CachedToken>(&raw) {
        Ok(cached) if cached.is_valid(now_epoch) => Some(cached),
        Ok(_) => {
            debug!(path = %path.display(), "만료된 토큰 파일 삭제");
            let _ = std::fs::remove_file(path);
            None
        }
        Err(e) => {
            warn!(path = %path.display(), "토큰 파일 손상, 삭제: {}", e);
            let _ = std::fs::remove_file(path);
            None
        }
    }
}

/// 토큰을 파일 캐시에 저장.
fn persist_cached_token(path: &Path, token: &CachedToken) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(token)?)
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KisEnvironment;

    fn test_config(dir: &Path) -> KisConfig {
        KisConfig::new("test-app-key", "test-app-secret", KisEnvironment::Paper)
            .with_cache_dir(dir)
    }

    fn seed_token_file(dir: &Path, expires_in: i64) -> PathBuf {
        let path = token_cache_path(dir, "vts", "test-app-key");
        let now = Utc::now().timestamp();
        let token = CachedToken {
            token: "seeded-token".to_string(),
            issued_at: now,
            expires_at: now + expires_in,
        };
        persist_cached_token(&path, &token).unwrap();
        path
    }

    #[test]
    fn test_cache_path_hides_app_key() {
        let path = token_cache_path(Path::new("/tmp"), "prod", "my-secret-app-key");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("token_prod_"));
        assert!(name.ends_with(".json"));
        assert!(!name.contains("my-secret-app-key"));
    }

    #[test]
    fn test_cache_path_differs_per_env_and_key() {
        let dir = Path::new("/tmp");
        let a = token_cache_path(dir, "prod", "key-a");
        let b = token_cache_path(dir, "vts", "key-a");
        let c = token_cache_path(dir, "prod", "key-b");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_safety_margin() {
        let now = 1_000_000;
        let fresh = CachedToken {
            token: "t".into(),
            issued_at: now,
            expires_at: now + 3600,
        };
        assert!(fresh.is_valid(now));

        // 만료까지 5분 미만이면 무효 취급
        let near_expiry = CachedToken {
            token: "t".into(),
            issued_at: now,
            expires_at: now + 200,
        };
        assert!(!near_expiry.is_valid(now));
    }

    #[test]
    fn test_expired_file_is_deleted_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed_token_file(dir.path(), 60); // 5분 여유 미달
        let now = Utc::now().timestamp();

        assert!(load_cached_token(&path, now).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_is_deleted_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_vts_bad.json");
        std::fs::write(&path, "not-json").unwrap();

        assert!(load_cached_token(&path, Utc::now().timestamp()).is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_token_reused_across_session_instances() {
        // 프로세스 재시작 시나리오: 파일 캐시가 있으면 발급 없이 재사용
        let dir = tempfile::tempdir().unwrap();
        seed_token_file(dir.path(), 86_400);

        let first = KisSession::new(test_config(dir.path())).unwrap();
        assert_eq!(first.access_token().await.unwrap(), "seeded-token");

        // 새 인스턴스 (재시작 후) — 네트워크 없이 파일에서 로드되어야 함
        let second = KisSession::new(test_config(dir.path())).unwrap();
        assert_eq!(second.access_token().await.unwrap(), "seeded-token");
    }

    #[tokio::test]
    async fn test_warm_cache_concurrent_access_skips_mint() {
        // 웜 캐시 경로: 유효한 파일 캐시가 있으면 동시 호출 전부가 발급
        // 시도 없이 같은 토큰을 받는다. (발급이 시도되면 네트워크가 없으므로
        // 에러가 났을 것) 콜드 캐시 경합은 아래 목 서버 테스트가 증명한다.
        let dir = tempfile::tempdir().unwrap();
        seed_token_file(dir.path(), 86_400);

        let session = KisSession::new(test_config(dir.path())).unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move { session.access_token().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "seeded-token");
        }
    }

    /// `/oauth2/tokenP` POST 횟수를 세는 로컬 목 브로커.
    ///
    /// 수신 주소와 발급 카운터를 반환합니다.
    async fn spawn_mock_broker() -> (std::net::SocketAddr, Arc<std::sync::atomic::AtomicUsize>) {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mint_count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&mint_count);
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]);
                    if request.starts_with("POST /oauth2/tokenP") {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }

                    let body = r#"{"access_token":"minted-token","token_type":"Bearer","expires_in":86400}"#;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (addr, mint_count)
    }

    #[tokio::test]
    async fn test_cold_cache_concurrent_mint_happens_once() {
        // 콜드 캐시 경합: 캐시 파일이 없는 상태에서 동시 8건을 시작해도
        // 브로커 발급은 정확히 1회여야 한다. 첫 호출자가 critical section
        // 안에서 발급하고 나머지는 그 결과를 재사용한다.
        use std::sync::atomic::Ordering;

        let (addr, mint_count) = spawn_mock_broker().await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).with_base_url(format!("http://{}", addr));
        let session = KisSession::new(config).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move { session.access_token().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "minted-token");
        }

        assert_eq!(mint_count.load(Ordering::SeqCst), 1);

        // 발급 결과는 파일 캐시에도 남아 재시작 시 재사용된다
        let cache_file = token_cache_path(dir.path(), "vts", "test-app-key");
        assert!(cache_file.exists());

        // 같은 캐시 디렉토리로 만든 새 세션(재시작)도 추가 발급이 없다
        let config = test_config(dir.path()).with_base_url(format!("http://{}", addr));
        let restarted = KisSession::new(config).unwrap();
        assert_eq!(restarted.access_token().await.unwrap(), "minted-token");
        assert_eq!(mint_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_purge_removes_both_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed_token_file(dir.path(), 86_400);

        let session = KisSession::new(test_config(dir.path())).unwrap();
        session.access_token().await.unwrap();

        session.purge().await;
        assert!(!path.exists());
    }
}
