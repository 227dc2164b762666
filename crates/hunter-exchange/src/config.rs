//! KIS 클라이언트 설정.

use std::path::PathBuf;

/// 환경 구분 (실전투자 / 모의투자).
///
/// 토큰과 시세 base URL이 환경별로 다릅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KisEnvironment {
    /// 실전투자
    Production,
    /// 모의투자
    Paper,
}

impl KisEnvironment {
    /// API base URL.
    pub fn base_url(&self) -> &'static str {
        match self {
            KisEnvironment::Production => "https://openapi.koreainvestment.com:9443",
            KisEnvironment::Paper => "https://openapivts.koreainvestment.com:29443",
        }
    }

    /// 토큰 캐시 파일명에 들어가는 환경 라벨.
    pub fn label(&self) -> &'static str {
        match self {
            KisEnvironment::Production => "prod",
            KisEnvironment::Paper => "vts",
        }
    }

    pub fn from_is_production(is_production: bool) -> Self {
        if is_production {
            KisEnvironment::Production
        } else {
            KisEnvironment::Paper
        }
    }
}

/// KIS 인증 설정.
#[derive(Clone)]
pub struct KisConfig {
    pub app_key: String,
    pub app_secret: String,
    pub environment: KisEnvironment,
    /// API base URL (기본: 환경별 KIS 엔드포인트)
    pub base_url: String,
    /// 토큰 캐시 디렉토리 (기본: `~/.stockhunter`)
    pub cache_dir: PathBuf,
}

impl std::fmt::Debug for KisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KisConfig")
            .field("app_key", &"***")
            .field("app_secret", &"***")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl KisConfig {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        environment: KisEnvironment,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            environment,
            base_url: environment.base_url().to_string(),
            cache_dir: default_cache_dir(),
        }
    }

    /// base URL 교체 (테스트 목 서버용).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// 토큰 캐시 디렉토리 변경 (테스트 및 배포 환경용).
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

/// 기본 캐시 디렉토리 (`~/.stockhunter`).
///
/// 홈 디렉토리를 확인할 수 없으면 현재 디렉토리 기준으로 둡니다.
pub fn default_cache_dir() -> PathBuf {
    std::env::var_os("STOCKHUNTER_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".stockhunter")))
        .unwrap_or_else(|| PathBuf::from(".stockhunter"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_base_url() {
        assert!(KisEnvironment::Production.base_url().contains("openapi.korea"));
        assert!(KisEnvironment::Paper.base_url().contains("openapivts"));
    }

    #[test]
    fn test_debug_masks_credentials() {
        let config = KisConfig::new("real-app-key", "real-app-secret", KisEnvironment::Paper);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("real-app-key"));
        assert!(!debug.contains("real-app-secret"));
    }

    #[test]
    fn test_base_url_defaults_to_environment() {
        let config = KisConfig::new("k", "s", KisEnvironment::Paper);
        assert_eq!(config.base_url, KisEnvironment::Paper.base_url());

        let overridden = config.with_base_url("http://127.0.0.1:9000");
        assert_eq!(overridden.base_url, "http://127.0.0.1:9000");
    }
}
