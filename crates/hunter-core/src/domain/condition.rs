//! 스크리닝 조건 타입.
//!
//! 클라이언트가 제출하는 선언적 조건 집합입니다. 필드 이름은 기존 게이트웨이
//! 규약(camelCase)을 그대로 따릅니다.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{HunterError, Result};

/// 볼린저 밴드 위치 게이트.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BandGate {
    /// 위치 무관 통과
    All,
    Upper,
    Middle,
    Lower,
}

impl Default for BandGate {
    fn default() -> Self {
        BandGate::All
    }
}

/// 스크리닝 조건.
///
/// 각 게이트는 `*_enabled` 플래그로 켜고 끕니다. 이동평균 비율 경계는
/// `100 · 현재가 / 이동평균` 퍼센트 값에 대한 양끝 포함 정수 범위입니다.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreeningCondition {
    // 인증 정보 (요청 단위)
    pub app_key: String,
    pub app_secret: String,
    /// 실전투자 여부 (false: 모의투자)
    pub is_production: bool,

    // 이동평균선 조건
    pub ma60_enabled: bool,
    pub ma60_min: i32,
    pub ma60_max: i32,

    pub ma112_enabled: bool,
    pub ma112_min: i32,
    pub ma112_max: i32,

    pub ma224_enabled: bool,
    pub ma224_min: i32,
    pub ma224_max: i32,

    // 볼린저 밴드
    pub bb_enabled: bool,
    pub bb_period: usize,
    pub bb_multiplier: f64,
    pub bb_position: BandGate,
    /// 현재가가 상단 밴드 이상이어야 통과
    pub bb_upper_break: bool,
    /// 현재가가 하단 밴드 이하여야 통과
    pub bb_lower_break: bool,

    // 거래량
    pub volume_enabled: bool,
    /// 20일 평균 거래량 대비 배수
    pub volume_multiple: f64,

    // 가격 변동 (전일 대비 %)
    pub price_change_enabled: bool,
    pub price_change_min: f64,
    pub price_change_max: f64,

    // 제외 조건
    #[serde(rename = "excludeETF")]
    pub exclude_etf: bool,
    #[serde(rename = "excludeETN")]
    pub exclude_etn: bool,
    pub exclude_management: bool,

    // 시가총액 (원 단위)
    pub market_cap_enabled: bool,
    pub market_cap_min: i64,
    pub market_cap_max: i64,

    // 재무 비율
    pub per_enabled: bool,
    pub per_min: f64,
    pub per_max: f64,

    pub pbr_enabled: bool,
    pub pbr_min: f64,
    pub pbr_max: f64,

    /// 이평선 정배열 (ma5 > ma20 > ma60 > ma112)
    pub ma_alignment: bool,

    /// 대상 종목 코드 (비어있으면 전체 유니버스)
    pub target_codes: Vec<String>,
}

impl Default for ScreeningCondition {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            app_secret: String::new(),
            is_production: false,

            ma60_enabled: false,
            ma60_min: 95,
            ma60_max: 105,

            ma112_enabled: true,
            ma112_min: 95,
            ma112_max: 105,

            ma224_enabled: false,
            ma224_min: 95,
            ma224_max: 105,

            bb_enabled: false,
            bb_period: 20,
            bb_multiplier: 2.0,
            bb_position: BandGate::All,
            bb_upper_break: false,
            bb_lower_break: false,

            volume_enabled: false,
            volume_multiple: 1.5,

            price_change_enabled: false,
            price_change_min: -100.0,
            price_change_max: 100.0,

            exclude_etf: true,
            exclude_etn: true,
            exclude_management: false,

            market_cap_enabled: false,
            market_cap_min: 0,
            market_cap_max: 1_000_000_000_000,

            per_enabled: false,
            per_min: 0.0,
            per_max: 30.0,

            pbr_enabled: false,
            pbr_min: 0.0,
            pbr_max: 10.0,

            ma_alignment: false,

            target_codes: Vec::new(),
        }
    }
}

impl ScreeningCondition {
    /// 요청 본문 유효성 검사.
    ///
    /// 허용 범위를 벗어난 값은 `InvalidInput`으로 거부합니다.
    pub fn validate(&self) -> Result<()> {
        if self.app_key.trim().is_empty() || self.app_secret.trim().is_empty() {
            return Err(HunterError::InvalidInput(
                "appKey / appSecret은 필수입니다".to_string(),
            ));
        }

        for (label, min, max) in [
            ("ma60", self.ma60_min, self.ma60_max),
            ("ma112", self.ma112_min, self.ma112_max),
            ("ma224", self.ma224_min, self.ma224_max),
        ] {
            if !(0..=200).contains(&min) || !(0..=200).contains(&max) || min > max {
                return Err(HunterError::InvalidInput(format!(
                    "{} 범위가 올바르지 않습니다: {} ~ {}",
                    label, min, max
                )));
            }
        }

        if self.bb_enabled {
            if ![10, 20, 30].contains(&self.bb_period) {
                return Err(HunterError::InvalidInput(format!(
                    "볼린저 기간은 10/20/30만 지원합니다: {}",
                    self.bb_period
                )));
            }
            if ![1.5, 2.0, 3.0].contains(&self.bb_multiplier) {
                return Err(HunterError::InvalidInput(format!(
                    "볼린저 승수는 1.5/2.0/3.0만 지원합니다: {}",
                    self.bb_multiplier
                )));
            }
        }

        if self.volume_enabled && self.volume_multiple < 1.0 {
            return Err(HunterError::InvalidInput(format!(
                "거래량 배수는 1 이상이어야 합니다: {}",
                self.volume_multiple
            )));
        }

        if self.price_change_enabled && self.price_change_min > self.price_change_max {
            return Err(HunterError::InvalidInput(
                "가격 변동 범위가 올바르지 않습니다".to_string(),
            ));
        }

        if self.market_cap_enabled
            && (self.market_cap_min < 0 || self.market_cap_min > self.market_cap_max)
        {
            return Err(HunterError::InvalidInput(
                "시가총액 범위가 올바르지 않습니다".to_string(),
            ));
        }

        Ok(())
    }

    /// 재무 게이트(시총/PER/PBR)가 하나라도 켜져 있는지.
    ///
    /// 켜져 있으면 엔진이 종목당 현재가 조회를 한 번 수행합니다.
    pub fn needs_fundamentals(&self) -> bool {
        self.market_cap_enabled || self.per_enabled || self.pbr_enabled
    }
}
