//! 스크리닝 엔진.
//!
//! 유니버스를 100종목 청크로 나눠 청크 단위로 병렬 평가합니다. 청크
//! 내부는 순차 실행이라 종목당 메모리가 일정하고, 재무 조회 폴백도
//! 종목 단위로 단순합니다. 종목 하나의 평가 실패는 로그 후 건너뛰며
//! 전체 스크리닝을 중단시키지 않습니다.
//!
//! 결과 순서는 청크 완료 순서이며 입력 순서를 보장하지 않습니다.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use hunter_core::domain::{
    round_price, round_to, BandGate, MatchedStock, ScreeningCondition, ScreeningResult, StockInfo,
};
use hunter_core::error::Result;
use hunter_core::indicators::{
    avg_volume, band_position, bollinger, ma_aligned, sma, BandPosition,
};
use hunter_core::MarketAdapter;

use crate::filters::{is_etn_name, is_management_name};

/// 종목당 조회하는 일봉 수. 최장 주기(224일) 이동평균 + 여유분.
const BARS_PER_INSTRUMENT: usize = 280;

/// 청크 크기. 청크 단위 병렬, 청크 내부 순차.
const CHUNK_SIZE: usize = 100;

/// 거래량 배수 계산 기간.
const VOLUME_AVG_PERIOD: usize = 20;

/// 스크리닝 엔진.
pub struct ScreeningEngine {
    adapter: Arc<dyn MarketAdapter>,
}

impl ScreeningEngine {
    pub fn new(adapter: Arc<dyn MarketAdapter>) -> Self {
        Self { adapter }
    }

    /// 조건 집합으로 유니버스 전체 평가.
    pub async fn run(&self, condition: &ScreeningCondition) -> Result<ScreeningResult> {
        let started = Instant::now();
        let mut universe = self.adapter.universe().await?;

        // 대상 종목 제한
        if !condition.target_codes.is_empty() {
            let targets: HashSet<&str> =
                condition.target_codes.iter().map(String::as_str).collect();
            universe.retain(|s| targets.contains(s.code.as_str()));
        }

        let total_scanned = universe.len();
        debug!(
            universe = total_scanned,
            label = self.adapter.label(),
            "스크리닝 시작"
        );

        let mut tasks: JoinSet<Vec<MatchedStock>> = JoinSet::new();
        for chunk in universe.chunks(CHUNK_SIZE) {
            let chunk: Vec<StockInfo> = chunk.to_vec();
            let adapter = Arc::clone(&self.adapter);
            let condition = condition.clone();

            tasks.spawn(async move {
                let mut matches = Vec::new();
                for stock in &chunk {
                    match evaluate_one(adapter.as_ref(), &condition, stock).await {
                        Ok(Some(matched)) => matches.push(matched),
                        Ok(None) => {}
                        Err(e) => {
                            // 종목 하나의 실패는 전체를 중단시키지 않음
                            warn!(code = %stock.code, error = %e, "종목 평가 실패, 건너뜀");
                        }
                    }
                }
                matches
            });
        }

        // 청크 완료 순서대로 수집
        let mut matches = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(chunk_matches) => matches.extend(chunk_matches),
                Err(e) => warn!(error = %e, "청크 태스크 실패"),
            }
        }

        let matched_count = matches.len();
        Ok(ScreeningResult {
            matches,
            total_scanned,
            matched_count,
            execution_ms: started.elapsed().as_millis() as u64,
            captured_at: Utc::now(),
            universe_label: self.adapter.label().to_string(),
        })
    }
}

/// 종목 하나 평가.
///
/// 조건에 부합하면 지표 값이 채워진 `MatchedStock`, 아니면 `None`.
async fn evaluate_one(
    adapter: &dyn MarketAdapter,
    condition: &ScreeningCondition,
    stock: &StockInfo,
) -> Result<Option<MatchedStock>> {
    let bars = adapter.daily_bars(&stock.code, BARS_PER_INSTRUMENT).await?;
    if bars.is_empty() {
        return Ok(None);
    }

    let name = if stock.name.is_empty() {
        stock.code.clone()
    } else {
        stock.name.clone()
    };

    // 제외 사전 필터 (종목명/심볼 기반)
    if condition.exclude_etf && (stock.is_etf || adapter.is_etf_like(&stock.code, &name)) {
        return Ok(None);
    }
    if condition.exclude_etn && (stock.is_etn || is_etn_name(&name)) {
        return Ok(None);
    }
    if condition.exclude_management && is_management_name(&name) {
        return Ok(None);
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let current_price = closes[0];
    let prev_price = closes.get(1).copied().unwrap_or(current_price);
    let current_volume = volumes[0];

    let ma5 = sma(5, &closes);
    let ma20 = sma(20, &closes);
    let ma60 = sma(60, &closes);
    let ma112 = sma(112, &closes);
    let ma224 = sma(224, &closes);

    // 이동평균 비율 게이트 (양끝 포함). 게이트가 참조하는 지표가 없으면 제외.
    let ma_gates = [
        (condition.ma60_enabled, ma60, condition.ma60_min, condition.ma60_max),
        (condition.ma112_enabled, ma112, condition.ma112_min, condition.ma112_max),
        (condition.ma224_enabled, ma224, condition.ma224_min, condition.ma224_max),
    ];
    for (enabled, ma, min, max) in ma_gates {
        if !enabled {
            continue;
        }
        match ma {
            Some(value) if value > 0.0 => {
                let ratio = 100.0 * current_price / value;
                if ratio < min as f64 || ratio > max as f64 {
                    return Ok(None);
                }
            }
            _ => return Ok(None),
        }
    }

    // 이평선 정배열
    if condition.ma_alignment && !ma_aligned(ma5, ma20, ma60, ma112) {
        return Ok(None);
    }

    // 볼린저 밴드
    let mut bb_values = None;
    if condition.bb_enabled {
        let bands = match bollinger(condition.bb_period, condition.bb_multiplier, &closes) {
            Some(bands) => bands,
            None => return Ok(None),
        };
        let position = band_position(current_price, &bands);

        let position_ok = match condition.bb_position {
            BandGate::All => true,
            BandGate::Upper => position == BandPosition::Upper,
            BandGate::Middle => position == BandPosition::Middle,
            BandGate::Lower => position == BandPosition::Lower,
        };
        if !position_ok {
            return Ok(None);
        }
        if condition.bb_upper_break && current_price < bands.upper {
            return Ok(None);
        }
        if condition.bb_lower_break && current_price > bands.lower {
            return Ok(None);
        }

        bb_values = Some((bands, position));
    }

    // 거래량 게이트 (20일 평균 대비 배수)
    let volume_ratio = avg_volume(VOLUME_AVG_PERIOD, &volumes)
        .filter(|avg| *avg > 0.0)
        .map(|avg| current_volume as f64 / avg);
    if condition.volume_enabled {
        match volume_ratio {
            Some(ratio) if ratio >= condition.volume_multiple => {}
            _ => return Ok(None),
        }
    }

    // 전일 대비 등락률
    let change_pct = if prev_price > 0.0 {
        100.0 * (current_price - prev_price) / prev_price
    } else {
        0.0
    };
    if condition.price_change_enabled
        && (change_pct < condition.price_change_min || change_pct > condition.price_change_max)
    {
        return Ok(None);
    }

    // 재무 게이트 — 켜진 경우에만 종목당 1회 현재가 조회
    let mut quote = None;
    if condition.needs_fundamentals() {
        match adapter.current_quote(&stock.code).await {
            Ok(snapshot) => {
                if condition.market_cap_enabled {
                    match snapshot.market_cap {
                        Some(v)
                            if v >= condition.market_cap_min && v <= condition.market_cap_max => {}
                        _ => return Ok(None),
                    }
                }
                if condition.per_enabled {
                    match snapshot.per {
                        Some(v) if v >= condition.per_min && v <= condition.per_max => {}
                        _ => return Ok(None),
                    }
                }
                if condition.pbr_enabled {
                    match snapshot.pbr {
                        Some(v) if v >= condition.pbr_min && v <= condition.pbr_max => {}
                        _ => return Ok(None),
                    }
                }
                quote = Some(snapshot);
            }
            Err(e) => {
                // 게이트 대상 필드를 확인할 수 없으므로 보수적으로 제외
                warn!(code = %stock.code, error = %e, "재무 조회 실패, 제외");
                return Ok(None);
            }
        }
    }

    let market = stock.market;
    let ratio_of = |ma: Option<f64>| {
        ma.filter(|v| *v > 0.0)
            .map(|v| round_to(100.0 * current_price / v, 2))
    };

    Ok(Some(MatchedStock {
        code: stock.code.clone(),
        name,
        market,
        current_price: round_price(current_price, market),
        change_pct: round_to(change_pct, 2),
        volume: current_volume,
        volume_ratio: volume_ratio.map(|r| round_to(r, 2)),
        ma5: ma5.map(|v| round_to(v, 2)),
        ma20: ma20.map(|v| round_to(v, 2)),
        ma60: ma60.map(|v| round_to(v, 2)),
        ma112: ma112.map(|v| round_to(v, 2)),
        ma224: ma224.map(|v| round_to(v, 2)),
        ma60_ratio: ratio_of(ma60),
        ma112_ratio: ratio_of(ma112),
        ma224_ratio: ratio_of(ma224),
        bb_upper: bb_values.map(|(b, _)| round_to(b.upper, 2)),
        bb_middle: bb_values.map(|(b, _)| round_to(b.middle, 2)),
        bb_lower: bb_values.map(|(b, _)| round_to(b.lower, 2)),
        bb_position: bb_values.map(|(_, p)| p.as_str().to_string()),
        market_cap: quote.as_ref().and_then(|q| q.market_cap),
        per: quote.as_ref().and_then(|q| q.per).map(|v| round_to(v, 2)),
        pbr: quote.as_ref().and_then(|q| q.pbr).map(|v| round_to(v, 2)),
        eps: quote.as_ref().and_then(|q| q.eps).map(|v| round_to(v, 2)),
        bps: quote.as_ref().and_then(|q| q.bps).map(|v| round_to(v, 2)),
    }))
}

// =============================================================================
// 테스트
// =============================================================================
