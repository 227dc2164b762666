//! 기술적 지표 커널.
//!
//! 순수 함수만 모아둔 모듈입니다. I/O와 부수효과가 없으며, 모든 함수는
//! **최신순**(가장 최근 봉이 index 0) 슬라이스와 기간을 받아 지표 값을
//! 반환합니다. 입력이 기간보다 짧으면 `None`입니다.
//!
//! 스크리닝 조건의 비율 비교는 `100 · 현재가 / 이동평균` 퍼센트 값을
//! 정수 경계와 양끝 포함으로 비교합니다.

/// 볼린저 밴드 계산 결과.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
    /// 모표준편차
    pub stddev: f64,
}

/// 밴드 대비 가격 위치.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandPosition {
    Upper,
    Middle,
    Lower,
}

impl BandPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            BandPosition::Upper => "upper",
            BandPosition::Middle => "middle",
            BandPosition::Lower => "lower",
        }
    }
}

/// MACD 계산 결과.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// 일목균형표 계산 결과.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IchimokuValue {
    /// 전환선 (9일)
    pub tenkan: f64,
    /// 기준선 (26일)
    pub kijun: f64,
    /// 선행스팬 A
    pub span_a: f64,
    /// 선행스팬 B (52일)
    pub span_b: f64,
    /// 후행스팬 (최근 종가)
    pub chikou: f64,
}

/// 단순 이동평균.
///
/// 최신 `period`개의 산술 평균. 입력이 짧으면 `None`.
pub fn sma(period: usize, prices: &[f64]) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    Some(prices[..period].iter().sum::<f64>() / period as f64)
}

/// 지수 이동평균.
///
/// 최신 `2·period`개(부족하면 전체)를 시간순으로 뒤집은 뒤, 앞쪽 `period`개의
/// 단순 평균으로 시드를 잡고 `k = 2/(period+1)`로 전진합니다.
pub fn ema(period: usize, prices: &[f64]) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[..prices.len().min(period * 2)];
    let k = 2.0 / (period as f64 + 1.0);

    // 시간순(과거 → 현재)으로 계산
    let chronological: Vec<f64> = window.iter().rev().copied().collect();
    let mut value = chronological[..period].iter().sum::<f64>() / period as f64;
    for &price in &chronological[period..] {
        value = price * k + value * (1.0 - k);
    }
    Some(value)
}

/// 볼린저 밴드.
///
/// 중심선은 SMA, 표준편차는 최신 `period`개의 모표준편차입니다.
pub fn bollinger(period: usize, multiplier: f64, prices: &[f64]) -> Option<BollingerBands> {
    let middle = sma(period, prices)?;
    let variance = prices[..period]
        .iter()
        .map(|p| (p - middle).powi(2))
        .sum::<f64>()
        / period as f64;
    let stddev = variance.sqrt();
    Some(BollingerBands {
        middle,
        upper: middle + multiplier * stddev,
        lower: middle - multiplier * stddev,
        stddev,
    })
}

/// 밴드 대비 가격 위치 판정.
///
/// 상단 이상이면 `Upper`, 하단 이하이면 `Lower`, 그 사이는 `Middle`.
pub fn band_position(price: f64, bands: &BollingerBands) -> BandPosition {
    if price >= bands.upper {
        BandPosition::Upper
    } else if price <= bands.lower {
        BandPosition::Lower
    } else {
        BandPosition::Middle
    }
}

/// RSI (Wilder).
///
/// 최신 `period + 1`개 종가의 시간순 변화분 `period`개에 대한 평균
/// 상승/하락폭으로 계산합니다. 평균 하락폭이 0이면 100을 반환합니다.
pub fn rsi(period: usize, prices: &[f64]) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    // 최신순 입력이므로 diff = prices[i] - prices[i+1]이 시간순 변화분
    for i in 0..period {
        let diff = prices[i] - prices[i + 1];
        if diff > 0.0 {
            gain_sum += diff;
        } else {
            loss_sum += -diff;
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// 시간순 EMA 시리즈.
///
/// `values`는 시간순(과거 → 현재)이며, 반환 시리즈의 첫 원소는
/// index `period - 1` 시점의 값입니다.
fn ema_series(period: usize, values: &[f64]) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut value = values[..period].iter().sum::<f64>() / period as f64;
    out.push(value);
    for &v in &values[period..] {
        value = v * k + value * (1.0 - k);
        out.push(value);
    }
    out
}

/// MACD (12, 26, 9).
///
/// 시그널은 MACD 시리즈의 9일 EMA입니다. 시그널까지 계산하려면 최소
/// 34개의 종가가 필요합니다.
pub fn macd(prices: &[f64]) -> Option<MacdValue> {
    const FAST: usize = 12;
    const SLOW: usize = 26;
    const SIGNAL: usize = 9;

    if prices.len() < SLOW + SIGNAL - 1 {
        return None;
    }

    let chronological: Vec<f64> = prices.iter().rev().copied().collect();
    let fast_ema = ema_series(FAST, &chronological);
    let slow_ema = ema_series(SLOW, &chronological);

    // slow 시리즈 시작점에 맞춰 정렬
    let offset = SLOW - FAST;
    let macd_series: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();

    let signal_series = ema_series(SIGNAL, &macd_series);
    let macd_line = *macd_series.last()?;
    let signal_line = *signal_series.last()?;

    Some(MacdValue {
        macd: macd_line,
        signal: signal_line,
        histogram: macd_line - signal_line,
    })
}

/// 평균 거래량.
pub fn avg_volume(period: usize, volumes: &[u64]) -> Option<f64> {
    if period == 0 || volumes.len() < period {
        return None;
    }
    Some(volumes[..period].iter().sum::<u64>() as f64 / period as f64)
}

/// 이평선 정배열 여부.
///
/// 네 값이 모두 존재하고 단기 → 장기 순으로 엄격히 감소해야 합니다.
pub fn ma_aligned(
    ma5: Option<f64>,
    ma20: Option<f64>,
    ma60: Option<f64>,
    ma112: Option<f64>,
) -> bool {
    match (ma5, ma20, ma60, ma112) {
        (Some(a), Some(b), Some(c), Some(d)) => a > b && b > c && c > d,
        _ => false,
    }
}

/// 일목균형표 (9, 26, 52).
///
/// 52개 이상의 봉이 필요합니다. `highs`/`lows`/`closes`는 최신순입니다.
pub fn ichimoku(highs: &[f64], lows: &[f64], closes: &[f64]) -> Option<IchimokuValue> {
    const TENKAN: usize = 9;
    const KIJUN: usize = 26;
    const SENKOU_B: usize = 52;

    if highs.len() < SENKOU_B || lows.len() < SENKOU_B || closes.is_empty() {
        return None;
    }

    let midpoint = |n: usize| -> f64 {
        let hi = highs[..n].iter().cloned().fold(f64::MIN, f64::max);
        let lo = lows[..n].iter().cloned().fold(f64::MAX, f64::min);
        (hi + lo) / 2.0
    };

    let tenkan = midpoint(TENKAN);
    let kijun = midpoint(KIJUN);
    Some(IchimokuValue {
        tenkan,
        kijun,
        span_a: (tenkan + kijun) / 2.0,
        span_b: midpoint(SENKOU_B),
        chikou: closes[0],
    })
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sma_basic() {
        // 최신순 종가 [110, 108, 106, 104, 102] → SMA5 = 106
        let prices = [110.0, 108.0, 106.0, 104.0, 102.0];
        assert!(approx(sma(5, &prices).unwrap(), 106.0));

        // 비율: 100 · 110 / 106 ≈ 103.77
        let ratio = 100.0 * prices[0] / sma(5, &prices).unwrap();
        assert!((ratio - 103.77).abs() < 0.01);
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = [110.0, 108.0, 106.0];
        assert_eq!(sma(5, &prices), None);
        assert_eq!(sma(112, &prices), None);
        assert_eq!(sma(0, &prices), None);
    }

    #[test]
    fn test_sma_ratio_scale_invariant() {
        // 가격과 이동평균을 같은 배율로 키워도 비율은 불변
        let prices = [110.0, 108.0, 106.0, 104.0, 102.0];
        let scaled: Vec<f64> = prices.iter().map(|p| p * 1000.0).collect();

        let r1 = 100.0 * prices[0] / sma(5, &prices).unwrap();
        let r2 = 100.0 * scaled[0] / sma(5, &scaled).unwrap();
        assert!(approx(r1, r2));
    }

    #[test]
    fn test_ema_constant_series() {
        let prices = [50.0; 20];
        assert!(approx(ema(5, &prices).unwrap(), 50.0));
    }

    #[test]
    fn test_ema_weights_recent_prices() {
        // 상승 추세에서 EMA(10)는 같은 창의 단순 평균보다 최근 가격 쪽으로 기운다
        let prices: Vec<f64> = (0..20).map(|i| 120.0 - i as f64).collect();
        let e = ema(10, &prices).unwrap();
        let window_mean = sma(20, &prices).unwrap();
        assert!(e > window_mean);
        assert!(e < prices[0]);
    }

    #[test]
    fn test_ema_insufficient_data() {
        assert_eq!(ema(10, &[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn test_bollinger_constant_series() {
        let prices = [100.0; 20];
        let bands = bollinger(20, 2.0, &prices).unwrap();
        assert!(approx(bands.middle, 100.0));
        assert!(approx(bands.upper, 100.0));
        assert!(approx(bands.lower, 100.0));
        assert!(approx(bands.stddev, 0.0));
    }

    #[test]
    fn test_bollinger_population_stddev() {
        // [2, 4, 4, 4, 5, 5, 7, 9]의 모표준편차는 정확히 2
        let prices = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger(8, 2.0, &prices).unwrap();
        assert!(approx(bands.stddev, 2.0));
        assert!(approx(bands.middle, 5.0));
        assert!(approx(bands.upper, 9.0));
        assert!(approx(bands.lower, 1.0));
    }

    #[test]
    fn test_band_position_lower() {
        // 현재가 95, 나머지 19개는 100 부근 → 하단 밴드 이탈
        let mut prices = vec![95.0];
        prices.extend(std::iter::repeat(100.0).take(19));
        let bands = bollinger(20, 2.0, &prices).unwrap();

        assert_eq!(band_position(95.0, &bands), BandPosition::Lower);
        assert_eq!(band_position(bands.middle, &bands), BandPosition::Middle);
        assert_eq!(band_position(bands.upper + 1.0, &bands), BandPosition::Upper);
    }

    #[test]
    fn test_band_position_boundaries_inclusive() {
        let bands = BollingerBands {
            middle: 100.0,
            upper: 110.0,
            lower: 90.0,
            stddev: 5.0,
        };
        assert_eq!(band_position(110.0, &bands), BandPosition::Upper);
        assert_eq!(band_position(90.0, &bands), BandPosition::Lower);
        assert_eq!(band_position(100.0, &bands), BandPosition::Middle);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        // 연속 상승 → 평균 하락폭 0 → RSI 100
        let prices: Vec<f64> = (0..15).map(|i| 115.0 - i as f64).collect();
        assert!(approx(rsi(14, &prices).unwrap(), 100.0));
    }

    #[test]
    fn test_rsi_balanced_is_50() {
        // 상승폭과 하락폭이 같으면 RSI 50
        let mut prices = vec![100.0];
        for i in 0..14 {
            let last = *prices.last().unwrap();
            prices.push(if i % 2 == 0 { last + 1.0 } else { last - 1.0 });
        }
        let value = rsi(14, &prices).unwrap();
        assert!((value - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = [1.0; 14];
        assert_eq!(rsi(14, &prices), None); // 15개 필요
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let prices = [100.0; 60];
        let value = macd(&prices).unwrap();
        assert!(approx(value.macd, 0.0));
        assert!(approx(value.signal, 0.0));
        assert!(approx(value.histogram, 0.0));
    }

    #[test]
    fn test_macd_uptrend_is_positive() {
        // 꾸준한 상승 추세에서 MACD > 0
        let prices: Vec<f64> = (0..60).map(|i| 160.0 - i as f64).collect();
        let value = macd(&prices).unwrap();
        assert!(value.macd > 0.0);
        assert!(value.signal > 0.0);
    }

    #[test]
    fn test_macd_insufficient_data() {
        assert_eq!(macd(&[100.0; 30]), None);
    }

    #[test]
    fn test_avg_volume() {
        let volumes = [3_000_000u64, 2_000_000, 1_000_000];
        assert!(approx(avg_volume(3, &volumes).unwrap(), 2_000_000.0));
        assert_eq!(avg_volume(5, &volumes), None);
    }

    #[test]
    fn test_ma_aligned() {
        assert!(ma_aligned(
            Some(110.0),
            Some(105.0),
            Some(100.0),
            Some(95.0)
        ));
        // 순서가 깨지면 false
        assert!(!ma_aligned(
            Some(110.0),
            Some(100.0),
            Some(105.0),
            Some(95.0)
        ));
        // 같은 값은 엄격 감소가 아님
        assert!(!ma_aligned(
            Some(100.0),
            Some(100.0),
            Some(95.0),
            Some(90.0)
        ));
        // 하나라도 없으면 false
        assert!(!ma_aligned(Some(110.0), Some(105.0), None, Some(95.0)));
    }

    #[test]
    fn test_ichimoku_requires_52_bars() {
        let highs = [100.0; 51];
        let lows = [90.0; 51];
        let closes = [95.0; 51];
        assert_eq!(ichimoku(&highs, &lows, &closes), None);
    }

    #[test]
    fn test_ichimoku_flat_series() {
        let highs = [110.0; 60];
        let lows = [90.0; 60];
        let closes = [100.0; 60];
        let value = ichimoku(&highs, &lows, &closes).unwrap();
        assert!(approx(value.tenkan, 100.0));
        assert!(approx(value.kijun, 100.0));
        assert!(approx(value.span_a, 100.0));
        assert!(approx(value.span_b, 100.0));
        assert!(approx(value.chikou, 100.0));
    }

    #[test]
    fn test_ichimoku_midpoints() {
        // 최근 9봉만 고가 120을 찍은 시리즈: 전환선과 기준선이 달라진다
        let mut highs = vec![120.0; 9];
        highs.extend(std::iter::repeat(110.0).take(51));
        let lows = vec![90.0; 60];
        let closes = vec![100.0; 60];

        let value = ichimoku(&highs, &lows, &closes).unwrap();
        assert!(approx(value.tenkan, 105.0)); // (120 + 90) / 2
        assert!(approx(value.kijun, 105.0)); // 26봉 안에도 120 포함
        assert!(approx(value.span_b, 105.0));
    }
}
