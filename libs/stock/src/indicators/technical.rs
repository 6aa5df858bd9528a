use serde::Serialize;
use ta::Next;
use ta::indicators::{Maximum, Minimum, SimpleMovingAverage};

use crate::series::HistoricalSeries;

pub const RSI_PERIOD: usize = 14;
pub const VOLUME_WINDOW: usize = 10;
pub const MOMENTUM_BARS: usize = 5;
pub const VOLATILITY_RETURNS: usize = 10;
pub const RANGE_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiSignal {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSignal {
    High,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MovingAverage {
    pub value: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rsi {
    pub value: f64,
    pub signal: RsiSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeRatio {
    pub ratio: f64,
    pub signal: VolumeSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceRange {
    pub support: f64,
    pub resistance: f64,
}

/// Indicators derived from a daily series. A field is `None` when the series
/// is too short for it; absence means unknown, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub ma5: Option<MovingAverage>,
    pub ma10: Option<MovingAverage>,
    pub ma20: Option<MovingAverage>,
    pub rsi: Option<Rsi>,
    pub volume: Option<VolumeRatio>,
    pub momentum_5d: Option<f64>,
    pub volatility: Option<f64>,
    pub range: Option<PriceRange>,
}

impl IndicatorSet {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub fn compute(series: &HistoricalSeries) -> IndicatorSet {
    let closes = series.closes();
    let volumes: Vec<f64> = series.bars().iter().map(|b| b.volume as f64).collect();
    let highs: Vec<f64> = series.bars().iter().map(|b| b.high).collect();
    let lows: Vec<f64> = series.bars().iter().map(|b| b.low).collect();

    IndicatorSet {
        ma5: moving_average(&closes, 5),
        ma10: moving_average(&closes, 10),
        ma20: moving_average(&closes, 20),
        rsi: rsi(&closes),
        volume: volume_ratio(&volumes),
        momentum_5d: momentum(&closes),
        volatility: volatility(&closes),
        range: price_range(&highs, &lows),
    }
}

/// Simple mean of the last `period` values, `None` on short input.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let mut sma = SimpleMovingAverage::new(period).ok()?;
    values.iter().fold(None, |_, &v| Some(sma.next(v)))
}

/// Rolling simple mean aligned with `values`; positions before the window
/// fills are NaN.
pub fn rolling_sma(values: &[f64], period: usize) -> Vec<f64> {
    let Ok(mut sma) = SimpleMovingAverage::new(period) else {
        return vec![f64::NAN; values.len()];
    };
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let avg = sma.next(v);
            if i + 1 >= period { avg } else { f64::NAN }
        })
        .collect()
}

fn moving_average(closes: &[f64], period: usize) -> Option<MovingAverage> {
    let value = sma(closes, period)?;
    let last = *closes.last()?;
    let trend = if last > value {
        Trend::Bullish
    } else {
        Trend::Bearish
    };
    Some(MovingAverage { value, trend })
}

fn rsi(closes: &[f64]) -> Option<Rsi> {
    if closes.len() < RSI_PERIOD + 1 {
        return None;
    }

    let window = &closes[closes.len() - (RSI_PERIOD + 1)..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), d: f64| (g + d.max(0.0), l + (-d).max(0.0)));
    let avg_gain = gains / RSI_PERIOD as f64;
    let avg_loss = losses / RSI_PERIOD as f64;

    let value = if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };

    let signal = if value > 70.0 {
        RsiSignal::Overbought
    } else if value < 30.0 {
        RsiSignal::Oversold
    } else {
        RsiSignal::Neutral
    };

    Some(Rsi { value, signal })
}

fn volume_ratio(volumes: &[f64]) -> Option<VolumeRatio> {
    let avg = sma(volumes, VOLUME_WINDOW)?;
    if avg <= 0.0 {
        return None;
    }
    let ratio = volumes.last()? / avg;
    let signal = if ratio > 1.5 {
        VolumeSignal::High
    } else {
        VolumeSignal::Normal
    };
    Some(VolumeRatio { ratio, signal })
}

/// Change from the close `MOMENTUM_BARS - 1` bars back to the latest close.
fn momentum(closes: &[f64]) -> Option<f64> {
    if closes.len() < MOMENTUM_BARS {
        return None;
    }
    let base = closes[closes.len() - MOMENTUM_BARS];
    let last = *closes.last()?;
    if base == 0.0 {
        return None;
    }
    Some((last - base) / base * 100.0)
}

/// Sample standard deviation of the last ten daily returns, in percent.
fn volatility(closes: &[f64]) -> Option<f64> {
    if closes.len() < VOLATILITY_RETURNS + 1 {
        return None;
    }

    let window = &closes[closes.len() - (VOLATILITY_RETURNS + 1)..];
    let returns: Vec<f64> = window
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.iter().any(|r| !r.is_finite()) {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt() * 100.0)
}

fn price_range(highs: &[f64], lows: &[f64]) -> Option<PriceRange> {
    if highs.len() < RANGE_WINDOW || lows.len() < RANGE_WINDOW {
        return None;
    }

    let mut max = Maximum::new(RANGE_WINDOW).ok()?;
    let mut min = Minimum::new(RANGE_WINDOW).ok()?;
    let resistance = highs.iter().fold(f64::NAN, |_, &h| max.next(h));
    let support = lows.iter().fold(f64::NAN, |_, &l| min.next(l));

    Some(PriceRange {
        support,
        resistance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::fixtures::bars_from_closes;

    fn series(closes: &[f64]) -> HistoricalSeries {
        HistoricalSeries::new("TEST", bars_from_closes(closes))
    }

    fn ramp(n: usize) -> Vec<f64> {
        (1..=n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn twelve_bars_omit_long_indicators() {
        let set = compute(&series(&ramp(12)));

        assert!(set.ma5.is_some());
        assert!(set.ma10.is_some());
        assert!(set.ma20.is_none());
        assert!(set.rsi.is_none());
        assert!(set.range.is_none());
        assert!(set.volume.is_some());
        assert!(set.momentum_5d.is_some());
        assert!(set.volatility.is_some());
    }

    #[test]
    fn tiny_series_has_nothing() {
        assert!(compute(&series(&[1.0, 2.0])).is_empty());
    }

    #[test]
    fn moving_averages_and_trend() {
        let set = compute(&series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let ma5 = set.ma5.unwrap();
        assert!((ma5.value - 4.0).abs() < 1e-10);
        assert_eq!(ma5.trend, Trend::Bullish);

        let set = compute(&series(&[6.0, 5.0, 4.0, 3.0, 2.0]));
        assert_eq!(set.ma5.unwrap().trend, Trend::Bearish);
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let set = compute(&series(&ramp(15)));
        let rsi = set.rsi.unwrap();
        assert_eq!(rsi.value, 100.0);
        assert_eq!(rsi.signal, RsiSignal::Overbought);
    }

    #[test]
    fn rsi_flat_is_neutral() {
        let rsi = compute(&series(&[50.0; 15])).rsi.unwrap();
        assert_eq!(rsi.value, 50.0);
        assert_eq!(rsi.signal, RsiSignal::Neutral);
    }

    #[test]
    fn rsi_uses_simple_averages() {
        // 14 deltas alternating +2 / -1: avg gain 1.0, avg loss 0.5
        let mut closes = vec![100.0];
        for i in 0..14 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last + 2.0 } else { last - 1.0 });
        }
        let rsi = compute(&series(&closes)).rsi.unwrap();
        assert!((rsi.value - (100.0 - 100.0 / 3.0)).abs() < 1e-9);
        assert_eq!(rsi.signal, RsiSignal::Neutral);
    }

    #[test]
    fn rsi_all_losses_is_oversold() {
        let closes: Vec<f64> = (0..15).map(|i| 200.0 - i as f64).collect();
        let rsi = compute(&series(&closes)).rsi.unwrap();
        assert_eq!(rsi.value, 0.0);
        assert_eq!(rsi.signal, RsiSignal::Oversold);
    }

    #[test]
    fn volume_spike_is_high() {
        let mut bars = bars_from_closes(&ramp(10));
        bars.last_mut().unwrap().volume = 10_000;
        let set = compute(&HistoricalSeries::new("V", bars));
        let volume = set.volume.unwrap();
        // mean of nine 1000s and one 10000 = 1900
        assert!((volume.ratio - 10_000.0 / 1_900.0).abs() < 1e-9);
        assert_eq!(volume.signal, VolumeSignal::High);
    }

    #[test]
    fn momentum_over_five_bars() {
        let m = compute(&series(&[100.0, 100.0, 101.0, 102.0, 103.0, 110.0]))
            .momentum_5d
            .unwrap();
        assert!((m - 10.0).abs() < 1e-9);
    }

    #[test]
    fn volatility_needs_eleven_bars() {
        assert!(compute(&series(&ramp(10))).volatility.is_none());

        let flat = compute(&series(&[10.0; 11])).volatility.unwrap();
        assert_eq!(flat, 0.0);
    }

    #[test]
    fn support_and_resistance_over_twenty_bars() {
        let closes: Vec<f64> = (0..25).map(|i| 50.0 + (i % 7) as f64).collect();
        let range = compute(&series(&closes)).range.unwrap();
        let tail = &closes[5..];
        let max = tail.iter().cloned().fold(f64::MIN, f64::max) + 1.0;
        let min = tail.iter().cloned().fold(f64::MAX, f64::min) - 1.0;
        assert_eq!(range.resistance, max);
        assert_eq!(range.support, min);
    }

    #[test]
    fn rolling_sma_pads_with_nan() {
        let r = rolling_sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(r[0].is_nan() && r[1].is_nan());
        assert_eq!(&r[2..], &[2.0, 3.0]);
    }
}
