mod technical;

pub use technical::{
    IndicatorSet, MovingAverage, PriceRange, Rsi, RsiSignal, Trend, VolumeRatio, VolumeSignal,
    compute, rolling_sma, sma,
};
