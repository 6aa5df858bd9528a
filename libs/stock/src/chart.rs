use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::{Error, ensure};
use charming::{
    Chart, ImageFormat, ImageRenderer,
    component::{Axis, Grid, Legend, Title},
    element::{AxisLabel, AxisType, ItemStyle, LineStyle, SplitLine, Symbol, TextStyle},
    series::{Bar as VolumeBars, Candlestick, Line},
};
use tracing::{debug, info};

use crate::{
    error::{Result, StockError},
    indicators::rolling_sma,
    pool::WorkerPool,
    series::HistoricalSeries,
};

pub const CHART_BARS: usize = 30;

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 800;
const UP: &str = "#00ff88";
const DOWN: &str = "#ff4444";
const GRID_LINE: &str = "#3a3c4a";
const LABEL: &str = "#a0a0a0";

/// Renders a candlestick chart of the last [`CHART_BARS`] bars with MA10/MA20
/// overlays and a volume panel, as PNG bytes.
pub fn render_candlestick(series: &HistoricalSeries) -> Result<Vec<u8>, Error> {
    ensure!(!series.is_empty(), "series is empty");

    let window = series.tail(CHART_BARS);
    let bars = window.bars();
    let closes = window.closes();

    let dates: Vec<String> = bars.iter().map(|b| b.date().format("%m/%d").to_string()).collect();
    // echarts candlestick order: open, close, low, high
    let candles: Vec<Vec<f64>> = bars
        .iter()
        .map(|b| vec![b.open, b.close, b.low, b.high])
        .collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
    let last_price = closes.last().copied().unwrap_or_default();

    let mut chart = Chart::new()
        .background_color("#2f3136")
        .title(
            Title::new()
                .text(format!(
                    "{} - {} Day Candlestick | ${:.2}",
                    window.symbol(),
                    bars.len(),
                    last_price
                ))
                .left("center")
                .top("1%")
                .text_style(TextStyle::new().color("#ffffff").font_size(16)),
        )
        .legend(Legend::new().top("5%"))
        .grid(Grid::new().left("8%").right("4%").top("12%").height("55%"))
        .grid(Grid::new().left("8%").right("4%").top("74%").height("16%"))
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .data(dates.clone())
                .axis_label(AxisLabel::new().color(LABEL).rotate(45).interval(4)),
        )
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .grid_index(1)
                .data(dates)
                .axis_label(AxisLabel::new().show(false)),
        )
        .y_axis(
            Axis::new()
                .type_(AxisType::Value)
                .scale(true)
                .axis_label(AxisLabel::new().color(LABEL))
                .split_line(SplitLine::new().line_style(LineStyle::new().color(GRID_LINE))),
        )
        .y_axis(
            Axis::new()
                .type_(AxisType::Value)
                .grid_index(1)
                .scale(true)
                .axis_label(AxisLabel::new().color(LABEL))
                .split_line(SplitLine::new().line_style(LineStyle::new().color(GRID_LINE))),
        )
        .series(
            Candlestick::new().name("Price").data(candles).item_style(
                ItemStyle::new()
                    .color(UP)
                    .color0(DOWN)
                    .border_color(UP)
                    .border_color0(DOWN),
            ),
        );

    for (period, color) in [(10, "#00bfff"), (20, "#ffa500")] {
        if closes.len() >= period {
            chart = chart.series(
                Line::new()
                    .name(format!("MA{period}"))
                    .data(rolling_sma(&closes, period))
                    .symbol(Symbol::None)
                    .line_style(LineStyle::new().width(2).color(color)),
            );
        }
    }

    chart = chart
        .series(
            Line::new()
                .name(format!("Current: ${last_price:.2}"))
                .data(vec![last_price; closes.len()])
                .symbol(Symbol::None)
                .line_style(LineStyle::new().width(1).color("#ffffff")),
        )
        .series(
            VolumeBars::new()
                .name("Volume")
                .x_axis_index(1)
                .y_axis_index(1)
                .data(volumes)
                .item_style(ItemStyle::new().color("#5c7bd9")),
        );

    let mut renderer = ImageRenderer::new(WIDTH, HEIGHT);
    let png_bytes = renderer.render_format(ImageFormat::Png, &chart)?;
    Ok(png_bytes)
}

/// Renders charts on the worker pool and writes them under `dir`.
pub struct ChartRenderer {
    dir: PathBuf,
    pool: WorkerPool,
}

impl ChartRenderer {
    pub fn new(dir: impl Into<PathBuf>, pool: WorkerPool) -> Self {
        Self {
            dir: dir.into(),
            pool,
        }
    }

    pub fn chart_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}_chart.png", symbol.to_uppercase()))
    }

    /// Returns the path of the written PNG.
    pub async fn render_to_file(&self, series: Arc<HistoricalSeries>) -> Result<PathBuf> {
        let path = self.chart_path(series.symbol());
        let dir = self.dir.clone();
        let target = path.clone();

        debug!(symbol = series.symbol(), bars = series.len(), "rendering chart");
        let written = self
            .pool
            .run(move || -> Result<usize> {
                let png = render_candlestick(&series).map_err(|e| StockError::Worker(e.to_string()))?;
                std::fs::create_dir_all(&dir).map_err(|source| StockError::PersistenceWriteFailure {
                    path: dir.clone(),
                    source,
                })?;
                write_atomic(&target, &png)?;
                Ok(png.len())
            })
            .await??;

        info!(path = %path.display(), bytes = written, "chart written");
        Ok(path)
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Writes `bytes` to a private sibling of `path` and renames it into place, so
/// readers and concurrent writers of the same chart never see a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()));

    let res = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(source) = res {
        let _ = std::fs::remove_file(&tmp);
        return Err(StockError::PersistenceWriteFailure {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::fixtures::bars_from_closes;

    #[test]
    fn empty_series_is_rejected() {
        let series = HistoricalSeries::new("X", Vec::new());
        assert!(render_candlestick(&series).is_err());
    }

    #[test]
    fn chart_path_is_per_symbol() {
        let renderer = ChartRenderer::new("charts", WorkerPool::new(1));
        assert_eq!(
            renderer.chart_path("aapl"),
            PathBuf::from("charts").join("AAPL_chart.png")
        );
    }

    #[test]
    fn window_is_trimmed_to_thirty_bars() {
        let closes: Vec<f64> = (0..45).map(|i| 100.0 + i as f64).collect();
        let series = HistoricalSeries::new("X", bars_from_closes(&closes));
        assert_eq!(series.tail(CHART_BARS).len(), 30);
        assert_eq!(series.tail(CHART_BARS).closes()[0], 115.0);
    }

    #[test]
    fn concurrent_writes_leave_one_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AAPL_chart.png");

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || write_atomic(&path, &vec![i; 64 * 1024]).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len(), 64 * 1024);
        assert!(written.iter().all(|b| *b == written[0]));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_into_missing_dir_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("X_chart.png");

        let err = write_atomic(&path, b"png").unwrap_err();
        assert!(matches!(err, StockError::PersistenceWriteFailure { .. }));
    }
}
