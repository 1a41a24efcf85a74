use humansize::{format_size, DECIMAL};
use ratatui::{
    prelude::*,
    widgets::{Block, Gauge, Paragraph, Sparkline},
};

use crate::core::system_monitor::{AlertLevel, HistorySeries, MetricSample, Unit};

/// Color for an alert level
pub fn level_color(level: AlertLevel) -> Color {
    match level {
        AlertLevel::Ok => Color::Cyan,
        AlertLevel::Warning => Color::LightYellow,
        AlertLevel::Critical => Color::Red,
    }
}

/// Create a gauge colored by the metric's alert level
pub fn colored_gauge<'a>(value: f64, label: String, level: AlertLevel) -> Gauge<'a> {
    Gauge::default()
        .gauge_style(Style::default().fg(level_color(level)).bg(Color::Black))
        .ratio((value / 100.0).clamp(0.0, 1.0))
        .label(label)
}

/// Grey placeholder for a metric that could not be read
pub fn unavailable<'a>(label: &str) -> Paragraph<'a> {
    Paragraph::new(format!("{}: n/a", label)).style(Style::default().fg(Color::DarkGray))
}

/// Format bytes per second for network display
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_size(bytes_per_sec.max(0.0) as u64, DECIMAL))
}

/// Trend line over the newest values that fit in `width` columns.
///
/// Series store values scaled by 10 (see `HistorySeries::as_u64`), so a
/// percentage series wants `max` 1000. Without `max` the sparkline scales to
/// its own peak.
pub fn history_sparkline<'a>(
    title: String,
    series: Option<&HistorySeries>,
    width: u16,
    max: Option<u64>,
    color: Color,
) -> Sparkline<'a> {
    let data = series.map(|s| s.as_u64()).unwrap_or_default();
    let start = data.len().saturating_sub(width as usize);

    let sparkline = Sparkline::default()
        .block(Block::default().title(title))
        .data(&data[start..])
        .style(Style::default().fg(color));
    match max {
        Some(max) => sparkline.max(max),
        None => sparkline,
    }
}

pub fn format_sample(sample: Option<&MetricSample>) -> String {
    match sample.and_then(|s| s.value.map(|v| (v, s.unit))) {
        Some((value, Unit::BytesPerSec)) => format_speed(value),
        Some((value, Unit::Bytes)) => format_size(value.max(0.0) as u64, DECIMAL),
        Some((value, Unit::Seconds)) => format_duration(value.max(0.0) as u64),
        Some((value, Unit::Megahertz)) => format!("{:.0} MHz", value),
        Some((value, Unit::Count)) => format!("{:.0}", value),
        Some((value, unit)) => format!("{:.1}{}", value, unit.suffix()),
        None => "n/a".to_string(),
    }
}

/// Format duration in seconds to human-readable format
pub fn format_duration(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
