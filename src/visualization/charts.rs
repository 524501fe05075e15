use ratatui::{
    prelude::*,
    widgets::{BarChart, Block, Borders, Paragraph, Sparkline},
};
use serde::Serialize;

use crate::analysis::{ProtocolCount, TrafficStats};
use crate::utils::formatting::format_bytes;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSlice {
    pub label: String,
    pub value: u64,
    pub percentage: f64,
}

/// Protocol distribution, one slice per protocol in ranking order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolChart {
    pub total: u64,
    pub slices: Vec<ChartSlice>,
}

impl ProtocolChart {
    pub fn from_counts(counts: Vec<ProtocolCount>) -> Self {
        let total: u64 = counts.iter().map(|c| c.count).sum();
        let slices = counts
            .into_iter()
            .map(|c| ChartSlice {
                percentage: if total > 0 {
                    c.count as f64 * 100.0 / total as f64
                } else {
                    0.0
                },
                label: c.name,
                value: c.count,
            })
            .collect();
        Self { total, slices }
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn render(&self, area: Rect, frame: &mut Frame) {
        let block = Block::default()
            .title("Protocol Distribution")
            .borders(Borders::ALL);

        if self.is_empty() {
            frame.render_widget(Paragraph::new("No transport protocols seen").block(block), area);
            return;
        }

        let data: Vec<(&str, u64)> = self
            .slices
            .iter()
            .take(10)
            .map(|slice| (slice.label.as_str(), slice.value))
            .collect();

        let chart = BarChart::default()
            .block(block)
            .data(&data)
            .bar_width(7)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Yellow))
            .value_style(Style::default().fg(Color::Black).bg(Color::Yellow));

        frame.render_widget(chart, area);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    /// Seconds since the first packet.
    pub offset_secs: i64,
    pub packets: u64,
    pub bytes: u64,
}

/// Packet and byte volume over the capture, plus the size histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficTimeline {
    pub start_unix: Option<i64>,
    pub points: Vec<TimelinePoint>,
    pub size_distribution: Vec<(String, u64)>,
}

impl TrafficTimeline {
    pub fn from_stats(stats: &TrafficStats) -> Self {
        let series = stats.volume_series();
        let start_unix = series.first().map(|(second, _)| *second);
        let points = series
            .iter()
            .map(|(second, sample)| TimelinePoint {
                offset_secs: second - start_unix.unwrap_or(*second),
                packets: sample.packets,
                bytes: sample.bytes,
            })
            .collect();
        let size_distribution = stats
            .size_buckets()
            .into_iter()
            .map(|(bucket, count)| (bucket.label().to_string(), count))
            .collect();

        Self {
            start_unix,
            points,
            size_distribution,
        }
    }

    pub fn span_secs(&self) -> i64 {
        self.points.last().map(|p| p.offset_secs + 1).unwrap_or(0)
    }

    /// Packets per bin over the whole span, with empty seconds as zero.
    /// Bins widen so that at most `max_bins` values are returned.
    pub fn packet_bins(&self, max_bins: usize) -> Vec<u64> {
        self.bins(max_bins, |p| p.packets)
    }

    pub fn byte_bins(&self, max_bins: usize) -> Vec<u64> {
        self.bins(max_bins, |p| p.bytes)
    }

    fn bins(&self, max_bins: usize, value: impl Fn(&TimelinePoint) -> u64) -> Vec<u64> {
        let span = self.span_secs();
        if span == 0 || max_bins == 0 {
            return Vec::new();
        }
        let width = (span as u64).div_ceil(max_bins as u64).max(1) as i64;
        let count = ((span + width - 1) / width) as usize;

        let mut bins = vec![0u64; count];
        for point in &self.points {
            bins[(point.offset_secs / width) as usize] += value(point);
        }
        bins
    }

    /// Packet sparkline above a byte sparkline, sharing the same bins.
    pub fn render(&self, area: Rect, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let inner_width = area.width.saturating_sub(2) as usize;
        let packets = self.packet_bins(inner_width);
        let packet_peak = packets.iter().copied().max().unwrap_or(0);
        let title = format!("Packets over {}s (peak {} per bin)", self.span_secs(), packet_peak);
        let sparkline = Sparkline::default()
            .block(Block::default().title(title).borders(Borders::ALL))
            .data(&packets)
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(sparkline, chunks[0]);

        let bytes = self.byte_bins(inner_width);
        let byte_peak = bytes.iter().copied().max().unwrap_or(0);
        let title = format!("Bytes (peak {} per bin)", format_bytes(byte_peak));
        let sparkline = Sparkline::default()
            .block(Block::default().title(title).borders(Borders::ALL))
            .data(&bytes)
            .style(Style::default().fg(Color::Magenta));
        frame.render_widget(sparkline, chunks[1]);
    }

    pub fn render_size_distribution(&self, area: Rect, frame: &mut Frame) {
        let data: Vec<(&str, u64)> = self
            .size_distribution
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();

        let chart = BarChart::default()
            .block(Block::default().title("Packet Sizes (bytes)").borders(Borders::ALL))
            .data(&data)
            .bar_width(8)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Green))
            .value_style(Style::default().fg(Color::Black).bg(Color::Green));

        frame.render_widget(chart, area);
    }
}
