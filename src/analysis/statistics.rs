use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::analysis::{lock, AnalyzerKind, PacketAnalyzer};
use crate::capture::{unix_seconds, Packet};

/// Fixed packet-size histogram buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SizeBucket {
    UpTo64,
    UpTo128,
    UpTo512,
    UpTo1024,
    Over1024,
}

impl SizeBucket {
    pub const ALL: [SizeBucket; 5] = [
        SizeBucket::UpTo64,
        SizeBucket::UpTo128,
        SizeBucket::UpTo512,
        SizeBucket::UpTo1024,
        SizeBucket::Over1024,
    ];

    pub fn for_length(length: usize) -> Self {
        match length {
            0..=64 => SizeBucket::UpTo64,
            65..=128 => SizeBucket::UpTo128,
            129..=512 => SizeBucket::UpTo512,
            513..=1024 => SizeBucket::UpTo1024,
            _ => SizeBucket::Over1024,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizeBucket::UpTo64 => "≤64",
            SizeBucket::UpTo128 => "65-128",
            SizeBucket::UpTo512 => "129-512",
            SizeBucket::UpTo1024 => "513-1024",
            SizeBucket::Over1024 => ">1024",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VolumeSample {
    pub packets: u64,
    pub bytes: u64,
}

/// Point-in-time copy of the running totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrafficSnapshot {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    /// Counts in `SizeBucket::ALL` order.
    pub size_buckets: [u64; 5],
}

impl TrafficSnapshot {
    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start).unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    pub fn average_packet_size(&self) -> f64 {
        if self.total_packets > 0 {
            self.total_bytes as f64 / self.total_packets as f64
        } else {
            0.0
        }
    }

    /// Bytes per second across the capture span, 0 for a zero-length span.
    pub fn average_rate(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.total_bytes as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default)]
struct Totals {
    snapshot: TrafficSnapshot,
    per_second: BTreeMap<i64, VolumeSample>,
}

/// Packet and byte totals, capture time span, size histogram and a
/// per-second volume series.
#[derive(Debug, Default)]
pub struct TrafficStats {
    totals: Mutex<Totals>,
}

impl TrafficStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        lock(&self.totals).snapshot.clone()
    }

    pub fn total_packets(&self) -> u64 {
        lock(&self.totals).snapshot.total_packets
    }

    pub fn total_bytes(&self) -> u64 {
        lock(&self.totals).snapshot.total_bytes
    }

    pub fn size_buckets(&self) -> Vec<(SizeBucket, u64)> {
        let totals = lock(&self.totals);
        SizeBucket::ALL
            .iter()
            .map(|bucket| (*bucket, totals.snapshot.size_buckets[bucket.index()]))
            .collect()
    }

    /// Volume per Unix second, oldest first. Seconds without traffic are absent.
    pub fn volume_series(&self) -> Vec<(i64, VolumeSample)> {
        lock(&self.totals)
            .per_second
            .iter()
            .map(|(second, sample)| (*second, *sample))
            .collect()
    }
}

impl PacketAnalyzer for TrafficStats {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::TrafficStats
    }

    fn process(&self, packet: &Packet) {
        let bytes = packet.length as u64;
        let bucket = SizeBucket::for_length(packet.length);
        let second = unix_seconds(packet.timestamp);

        let mut totals = lock(&self.totals);
        let snapshot = &mut totals.snapshot;
        snapshot.total_packets += 1;
        snapshot.total_bytes += bytes;

        if snapshot.start_time.map_or(true, |start| packet.timestamp < start) {
            snapshot.start_time = Some(packet.timestamp);
        }
        if snapshot.end_time.map_or(true, |end| packet.timestamp > end) {
            snapshot.end_time = Some(packet.timestamp);
        }
        snapshot.size_buckets[bucket.index()] += 1;

        let sample = totals.per_second.entry(second).or_default();
        sample.packets += 1;
        sample.bytes += bytes;
    }
}
