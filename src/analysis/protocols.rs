use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::analysis::{lock, rank_counts, AnalyzerKind, PacketAnalyzer};
use crate::capture::Packet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolCount {
    pub name: String,
    pub count: u64,
}

/// Packet counts per transport protocol name.
#[derive(Debug, Default)]
pub struct ProtocolAnalyzer {
    protocols: Mutex<HashMap<String, u64>>,
}

impl ProtocolAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Up to `n` protocols, most packets first, ties by name.
    pub fn top(&self, n: usize) -> Vec<ProtocolCount> {
        let protocols = lock(&self.protocols);
        rank_counts(&protocols, n)
            .into_iter()
            .map(|(name, count)| ProtocolCount { name, count })
            .collect()
    }

    pub fn total(&self) -> u64 {
        lock(&self.protocols).values().sum()
    }

    pub fn count(&self, protocol: &str) -> u64 {
        lock(&self.protocols).get(protocol).copied().unwrap_or(0)
    }
}

impl PacketAnalyzer for ProtocolAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Protocol
    }

    fn process(&self, packet: &Packet) {
        // Packets without a transport layer are only counted by TrafficStats.
        if packet.protocol.is_empty() {
            return;
        }
        let mut protocols = lock(&self.protocols);
        *protocols.entry(packet.protocol.clone()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn packet(protocol: &str) -> Packet {
        Packet::new(UNIX_EPOCH, "10.0.0.1", "10.0.0.2", protocol, 60)
    }

    #[test]
    fn test_protocol_counting() {
        let analyzer = ProtocolAnalyzer::new();
        for proto in ["TCP", "UDP", "TCP", "", "ICMP", "TCP"] {
            analyzer.process(&packet(proto));
        }

        assert_eq!(analyzer.count("TCP"), 3);
        assert_eq!(analyzer.count(""), 0);
        assert_eq!(analyzer.total(), 5);
        assert_eq!(analyzer.top(usize::MAX).len(), 3);
    }

    #[test]
    fn test_top_is_ranked_and_deterministic() {
        let analyzer = ProtocolAnalyzer::new();
        for proto in ["UDP", "TCP", "ICMP", "ICMP", "TCP", "UDP", "SCTP"] {
            analyzer.process(&packet(proto));
        }

        let top = analyzer.top(3);
        let names: Vec<&str> = top.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ICMP", "TCP", "UDP"]);
        assert!(top.iter().all(|p| p.count == 2));

        assert_eq!(analyzer.top(3), top);
        assert_eq!(analyzer.top(usize::MAX).len(), 4);
    }
}
