use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::analysis::{lock, rank_counts, AnalyzerKind, PacketAnalyzer};
use crate::capture::Packet;

/// Remote-access and file-sharing ports worth flagging in a capture.
pub const SUSPICIOUS_PORTS: &[(u16, &str)] = &[
    (22, "SSH"),
    (23, "Telnet"),
    (445, "SMB"),
    (3389, "RDP"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCount {
    pub port: u16,
    pub service: &'static str,
    pub count: u64,
}

/// Packets touching a suspicious port, per port.
///
/// Source and destination are checked independently, so a packet between
/// two suspicious ports counts once for each.
#[derive(Debug, Default)]
pub struct SecurityAnalyzer {
    ports: Mutex<HashMap<u16, u64>>,
}

fn suspicious_service(port: u16) -> Option<&'static str> {
    SUSPICIOUS_PORTS
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, service)| *service)
}

impl SecurityAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Up to `n` flagged ports, most hits first, ties by port number.
    pub fn top_ports(&self, n: usize) -> Vec<PortCount> {
        let ports = lock(&self.ports);
        rank_counts(&ports, n)
            .into_iter()
            .map(|(port, count)| PortCount {
                port,
                service: suspicious_service(port).unwrap_or("unknown"),
                count,
            })
            .collect()
    }

    pub fn count(&self, port: u16) -> u64 {
        lock(&self.ports).get(&port).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        lock(&self.ports).values().sum()
    }
}

impl PacketAnalyzer for SecurityAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Security
    }

    fn process(&self, packet: &Packet) {
        let flagged = [packet.src_port, packet.dst_port]
            .into_iter()
            .filter(|port| suspicious_service(*port).is_some());

        let mut ports = lock(&self.ports);
        for port in flagged {
            *ports.entry(port).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn packet(src_port: u16, dst_port: u16) -> Packet {
        Packet::new(UNIX_EPOCH, "10.0.0.1", "10.0.0.2", "TCP", 60).with_ports(src_port, dst_port)
    }

    #[test]
    fn test_counts_either_direction() {
        let analyzer = SecurityAnalyzer::new();
        analyzer.process(&packet(51000, 22));
        analyzer.process(&packet(22, 51000));
        analyzer.process(&packet(40000, 443));
        analyzer.process(&packet(0, 0));

        assert_eq!(analyzer.count(22), 2);
        assert_eq!(analyzer.count(443), 0);
        assert_eq!(analyzer.total(), 2);
    }

    #[test]
    fn test_both_ports_suspicious() {
        let analyzer = SecurityAnalyzer::new();
        analyzer.process(&packet(445, 3389));
        analyzer.process(&packet(23, 23));

        assert_eq!(analyzer.count(445), 1);
        assert_eq!(analyzer.count(3389), 1);
        assert_eq!(analyzer.count(23), 2);
    }

    #[test]
    fn test_top_ports_ranking() {
        let analyzer = SecurityAnalyzer::new();
        for (src, dst) in [(1, 3389), (2, 445), (3, 3389), (4, 22), (5, 445)] {
            analyzer.process(&packet(src, dst));
        }

        let top = analyzer.top_ports(2);
        assert_eq!(
            top,
            vec![
                PortCount { port: 445, service: "SMB", count: 2 },
                PortCount { port: 3389, service: "RDP", count: 2 },
            ]
        );
        assert_eq!(analyzer.top_ports(usize::MAX).len(), 3);
        assert!(SecurityAnalyzer::new().top_ports(5).is_empty());
    }
}
