pub mod cache;
pub mod dispatch;
pub mod summary;

pub use cache::{SessionCache, SessionId};
pub use dispatch::{Dispatcher, DispatchError, DispatchReport};
pub use summary::SessionSummary;

use crate::analysis::{
    AnalyzerKind, ConversationTracker, DnsAnalyzer, NetworkMapAnalyzer, PacketAnalyzer,
    ProtocolAnalyzer, SecurityAnalyzer, TrafficStats,
};
use crate::capture::Packet;
use crate::visualization::{ProtocolChart, TrafficTimeline};

/// One aggregation run over a capture: one instance of each analyzer.
///
/// `process` takes `&self`; every analyzer locks only its own state, so a
/// session can be shared between workers behind an `Arc`.
#[derive(Debug, Default)]
pub struct Session {
    protocols: ProtocolAnalyzer,
    stats: TrafficStats,
    conversations: ConversationTracker,
    dns: DnsAnalyzer,
    network_map: NetworkMapAnalyzer,
    security: SecurityAnalyzer,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyzer(&self, kind: AnalyzerKind) -> &dyn PacketAnalyzer {
        match kind {
            AnalyzerKind::Protocol => &self.protocols,
            AnalyzerKind::Conversation => &self.conversations,
            AnalyzerKind::Dns => &self.dns,
            AnalyzerKind::NetworkMap => &self.network_map,
            AnalyzerKind::TrafficStats => &self.stats,
            AnalyzerKind::Security => &self.security,
        }
    }

    /// Feed one packet to every analyzer.
    pub fn process(&self, packet: &Packet) {
        for kind in AnalyzerKind::ALL {
            self.analyzer(kind).process(packet);
        }
    }

    /// Sequentially process a whole capture.
    pub fn process_all<'a>(&self, packets: impl IntoIterator<Item = &'a Packet>) {
        for packet in packets {
            self.process(packet);
        }
    }

    pub fn protocols(&self) -> &ProtocolAnalyzer {
        &self.protocols
    }

    pub fn traffic_stats(&self) -> &TrafficStats {
        &self.stats
    }

    pub fn conversations(&self) -> &ConversationTracker {
        &self.conversations
    }

    pub fn dns(&self) -> &DnsAnalyzer {
        &self.dns
    }

    pub fn network_map(&self) -> &NetworkMapAnalyzer {
        &self.network_map
    }

    pub fn security(&self) -> &SecurityAnalyzer {
        &self.security
    }

    pub fn protocol_chart(&self) -> ProtocolChart {
        ProtocolChart::from_counts(self.protocols.top(usize::MAX))
    }

    pub fn traffic_timeline(&self) -> TrafficTimeline {
        TrafficTimeline::from_stats(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn packet(src: &str, dst: &str, protocol: &str, length: usize) -> Packet {
        Packet::new(UNIX_EPOCH + Duration::from_secs(1_000), src, dst, protocol, length)
    }

    #[test]
    fn test_session_scenario() {
        let session = Session::new();
        session.process(&packet("10.0.0.1", "10.0.0.2", "TCP", 100));
        session.process(&packet("10.0.0.1", "10.0.0.2", "TCP", 200));
        session.process(&packet("10.0.0.2", "10.0.0.1", "UDP", 50));

        let conversations = session.conversations().top(2);
        assert_eq!(conversations[0].key.protocol, "TCP");
        assert_eq!(conversations[0].packet_count, 2);
        assert_eq!(conversations[0].total_bytes, 300);
        assert_eq!(conversations[1].key.protocol, "UDP");
        assert_eq!(conversations[1].packet_count, 1);
        assert_eq!(conversations[1].total_bytes, 50);

        let protocols = session.protocols().top(2);
        assert_eq!(protocols[0].name, "TCP");
        assert_eq!(protocols[0].count, 2);
        assert_eq!(protocols[1].name, "UDP");
        assert_eq!(protocols[1].count, 1);

        assert_eq!(session.traffic_stats().total_packets(), 3);
        assert_eq!(session.traffic_stats().total_bytes(), 350);
    }

    #[test]
    fn test_total_packets_includes_unknown_protocol() {
        let session = Session::new();
        let packets = vec![
            packet("10.0.0.1", "10.0.0.2", "TCP", 60),
            packet("10.0.0.1", "10.0.0.2", "", 42),
            packet("", "", "", 42),
            packet("10.0.0.3", "10.0.0.2", "UDP", 60),
        ];
        session.process_all(&packets);

        let unknown = packets.iter().filter(|p| p.protocol.is_empty()).count() as u64;
        let tallied: u64 = session.protocols().top(usize::MAX).iter().map(|p| p.count).sum();
        assert_eq!(session.traffic_stats().total_packets(), packets.len() as u64);
        assert_eq!(tallied + unknown, session.traffic_stats().total_packets());
    }

    #[test]
    fn test_every_analyzer_sees_the_packet() {
        let session = Session::new();
        for kind in AnalyzerKind::ALL {
            assert_eq!(session.analyzer(kind).kind(), kind);
        }

        session.process(&packet("10.0.0.1", "10.0.0.2", "TCP", 60).with_ports(40000, 3389));
        assert_eq!(session.protocols().total(), 1);
        assert_eq!(session.security().count(3389), 1);
        assert_eq!(session.conversations().len(), 1);
        assert_eq!(session.network_map().active_nodes().len(), 2);
        assert_eq!(session.traffic_stats().total_packets(), 1);
    }

    #[test]
    fn test_visualizations_reflect_state() {
        let session = Session::new();
        session.process(&packet("10.0.0.1", "10.0.0.2", "TCP", 100));
        session.process(&packet("10.0.0.1", "10.0.0.2", "UDP", 100));
        session.process(&packet("10.0.0.1", "10.0.0.2", "TCP", 100));

        let chart = session.protocol_chart();
        assert_eq!(chart.slices.len(), 2);
        assert_eq!(chart.slices[0].label, "TCP");

        let timeline = session.traffic_timeline();
        assert_eq!(timeline.points.len(), 1);
        assert_eq!(timeline.points[0].packets, 3);
    }
}
