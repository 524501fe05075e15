use serde::Serialize;
use std::collections::BTreeMap;

use crate::analysis::{
    Conversation, NetworkConnection, NetworkNode, PortCount, ProtocolCount, QueryCount,
    TrafficSnapshot, SUSPICIOUS_PORTS,
};
use crate::capture::{unix_seconds, CaptureProperties, ReaderStats};
use crate::config::ReportConfig;
use crate::session::{Session, SessionId};
use crate::visualization::{ProtocolChart, TrafficTimeline};

/// Connections whose last packet falls in this many final seconds of the
/// capture are listed as recent.
pub const RECENT_WINDOW_SECS: i64 = 60;

/// Everything an overview page or report shows for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Option<SessionId>,
    pub capture: Option<CaptureProperties>,
    pub reader: Option<ReaderStats>,
    pub traffic: TrafficSnapshot,
    pub top_protocols: Vec<ProtocolCount>,
    pub top_conversations: Vec<Conversation>,
    pub network_nodes: Vec<NetworkNode>,
    pub recent_connections: Vec<NetworkConnection>,
    pub top_queries: Vec<QueryCount>,
    pub top_answers: Vec<QueryCount>,
    pub dns_opcodes: BTreeMap<String, u64>,
    pub suspicious_ports: Vec<PortCount>,
    pub protocol_chart: ProtocolChart,
    pub traffic_timeline: TrafficTimeline,
}

impl SessionSummary {
    pub fn build(session: &Session, limits: &ReportConfig) -> Self {
        let traffic = session.traffic_stats().snapshot();
        let recent_connections = match traffic.end_time {
            Some(end) => session
                .network_map()
                .connections_seen_since(unix_seconds(end) - RECENT_WINDOW_SECS),
            None => Vec::new(),
        };

        Self {
            session_id: None,
            capture: None,
            reader: None,
            traffic,
            top_protocols: session.protocols().top(limits.top_protocols),
            top_conversations: session.conversations().top(limits.top_conversations),
            network_nodes: session.network_map().active_nodes(),
            recent_connections,
            top_queries: session.dns().top_queries(limits.top_queries),
            top_answers: session.dns().top_answers(limits.top_queries),
            dns_opcodes: session.dns().opcode_counts().into_iter().collect(),
            suspicious_ports: session.security().top_ports(SUSPICIOUS_PORTS.len()),
            protocol_chart: session.protocol_chart(),
            traffic_timeline: session.traffic_timeline(),
        }
    }

    pub fn with_id(mut self, id: SessionId) -> Self {
        self.session_id = Some(id);
        self
    }

    pub fn with_capture(mut self, properties: CaptureProperties, stats: ReaderStats) -> Self {
        self.capture = Some(properties);
        self.reader = Some(stats);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DnsInfo, Packet};
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_summary_respects_limits() {
        let session = Session::new();
        for (i, proto) in ["TCP", "UDP", "ICMP", "TCP"].iter().enumerate() {
            let src = format!("10.0.0.{}", i);
            session.process(&Packet::new(UNIX_EPOCH, src, "10.0.0.254", *proto, 100));
        }

        let limits = ReportConfig {
            top_protocols: 2,
            top_conversations: 3,
            ..ReportConfig::default()
        };
        let summary = SessionSummary::build(&session, &limits);

        assert_eq!(summary.traffic.total_packets, 4);
        assert_eq!(summary.top_protocols.len(), 2);
        assert_eq!(summary.top_protocols[0].name, "TCP");
        assert_eq!(summary.top_conversations.len(), 3);
        assert_eq!(summary.network_nodes.len(), 5);
        assert!(summary.session_id.is_none());
        assert!(summary.capture.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["top_protocols"][0]["count"], 2);
        assert_eq!(json["top_conversations"][0]["src_ip"], "10.0.0.0");
    }

    #[test]
    fn test_summary_dns_security_and_recency() {
        let at = |secs| UNIX_EPOCH + Duration::from_secs(secs);
        let dns = DnsInfo {
            is_response: true,
            opcode: "Query".to_string(),
            questions: vec!["example.com".to_string()],
            answers: vec!["example.com".to_string(), "cdn.example.net".to_string()],
            response_code: "No Error".to_string(),
        };

        let tcp = |secs: u64, src: &str, dst_port: u16| {
            Packet::new(at(secs), src, "10.0.0.9", "TCP", 60).with_ports(50000, dst_port)
        };

        let session = Session::new();
        session.process(&tcp(0, "10.0.0.1", 22));
        session.process(&tcp(10, "10.0.0.5", 8080));
        session.process(
            &Packet::new(at(100), "1.1.1.1", "10.0.0.1", "UDP", 90)
                .with_ports(53, 40000)
                .with_dns(dns),
        );
        session.process(&tcp(150, "10.0.0.1", 3389));

        let summary = SessionSummary::build(&session, &ReportConfig::default());

        assert_eq!(summary.top_answers.len(), 2);
        assert_eq!(summary.top_answers[0].domain, "cdn.example.net");
        assert_eq!(summary.dns_opcodes.get("Query"), Some(&1));
        assert_eq!(
            summary.suspicious_ports,
            vec![
                PortCount { port: 22, service: "SSH", count: 1 },
                PortCount { port: 3389, service: "RDP", count: 1 },
            ]
        );

        // Capture ends at 150s, so only connections last seen from 90s on are recent.
        let recent: Vec<&str> = summary
            .recent_connections
            .iter()
            .map(|c| c.source.as_str())
            .collect();
        assert_eq!(recent, vec!["1.1.1.1", "10.0.0.1"]);
    }

    #[test]
    fn test_summary_with_capture() {
        let properties = CaptureProperties {
            file_name: "trace.pcap".to_string(),
            file_size: 24,
            md5_hash: String::new(),
            sha256_hash: String::new(),
            first_packet_utc: None,
            last_packet_utc: None,
            link_type: "EN10MB".to_string(),
        };
        let stats = ReaderStats {
            frames_read: 7,
            ..ReaderStats::default()
        };

        let summary = SessionSummary::build(&Session::new(), &ReportConfig::default())
            .with_capture(properties, stats);
        assert!(summary.recent_connections.is_empty());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["capture"]["file_name"], "trace.pcap");
        assert_eq!(json["capture"]["link_type"], "EN10MB");
        assert_eq!(json["reader"]["frames_read"], 7);
        assert!(json["reader"].get("first_packet").is_none());
    }
}
