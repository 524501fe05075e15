use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::analysis::{lock, rank_counts, AnalyzerKind, PacketAnalyzer};
use crate::capture::Packet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryCount {
    pub domain: String,
    pub count: u64,
}

#[derive(Debug, Default)]
struct DnsCounts {
    queries: HashMap<String, u64>,
    answers: HashMap<String, u64>,
    opcodes: HashMap<String, u64>,
}

/// Frequency of DNS question names, answer names and opcodes.
#[derive(Debug, Default)]
pub struct DnsAnalyzer {
    counts: Mutex<DnsCounts>,
}

impl DnsAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top_queries(&self, n: usize) -> Vec<QueryCount> {
        to_query_counts(rank_counts(&lock(&self.counts).queries, n))
    }

    pub fn top_answers(&self, n: usize) -> Vec<QueryCount> {
        to_query_counts(rank_counts(&lock(&self.counts).answers, n))
    }

    pub fn opcode_counts(&self) -> HashMap<String, u64> {
        lock(&self.counts).opcodes.clone()
    }

}

fn to_query_counts(ranked: Vec<(String, u64)>) -> Vec<QueryCount> {
    ranked
        .into_iter()
        .map(|(domain, count)| QueryCount { domain, count })
        .collect()
}

impl PacketAnalyzer for DnsAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Dns
    }

    fn process(&self, packet: &Packet) {
        let Some(dns) = packet.dns.as_ref() else {
            return;
        };

        let mut counts = lock(&self.counts);
        for question in &dns.questions {
            *counts.queries.entry(question.clone()).or_insert(0) += 1;
        }
        for answer in &dns.answers {
            *counts.answers.entry(answer.clone()).or_insert(0) += 1;
        }
        *counts.opcodes.entry(dns.opcode.clone()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::DnsInfo;
    use std::time::UNIX_EPOCH;

    fn dns_packet(questions: &[&str], answers: &[&str]) -> Packet {
        Packet::new(UNIX_EPOCH, "192.168.1.10", "1.1.1.1", "UDP", 74)
            .with_ports(51515, 53)
            .with_dns(DnsInfo {
                is_response: !answers.is_empty(),
                opcode: "Query".to_string(),
                questions: questions.iter().map(|q| q.to_string()).collect(),
                answers: answers.iter().map(|a| a.to_string()).collect(),
                response_code: "No Error".to_string(),
            })
    }

    #[test]
    fn test_packets_without_dns_are_ignored() {
        let analyzer = DnsAnalyzer::new();
        analyzer.process(&Packet::new(UNIX_EPOCH, "a", "b", "TCP", 60));
        assert!(analyzer.opcode_counts().is_empty());
        assert!(analyzer.top_queries(5).is_empty());
    }

    #[test]
    fn test_query_ranking() {
        let analyzer = DnsAnalyzer::new();
        analyzer.process(&dns_packet(&["example.com"], &[]));
        analyzer.process(&dns_packet(&["example.com"], &["example.com"]));
        analyzer.process(&dns_packet(&["b.org", "a.org"], &[]));

        let top = analyzer.top_queries(3);
        assert_eq!(top[0], QueryCount { domain: "example.com".to_string(), count: 2 });
        assert_eq!(top[1].domain, "a.org");
        assert_eq!(top[2].domain, "b.org");

        assert_eq!(analyzer.top_answers(5).len(), 1);
        assert_eq!(analyzer.opcode_counts().get("Query"), Some(&3));
    }
}
