use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::analysis::{lock, AnalyzerKind, PacketAnalyzer};
use crate::capture::Packet;

/// Directional (source, destination, protocol) triple. A→B and B→A are
/// different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConversationKey {
    pub src_ip: String,
    pub dst_ip: String,
    pub protocol: String,
}

impl ConversationKey {
    pub fn from_packet(packet: &Packet) -> Self {
        Self {
            src_ip: packet.src_ip.clone(),
            dst_ip: packet.dst_ip.clone(),
            protocol: packet.protocol.clone(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.src_ip, self.dst_ip, self.protocol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    #[serde(flatten)]
    pub key: ConversationKey,
    pub packet_count: u64,
    pub total_bytes: u64,
}

/// Packet and byte totals per directional conversation.
#[derive(Debug, Default)]
pub struct ConversationTracker {
    conversations: Mutex<HashMap<ConversationKey, Conversation>>,
}

impl ConversationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Up to `n` conversations by packet count, ties by key.
    pub fn top(&self, n: usize) -> Vec<Conversation> {
        self.ranked(n, |c| c.packet_count)
    }

    /// Up to `n` conversations by byte count, ties by key.
    pub fn top_by_bytes(&self, n: usize) -> Vec<Conversation> {
        self.ranked(n, |c| c.total_bytes)
    }

    fn ranked(&self, n: usize, metric: impl Fn(&Conversation) -> u64) -> Vec<Conversation> {
        let mut conversations: Vec<Conversation> =
            lock(&self.conversations).values().cloned().collect();
        conversations.sort_by(|a, b| metric(b).cmp(&metric(a)).then_with(|| a.key.cmp(&b.key)));
        conversations.truncate(n);
        conversations
    }

    pub fn get(&self, key: &ConversationKey) -> Option<Conversation> {
        lock(&self.conversations).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.conversations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PacketAnalyzer for ConversationTracker {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Conversation
    }

    fn process(&self, packet: &Packet) {
        let key = ConversationKey::from_packet(packet);
        let bytes = packet.length as u64;

        let mut conversations = lock(&self.conversations);
        conversations
            .entry(key)
            .and_modify(|conv| {
                conv.packet_count += 1;
                conv.total_bytes += bytes;
            })
            .or_insert_with_key(|key| Conversation {
                key: key.clone(),
                packet_count: 1,
                total_bytes: bytes,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn packet(src: &str, dst: &str, protocol: &str, length: usize) -> Packet {
        Packet::new(UNIX_EPOCH, src, dst, protocol, length)
    }

    #[test]
    fn test_conversation_tracking() {
        let tracker = ConversationTracker::new();
        tracker.process(&packet("10.0.0.1", "10.0.0.2", "TCP", 100));
        tracker.process(&packet("10.0.0.1", "10.0.0.2", "TCP", 200));
        tracker.process(&packet("10.0.0.2", "10.0.0.1", "UDP", 50));

        let top = tracker.top(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].key.to_string(), "10.0.0.1:10.0.0.2:TCP");
        assert_eq!(top[0].packet_count, 2);
        assert_eq!(top[0].total_bytes, 300);
        assert_eq!(top[1].key.protocol, "UDP");
        assert_eq!(top[1].packet_count, 1);
        assert_eq!(top[1].total_bytes, 50);
    }

    #[test]
    fn test_conversations_are_directional() {
        let tracker = ConversationTracker::new();
        tracker.process(&packet("10.0.0.1", "10.0.0.2", "TCP", 60));
        tracker.process(&packet("10.0.0.2", "10.0.0.1", "TCP", 60));

        assert_eq!(tracker.len(), 2);
        assert!(tracker.top(10).iter().all(|c| c.packet_count == 1));
    }

    #[test]
    fn test_rank_by_bytes_and_ties() {
        let tracker = ConversationTracker::new();
        tracker.process(&packet("10.0.0.3", "10.0.0.1", "TCP", 10));
        tracker.process(&packet("10.0.0.2", "10.0.0.1", "TCP", 10));
        tracker.process(&packet("10.0.0.9", "10.0.0.1", "UDP", 1500));

        let by_packets = tracker.top(3);
        assert_eq!(by_packets[0].key.src_ip, "10.0.0.2");
        assert_eq!(by_packets[1].key.src_ip, "10.0.0.3");
        assert_eq!(by_packets[2].key.src_ip, "10.0.0.9");

        let by_bytes = tracker.top_by_bytes(1);
        assert_eq!(by_bytes[0].key.src_ip, "10.0.0.9");
    }

    #[test]
    fn test_ipv6_keys_do_not_collide() {
        let tracker = ConversationTracker::new();
        tracker.process(&packet("fe80::1", "fe80::2", "UDP", 80));
        let key = ConversationKey {
            src_ip: "fe80::1".to_string(),
            dst_ip: "fe80::2".to_string(),
            protocol: "UDP".to_string(),
        };
        assert_eq!(tracker.get(&key).map(|c| c.total_bytes), Some(80));
    }
}
