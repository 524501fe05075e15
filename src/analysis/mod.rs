pub mod protocols;
pub mod conversations;
pub mod dns;
pub mod network_map;
pub mod security;
pub mod statistics;

pub use protocols::{ProtocolAnalyzer, ProtocolCount};
pub use conversations::{ConversationTracker, Conversation, ConversationKey};
pub use dns::{DnsAnalyzer, QueryCount};
pub use network_map::{NetworkMapAnalyzer, NetworkNode, NetworkConnection, NodeRole, SERVICE_PORTS};
pub use security::{SecurityAnalyzer, PortCount, SUSPICIOUS_PORTS};
pub use statistics::{TrafficStats, TrafficSnapshot, SizeBucket, VolumeSample};

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use crate::capture::Packet;

/// The fixed set of analyzers a session fans packets out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerKind {
    Protocol,
    Conversation,
    Dns,
    NetworkMap,
    TrafficStats,
    Security,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 6] = [
        AnalyzerKind::Protocol,
        AnalyzerKind::Conversation,
        AnalyzerKind::Dns,
        AnalyzerKind::NetworkMap,
        AnalyzerKind::TrafficStats,
        AnalyzerKind::Security,
    ];
}

/// Something that accumulates state from every packet of a session.
///
/// Implementations take `&self` and guard their own state, so one analyzer
/// can be fed from many workers at once.
pub trait PacketAnalyzer: Send + Sync {
    fn kind(&self) -> AnalyzerKind;
    fn process(&self, packet: &Packet);
}

/// Lock an analyzer's state. A worker that panicked mid-update leaves the
/// counters as they were, so a poisoned lock is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Highest counts first, ties broken by key ascending, at most `limit`.
pub(crate) fn rank_counts<K>(counts: &HashMap<K, u64>, limit: usize) -> Vec<(K, u64)>
where
    K: Clone + Ord + Hash,
{
    let mut ranked: Vec<(K, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_counts_tie_break() {
        let mut counts = HashMap::new();
        counts.insert("udp".to_string(), 3);
        counts.insert("tcp".to_string(), 3);
        counts.insert("icmp".to_string(), 7);
        counts.insert("arp".to_string(), 1);

        let ranked = rank_counts(&counts, 3);
        assert_eq!(
            ranked,
            vec![
                ("icmp".to_string(), 7),
                ("tcp".to_string(), 3),
                ("udp".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_rank_counts_limit_larger_than_map() {
        let mut counts = HashMap::new();
        counts.insert(1u16, 1);
        assert_eq!(rank_counts(&counts, usize::MAX).len(), 1);
        assert!(rank_counts(&counts, 0).is_empty());
    }
}
