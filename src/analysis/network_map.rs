use ipnetwork::IpNetwork;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::IpAddr;
use std::sync::Mutex;

use crate::analysis::{lock, AnalyzerKind, PacketAnalyzer};
use crate::capture::Packet;

/// Well-known ports and the service names they map to.
pub const SERVICE_PORTS: &[(u16, &str)] = &[
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (139, "NetBIOS"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (6379, "Redis"),
    (27017, "MongoDB"),
];

const LOCAL_NETWORKS: &[&str] = &[
    "127.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "169.254.0.0/16",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Server,
    Client,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Server => write!(f, "server"),
            NodeRole::Client => write!(f, "client"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkNode {
    pub ip: String,
    pub role: NodeRole,
    pub local: bool,
    pub ports: BTreeSet<u16>,
    pub services: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConnection {
    pub source: String,
    pub destination: String,
    pub protocol: String,
    pub count: u64,
    /// Unix seconds of the newest packet seen on this connection.
    pub last_seen: i64,
}

type ConnectionKey = (String, String, String);

#[derive(Debug, Default)]
struct Topology {
    nodes: HashMap<String, NetworkNode>,
    connections: HashMap<ConnectionKey, NetworkConnection>,
}

/// Hosts, the ports and services they were seen on, and who talks to whom.
///
/// Roles come from a port heuristic: a host first seen on a well-known
/// service port is called a server, anything else a client. Nothing checks
/// handshake direction, so a client that happens to use a well-known port
/// as its source port is reported as a server.
#[derive(Debug)]
pub struct NetworkMapAnalyzer {
    topology: Mutex<Topology>,
    service_ports: HashMap<u16, &'static str>,
    local_networks: Vec<IpNetwork>,
}

impl Default for NetworkMapAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMapAnalyzer {
    pub fn new() -> Self {
        Self {
            topology: Mutex::new(Topology::default()),
            service_ports: SERVICE_PORTS.iter().copied().collect(),
            local_networks: LOCAL_NETWORKS
                .iter()
                .filter_map(|cidr| cidr.parse().ok())
                .collect(),
        }
    }

    pub fn service_for_port(&self, port: u16) -> Option<&'static str> {
        self.service_ports.get(&port).copied()
    }

    fn determine_role(&self, port: u16) -> NodeRole {
        if self.service_ports.contains_key(&port) {
            NodeRole::Server
        } else {
            NodeRole::Client
        }
    }

    fn is_local(&self, ip: &str) -> bool {
        match ip.parse::<IpAddr>() {
            Ok(addr) => self.local_networks.iter().any(|net| net.contains(addr)),
            Err(_) => false,
        }
    }

    fn observe_endpoint(&self, topology: &mut Topology, ip: &str, port: u16) {
        let node = topology.nodes.entry(ip.to_string()).or_insert_with(|| NetworkNode {
            ip: ip.to_string(),
            role: self.determine_role(port),
            local: self.is_local(ip),
            ports: BTreeSet::new(),
            services: BTreeSet::new(),
        });

        node.ports.insert(port);
        if let Some(service) = self.service_for_port(port) {
            node.services.insert(service.to_string());
        }
    }

    /// Every node seen so far, ordered by IP.
    pub fn active_nodes(&self) -> Vec<NetworkNode> {
        let topology = lock(&self.topology);
        let mut nodes: Vec<NetworkNode> = topology.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.ip.cmp(&b.ip));
        nodes
    }

    /// Every connection seen so far, ordered by (source, destination, protocol).
    pub fn active_connections(&self) -> Vec<NetworkConnection> {
        self.collect_connections(|_| true)
    }

    /// Connections whose newest packet is at or after `unix_secs`.
    pub fn connections_seen_since(&self, unix_secs: i64) -> Vec<NetworkConnection> {
        self.collect_connections(|conn| conn.last_seen >= unix_secs)
    }

    fn collect_connections(
        &self,
        keep: impl Fn(&NetworkConnection) -> bool,
    ) -> Vec<NetworkConnection> {
        let topology = lock(&self.topology);
        let mut connections: Vec<NetworkConnection> = topology
            .connections
            .values()
            .filter(|conn| keep(conn))
            .cloned()
            .collect();
        connections.sort_by(|a, b| {
            (&a.source, &a.destination, &a.protocol)
                .cmp(&(&b.source, &b.destination, &b.protocol))
        });
        connections
    }

    pub fn node(&self, ip: &str) -> Option<NetworkNode> {
        lock(&self.topology).nodes.get(ip).cloned()
    }
}

impl PacketAnalyzer for NetworkMapAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::NetworkMap
    }

    fn process(&self, packet: &Packet) {
        let seen_at = packet.unix_seconds();
        let mut topology = lock(&self.topology);

        self.observe_endpoint(&mut topology, &packet.src_ip, packet.src_port);
        self.observe_endpoint(&mut topology, &packet.dst_ip, packet.dst_port);

        let key = (
            packet.src_ip.clone(),
            packet.dst_ip.clone(),
            packet.protocol.clone(),
        );
        let connection = topology.connections.entry(key).or_insert_with(|| NetworkConnection {
            source: packet.src_ip.clone(),
            destination: packet.dst_ip.clone(),
            protocol: packet.protocol.clone(),
            count: 0,
            last_seen: seen_at,
        });
        connection.count += 1;
        connection.last_seen = connection.last_seen.max(seen_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn packet(src: &str, sport: u16, dst: &str, dport: u16, secs: u64) -> Packet {
        Packet::new(UNIX_EPOCH + Duration::from_secs(secs), src, dst, "TCP", 60)
            .with_ports(sport, dport)
    }

    #[test]
    fn test_service_table_has_required_entries() {
        let analyzer = NetworkMapAnalyzer::new();
        assert_eq!(analyzer.service_for_port(80), Some("HTTP"));
        assert_eq!(analyzer.service_for_port(443), Some("HTTPS"));
        assert_eq!(analyzer.service_for_port(27017), Some("MongoDB"));
        assert_eq!(analyzer.service_for_port(6379), Some("Redis"));
        assert_eq!(analyzer.service_for_port(8080), None);
        assert_eq!(SERVICE_PORTS.len(), 16);
    }

    #[test]
    fn test_client_server_heuristic() {
        let analyzer = NetworkMapAnalyzer::new();
        analyzer.process(&packet("192.168.1.5", 51000, "93.184.216.34", 443, 100));

        let client = analyzer.node("192.168.1.5").unwrap();
        assert_eq!(client.role, NodeRole::Client);
        assert!(client.local);
        assert!(client.services.is_empty());

        let server = analyzer.node("93.184.216.34").unwrap();
        assert_eq!(server.role, NodeRole::Server);
        assert!(!server.local);
        assert!(server.services.contains("HTTPS"));
        assert!(analyzer.node("10.9.9.9").is_none());

        // Link-local peers count as local.
        analyzer.process(&packet("169.254.10.20", 5353, "169.254.10.21", 40000, 101));
        assert!(analyzer.node("169.254.10.20").unwrap().local);
        assert!(analyzer.node("169.254.10.21").unwrap().local);
        assert!(!analyzer.node("93.184.216.34").unwrap().local);
    }

    #[test]
    fn test_role_is_not_revisited() {
        let analyzer = NetworkMapAnalyzer::new();
        analyzer.process(&packet("10.0.0.1", 40000, "10.0.0.2", 9000, 1));
        // Later seen on SSH: port and service are added, role stays client.
        analyzer.process(&packet("10.0.0.3", 40001, "10.0.0.2", 22, 2));

        let node = analyzer.node("10.0.0.2").unwrap();
        assert_eq!(node.role, NodeRole::Client);
        assert_eq!(node.ports.iter().copied().collect::<Vec<_>>(), vec![22, 9000]);
        assert!(node.services.contains("SSH"));
    }

    #[test]
    fn test_heuristic_misclassifies_well_known_source_port() {
        // A client using source port 53 is reported as a DNS server.
        let analyzer = NetworkMapAnalyzer::new();
        analyzer.process(&packet("10.0.0.7", 53, "10.0.0.8", 33000, 1));
        assert_eq!(analyzer.node("10.0.0.7").unwrap().role, NodeRole::Server);
    }

    #[test]
    fn test_connections_and_recency() {
        let analyzer = NetworkMapAnalyzer::new();
        analyzer.process(&packet("10.0.0.1", 40000, "10.0.0.2", 80, 50));
        analyzer.process(&packet("10.0.0.1", 40000, "10.0.0.2", 80, 10));
        analyzer.process(&packet("10.0.0.2", 80, "10.0.0.1", 40000, 20));

        let connections = analyzer.active_connections();
        assert_eq!(connections.len(), 2);
        assert_eq!(connections[0].source, "10.0.0.1");
        assert_eq!(connections[0].count, 2);
        assert_eq!(connections[0].last_seen, 50);

        let recent = analyzer.connections_seen_since(30);
        assert_eq!(recent.len(), 1);
        assert_eq!(analyzer.active_nodes().len(), 2);
    }
}
