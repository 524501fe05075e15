use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// DNS fields lifted from a decoded packet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DnsInfo {
    pub is_response: bool,
    pub opcode: String,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub response_code: String,
}

/// One captured packet, already decoded.
///
/// Packets without a transport layer carry an empty `protocol` and zero
/// ports. Packets without a DNS layer carry `dns: None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub timestamp: SystemTime,
    pub src_ip: String,
    pub dst_ip: String,
    pub protocol: String,
    pub length: usize,
    pub src_port: u16,
    pub dst_port: u16,
    pub dns: Option<DnsInfo>,
}

impl Packet {
    pub fn new(
        timestamp: SystemTime,
        src_ip: impl Into<String>,
        dst_ip: impl Into<String>,
        protocol: impl Into<String>,
        length: usize,
    ) -> Self {
        Self {
            timestamp,
            src_ip: src_ip.into(),
            dst_ip: dst_ip.into(),
            protocol: protocol.into(),
            length,
            src_port: 0,
            dst_port: 0,
            dns: None,
        }
    }

    pub fn with_ports(mut self, src_port: u16, dst_port: u16) -> Self {
        self.src_port = src_port;
        self.dst_port = dst_port;
        self
    }

    pub fn with_dns(mut self, dns: DnsInfo) -> Self {
        self.dns = Some(dns);
        self
    }

    pub fn unix_seconds(&self) -> i64 {
        unix_seconds(self.timestamp)
    }
}

/// Seconds since the Unix epoch, negative for timestamps before it.
pub fn unix_seconds(timestamp: SystemTime) -> i64 {
    match timestamp.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs() as i64,
        Err(before) => {
            let before = before.duration();
            let secs = before.as_secs() as i64;
            if before.subsec_nanos() > 0 {
                -secs - 1
            } else {
                -secs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unix_seconds() {
        let ts = UNIX_EPOCH + Duration::from_millis(1_700_000_000_500);
        assert_eq!(unix_seconds(ts), 1_700_000_000);

        let before = UNIX_EPOCH - Duration::from_millis(1500);
        assert_eq!(unix_seconds(before), -2);
    }

    #[test]
    fn test_packet_builders() {
        let packet = Packet::new(UNIX_EPOCH, "10.0.0.1", "10.0.0.2", "UDP", 80)
            .with_ports(5353, 53)
            .with_dns(DnsInfo {
                opcode: "Query".to_string(),
                questions: vec!["example.com".to_string()],
                ..Default::default()
            });

        assert_eq!(packet.src_port, 5353);
        assert_eq!(packet.dst_port, 53);
        assert_eq!(packet.dns.as_ref().map(|d| d.questions.len()), Some(1));
    }
}
