use log::{debug, info};
use pcap::{Capture, Linktype, Offline};
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::sll::SLLPacket;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;
use pnet::packet::Packet as _;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::capture::dns_decoder::{self, DNS_PORT};
use crate::capture::packet::Packet;
use crate::capture::properties::CaptureProperties;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture file '{}' could not be opened: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: pcap::Error,
    },

    #[error("Reading capture failed after {packets} packets: {source}")]
    Read {
        packets: u64,
        #[source]
        source: pcap::Error,
    },

    #[error("Unsupported link type {0:?}")]
    UnsupportedLinktype(Linktype),

    #[error("Capture file '{}' could not be inspected: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ReaderStats {
    pub frames_read: u64,
    pub bytes_read: u64,
    pub undecoded_frames: u64,
    /// Timestamp of the first record in file order.
    #[serde(skip)]
    pub first_packet: Option<SystemTime>,
    #[serde(skip)]
    pub last_packet: Option<SystemTime>,
}

/// Everything read from one capture file.
#[derive(Debug, Clone)]
pub struct CaptureFile {
    pub packets: Vec<Packet>,
    pub properties: CaptureProperties,
    pub stats: ReaderStats,
}

/// Offline capture reader producing decoded `Packet` records.
pub struct PcapReader {
    capture: Capture<Offline>,
    linktype: Linktype,
    stats: ReaderStats,
}

impl PcapReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let capture = Capture::from_file(path).map_err(|source| CaptureError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let linktype = capture.get_datalink();
        if !is_supported(linktype) {
            return Err(CaptureError::UnsupportedLinktype(linktype));
        }

        info!("Opened capture {} (link type {:?})", path.display(), linktype);

        Ok(PcapReader {
            capture,
            linktype,
            stats: ReaderStats::default(),
        })
    }

    /// Next decoded packet, or `None` at end of file.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, CaptureError> {
        match self.capture.next_packet() {
            Ok(frame) => {
                self.stats.frames_read += 1;
                self.stats.bytes_read += frame.header.len as u64;

                let timestamp = timeval_to_system_time(
                    frame.header.ts.tv_sec as i64,
                    frame.header.ts.tv_usec as i64,
                );
                self.stats.first_packet.get_or_insert(timestamp);
                self.stats.last_packet = Some(timestamp);

                let length = frame.header.len as usize;
                let packet = decode_frame(self.linktype, timestamp, length, frame.data);
                if packet.src_ip.is_empty() {
                    self.stats.undecoded_frames += 1;
                    debug!("Frame {} has no network layer", self.stats.frames_read);
                }
                Ok(Some(packet))
            }
            Err(pcap::Error::NoMorePackets) => Ok(None),
            Err(source) => Err(CaptureError::Read {
                packets: self.stats.frames_read,
                source,
            }),
        }
    }

    /// Drain the capture into memory.
    pub fn read_all(&mut self) -> Result<Vec<Packet>, CaptureError> {
        let mut packets = Vec::new();
        while let Some(packet) = self.next_packet()? {
            packets.push(packet);
        }
        info!(
            "Read {} packets ({} without a network layer)",
            self.stats.frames_read, self.stats.undecoded_frames
        );
        Ok(packets)
    }

    pub fn get_statistics(&self) -> &ReaderStats {
        &self.stats
    }

    /// libpcap's name for the link type, e.g. "EN10MB".
    pub fn link_type_name(&self) -> String {
        self.linktype
            .get_name()
            .unwrap_or_else(|_| format!("DLT {}", self.linktype.0))
    }
}

/// Read every packet of a capture file along with its file properties.
pub fn read_capture(path: impl AsRef<Path>) -> Result<CaptureFile, CaptureError> {
    let path = path.as_ref();
    let mut reader = PcapReader::open(path)?;
    let packets = reader.read_all()?;
    let stats = reader.get_statistics().clone();
    let properties = CaptureProperties::collect(path, reader.link_type_name(), &stats)?;

    Ok(CaptureFile {
        packets,
        properties,
        stats,
    })
}

fn is_supported(linktype: Linktype) -> bool {
    matches!(linktype.0, 1 | 12 | 14 | 101 | 113 | 228 | 229)
}

fn timeval_to_system_time(secs: i64, micros: i64) -> SystemTime {
    let micros = micros.clamp(0, 999_999) as u64;
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64) + Duration::from_micros(micros)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_micros(micros)
    }
}

/// Decode one link-layer frame. Never fails: anything unrecognised yields a
/// record with empty addresses and protocol.
pub fn decode_frame(
    linktype: Linktype,
    timestamp: SystemTime,
    length: usize,
    data: &[u8],
) -> Packet {
    let mut packet = Packet::new(timestamp, String::new(), String::new(), String::new(), length);

    match linktype.0 {
        // Ethernet
        1 => {
            if let Some(ethernet) = EthernetPacket::new(data) {
                decode_ethertype(ethernet.get_ethertype(), ethernet.payload(), &mut packet);
            }
        }
        // Linux cooked capture
        113 => {
            if let Some(sll) = SLLPacket::new(data) {
                decode_ethertype(sll.get_protocol(), sll.payload(), &mut packet);
            }
        }
        228 => decode_ipv4(data, &mut packet),
        229 => decode_ipv6(data, &mut packet),
        // Raw IP, version taken from the first nibble
        _ => match data.first().map(|b| b >> 4) {
            Some(4) => decode_ipv4(data, &mut packet),
            Some(6) => decode_ipv6(data, &mut packet),
            _ => {}
        },
    }

    packet
}

/// Dispatch on an EtherType, unwrapping 802.1Q / 802.1ad tags. Each tag
/// consumes four bytes, so nesting is bounded by the frame length.
fn decode_ethertype(ethertype: EtherType, payload: &[u8], packet: &mut Packet) {
    match ethertype {
        EtherTypes::Ipv4 => decode_ipv4(payload, packet),
        EtherTypes::Ipv6 => decode_ipv6(payload, packet),
        EtherTypes::Vlan | EtherTypes::PBridge | EtherTypes::QinQ => {
            if let Some(vlan) = VlanPacket::new(payload) {
                decode_ethertype(vlan.get_ethertype(), vlan.payload(), packet);
            }
        }
        _ => {}
    }
}

fn decode_ipv4(data: &[u8], packet: &mut Packet) {
    if let Some(ipv4) = Ipv4Packet::new(data) {
        packet.src_ip = ipv4.get_source().to_string();
        packet.dst_ip = ipv4.get_destination().to_string();
        decode_transport(ipv4.get_next_level_protocol(), ipv4.payload(), packet);
    }
}

fn decode_ipv6(data: &[u8], packet: &mut Packet) {
    if let Some(ipv6) = Ipv6Packet::new(data) {
        packet.src_ip = ipv6.get_source().to_string();
        packet.dst_ip = ipv6.get_destination().to_string();
        decode_transport(ipv6.get_next_header(), ipv6.payload(), packet);
    }
}

fn decode_transport(protocol: IpNextHeaderProtocol, data: &[u8], packet: &mut Packet) {
    match protocol {
        IpNextHeaderProtocols::Tcp => {
            if let Some(tcp) = TcpPacket::new(data) {
                packet.protocol = "TCP".to_string();
                packet.src_port = tcp.get_source();
                packet.dst_port = tcp.get_destination();
                if is_dns(packet) {
                    packet.dns = dns_decoder::decode_tcp(tcp.payload());
                }
            }
        }
        IpNextHeaderProtocols::Udp => {
            if let Some(udp) = UdpPacket::new(data) {
                packet.protocol = "UDP".to_string();
                packet.src_port = udp.get_source();
                packet.dst_port = udp.get_destination();
                if is_dns(packet) {
                    packet.dns = dns_decoder::decode_udp(udp.payload());
                }
            }
        }
        IpNextHeaderProtocols::Icmp => packet.protocol = "ICMP".to_string(),
        IpNextHeaderProtocols::Icmpv6 => packet.protocol = "ICMPv6".to_string(),
        _ => {}
    }
}

fn is_dns(packet: &Packet) -> bool {
    packet.src_port == DNS_PORT || packet.dst_port == DNS_PORT
}
