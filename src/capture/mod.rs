pub mod packet;
pub mod pcap_reader;
pub mod dns_decoder;
pub mod properties;

pub use packet::{Packet, DnsInfo, unix_seconds};
pub use pcap_reader::{PcapReader, ReaderStats, CaptureError, CaptureFile, read_capture};
pub use properties::CaptureProperties;
