// Library exports for traffic-lens
pub mod analysis;
pub mod capture;
pub mod config;
pub mod session;
pub mod ui;
pub mod utils;
pub mod visualization;

pub use analysis::{AnalyzerKind, PacketAnalyzer};
pub use capture::{read_capture, Packet};
pub use config::settings;
pub use session::{Dispatcher, Session, SessionCache, SessionId, SessionSummary};
pub use utils::formatting;

// Error types
pub use anyhow::{Error, Result};
