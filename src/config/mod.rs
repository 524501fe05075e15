pub mod settings;

pub use settings::{Config, EngineConfig, CacheConfig, ReportConfig};
