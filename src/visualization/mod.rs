pub mod charts;
pub mod widgets;
pub mod layouts;

pub use charts::{ProtocolChart, TrafficTimeline, ChartSlice, TimelinePoint};
pub use layouts::{FrameLayout, OverviewLayout};
