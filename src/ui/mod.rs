pub mod dashboard;
pub mod report;

pub use dashboard::Dashboard;
pub use report::TextReport;
