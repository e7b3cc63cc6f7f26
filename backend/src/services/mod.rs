//! Business logic services for the fermentation server

pub mod batch;
pub mod dashboard;
pub mod reading;
pub mod stats;
pub mod tank;


pub use batch::BatchService;
pub use dashboard::DashboardService;
pub use reading::ReadingService;
pub use stats::StatsService;
pub use tank::TankService;
