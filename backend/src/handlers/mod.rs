//! HTTP handlers for the fermentation server

pub mod batches;
pub mod dashboard;
pub mod health;
pub mod iot;
pub mod readings;
pub mod stats;
pub mod tanks;

pub use batches::*;
pub use dashboard::*;
pub use health::*;
pub use iot::*;
pub use readings::*;
pub use stats::*;
pub use tanks::*;
