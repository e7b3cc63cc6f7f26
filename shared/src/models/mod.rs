//! Domain models for the fermentation service

mod batch;
mod reading;
pub mod stats;
mod tank;

pub use batch::*;
pub use reading::*;
pub use stats::{compute_batch_stats, BatchStats};
pub use tank::*;
