//! Shared types and fermentation domain logic for the Winery Console
//!
//! This crate contains the domain model used by the backend, the browser
//! console (via WASM), and the in-process fermentation engine.

pub mod clock;
pub mod error;
pub mod fermentation;
pub mod models;
pub mod validation;

pub use clock::*;
pub use error::*;
pub use models::*;
pub use validation::*;
