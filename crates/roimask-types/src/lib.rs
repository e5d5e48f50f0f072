//! Shared domain types for the roimask project.

pub mod config;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod stream;
pub mod telemetry;

mod errors;

pub use errors::{RoiError, Result};
